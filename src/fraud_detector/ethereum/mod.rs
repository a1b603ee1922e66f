mod client;
mod contract;

pub(crate) use client::{
    CommitmentChainClient,
    RollupClient,
};
pub(crate) use contract::{
    address_from_string,
    AppendStateBatchCall,
};
