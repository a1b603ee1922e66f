//! Bindings for the state commitment chain contract on the base chain, which
//! publishes one `StateBatchAppended` event per committed batch of rollup
//! state roots.
//!
//! The bindings are generated from the `StateCommitmentChain.abi` file in the
//! project root, which contains the subset of the contract's ABI this service
//! reads.
use ethers::prelude::*;
use eyre::{
    eyre,
    WrapErr as _,
};

abigen!(StateCommitmentChain, "./StateCommitmentChain.abi");

// converts an ethereum address string to an `ethers::types::Address`.
// the input string may be prefixed with "0x" or not.
pub(crate) fn address_from_string(s: &str) -> eyre::Result<Address> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).wrap_err("failed to parse ethereum address as hex")?;
    let address: [u8; 20] = bytes
        .try_into()
        .map_err(|_| eyre!("invalid length for ethereum address, must be 20 bytes"))?;
    Ok(address.into())
}
