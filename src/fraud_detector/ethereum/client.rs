use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    contract::LogMeta,
    providers::{
        Http,
        Middleware as _,
        Provider,
    },
    types::{
        Address,
        Bytes,
        H256,
    },
};
use eyre::WrapErr as _;

use super::contract::{
    StateBatchAppendedFilter,
    StateCommitmentChain,
};
use crate::fraud_detector::{
    error::SourceError,
    scanner::{
        CommitmentChain,
        CommitmentEvent,
        ScanWindow,
    },
    verifier::RollupNode,
};

/// Read side of the state commitment chain: head block queries, ranged event
/// queries against the contract, and commitment transaction fetches.
pub(crate) struct CommitmentChainClient {
    provider: Arc<Provider<Http>>,
    contract: StateCommitmentChain<Provider<Http>>,
}

impl CommitmentChainClient {
    pub(crate) fn new(l1_rpc_endpoint: &str, contract_address: Address) -> eyre::Result<Self> {
        let provider = Arc::new(
            Provider::<Http>::try_from(l1_rpc_endpoint)
                .wrap_err("failed to create base chain http provider")?,
        );
        let contract = StateCommitmentChain::new(contract_address, provider.clone());
        Ok(Self {
            provider,
            contract,
        })
    }
}

#[async_trait]
impl CommitmentChain for CommitmentChainClient {
    async fn head_block_number(&self) -> Result<u64, SourceError> {
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|error| SourceError::new("failed to fetch base chain head block", error))?;
        Ok(head.as_u64())
    }

    async fn commitment_events(
        &self,
        window: ScanWindow,
    ) -> Result<Vec<CommitmentEvent>, SourceError> {
        let events = self
            .contract
            .event::<StateBatchAppendedFilter>()
            .from_block(window.from_block)
            .to_block(window.to_block)
            .query_with_meta()
            .await
            .map_err(|error| SourceError::new("failed to query commitment events", error))?;

        events
            .into_iter()
            .map(|(event, meta)| commitment_event_from_log(event, meta))
            .collect()
    }

    async fn transaction_data(&self, transaction_hash: H256) -> Result<Bytes, SourceError> {
        let transaction = self
            .provider
            .get_transaction(transaction_hash)
            .await
            .map_err(|error| {
                SourceError::new("failed to fetch commitment transaction", error)
            })?
            .ok_or_else(|| {
                SourceError::new(
                    "commitment transaction not found on base chain",
                    format!("no transaction with hash {transaction_hash}"),
                )
            })?;
        Ok(transaction.input)
    }
}

// The contract is untrusted input; its uint256 fields are converted
// fallibly instead of truncating or panicking.
fn commitment_event_from_log(
    event: StateBatchAppendedFilter,
    meta: LogMeta,
) -> Result<CommitmentEvent, SourceError> {
    let prev_total_elements = u64::try_from(event.prev_total_elements).map_err(|_| {
        SourceError::new(
            "commitment event's previous total elements does not fit in u64",
            format!("got {}", event.prev_total_elements),
        )
    })?;
    Ok(CommitmentEvent {
        transaction_hash: meta.transaction_hash,
        block_number: meta.block_number.as_u64(),
        batch_index: event.batch_index,
        prev_total_elements,
    })
}

/// A rollup node queried for per-block state roots, used for both the
/// canonical and the verifier node.
pub(crate) struct RollupClient {
    provider: Provider<Http>,
}

impl RollupClient {
    pub(crate) fn new(rpc_endpoint: &str) -> eyre::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_endpoint)
            .wrap_err("failed to create rollup node http provider")?;
        Ok(Self {
            provider,
        })
    }
}

#[async_trait]
impl RollupNode for RollupClient {
    async fn state_root(&self, block_number: u64) -> Result<H256, SourceError> {
        let block = self
            .provider
            .get_block(block_number)
            .await
            .map_err(|error| SourceError::new("failed to fetch rollup block", error))?
            .ok_or_else(|| {
                SourceError::new(
                    "rollup node does not have the requested block",
                    format!("no block with number {block_number}"),
                )
            })?;
        Ok(block.state_root)
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::U256;

    use super::*;

    fn event(prev_total_elements: U256) -> StateBatchAppendedFilter {
        StateBatchAppendedFilter {
            batch_index: U256::from(7),
            batch_root: [0; 32],
            batch_size: U256::from(5),
            prev_total_elements,
            extra_data: Bytes::default(),
        }
    }

    fn meta() -> LogMeta {
        LogMeta {
            address: Address::zero(),
            block_number: 42.into(),
            block_hash: H256::zero(),
            transaction_hash: H256::from_low_u64_be(0xf00d),
            transaction_index: 0.into(),
            log_index: U256::zero(),
        }
    }

    #[test]
    fn event_fields_are_converted_losslessly() {
        let converted = commitment_event_from_log(event(U256::from(9)), meta()).unwrap();
        assert_eq!(converted.transaction_hash, H256::from_low_u64_be(0xf00d));
        assert_eq!(converted.block_number, 42);
        assert_eq!(converted.batch_index, U256::from(7));
        assert_eq!(converted.prev_total_elements, 9);
    }

    #[test]
    fn oversized_prev_total_elements_is_a_source_fault() {
        let oversized = U256::from(u64::MAX) + 1;
        assert!(commitment_event_from_log(event(oversized), meta()).is_err());
    }
}
