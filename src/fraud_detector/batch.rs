use ethers::{
    abi::AbiDecode as _,
    types::H256,
};

use super::ethereum::AppendStateBatchCall;

/// The ordered run of rollup state roots committed by one `appendStateBatch`
/// transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CommittedBatch {
    roots: Vec<H256>,
}

impl CommittedBatch {
    pub(crate) fn len(&self) -> u64 {
        self.roots.len() as u64
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Returns the committed root at the zero-based position within this
    /// batch, or `None` if the offset is past the batch's end.
    pub(crate) fn root_at(&self, offset: u64) -> Option<H256> {
        usize::try_from(offset)
            .ok()
            .and_then(|offset| self.roots.get(offset).copied())
    }
}

/// Failed to decode calldata as an `appendStateBatch` commitment call.
///
/// Fatal for the cycle that hit it: a commitment the engine cannot decode
/// invalidates the integrity guarantee and must not be skipped silently.
#[derive(Debug, thiserror::Error)]
#[error("calldata is not a well-formed `appendStateBatch` commitment call")]
pub(crate) struct DecodeError(#[from] ethers::abi::AbiError);

/// Decodes the ordered sequence of committed state roots from the calldata of
/// a commitment transaction.
pub(crate) fn decode_committed_batch(calldata: &[u8]) -> Result<CommittedBatch, DecodeError> {
    let call = AppendStateBatchCall::decode(calldata)?;
    Ok(CommittedBatch {
        roots: call.batch.into_iter().map(H256::from).collect(),
    })
}
