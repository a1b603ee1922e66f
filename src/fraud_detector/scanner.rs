use async_trait::async_trait;
use ethers::types::{
    Bytes,
    H256,
    U256,
};

use super::error::SourceError;

/// A confirmation-safe, size-bounded range of base chain blocks to scan for
/// commitment events. Both bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ScanWindow {
    pub(crate) from_block: u64,
    pub(crate) to_block: u64,
}

/// One `StateBatchAppended` event retrieved from the commitment log, in chain
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CommitmentEvent {
    /// Hash of the base chain transaction carrying the commitment call.
    pub(crate) transaction_hash: H256,
    /// Base chain block the event was emitted in.
    pub(crate) block_number: u64,
    /// Index of the batch in the commitment chain's global batch sequence.
    pub(crate) batch_index: U256,
    /// Number of state roots committed before this batch; anchors the batch
    /// in the global root sequence.
    pub(crate) prev_total_elements: u64,
}

/// Read access to the base chain's commitment log.
#[async_trait]
pub(crate) trait CommitmentChain {
    /// Returns the base chain's current head block number.
    async fn head_block_number(&self) -> Result<u64, SourceError>;

    /// Returns all commitment events emitted within `window`, in ascending
    /// chain order. An empty window is not an error.
    async fn commitment_events(
        &self,
        window: ScanWindow,
    ) -> Result<Vec<CommitmentEvent>, SourceError>;

    /// Returns the calldata of the base chain transaction with the given
    /// hash.
    async fn transaction_data(&self, transaction_hash: H256) -> Result<Bytes, SourceError>;
}

/// Computes the next scan window for the given base chain head and scan
/// cursor.
///
/// Returns `None` if the cursor has caught up with the confirmation-safe
/// head, i.e. there is nothing to scan yet.
pub(crate) fn next_window(
    head: u64,
    cursor: u64,
    confirmation_depth: u64,
    max_window: u64,
) -> Option<ScanWindow> {
    let safe_head = head.checked_sub(confirmation_depth)?;
    if safe_head < cursor {
        return None;
    }
    Some(ScanWindow {
        from_block: cursor,
        to_block: safe_head.min(cursor.saturating_add(max_window)),
    })
}

#[cfg(test)]
mod tests {
    use super::next_window;

    #[test]
    fn window_is_bounded_by_max_size() {
        let window = next_window(10_000, 100, 8, 1000).unwrap();
        assert_eq!(window.from_block, 100);
        assert_eq!(window.to_block, 1100);
    }

    #[test]
    fn window_is_bounded_by_safe_head() {
        let window = next_window(500, 100, 8, 1000).unwrap();
        assert_eq!(window.from_block, 100);
        assert_eq!(window.to_block, 492);
    }

    #[test]
    fn caught_up_cursor_yields_no_window() {
        assert_eq!(next_window(500, 493, 8, 1000), None);
    }

    #[test]
    fn cursor_at_safe_head_yields_single_block_window() {
        let window = next_window(500, 492, 8, 1000).unwrap();
        assert_eq!(window.from_block, 492);
        assert_eq!(window.to_block, 492);
    }

    #[test]
    fn confirmation_depth_below_head_yields_no_window() {
        assert_eq!(next_window(5, 0, 8, 1000), None);
    }
}
