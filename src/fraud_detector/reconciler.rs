use std::{
    sync::Arc,
    time::Duration,
};

use ethers::types::H256;
use tokio::{
    select,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{
    debug,
    info,
    instrument,
    warn,
};

use super::{
    batch::{
        self,
        DecodeError,
    },
    error::SourceError,
    scanner::{
        self,
        CommitmentChain,
        CommitmentEvent,
    },
    state::State,
    verifier::{
        self,
        RollupNode,
    },
};
use crate::metrics::Metrics;

/// An error that aborts the running reconciliation cycle.
///
/// Neither variant is a mismatch: a mismatch is the engine's product and is
/// reported through the published status, not as an error.
#[derive(Debug, thiserror::Error)]
pub(crate) enum EngineError {
    #[error("a state source became unavailable")]
    SourceUnavailable(#[from] SourceError),
    #[error("failed to decode the commitment carried by base chain transaction {transaction_hash}")]
    Decode {
        transaction_hash: H256,
        #[source]
        source: DecodeError,
    },
}

pub(super) struct Builder<C, N> {
    pub(super) shutdown_token: CancellationToken,
    pub(super) commitment_chain: C,
    pub(super) canonical_node: N,
    pub(super) verifier_node: N,
    pub(super) state: Arc<State>,
    pub(super) metrics: &'static Metrics,
    pub(super) l1_deployment_block: u64,
    pub(super) rollup_start_block: u64,
    pub(super) poll_interval: Duration,
    pub(super) confirmation_depth: u64,
    pub(super) max_scan_window: u64,
}

impl<C: CommitmentChain, N: RollupNode> Builder<C, N> {
    pub(super) fn build(self) -> Reconciler<C, N> {
        let Self {
            shutdown_token,
            commitment_chain,
            canonical_node,
            verifier_node,
            state,
            metrics,
            l1_deployment_block,
            rollup_start_block,
            poll_interval,
            confirmation_depth,
            max_scan_window,
        } = self;

        Reconciler {
            shutdown_token,
            commitment_chain,
            canonical_node,
            verifier_node,
            state,
            metrics,
            rollup_start_block,
            poll_interval,
            confirmation_depth,
            max_scan_window,
            scan_cursor: l1_deployment_block,
            root_count: 0,
            last_verified: rollup_start_block.saturating_sub(1),
            mismatch: None,
        }
    }
}

/// What a completed cycle asks the run loop to do next.
enum CycleOutcome {
    /// More confirmed base chain blocks are waiting; scan again immediately.
    Progressed,
    /// The scan caught up with the confirmation-safe head; sleep before the
    /// next cycle.
    CaughtUp,
    /// A mismatch was detected; stop scanning permanently.
    Halted,
}

/// The reconciliation engine.
///
/// Owns the entire mutable reconciliation state; one cycle strictly follows
/// the previous, and every RPC call is awaited inline. The rest of the
/// service observes progress only through the snapshots published to
/// [`State`].
pub(super) struct Reconciler<C, N> {
    shutdown_token: CancellationToken,
    commitment_chain: C,
    canonical_node: N,
    verifier_node: N,
    state: Arc<State>,
    metrics: &'static Metrics,
    rollup_start_block: u64,
    poll_interval: Duration,
    confirmation_depth: u64,
    max_scan_window: u64,

    /// Next base chain block to scan from.
    scan_cursor: u64,
    /// Total state roots processed across all batches so far.
    root_count: u64,
    /// Highest rollup block checkpointed as consistent.
    last_verified: u64,
    /// The first detected disagreement; terminal once set.
    mismatch: Option<verifier::BlockVerificationResult>,
}

impl<C: CommitmentChain, N: RollupNode> Reconciler<C, N> {
    pub(super) async fn run_until_stopped(mut self) -> Result<(), EngineError> {
        self.state.set_checkpoint(self.last_verified, self.root_count);
        self.state.set_engine_ready();
        info!(
            scan_cursor = self.scan_cursor,
            last_verified = self.last_verified,
            "starting reconciliation"
        );

        loop {
            if self.shutdown_token.is_cancelled() {
                info!("received shutdown signal");
                break;
            }

            match self.run_cycle().await? {
                CycleOutcome::Progressed => {}
                CycleOutcome::CaughtUp => {
                    select!(
                        () = self.shutdown_token.cancelled() => {
                            info!("received shutdown signal while waiting for new base chain blocks");
                            break;
                        }
                        () = sleep(self.poll_interval) => {}
                    );
                }
                CycleOutcome::Halted => {
                    warn!(
                        last_verified = self.last_verified,
                        mismatch = ?self.mismatch,
                        "mismatch detected; reconciliation halted permanently"
                    );
                    break;
                }
            }
        }

        Ok(())
    }

    /// Runs one reconciliation cycle: advance the scan window, decode each
    /// event's batch, verify all newly covered rollup blocks, advance the
    /// cursor.
    #[instrument(skip_all, fields(scan_cursor = self.scan_cursor))]
    async fn run_cycle(&mut self) -> Result<CycleOutcome, EngineError> {
        self.metrics.increment_scan_cycle_count();

        let head = self.commitment_chain.head_block_number().await?;
        let Some(window) = scanner::next_window(
            head,
            self.scan_cursor,
            self.confirmation_depth,
            self.max_scan_window,
        ) else {
            debug!(head, "caught up with the confirmation-safe head");
            return Ok(CycleOutcome::CaughtUp);
        };

        let events = self.commitment_chain.commitment_events(window).await?;
        debug!(
            from_block = window.from_block,
            to_block = window.to_block,
            events = events.len(),
            "scanned commitment log"
        );

        let mut halted = false;
        for event in &events {
            if self.process_event(event).await? {
                halted = true;
                break;
            }
        }

        // The cursor advances even on the halting cycle; it tracks scan
        // progress, not the checkpoint.
        self.scan_cursor = window.to_block.saturating_add(1);

        if halted {
            return Ok(CycleOutcome::Halted);
        }
        if window.to_block < window.from_block.saturating_add(self.max_scan_window) {
            return Ok(CycleOutcome::CaughtUp);
        }
        Ok(CycleOutcome::Progressed)
    }

    /// Verifies all blocks of one commitment event's batch that are not yet
    /// checkpointed. Returns `true` if a mismatch halted the engine.
    async fn process_event(&mut self, event: &CommitmentEvent) -> Result<bool, EngineError> {
        let calldata = self
            .commitment_chain
            .transaction_data(event.transaction_hash)
            .await?;
        let batch = batch::decode_committed_batch(&calldata).map_err(|source| {
            EngineError::Decode {
                transaction_hash: event.transaction_hash,
                source,
            }
        })?;
        self.metrics.increment_batches_decoded_count();

        if batch.is_empty() {
            info!(batch_index = %event.batch_index, "commitment batch is empty; nothing to verify");
            return Ok(false);
        }

        // The event's previous-total-elements anchors the batch in the global
        // root sequence, so a replayed event maps to the same rollup blocks
        // as its first appearance.
        let batch_first_block = self.rollup_start_block + event.prev_total_elements;
        let batch_end_block = batch_first_block + batch.len() - 1;

        if batch_end_block <= self.last_verified {
            self.root_count = self
                .root_count
                .max(event.prev_total_elements + batch.len());
            self.state.set_checkpoint(self.last_verified, self.root_count);
            info!(
                batch_index = %event.batch_index,
                batch_first_block,
                batch_end_block,
                "batch is below the checkpoint; skipping re-verification"
            );
            return Ok(false);
        }

        if batch_first_block > self.last_verified + 1 {
            warn!(
                batch_index = %event.batch_index,
                batch_first_block,
                last_verified = self.last_verified,
                "commitment log has a gap ahead of the checkpoint; blocks in the gap cannot be verified"
            );
        }

        let first_unverified = (self.last_verified + 1).max(batch_first_block);
        for block_number in first_unverified..=batch_end_block {
            let offset = block_number - batch_first_block;
            let committed_root = batch
                .root_at(offset)
                .expect("offset is within the batch because block_number <= batch_end_block");

            let result = verifier::verify_block(
                &self.canonical_node,
                &self.verifier_node,
                block_number,
                committed_root,
            )
            .await?;

            self.last_verified = block_number;
            self.root_count = self.root_count.max(event.prev_total_elements + offset + 1);
            self.metrics.increment_blocks_verified_count();
            self.metrics.set_last_verified_block(self.last_verified);
            self.metrics.set_cumulative_root_count(self.root_count);

            info!(
                rollup_block = block_number,
                committed_root = %result.committed_root,
                canonical_root = %result.canonical_root,
                verifier_root = %result.verifier_root,
                outcome = ?result.outcome,
                "verified rollup block"
            );

            self.state.set_checkpoint(self.last_verified, self.root_count);

            if !result.outcome.is_match() {
                warn!(
                    rollup_block = block_number,
                    outcome = ?result.outcome,
                    "state root mismatch detected"
                );
                self.metrics.increment_mismatches_detected_count();
                self.state.set_halted(result.clone());
                self.mismatch = Some(result);
                return Ok(true);
            }
        }

        Ok(false)
    }
}
