use tokio::sync::watch;

use super::verifier::BlockVerificationResult;

/// The single-writer side of the status store.
///
/// Owned by the service, written to only from the reconciliation engine task;
/// the status API holds receivers and never observes a half-updated
/// checkpoint.
pub(crate) struct State {
    inner: watch::Sender<VerifiedBlockStatus>,
}

impl State {
    pub(crate) fn new() -> Self {
        let (inner, _) = watch::channel(VerifiedBlockStatus::default());
        Self {
            inner,
        }
    }

    pub(crate) fn set_engine_ready(&self) {
        self.inner.send_modify(VerifiedBlockStatus::set_engine_ready);
    }

    pub(crate) fn set_checkpoint(&self, last_verified_block: u64, cumulative_root_count: u64) {
        self.inner.send_if_modified(|status| {
            status.set_checkpoint(last_verified_block, cumulative_root_count)
        });
    }

    pub(crate) fn set_halted(&self, mismatch: BlockVerificationResult) {
        self.inner
            .send_modify(|status| status.set_halted(mismatch));
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<VerifiedBlockStatus> {
        self.inner.subscribe()
    }
}

/// The externally visible snapshot of the reconciliation state.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct VerifiedBlockStatus {
    engine_ready: bool,
    last_verified_block: u64,
    cumulative_root_count: u64,
    halted: bool,
    mismatch: Option<BlockVerificationResult>,
}

impl VerifiedBlockStatus {
    fn set_engine_ready(&mut self) {
        self.engine_ready = true;
    }

    fn set_checkpoint(&mut self, last_verified_block: u64, cumulative_root_count: u64) -> bool {
        let changed = self.last_verified_block != last_verified_block
            || self.cumulative_root_count != cumulative_root_count;
        self.last_verified_block = last_verified_block;
        self.cumulative_root_count = cumulative_root_count;
        changed
    }

    fn set_halted(&mut self, mismatch: BlockVerificationResult) {
        self.halted = true;
        self.mismatch = Some(mismatch);
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.engine_ready
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn last_verified_block(&self) -> u64 {
        self.last_verified_block
    }

    pub(crate) fn cumulative_root_count(&self) -> u64 {
        self.cumulative_root_count
    }

    pub(crate) fn mismatch(&self) -> Option<&BlockVerificationResult> {
        self.mismatch.as_ref()
    }
}
