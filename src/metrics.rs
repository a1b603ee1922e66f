use metrics::{
    counter,
    describe_counter,
    describe_gauge,
    gauge,
    Counter,
    Gauge,
    Unit,
};

pub struct Metrics {
    last_verified_block: Gauge,
    cumulative_root_count: Gauge,
    scan_cycle_count: Counter,
    batches_decoded_count: Counter,
    blocks_verified_count: Counter,
    mismatches_detected_count: Counter,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        describe_gauge!(
            LAST_VERIFIED_BLOCK,
            Unit::Count,
            "The highest rollup block checkpointed as consistent across all three sources"
        );
        let last_verified_block = gauge!(LAST_VERIFIED_BLOCK);

        describe_gauge!(
            CUMULATIVE_ROOT_COUNT,
            Unit::Count,
            "The total number of committed state roots processed so far"
        );
        let cumulative_root_count = gauge!(CUMULATIVE_ROOT_COUNT);

        describe_counter!(
            SCAN_CYCLE_COUNT,
            Unit::Count,
            "The number of base chain scan cycles run"
        );
        let scan_cycle_count = counter!(SCAN_CYCLE_COUNT);

        describe_counter!(
            BATCHES_DECODED_COUNT,
            Unit::Count,
            "The number of commitment batches decoded from base chain transactions"
        );
        let batches_decoded_count = counter!(BATCHES_DECODED_COUNT);

        describe_counter!(
            BLOCKS_VERIFIED_COUNT,
            Unit::Count,
            "The number of rollup blocks verified against both nodes"
        );
        let blocks_verified_count = counter!(BLOCKS_VERIFIED_COUNT);

        describe_counter!(
            MISMATCHES_DETECTED_COUNT,
            Unit::Count,
            "The number of state root mismatches detected; at most one, the service halts on the \
             first"
        );
        let mismatches_detected_count = counter!(MISMATCHES_DETECTED_COUNT);

        Self {
            last_verified_block,
            cumulative_root_count,
            scan_cycle_count,
            batches_decoded_count,
            blocks_verified_count,
            mismatches_detected_count,
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "gauges only accept f64; rollup block numbers stay well below 2^52"
    )]
    pub(crate) fn set_last_verified_block(&self, block: u64) {
        self.last_verified_block.set(block as f64);
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "gauges only accept f64; root counts stay well below 2^52"
    )]
    pub(crate) fn set_cumulative_root_count(&self, count: u64) {
        self.cumulative_root_count.set(count as f64);
    }

    pub(crate) fn increment_scan_cycle_count(&self) {
        self.scan_cycle_count.increment(1);
    }

    pub(crate) fn increment_batches_decoded_count(&self) {
        self.batches_decoded_count.increment(1);
    }

    pub(crate) fn increment_blocks_verified_count(&self) {
        self.blocks_verified_count.increment(1);
    }

    pub(crate) fn increment_mismatches_detected_count(&self) {
        self.mismatches_detected_count.increment(1);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

const LAST_VERIFIED_BLOCK: &str = concat!(env!("CARGO_CRATE_NAME"), "_last_verified_block");
const CUMULATIVE_ROOT_COUNT: &str = concat!(env!("CARGO_CRATE_NAME"), "_cumulative_root_count");
const SCAN_CYCLE_COUNT: &str = concat!(env!("CARGO_CRATE_NAME"), "_scan_cycle_count");
const BATCHES_DECODED_COUNT: &str = concat!(env!("CARGO_CRATE_NAME"), "_batches_decoded_count");
const BLOCKS_VERIFIED_COUNT: &str = concat!(env!("CARGO_CRATE_NAME"), "_blocks_verified_count");
const MISMATCHES_DETECTED_COUNT: &str =
    concat!(env!("CARGO_CRATE_NAME"), "_mismatches_detected_count");
