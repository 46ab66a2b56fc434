/// Trait for reporting dedupe progress.
///
/// The CLI implements it with indicatif. Partition hooks may be called from
/// several worker threads at once. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_run_start(&self, _records: usize, _partitions: usize) {}
    fn on_partition_start(&self, _plan: &str, _partition: &str, _records: usize) {}
    fn on_partition_complete(&self, _plan: &str, _partition: &str, _groups: usize) {}
    fn on_partition_abandoned(&self, _plan: &str, _partition: &str) {}
    fn on_result_set_complete(&self, _plan: &str, _groups: usize, _duration_secs: f64) {}
    fn on_run_complete(&self, _cancelled: bool, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}
