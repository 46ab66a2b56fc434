use indicatif::{ProgressBar, ProgressStyle};
use media_dedupe_core::ProgressReporter;
use std::sync::Mutex;

/// Progress bar over partitions. A run in `both` mode walks every partition twice.
pub struct CliReporter {
    plans: usize,
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new(plans: usize) -> Self {
        Self {
            plans: plans.max(1),
            bar: Mutex::new(None),
        }
    }

    fn tick(&self) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            pb.inc(1);
        }
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_run_start(&self, records: usize, partitions: usize) {
        let pb = ProgressBar::new((partitions * self.plans) as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Grouping [{bar:30.cyan/dim}] {pos}/{len} partitions {msg}",
            )
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(format!("({} records)", records));
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        *self.bar.lock().unwrap() = Some(pb);
    }

    fn on_partition_complete(&self, _plan: &str, _partition: &str, _groups: usize) {
        self.tick();
    }

    fn on_partition_abandoned(&self, _plan: &str, _partition: &str) {
        self.tick();
    }

    fn on_result_set_complete(&self, plan: &str, groups: usize, duration_secs: f64) {
        let guard = self.bar.lock().unwrap();
        let line = format!(
            "  \x1b[32m✓\x1b[0m {} complete: {} groups in {:.2}s",
            plan, groups, duration_secs
        );
        match guard.as_ref() {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn on_run_complete(&self, cancelled: bool, duration_secs: f64) {
        self.finish_bar();
        if cancelled {
            eprintln!(
                "  \x1b[33m!\x1b[0m Run interrupted after {:.2}s; finished partitions kept",
                duration_secs
            );
        }
    }
}
