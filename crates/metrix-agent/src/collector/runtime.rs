//! Process statistics plus the `PollCount` / `RandomValue` pair.

use rand::Rng;
use sysinfo::{Pid, Process, System};
use tracing::warn;

use metrix_core::error::Result;
use metrix_core::{Metric, MetricValue};

use super::MetricsProvider;

/// A gauge read off the current process.
struct ProcessGauge {
    name: &'static str,
    read: fn(&Process) -> f64,
}

const PROCESS_GAUGES: &[ProcessGauge] = &[
    ProcessGauge { name: "ResidentMemory", read: |p| p.memory() as f64 },
    ProcessGauge { name: "VirtualMemory", read: |p| p.virtual_memory() as f64 },
    ProcessGauge { name: "ProcessCPU", read: |p| f64::from(p.cpu_usage()) },
    ProcessGauge { name: "DiskReadBytes", read: |p| p.disk_usage().total_read_bytes as f64 },
    ProcessGauge { name: "DiskWrittenBytes", read: |p| p.disk_usage().total_written_bytes as f64 },
    ProcessGauge { name: "RunTime", read: |p| p.run_time() as f64 },
];

pub const POLL_COUNT: &str = "PollCount";
pub const RANDOM_VALUE: &str = "RandomValue";

pub struct RuntimeProvider {
    sys: System,
    pid: Option<Pid>,
    gauges: Vec<(&'static ProcessGauge, Metric)>,
    poll_count: Metric,
    random_value: Metric,
}

impl RuntimeProvider {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(error = e, "current pid unavailable, process gauges disabled");
                None
            }
        };
        Self {
            sys: System::new(),
            pid,
            gauges: PROCESS_GAUGES
                .iter()
                .map(|g| (g, Metric::gauge(g.name, 0.0)))
                .collect(),
            poll_count: Metric::counter(POLL_COUNT, 0),
            random_value: Metric::gauge(RANDOM_VALUE, 0.0),
        }
    }
}

impl Default for RuntimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for RuntimeProvider {
    fn name(&self) -> &'static str {
        "runtime"
    }

    fn update(&mut self) -> Result<()> {
        if let Some(pid) = self.pid {
            self.sys.refresh_process(pid);
            match self.sys.process(pid) {
                Some(proc_) => {
                    for (g, metric) in &self.gauges {
                        metric.set_value(MetricValue::Gauge((g.read)(proc_)))?;
                    }
                }
                None => warn!(%pid, "current process missing from process table"),
            }
        }

        self.poll_count.set_value(MetricValue::Counter(1))?;
        let r: f64 = rand::thread_rng().gen();
        self.random_value.set_value(MetricValue::Gauge(r))?;
        Ok(())
    }

    fn metrics(&self) -> Vec<Metric> {
        self.gauges
            .iter()
            .map(|(_, m)| m.clone())
            .chain([self.poll_count.clone(), self.random_value.clone()])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use metrix_core::MetricKind;

    use super::*;

    fn find(metrics: &[Metric], name: &str) -> Metric {
        metrics.iter().find(|m| m.name() == name).cloned().unwrap()
    }

    #[test]
    fn poll_count_counts_updates() {
        let mut p = RuntimeProvider::new();
        for _ in 0..3 {
            p.update().unwrap();
        }
        let poll = find(&p.metrics(), POLL_COUNT);
        assert_eq!(poll.value(), MetricValue::Counter(3));

        // flush through the shared handle, then keep counting
        poll.flush();
        p.update().unwrap();
        assert_eq!(find(&p.metrics(), POLL_COUNT).value(), MetricValue::Counter(1));
    }

    #[test]
    fn random_value_and_process_table() {
        let mut p = RuntimeProvider::new();
        p.update().unwrap();
        let metrics = p.metrics();
        assert_eq!(metrics.len(), PROCESS_GAUGES.len() + 2);

        match find(&metrics, RANDOM_VALUE).value() {
            MetricValue::Gauge(v) => assert!((0.0..1.0).contains(&v)),
            other => panic!("unexpected {other:?}"),
        }
        for g in PROCESS_GAUGES {
            assert_eq!(find(&metrics, g.name).kind(), MetricKind::Gauge);
        }
        match find(&metrics, "ResidentMemory").value() {
            MetricValue::Gauge(v) => assert!(v > 0.0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
