//! Host memory and per-CPU utilization.

use sysinfo::System;

use metrix_core::error::Result;
use metrix_core::{Metric, MetricValue};

use super::MetricsProvider;

pub struct SystemProvider {
    sys: System,
    total_memory: Metric,
    free_memory: Metric,
    cpus: Vec<Metric>,
}

impl SystemProvider {
    pub fn new() -> Self {
        Self {
            sys: System::new(),
            total_memory: Metric::gauge("TotalMemory", 0.0),
            free_memory: Metric::gauge("FreeMemory", 0.0),
            cpus: Vec::new(),
        }
    }
}

impl Default for SystemProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for SystemProvider {
    fn name(&self) -> &'static str {
        "system"
    }

    fn update(&mut self) -> Result<()> {
        self.sys.refresh_memory();
        self.sys.refresh_cpu();

        self.total_memory
            .set_value(MetricValue::Gauge(self.sys.total_memory() as f64))?;
        self.free_memory
            .set_value(MetricValue::Gauge(self.sys.free_memory() as f64))?;

        let cpus = self.sys.cpus();
        // CPUs are numbered from 1; handles are created once per CPU.
        while self.cpus.len() < cpus.len() {
            let n = self.cpus.len() + 1;
            self.cpus.push(Metric::gauge(format!("CPUutilization{n}"), 0.0));
        }
        for (cpu, metric) in cpus.iter().zip(&self.cpus) {
            metric.set_value(MetricValue::Gauge(f64::from(cpu.cpu_usage())))?;
        }
        Ok(())
    }

    fn metrics(&self) -> Vec<Metric> {
        [self.total_memory.clone(), self.free_memory.clone()]
            .into_iter()
            .chain(self.cpus.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_memory_and_stable_cpu_handles() {
        let mut p = SystemProvider::new();
        p.update().unwrap();
        let first = p.metrics();
        assert_eq!(first[0].name(), "TotalMemory");
        assert_eq!(first[1].name(), "FreeMemory");
        match first[0].value() {
            MetricValue::Gauge(v) => assert!(v > 0.0),
            other => panic!("unexpected {other:?}"),
        }
        for (i, m) in first[2..].iter().enumerate() {
            assert_eq!(m.name(), format!("CPUutilization{}", i + 1));
        }

        p.update().unwrap();
        let second = p.metrics();
        assert_eq!(first.len(), second.len());
        assert!(first.iter().zip(&second).all(|(a, b)| a.same_cell(b)));
    }
}
