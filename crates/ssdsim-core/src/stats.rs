//! Simulation counters and latency summaries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::Completion;

/// Running min/mean/max over request latencies, in simulated nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub total_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
}

impl LatencySummary {
    pub fn record(&mut self, latency: Duration) {
        let ns = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        if self.count == 0 || ns < self.min_ns {
            self.min_ns = ns;
        }
        self.max_ns = self.max_ns.max(ns);
        self.total_ns = self.total_ns.saturating_add(ns);
        self.count += 1;
    }

    pub fn mean_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.count as f64
        }
    }
}

/// Snapshot of simulation activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimStats {
    /// Requests accepted into the submission queue.
    pub submitted: u64,
    /// Submissions refused because the queue was full.
    pub rejected_busy: u64,
    /// Completions handed back to the host.
    pub completed: u64,
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    /// Reads of never-written LBAs.
    pub unmapped_reads: u64,
    /// Distinct LBAs with a mapping.
    pub mapped_lbas: u64,
    /// Current simulated time in nanoseconds.
    pub sim_time_ns: u64,
    pub read_latency: LatencySummary,
    pub write_latency: LatencySummary,
}

impl SimStats {
    /// Account for a completion handed to the host.
    pub fn record_completion(&mut self, cpl: &Completion) {
        self.completed += 1;
        let bytes = u64::from(cpl.size_bytes);
        if cpl.is_write {
            self.writes += 1;
            self.bytes_written += bytes;
            self.write_latency.record(cpl.latency());
        } else {
            self.reads += 1;
            self.bytes_read += bytes;
            self.read_latency.record(cpl.latency());
        }
    }

    /// Requests accepted but not yet returned to the host.
    pub fn outstanding(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }

    /// Completed requests per simulated second.
    pub fn iops(&self) -> f64 {
        if self.sim_time_ns == 0 {
            return 0.0;
        }
        self.completed as f64 / (self.sim_time_ns as f64 / 1e9)
    }

    /// Pretty-print the snapshot.
    pub fn print(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SSD SIMULATION STATS");
        println!("{}", "=".repeat(60));
        println!(
            "Simulated time: {:.3} ms",
            self.sim_time_ns as f64 / 1e6
        );
        println!(
            "Submitted: {} | Completed: {} | Busy rejections: {}",
            self.submitted, self.completed, self.rejected_busy
        );
        println!(
            "Reads: {} ({} B, {} unmapped) | Writes: {} ({} B)",
            self.reads, self.bytes_read, self.unmapped_reads, self.writes, self.bytes_written
        );
        println!("Mapped LBAs: {}", self.mapped_lbas);
        println!(
            "\n{:<8} {:>10} {:>12} {:>12} {:>12}",
            "Op", "Count", "Min(us)", "Mean(us)", "Max(us)"
        );
        println!("{}", "-".repeat(58));
        for (name, lat) in [("read", &self.read_latency), ("write", &self.write_latency)] {
            println!(
                "{:<8} {:>10} {:>12.3} {:>12.3} {:>12.3}",
                name,
                lat.count,
                lat.min_ns as f64 / 1e3,
                lat.mean_ns() / 1e3,
                lat.max_ns as f64 / 1e3
            );
        }
    }
}
