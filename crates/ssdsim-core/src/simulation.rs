//! One wired-up simulated SSD: kernel, host queues, firmware, FTL and NAND.
//!
//! Callers live in wall-clock time and interact through two non-blocking
//! calls. [`Simulation::submit`] enqueues a request or refuses with `Busy`.
//! [`Simulation::poll`] hands back finished requests and, because nothing
//! else drives the simulated clock, spends up to `poll_max_steps` quanta of
//! simulated time so in-flight work can finish. One poll therefore never
//! moves the clock by more than `poll_quantum * poll_max_steps`.

use std::time::Duration;

use crate::config::SimConfig;
use crate::error::Result;
use crate::firmware::{Firmware, FirmwareEvent};
use crate::host::{Completion, HostInterface, IoSubmission};
use crate::kernel::{Kernel, SimTime};
use crate::stats::SimStats;

pub struct Simulation {
    config: SimConfig,
    kernel: Kernel<FirmwareEvent>,
    host: HostInterface,
    firmware: Firmware,
    stats: SimStats,
}

impl Simulation {
    /// Build a simulation from a validated config.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let host = HostInterface::new(config.host.queue_depth);
        let firmware = Firmware::from_config(&config);
        log::info!(
            "ssd: {} blocks x {} pages, read={}us prog={}us erase={}us overhead={}us, qd={}",
            config.nand.blocks_per_die,
            config.nand.pages_per_block,
            config.nand.timing.t_read_us,
            config.nand.timing.t_prog_us,
            config.nand.timing.t_erase_us,
            config.controller.ctrl_overhead_us,
            config.host.queue_depth
        );
        Ok(Self {
            config,
            kernel: Kernel::new(),
            host,
            firmware,
            stats: SimStats::default(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.kernel.now()
    }

    pub fn firmware(&self) -> &Firmware {
        &self.firmware
    }

    pub fn host(&self) -> &HostInterface {
        &self.host
    }

    /// Accept a request at the current simulated time.
    ///
    /// Returns [`crate::SimError::Busy`] when the submission queue is full; the
    /// request is dropped and never produces a completion.
    pub fn submit(&mut self, sub: IoSubmission) -> Result<()> {
        match self.host.submit(sub, self.kernel.now()) {
            Ok(_) => {
                self.stats.submitted += 1;
                self.firmware.wake(&mut self.kernel);
                Ok(())
            }
            Err(e) => {
                self.stats.rejected_busy += 1;
                Err(e)
            }
        }
    }

    /// Return up to `max` completions in submission order, spending
    /// simulated time in quanta until `max` are gathered, the step budget
    /// runs out, or nothing is left in flight.
    pub fn poll(&mut self, max: usize) -> Vec<Completion> {
        let mut out = Vec::new();
        self.poll_into(max, &mut out);
        out
    }

    /// Like [`Simulation::poll`], appending to `out`. Returns how many were
    /// appended.
    pub fn poll_into(&mut self, max: usize, out: &mut Vec<Completion>) -> usize {
        let start = out.len();
        if max == 0 {
            return 0;
        }
        self.collect(max, start, out);

        let quantum = self.config.poll_quantum();
        let mut steps = 0;
        while out.len() - start < max
            && steps < self.config.host.poll_max_steps
            && self.has_outstanding_work()
        {
            self.advance(quantum);
            self.collect(max, start, out);
            steps += 1;
        }
        out.len() - start
    }

    /// Spend `d` of simulated time, delivering every event due in it.
    pub fn advance(&mut self, d: Duration) {
        let target = self.kernel.now() + d;
        self.run_until(target);
    }

    /// Deliver every event due at or before `target`, then park the clock
    /// at `target`.
    pub fn run_until(&mut self, target: SimTime) {
        while let Some((_, ev)) = self.kernel.pop_due(target) {
            self.firmware.handle(ev, &mut self.host, &mut self.kernel);
        }
        self.kernel.advance_to(target);
    }

    /// Run events until the pipeline holds no work except completions the
    /// host has not collected, without spending idle time.
    pub fn run_until_idle(&mut self) {
        while let Some(t) = self.kernel.next_event_time() {
            self.run_until(t);
            if self.firmware.is_blocked_on_completion() {
                break;
            }
        }
    }

    /// True while a request is queued, in flight, or waiting for collection.
    pub fn has_outstanding_work(&self) -> bool {
        self.host.submission_len() > 0
            || self.host.completion_len() > 0
            || self.firmware.is_busy()
            || self.kernel.pending() > 0
    }

    /// Requests accepted but not yet returned by `poll`.
    pub fn outstanding(&self) -> u64 {
        self.stats.outstanding()
    }

    /// Snapshot of counters.
    pub fn stats(&self) -> SimStats {
        let counters = self.firmware.counters();
        SimStats {
            unmapped_reads: counters.unmapped_reads,
            mapped_lbas: self.firmware.ftl().mapped_count() as u64,
            sim_time_ns: self.kernel.now().as_nanos(),
            ..self.stats.clone()
        }
    }

    fn collect(&mut self, max: usize, start: usize, out: &mut Vec<Completion>) {
        let want = max - (out.len() - start);
        let before = out.len();
        let n = self.host.drain_completions(want, out);
        for cpl in &out[before..] {
            self.stats.record_completion(cpl);
        }
        if n > 0 && self.firmware.is_blocked_on_completion() {
            self.kernel
                .schedule_at(self.kernel.now(), FirmwareEvent::CompletionSpace);
        }
    }
}
