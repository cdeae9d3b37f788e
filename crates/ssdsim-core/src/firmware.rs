//! Firmware pipeline: the single sequential worker between the host queues
//! and the NAND array.
//!
//! The worker is a state machine driven by kernel events:
//!
//! ```text
//!            Dispatch                         CommandDone
//!   Idle ───────────────▶ Mapping ──▶ Timing ─────────────▶ Completing ──▶ Idle
//!    ▲                                                          │
//!    └────────────── CompletionSpace (cq was full) ─────────────┘
//! ```
//!
//! It suspends in exactly two places: `Idle` while the submission queue is
//! empty, and `Timing` while the NAND command plus controller overhead
//! elapses. `Completing` only lingers if the host has let the completion
//! queue fill up. At most one request is in flight, so throughput is bounded
//! by `1 / (min_latency + ctrl_overhead)`.

use std::time::Duration;

use crate::config::SimConfig;
use crate::ftl::{Ftl, PhysicalPage};
use crate::host::{Completion, HostInterface, SlotId};
use crate::kernel::{Kernel, SimTime};
use crate::nand::{NandCommand, NandModel, NandOp};

/// Events the firmware reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareEvent {
    /// A request may be waiting in the submission queue.
    Dispatch,
    /// The in-flight NAND command and controller overhead have elapsed.
    CommandDone,
    /// The host drained the completion queue.
    CompletionSpace,
}

/// Where the worker is in its per-request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareState {
    Idle,
    Mapping(SlotId),
    Timing {
        slot: SlotId,
        cmd: NandCommand,
        done_at: SimTime,
    },
    Completing(Completion),
}

/// Per-op command counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirmwareCounters {
    pub reads: u64,
    pub programs: u64,
    /// Reads of LBAs that were never written, serviced at the sentinel page.
    pub unmapped_reads: u64,
}

pub struct Firmware {
    ftl: Ftl,
    nand: NandModel,
    ctrl_overhead: Duration,
    state: FirmwareState,
    wake_pending: bool,
    counters: FirmwareCounters,
}

impl Firmware {
    pub fn new(ftl: Ftl, nand: NandModel, ctrl_overhead: Duration) -> Self {
        Self {
            ftl,
            nand,
            ctrl_overhead,
            state: FirmwareState::Idle,
            wake_pending: false,
            counters: FirmwareCounters::default(),
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            Ftl::with_capacity(
                config.nand.blocks_per_die,
                config.nand.pages_per_block,
                config.l2p_capacity_hint,
            ),
            NandModel::from_config(&config.nand.timing),
            config.ctrl_overhead(),
        )
    }

    pub fn state(&self) -> FirmwareState {
        self.state
    }

    /// True while a request is between dequeue and completion enqueue.
    pub fn is_busy(&self) -> bool {
        self.state != FirmwareState::Idle
    }

    /// True while a finished completion waits for room in the host queue.
    pub fn is_blocked_on_completion(&self) -> bool {
        matches!(self.state, FirmwareState::Completing(_))
    }

    pub fn ftl(&self) -> &Ftl {
        &self.ftl
    }

    pub fn nand(&self) -> &NandModel {
        &self.nand
    }

    pub fn ctrl_overhead(&self) -> Duration {
        self.ctrl_overhead
    }

    pub fn counters(&self) -> FirmwareCounters {
        self.counters
    }

    /// Schedule a dispatch at the current instant if the worker is idle and
    /// none is pending yet. Called after the host enqueues a request.
    pub fn wake(&mut self, kernel: &mut Kernel<FirmwareEvent>) {
        if self.state == FirmwareState::Idle && !self.wake_pending {
            self.wake_pending = true;
            kernel.schedule_at(kernel.now(), FirmwareEvent::Dispatch);
        }
    }

    /// Advance the state machine in response to `event`.
    pub fn handle(
        &mut self,
        event: FirmwareEvent,
        host: &mut HostInterface,
        kernel: &mut Kernel<FirmwareEvent>,
    ) {
        match event {
            FirmwareEvent::Dispatch => {
                self.wake_pending = false;
                self.dispatch(host, kernel);
            }
            FirmwareEvent::CommandDone => self.finish_command(host, kernel),
            FirmwareEvent::CompletionSpace => self.deliver(host, kernel),
        }
    }

    fn dispatch(&mut self, host: &mut HostInterface, kernel: &mut Kernel<FirmwareEvent>) {
        if self.state != FirmwareState::Idle {
            return;
        }
        let Some(slot) = host.next_submission() else {
            return;
        };
        self.state = FirmwareState::Mapping(slot);

        let Some(req) = host.request(slot).copied() else {
            log::error!("submission slot {} has no request, skipping", slot.index());
            self.state = FirmwareState::Idle;
            self.wake(kernel);
            return;
        };

        let cmd = if req.is_write {
            self.counters.programs += 1;
            NandCommand::program(self.ftl.map_write(req.lba))
        } else {
            self.counters.reads += 1;
            if self.ftl.lookup(req.lba).is_none() {
                self.counters.unmapped_reads += 1;
                log::debug!("read of unmapped lba {} served from {}", req.lba, PhysicalPage::UNMAPPED);
            }
            NandCommand::read(self.ftl.map_read(req.lba))
        };

        let busy = self.nand.service(&cmd) + self.ctrl_overhead;
        let done_at = kernel.now() + busy;
        log::debug!(
            "t={} lba {} {} {} done_at={}",
            kernel.now(),
            req.lba,
            cmd.op,
            cmd.page,
            done_at
        );
        self.state = FirmwareState::Timing { slot, cmd, done_at };
        kernel.schedule_at(done_at, FirmwareEvent::CommandDone);
    }

    fn finish_command(&mut self, host: &mut HostInterface, kernel: &mut Kernel<FirmwareEvent>) {
        let FirmwareState::Timing { slot, cmd, .. } = self.state else {
            return;
        };
        let Some(req) = host.release(slot) else {
            log::error!("in-flight slot {} vanished before completion", slot.index());
            self.state = FirmwareState::Idle;
            self.wake_if_queued(host, kernel);
            return;
        };
        debug_assert_eq!(cmd.op == NandOp::Program, req.is_write);
        self.state = FirmwareState::Completing(Completion::ok(&req, kernel.now()));
        self.deliver(host, kernel);
    }

    fn deliver(&mut self, host: &mut HostInterface, kernel: &mut Kernel<FirmwareEvent>) {
        let FirmwareState::Completing(cpl) = self.state else {
            return;
        };
        match host.push_completion(cpl) {
            Ok(()) => {
                self.state = FirmwareState::Idle;
                self.wake_if_queued(host, kernel);
            }
            Err(_) => {
                log::debug!("completion queue full, tag {:#x} waits", cpl.tag);
            }
        }
    }

    fn wake_if_queued(&mut self, host: &HostInterface, kernel: &mut Kernel<FirmwareEvent>) {
        if host.submission_len() > 0 {
            self.wake(kernel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::IoSubmission;

    fn setup(queue_depth: usize) -> (Firmware, HostInterface, Kernel<FirmwareEvent>) {
        (
            Firmware::from_config(&SimConfig::default()),
            HostInterface::new(queue_depth),
            Kernel::new(),
        )
    }

    fn run_all(fw: &mut Firmware, host: &mut HostInterface, kernel: &mut Kernel<FirmwareEvent>) {
        while let Some((_, ev)) = kernel.pop_due(SimTime::from_nanos(u64::MAX)) {
            fw.handle(ev, host, kernel);
        }
    }

    #[test]
    fn test_idle_until_woken() {
        let (mut fw, mut host, mut kernel) = setup(4);
        host.submit(IoSubmission::write(1, 0, 4096), kernel.now()).unwrap();
        assert_eq!(fw.state(), FirmwareState::Idle);
        assert_eq!(kernel.pending(), 0);
        fw.wake(&mut kernel);
        fw.wake(&mut kernel);
        assert_eq!(kernel.pending(), 1, "duplicate wakes are coalesced");
    }

    #[test]
    fn test_write_walks_all_states() {
        let (mut fw, mut host, mut kernel) = setup(4);
        host.submit(IoSubmission::write(1, 10, 4096), kernel.now()).unwrap();
        fw.wake(&mut kernel);

        let (_, ev) = kernel.pop_due(SimTime::ZERO).unwrap();
        fw.handle(ev, &mut host, &mut kernel);
        let FirmwareState::Timing { cmd, done_at, .. } = fw.state() else {
            panic!("expected Timing, got {:?}", fw.state());
        };
        assert_eq!(cmd.op, NandOp::Program);
        assert_eq!(done_at, SimTime::from_micros(605));
        assert_eq!(host.submission_len(), 0);

        let (at, ev) = kernel.pop_due(SimTime::from_micros(1000)).unwrap();
        assert_eq!(at, SimTime::from_micros(605));
        fw.handle(ev, &mut host, &mut kernel);
        assert_eq!(fw.state(), FirmwareState::Idle);
        assert_eq!(host.completion_len(), 1);
        assert_eq!(host.in_flight(), 0);
        assert_eq!(fw.ftl().lookup(10), Some(PhysicalPage::new(0, 0, 0)));
    }

    #[test]
    fn test_read_latency_and_unmapped_counter() {
        let (mut fw, mut host, mut kernel) = setup(4);
        host.submit(IoSubmission::read(1, 99, 4096), kernel.now()).unwrap();
        fw.wake(&mut kernel);
        run_all(&mut fw, &mut host, &mut kernel);

        let mut out = Vec::new();
        host.drain_completions(1, &mut out);
        assert_eq!(out[0].latency(), Duration::from_micros(55));
        assert_eq!(fw.counters().reads, 1);
        assert_eq!(fw.counters().unmapped_reads, 1);
    }

    #[test]
    fn test_back_to_back_requests_serialize() {
        let (mut fw, mut host, mut kernel) = setup(8);
        for tag in 0..3 {
            host.submit(IoSubmission::write(tag, tag as u64, 4096), kernel.now()).unwrap();
        }
        fw.wake(&mut kernel);
        run_all(&mut fw, &mut host, &mut kernel);

        let mut out = Vec::new();
        host.drain_completions(8, &mut out);
        let times: Vec<u64> = out.iter().map(|c| c.complete_time.as_nanos()).collect();
        assert_eq!(times, vec![605_000, 1_210_000, 1_815_000]);
        assert_eq!(out.iter().map(|c| c.tag).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(fw.counters().programs, 3);
    }

    #[test]
    fn test_stalls_on_full_completion_queue() {
        let (mut fw, mut host, mut kernel) = setup(1);
        host.submit(IoSubmission::write(1, 0, 4096), kernel.now()).unwrap();
        fw.wake(&mut kernel);
        run_all(&mut fw, &mut host, &mut kernel);
        assert_eq!(host.completion_len(), 1);

        host.submit(IoSubmission::write(2, 1, 4096), kernel.now()).unwrap();
        fw.wake(&mut kernel);
        run_all(&mut fw, &mut host, &mut kernel);
        assert!(fw.is_blocked_on_completion());
        assert!(fw.is_busy());

        let mut out = Vec::new();
        host.drain_completions(1, &mut out);
        kernel.schedule_at(kernel.now(), FirmwareEvent::CompletionSpace);
        run_all(&mut fw, &mut host, &mut kernel);
        assert_eq!(fw.state(), FirmwareState::Idle);
        host.drain_completions(1, &mut out);
        assert_eq!(out.iter().map(|c| c.tag).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_spurious_events_are_ignored() {
        let (mut fw, mut host, mut kernel) = setup(4);
        fw.handle(FirmwareEvent::CommandDone, &mut host, &mut kernel);
        fw.handle(FirmwareEvent::CompletionSpace, &mut host, &mut kernel);
        fw.handle(FirmwareEvent::Dispatch, &mut host, &mut kernel);
        assert_eq!(fw.state(), FirmwareState::Idle);
        assert_eq!(host.completion_len(), 0);
    }
}
