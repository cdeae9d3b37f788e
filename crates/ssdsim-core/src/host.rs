//! Host interface: request slots, the submission queue and the completion
//! queue.
//!
//! Accepted requests live in a [`RequestArena`] and travel through the
//! submission queue as [`SlotId`] indices. The firmware reads a request by
//! index and releases its slot when the completion is produced, so no raw
//! ownership crosses the queue.

use std::collections::VecDeque;
use std::time::Duration;

use crate::config::DEFAULT_QUEUE_DEPTH;
use crate::error::{Result, SimError};
use crate::kernel::SimTime;

/// Completion status for a successful request. No other codes are produced.
pub const STATUS_OK: i32 = 0;

/// What a caller hands to `submit`.
///
/// `tag` and `buffer` are opaque pointer-sized values owned by the caller.
/// The simulator copies them around but never dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IoSubmission {
    pub tag: usize,
    pub lba: u64,
    pub size_bytes: u32,
    pub is_write: bool,
    pub buffer: usize,
}

impl IoSubmission {
    pub fn read(tag: usize, lba: u64, size_bytes: u32) -> Self {
        Self {
            tag,
            lba,
            size_bytes,
            is_write: false,
            buffer: 0,
        }
    }

    pub fn write(tag: usize, lba: u64, size_bytes: u32) -> Self {
        Self {
            is_write: true,
            ..Self::read(tag, lba, size_bytes)
        }
    }
}

/// An accepted request, stamped with its submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRequest {
    pub tag: usize,
    pub lba: u64,
    pub size_bytes: u32,
    pub is_write: bool,
    pub buffer: usize,
    pub submit_time: SimTime,
}

impl IoRequest {
    fn from_submission(sub: IoSubmission, submit_time: SimTime) -> Self {
        Self {
            tag: sub.tag,
            lba: sub.lba,
            size_bytes: sub.size_bytes,
            is_write: sub.is_write,
            buffer: sub.buffer,
            submit_time,
        }
    }
}

/// Result of a request, produced exactly once per accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub tag: usize,
    pub status: i32,
    pub complete_time: SimTime,
    pub submit_time: SimTime,
    pub lba: u64,
    pub size_bytes: u32,
    pub is_write: bool,
}

impl Completion {
    /// Successful completion of `req` at `complete_time`.
    pub fn ok(req: &IoRequest, complete_time: SimTime) -> Self {
        Self {
            tag: req.tag,
            status: STATUS_OK,
            complete_time,
            submit_time: req.submit_time,
            lba: req.lba,
            size_bytes: req.size_bytes,
            is_write: req.is_write,
        }
    }

    /// Simulated time from submission to completion.
    pub fn latency(&self) -> Duration {
        self.complete_time.saturating_duration_since(self.submit_time)
    }
}

// ---------------------------------------------------------------------------
// Request arena
// ---------------------------------------------------------------------------

/// Index of a request slot in a [`RequestArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

impl SlotId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Slot storage for in-flight requests. Freed slots are reused.
#[derive(Debug, Default)]
pub struct RequestArena {
    slots: Vec<Option<IoRequest>>,
    free: Vec<usize>,
}

impl RequestArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, req: IoRequest) -> SlotId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(req);
                SlotId(idx)
            }
            None => {
                self.slots.push(Some(req));
                SlotId(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, id: SlotId) -> Option<&IoRequest> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Remove the request and free its slot.
    pub fn take(&mut self, id: SlotId) -> Option<IoRequest> {
        let req = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(req)
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Queues
// ---------------------------------------------------------------------------

/// Bounded submission and completion queues between the host and firmware.
#[derive(Debug)]
pub struct HostInterface {
    arena: RequestArena,
    sq: VecDeque<SlotId>,
    sq_capacity: usize,
    cq: VecDeque<Completion>,
    cq_capacity: usize,
}

impl HostInterface {
    /// Both queues hold up to `queue_depth` entries. Storage grows with
    /// occupancy, up to [`DEFAULT_QUEUE_DEPTH`] reserved up front.
    pub fn new(queue_depth: usize) -> Self {
        let reserve = queue_depth.min(DEFAULT_QUEUE_DEPTH);
        Self {
            arena: RequestArena::new(),
            sq: VecDeque::with_capacity(reserve),
            sq_capacity: queue_depth,
            cq: VecDeque::with_capacity(reserve),
            cq_capacity: queue_depth,
        }
    }

    /// Accept a request stamped at `now`, or refuse with [`SimError::Busy`]
    /// when the submission queue is full. Never blocks.
    pub fn submit(&mut self, sub: IoSubmission, now: SimTime) -> Result<SlotId> {
        if self.sq.len() >= self.sq_capacity {
            return Err(SimError::Busy {
                capacity: self.sq_capacity,
            });
        }
        let slot = self.arena.insert(IoRequest::from_submission(sub, now));
        self.sq.push_back(slot);
        Ok(slot)
    }

    /// Firmware side: oldest queued request.
    pub fn next_submission(&mut self) -> Option<SlotId> {
        self.sq.pop_front()
    }

    pub fn request(&self, slot: SlotId) -> Option<&IoRequest> {
        self.arena.get(slot)
    }

    /// Firmware side: give up the slot once the request is finished.
    pub fn release(&mut self, slot: SlotId) -> Option<IoRequest> {
        self.arena.take(slot)
    }

    /// Firmware side: enqueue a completion. Hands it back if the queue is full.
    pub fn push_completion(&mut self, cpl: Completion) -> std::result::Result<(), Completion> {
        if self.cq.len() >= self.cq_capacity {
            return Err(cpl);
        }
        self.cq.push_back(cpl);
        Ok(())
    }

    /// Move up to `max` completions into `out`, oldest first.
    pub fn drain_completions(&mut self, max: usize, out: &mut Vec<Completion>) -> usize {
        let n = max.min(self.cq.len());
        out.extend(self.cq.drain(..n));
        n
    }

    pub fn submission_len(&self) -> usize {
        self.sq.len()
    }

    pub fn completion_len(&self) -> usize {
        self.cq.len()
    }

    pub fn queue_depth(&self) -> usize {
        self.sq_capacity
    }

    /// Requests accepted whose slots are not yet released.
    pub fn in_flight(&self) -> usize {
        self.arena.len()
    }
}
