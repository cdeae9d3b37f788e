//! # ssdsim-core
//!
//! **Realistic SSD latency without the SSD.**
//!
//! `ssdsim-core` is a discrete-event model of an SSD's request path, so that
//! I/O benchmarking tools can observe per-request latency shaped like a
//! flash device's while nothing touches real hardware.
//!
//! ## Quick Start
//!
//! ```
//! use ssdsim_core::{IoSubmission, SimConfig, Simulation};
//! use std::time::Duration;
//!
//! let mut sim = Simulation::new(SimConfig::default()).unwrap();
//! sim.submit(IoSubmission::write(1, 0, 4096)).unwrap();
//!
//! // poll() spends simulated time until the write completes.
//! let done = sim.poll(1);
//! assert_eq!(done[0].tag, 1);
//! assert_eq!(done[0].latency(), Duration::from_micros(605));
//! ```
//!
//! ## Architecture
//!
//! Host Interface → Firmware → FTL + NAND timing → Firmware → Host Interface
//!
//! - [`HostInterface`]: bounded submission/completion queues and request slots.
//! - [`Firmware`]: one sequential worker, an event-driven state machine.
//! - [`Ftl`]: LBA → physical page map with a round-robin write allocator.
//! - [`NandModel`]: fixed per-op latencies (read, program, erase).
//! - [`Kernel`]: simulated clock and time-ordered event queue.
//! - [`Simulation`] wires them together; [`SimContext`] adds the
//!   init/shutdown lifecycle used by the C ABI.
//!
//! Known limitations: no garbage collection, wear leveling, bad blocks,
//! error injection, or die/channel parallelism. Every accepted request
//! completes successfully, one at a time, in submission order.

pub mod config;
pub mod context;
pub mod error;
pub mod firmware;
pub mod ftl;
pub mod host;
pub mod kernel;
pub mod nand;
pub mod simulation;
pub mod stats;

pub use config::{
    ControllerConfig, DEFAULT_POLL_MAX_STEPS, DEFAULT_POLL_QUANTUM_US, DEFAULT_QUEUE_DEPTH,
    HostConfig, MAX_L2P_CAPACITY_HINT, MAX_QUEUE_DEPTH, NandConfig, NandTimingConfig, SimConfig,
};
pub use context::{InitOutcome, SimContext};
pub use error::{Result, SimError};
pub use firmware::{Firmware, FirmwareCounters, FirmwareEvent, FirmwareState};
pub use ftl::{Ftl, PhysicalPage};
pub use host::{
    Completion, HostInterface, IoRequest, IoSubmission, RequestArena, STATUS_OK, SlotId,
};
pub use kernel::{Kernel, SimTime};
pub use nand::{NandCommand, NandModel, NandOp};
pub use simulation::Simulation;
pub use stats::{LatencySummary, SimStats};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
