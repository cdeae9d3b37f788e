//! Simulator configuration.
//!
//! Loaded from a JSON file whose every field is optional:
//!
//! ```json
//! {
//!   "nand": {
//!     "dies": 1,
//!     "blocks_per_die": 1024,
//!     "pages_per_block": 256,
//!     "page_size_bytes": 4096,
//!     "timing": { "t_read_us": 50, "t_prog_us": 600, "t_erase_us": 3000 }
//!   },
//!   "controller": { "ctrl_overhead_us": 5 },
//!   "host": { "queue_depth": 1024, "poll_quantum_us": 10, "poll_max_steps": 100 },
//!   "l2p_capacity_hint": 0,
//!   "rng_seed": 42
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Default submission/completion queue capacity.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;
/// Default simulated time spent per poll step.
pub const DEFAULT_POLL_QUANTUM_US: u64 = 10;
/// Default number of quanta a single poll may spend.
pub const DEFAULT_POLL_MAX_STEPS: u32 = 100;
/// Largest accepted queue depth (the NVMe per-queue entry limit).
pub const MAX_QUEUE_DEPTH: usize = 65_536;
/// Largest accepted `l2p_capacity_hint`.
pub const MAX_L2P_CAPACITY_HINT: usize = 1 << 24;

// ---------------------------------------------------------------------------
// NAND geometry and timing
// ---------------------------------------------------------------------------

/// Per-operation NAND latencies in microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NandTimingConfig {
    pub t_read_us: u64,
    pub t_prog_us: u64,
    pub t_erase_us: u64,
}

impl Default for NandTimingConfig {
    fn default() -> Self {
        Self {
            t_read_us: 50,
            t_prog_us: 600,
            t_erase_us: 3000,
        }
    }
}

/// NAND array geometry.
///
/// Only die 0 is ever allocated from; `dies` and `page_size_bytes` are
/// carried for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NandConfig {
    pub dies: u32,
    pub blocks_per_die: u32,
    pub pages_per_block: u32,
    pub page_size_bytes: u32,
    pub timing: NandTimingConfig,
}

impl Default for NandConfig {
    fn default() -> Self {
        Self {
            dies: 1,
            blocks_per_die: 1024,
            pages_per_block: 256,
            page_size_bytes: 4096,
            timing: NandTimingConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Controller and host
// ---------------------------------------------------------------------------

/// Firmware/controller parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Fixed per-command dispatch cost, independent of op type.
    pub ctrl_overhead_us: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            ctrl_overhead_us: 5,
        }
    }
}

/// Host interface queues and the poll-driven clock advance.
///
/// A single poll call advances simulated time by at most
/// `poll_quantum_us * poll_max_steps`, which bounds how far the simulated
/// clock can run ahead per unit of caller work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub queue_depth: usize,
    pub poll_quantum_us: u64,
    pub poll_max_steps: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            poll_quantum_us: DEFAULT_POLL_QUANTUM_US,
            poll_max_steps: DEFAULT_POLL_MAX_STEPS,
        }
    }
}

// ---------------------------------------------------------------------------
// Root config
// ---------------------------------------------------------------------------

/// Complete simulator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub nand: NandConfig,
    pub controller: ControllerConfig,
    pub host: HostConfig,
    /// Expected number of distinct LBAs; pre-sizes the mapping table when
    /// the allocation succeeds.
    pub l2p_capacity_hint: usize,
    /// Seed for workload generators driving the simulator.
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nand: NandConfig::default(),
            controller: ControllerConfig::default(),
            host: HostConfig::default(),
            l2p_capacity_hint: 0,
            rng_seed: 42,
        }
    }
}

impl SimConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file. A missing file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Load a config file, falling back to defaults when it does not exist.
    ///
    /// Benchmark plugins pass whatever filename the user configured, which
    /// often is not a simulator config at all; only a file that exists and
    /// fails to parse is treated as an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "config {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let config = Self::load(path)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Write this config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json + "\n")?;
        Ok(())
    }

    /// Reject values the simulator cannot run with.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (self.nand.blocks_per_die == 0, "nand.blocks_per_die must be > 0"),
            (self.nand.pages_per_block == 0, "nand.pages_per_block must be > 0"),
            (self.nand.dies == 0, "nand.dies must be > 0"),
            (self.host.queue_depth == 0, "host.queue_depth must be > 0"),
            (
                self.host.queue_depth > MAX_QUEUE_DEPTH,
                "host.queue_depth exceeds 65536",
            ),
            (self.host.poll_quantum_us == 0, "host.poll_quantum_us must be > 0"),
            (self.host.poll_max_steps == 0, "host.poll_max_steps must be > 0"),
            (
                self.l2p_capacity_hint > MAX_L2P_CAPACITY_HINT,
                "l2p_capacity_hint exceeds 16777216",
            ),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, msg)) => Err(SimError::Config((*msg).to_string())),
            None => Ok(()),
        }
    }

    pub fn ctrl_overhead(&self) -> Duration {
        Duration::from_micros(self.controller.ctrl_overhead_us)
    }

    pub fn poll_quantum(&self) -> Duration {
        Duration::from_micros(self.host.poll_quantum_us)
    }
}
