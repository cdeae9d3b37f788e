//! Init/shutdown lifecycle around a [`Simulation`].
//!
//! A `SimContext` is either empty or holds exactly one running simulation.
//! Calls made while empty fail with [`SimError::NotInitialized`] instead of
//! panicking, and a second `init` leaves the running simulation untouched.

use std::path::Path;

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::host::{Completion, IoSubmission};
use crate::simulation::Simulation;
use crate::stats::SimStats;

/// What `init` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A new simulation was built.
    Started,
    /// A simulation was already running and was left as is.
    AlreadyRunning,
}

#[derive(Default)]
pub struct SimContext {
    sim: Option<Simulation>,
}

impl SimContext {
    /// An empty, uninitialized context.
    pub const fn new() -> Self {
        Self { sim: None }
    }

    pub fn is_initialized(&self) -> bool {
        self.sim.is_some()
    }

    /// Build and wire the simulation from `config`. No-op if already running.
    pub fn init(&mut self, config: SimConfig) -> Result<InitOutcome> {
        if self.sim.is_some() {
            log::debug!("init called while running, keeping existing simulation");
            return Ok(InitOutcome::AlreadyRunning);
        }
        self.sim = Some(Simulation::new(config)?);
        log::info!("simulation initialized");
        Ok(InitOutcome::Started)
    }

    /// Like [`SimContext::init`], reading the config file at `path`.
    ///
    /// The file is not read at all if a simulation is already running. A
    /// missing file means defaults; see [`SimConfig::load_or_default`].
    pub fn init_from_path(&mut self, path: impl AsRef<Path>) -> Result<InitOutcome> {
        if self.sim.is_some() {
            return Ok(InitOutcome::AlreadyRunning);
        }
        let config = SimConfig::load_or_default(path)?;
        self.init(config)
    }

    /// Tear down the running simulation, returning its final stats.
    /// Requests still in flight are discarded.
    pub fn shutdown(&mut self) -> Option<SimStats> {
        let sim = self.sim.take()?;
        let stats = sim.stats();
        if stats.outstanding() > 0 {
            log::warn!(
                "shutdown with {} request(s) outstanding",
                stats.outstanding()
            );
        }
        log::info!(
            "simulation shut down after {} completions at t={}",
            stats.completed,
            sim.now()
        );
        Some(stats)
    }

    pub fn submit(&mut self, sub: IoSubmission) -> Result<()> {
        self.simulation_mut()?.submit(sub)
    }

    pub fn poll(&mut self, max: usize) -> Result<Vec<Completion>> {
        Ok(self.simulation_mut()?.poll(max))
    }

    pub fn simulation(&self) -> Result<&Simulation> {
        self.sim.as_ref().ok_or(SimError::NotInitialized)
    }

    pub fn simulation_mut(&mut self) -> Result<&mut Simulation> {
        self.sim.as_mut().ok_or(SimError::NotInitialized)
    }
}
