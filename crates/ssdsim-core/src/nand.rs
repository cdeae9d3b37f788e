//! NAND timing model.
//!
//! Every command is serviced as if it had the array to itself: there is no
//! die/channel contention and the addressed page does not influence the
//! latency. The model only answers "how long does this op take".

use std::fmt;
use std::time::Duration;

use crate::config::NandTimingConfig;
use crate::ftl::PhysicalPage;

/// NAND operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NandOp {
    /// Page read.
    Read,
    /// Page program (write).
    Program,
    /// Block erase.
    Erase,
}

impl fmt::Display for NandOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Program => write!(f, "program"),
            Self::Erase => write!(f, "erase"),
        }
    }
}

/// A command addressed to the NAND array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandCommand {
    pub op: NandOp,
    /// Target page. For erases only `die` and `block` are meaningful.
    pub page: PhysicalPage,
}

impl NandCommand {
    pub fn read(page: PhysicalPage) -> Self {
        Self {
            op: NandOp::Read,
            page,
        }
    }

    pub fn program(page: PhysicalPage) -> Self {
        Self {
            op: NandOp::Program,
            page,
        }
    }

    pub fn erase(die: u32, block: u32) -> Self {
        Self {
            op: NandOp::Erase,
            page: PhysicalPage::new(die, block, 0),
        }
    }
}

/// Fixed per-operation latency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NandModel {
    t_read: Duration,
    t_prog: Duration,
    t_erase: Duration,
}

impl Default for NandModel {
    fn default() -> Self {
        Self::from_config(&NandTimingConfig::default())
    }
}

impl NandModel {
    pub fn from_config(timing: &NandTimingConfig) -> Self {
        Self {
            t_read: Duration::from_micros(timing.t_read_us),
            t_prog: Duration::from_micros(timing.t_prog_us),
            t_erase: Duration::from_micros(timing.t_erase_us),
        }
    }

    /// Latency of a single `op`.
    pub fn latency(&self, op: NandOp) -> Duration {
        match op {
            NandOp::Read => self.t_read,
            NandOp::Program => self.t_prog,
            NandOp::Erase => self.t_erase,
        }
    }

    /// Service a command and return how long the array is busy with it.
    pub fn service(&self, cmd: &NandCommand) -> Duration {
        self.latency(cmd.op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_latencies() {
        let nand = NandModel::default();
        assert_eq!(nand.latency(NandOp::Read), Duration::from_micros(50));
        assert_eq!(nand.latency(NandOp::Program), Duration::from_micros(600));
        assert_eq!(nand.latency(NandOp::Erase), Duration::from_millis(3));
    }

    #[test]
    fn test_latency_order() {
        let nand = NandModel::default();
        assert!(nand.latency(NandOp::Read) >= Duration::from_micros(1));
        assert!(nand.latency(NandOp::Read) < nand.latency(NandOp::Program));
        assert!(nand.latency(NandOp::Program) < nand.latency(NandOp::Erase));
    }

    #[test]
    fn test_address_does_not_affect_latency() {
        let nand = NandModel::default();
        let a = nand.service(&NandCommand::program(PhysicalPage::new(0, 0, 0)));
        let b = nand.service(&NandCommand::program(PhysicalPage::new(3, 1000, 255)));
        assert_eq!(a, b);
        assert_eq!(
            nand.service(&NandCommand::erase(1, 7)),
            nand.latency(NandOp::Erase)
        );
    }

    #[test]
    fn test_configured_latencies() {
        let nand = NandModel::from_config(&NandTimingConfig {
            t_read_us: 80,
            t_prog_us: 800,
            t_erase_us: 5000,
        });
        assert_eq!(
            nand.service(&NandCommand::read(PhysicalPage::UNMAPPED)),
            Duration::from_micros(80)
        );
        assert_eq!(nand.latency(NandOp::Program), Duration::from_micros(800));
        assert_eq!(nand.latency(NandOp::Erase), Duration::from_millis(5));
    }

    #[test]
    fn test_op_display() {
        assert_eq!(NandOp::Read.to_string(), "read");
        assert_eq!(NandOp::Program.to_string(), "program");
        assert_eq!(NandOp::Erase.to_string(), "erase");
    }
}
