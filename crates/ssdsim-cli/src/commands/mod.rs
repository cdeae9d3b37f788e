pub mod gen_config;
pub mod probe;
pub mod run;

use ssdsim_core::SimConfig;

/// Bytes per LBA as seen by benchmark plugins (`lba = offset / 512`).
pub const SECTOR_SIZE: u64 = 512;

/// Workload access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    SeqWrite,
    SeqRead,
    RandWrite,
    RandRead,
    RandRw,
}

impl Pattern {
    pub fn is_random(self) -> bool {
        matches!(self, Self::RandWrite | Self::RandRead | Self::RandRw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SeqWrite => "write",
            Self::SeqRead => "read",
            Self::RandWrite => "randwrite",
            Self::RandRead => "randread",
            Self::RandRw => "randrw",
        }
    }
}

/// Parse an fio-style `--rw` value.
pub fn parse_rw(s: &str) -> Option<Pattern> {
    match s {
        "write" => Some(Pattern::SeqWrite),
        "read" => Some(Pattern::SeqRead),
        "randwrite" => Some(Pattern::RandWrite),
        "randread" => Some(Pattern::RandRead),
        "randrw" | "rw" => Some(Pattern::RandRw),
        _ => None,
    }
}

/// Parse a byte count with an optional binary suffix: `4096`, `4k`, `1M`, `2g`.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let (numeric, multiplier) = if let Some(rest) = lower.strip_suffix('k') {
        (rest, 1u64 << 10)
    } else if let Some(rest) = lower.strip_suffix('m') {
        (rest, 1 << 20)
    } else if let Some(rest) = lower.strip_suffix('g') {
        (rest, 1 << 30)
    } else {
        (lower.as_str(), 1)
    };
    let value: u64 = numeric
        .parse()
        .map_err(|_| format!("invalid size: {s}"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {s}"))
}

/// Load the simulator config, or exit with a message.
pub fn load_config(path: Option<&str>) -> SimConfig {
    let result = match path {
        Some(p) => SimConfig::load_or_default(p),
        None => Ok(SimConfig::default()),
    };
    result.unwrap_or_else(|e| {
        eprintln!("Error loading config: {e}");
        std::process::exit(1);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // parse_rw tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_rw_all_patterns() {
        assert_eq!(parse_rw("write"), Some(Pattern::SeqWrite));
        assert_eq!(parse_rw("read"), Some(Pattern::SeqRead));
        assert_eq!(parse_rw("randwrite"), Some(Pattern::RandWrite));
        assert_eq!(parse_rw("randread"), Some(Pattern::RandRead));
        assert_eq!(parse_rw("randrw"), Some(Pattern::RandRw));
    }

    #[test]
    fn test_parse_rw_unknown() {
        assert_eq!(parse_rw("trim"), None);
        assert_eq!(parse_rw(""), None);
    }

    #[test]
    fn test_pattern_round_trips_through_name() {
        for p in [
            Pattern::SeqWrite,
            Pattern::SeqRead,
            Pattern::RandWrite,
            Pattern::RandRead,
            Pattern::RandRw,
        ] {
            assert_eq!(parse_rw(p.as_str()), Some(p));
        }
        assert!(!Pattern::SeqRead.is_random());
        assert!(Pattern::RandRw.is_random());
    }

    // -----------------------------------------------------------------------
    // parse_size tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_size_plain() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size(" 512 "), Ok(512));
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("4k"), Ok(4096));
        assert_eq!(parse_size("4K"), Ok(4096));
        assert_eq!(parse_size("1m"), Ok(1 << 20));
        assert_eq!(parse_size("2G"), Ok(2 << 30));
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("k").is_err());
        assert!(parse_size("4x").is_err());
        assert!(parse_size("99999999999999999999g").is_err());
    }

    #[test]
    fn test_load_config_default_when_absent() {
        assert_eq!(load_config(None), SimConfig::default());
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.json");
        assert_eq!(
            load_config(Some(missing.to_str().unwrap())),
            SimConfig::default()
        );
    }
}
