//! `ssdsim run`: drive a synthetic workload through the simulator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use ssdsim_core::{Completion, IoSubmission, SimConfig, SimError, SimStats, SimTime, Simulation};

use super::{Pattern, SECTOR_SIZE, load_config, parse_rw, parse_size};

pub struct RunCommandConfig<'a> {
    pub config_path: Option<&'a str>,
    pub rw: &'a str,
    pub bs: &'a str,
    pub size: &'a str,
    pub iodepth: usize,
    pub ios: Option<u64>,
    pub runtime_secs: Option<f64>,
    pub seed: Option<u64>,
    pub output_path: Option<&'a str>,
}

/// Generates requests for one access pattern over `[0, size)`.
pub struct Workload {
    pattern: Pattern,
    bs: u32,
    blocks: u64,
    next_block: u64,
    rng: StdRng,
}

impl Workload {
    pub fn new(pattern: Pattern, bs: u32, size: u64, seed: u64) -> Self {
        Self {
            pattern,
            bs,
            blocks: (size / u64::from(bs)).max(1),
            next_block: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_io(&mut self, tag: usize) -> IoSubmission {
        let block = if self.pattern.is_random() {
            self.rng.random_range(0..self.blocks)
        } else {
            let b = self.next_block % self.blocks;
            self.next_block += 1;
            b
        };
        let lba = block * u64::from(self.bs) / SECTOR_SIZE;
        let is_write = match self.pattern {
            Pattern::SeqWrite | Pattern::RandWrite => true,
            Pattern::SeqRead | Pattern::RandRead => false,
            Pattern::RandRw => self.rng.random_bool(0.5),
        };
        if is_write {
            IoSubmission::write(tag, lba, self.bs)
        } else {
            IoSubmission::read(tag, lba, self.bs)
        }
    }
}

/// Keep up to `iodepth` requests in flight until `target` have completed,
/// `running` is cleared, or `deadline` passes. Returns completions in
/// the order they were polled.
pub fn drive(
    sim: &mut Simulation,
    workload: &mut Workload,
    iodepth: usize,
    target: u64,
    running: &AtomicBool,
    deadline: Option<Instant>,
) -> Result<Vec<Completion>, SimError> {
    let mut done: Vec<Completion> = Vec::new();
    let mut issued = 0u64;
    let mut pending: Option<IoSubmission> = None;

    while (done.len() as u64) < target {
        if !running.load(Ordering::SeqCst) || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        while issued < target && issued - (done.len() as u64) < iodepth as u64 {
            let sub = pending
                .take()
                .unwrap_or_else(|| workload.next_io(issued as usize));
            match sim.submit(sub) {
                Ok(()) => issued += 1,
                Err(SimError::Busy { .. }) => {
                    pending = Some(sub);
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let n = sim.poll_into(iodepth, &mut done);
        if n == 0 && !sim.has_outstanding_work() && pending.is_none() && issued >= target {
            break;
        }
    }
    Ok(done)
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyReport {
    pub count: usize,
    pub mean_us: f64,
    pub min_us: f64,
    pub max_us: f64,
    pub p50_us: f64,
    pub p99_us: f64,
}

impl LatencyReport {
    pub fn from_latencies(mut ns: Vec<u64>) -> Option<Self> {
        if ns.is_empty() {
            return None;
        }
        ns.sort_unstable();
        let pct = |q: f64| ns[((ns.len() - 1) as f64 * q).round() as usize] as f64 / 1e3;
        let total: u128 = ns.iter().map(|&v| u128::from(v)).sum();
        Some(Self {
            count: ns.len(),
            mean_us: total as f64 / ns.len() as f64 / 1e3,
            min_us: ns[0] as f64 / 1e3,
            max_us: ns[ns.len() - 1] as f64 / 1e3,
            p50_us: pct(0.50),
            p99_us: pct(0.99),
        })
    }
}

#[derive(Debug, Serialize)]
struct RunReport {
    run_id: String,
    pattern: &'static str,
    block_size: u32,
    size: u64,
    iodepth: usize,
    completed: usize,
    sim_elapsed_ns: u64,
    wall_elapsed_ms: f64,
    iops: f64,
    bandwidth_mib_s: f64,
    latency: Option<LatencyReport>,
    read_latency: Option<LatencyReport>,
    write_latency: Option<LatencyReport>,
    stats: SimStats,
    config: SimConfig,
}

fn latency_ns(cpl: &Completion) -> u64 {
    u64::try_from(cpl.latency().as_nanos()).unwrap_or(u64::MAX)
}

fn summarize(done: &[Completion], filter: impl Fn(&Completion) -> bool) -> Option<LatencyReport> {
    LatencyReport::from_latencies(done.iter().filter(|c| filter(c)).map(latency_ns).collect())
}

/// Run the run command.
pub fn run(cfg: RunCommandConfig) {
    let pattern = parse_rw(cfg.rw).unwrap_or_else(|| {
        eprintln!("Error: unknown --rw pattern '{}'", cfg.rw);
        std::process::exit(1);
    });
    let size_arg = |s: &str| {
        parse_size(s).unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            std::process::exit(1);
        })
    };
    let bs = size_arg(cfg.bs);
    let size = size_arg(cfg.size);
    let bs = match u32::try_from(bs) {
        Ok(b) if b > 0 => b,
        _ => {
            eprintln!("Error: --bs must be between 1 and {} bytes", u32::MAX);
            std::process::exit(1);
        }
    };
    if size < u64::from(bs) {
        eprintln!("Error: --size must be at least one block ({bs} bytes)");
        std::process::exit(1);
    }

    let mut config = load_config(cfg.config_path);
    if let Some(seed) = cfg.seed {
        config.rng_seed = seed;
    }
    let mut iodepth = cfg.iodepth.max(1);
    if iodepth > config.host.queue_depth {
        eprintln!(
            "Warning: iodepth {iodepth} exceeds queue depth {}, clamping",
            config.host.queue_depth
        );
        iodepth = config.host.queue_depth;
    }

    let mut sim = match Simulation::new(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let target = match (cfg.ios, cfg.runtime_secs) {
        (Some(n), _) => n,
        (None, Some(_)) => u64::MAX,
        (None, None) => size / u64::from(bs),
    };
    let deadline = cfg
        .runtime_secs
        .map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }

    println!("ssdsim run");
    println!("  Pattern:   {}", pattern.as_str());
    println!("  Block:     {bs} B");
    println!("  Size:      {size} B");
    println!("  iodepth:   {iodepth}");
    match cfg.runtime_secs {
        Some(s) if cfg.ios.is_none() => println!("  Runtime:   {s}s"),
        _ => println!("  Requests:  {target}"),
    }
    println!();

    let mut workload = Workload::new(pattern, bs, size, config.rng_seed);
    let wall_start = Instant::now();
    let done = match drive(&mut sim, &mut workload, iodepth, target, &running, deadline) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let wall_elapsed = wall_start.elapsed();

    let sim_elapsed_ns = done
        .iter()
        .map(|c| c.complete_time)
        .max()
        .unwrap_or(SimTime::ZERO)
        .as_nanos();
    let secs = sim_elapsed_ns as f64 / 1e9;
    let bytes: u64 = done.iter().map(|c| u64::from(c.size_bytes)).sum();
    let (iops, bandwidth) = if secs > 0.0 {
        (done.len() as f64 / secs, bytes as f64 / secs / (1 << 20) as f64)
    } else {
        (0.0, 0.0)
    };

    let latency = summarize(&done, |_| true);
    let read_latency = summarize(&done, |c| !c.is_write);
    let write_latency = summarize(&done, |c| c.is_write);

    println!("Completed {} requests", done.len());
    println!("  Simulated time: {:.3} ms", sim_elapsed_ns as f64 / 1e6);
    println!("  Wall time:      {:.3} ms", wall_elapsed.as_secs_f64() * 1e3);
    println!("  IOPS:           {iops:.0}");
    println!("  Bandwidth:      {bandwidth:.2} MiB/s");
    println!();
    println!(
        "{:<8} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Op", "Count", "Mean(us)", "Min(us)", "Max(us)", "p50(us)", "p99(us)"
    );
    println!("{}", "-".repeat(72));
    for (name, lat) in [
        ("all", &latency),
        ("read", &read_latency),
        ("write", &write_latency),
    ] {
        if let Some(l) = lat {
            println!(
                "{:<8} {:>8} {:>10.1} {:>10.1} {:>10.1} {:>10.1} {:>10.1}",
                name, l.count, l.mean_us, l.min_us, l.max_us, l.p50_us, l.p99_us
            );
        }
    }

    let stats = sim.stats();
    if log::log_enabled!(log::Level::Info) {
        stats.print();
    }

    if let Some(path) = cfg.output_path {
        let report = RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            pattern: pattern.as_str(),
            block_size: bs,
            size,
            iodepth,
            completed: done.len(),
            sim_elapsed_ns,
            wall_elapsed_ms: wall_elapsed.as_secs_f64() * 1e3,
            iops,
            bandwidth_mib_s: bandwidth,
            latency,
            read_latency,
            write_latency,
            stats,
            config,
        };
        let json = match serde_json::to_string_pretty(&report) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("Failed to serialize report: {e}");
                std::process::exit(1);
            }
        };
        match std::fs::write(path, json + "\n") {
            Ok(()) => println!("\nReport written to {path}"),
            Err(e) => eprintln!("\nFailed to write {path}: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> Simulation {
        Simulation::new(SimConfig::default()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Workload tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_sequential_lbas_in_sectors() {
        let mut w = Workload::new(Pattern::SeqWrite, 4096, 4 * 4096, 1);
        let lbas: Vec<u64> = (0..6).map(|t| w.next_io(t).lba).collect();
        assert_eq!(lbas, vec![0, 8, 16, 24, 0, 8]);
    }

    #[test]
    fn test_sequential_read_direction() {
        let mut w = Workload::new(Pattern::SeqRead, 512, 4096, 1);
        let io = w.next_io(3);
        assert!(!io.is_write);
        assert_eq!(io.tag, 3);
        assert_eq!(io.size_bytes, 512);
    }

    #[test]
    fn test_random_stays_in_range_and_is_seeded() {
        let mut a = Workload::new(Pattern::RandRw, 4096, 1 << 20, 42);
        let mut b = Workload::new(Pattern::RandRw, 4096, 1 << 20, 42);
        let max_lba = (1u64 << 20) / SECTOR_SIZE;
        for t in 0..500 {
            let x = a.next_io(t);
            let y = b.next_io(t);
            assert_eq!(x, y);
            assert!(x.lba < max_lba);
            assert_eq!(x.lba % 8, 0);
        }
    }

    #[test]
    fn test_randrw_mixes_directions() {
        let mut w = Workload::new(Pattern::RandRw, 4096, 1 << 20, 7);
        let writes = (0..200).filter(|&t| w.next_io(t).is_write).count();
        assert!(writes > 50 && writes < 150);
    }

    // -----------------------------------------------------------------------
    // drive tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_drive_completes_target_in_order() {
        let mut s = sim();
        let mut w = Workload::new(Pattern::SeqWrite, 4096, 1 << 20, 1);
        let running = AtomicBool::new(true);
        let done = drive(&mut s, &mut w, 16, 100, &running, None).unwrap();
        assert_eq!(done.len(), 100);
        let tags: Vec<usize> = done.iter().map(|c| c.tag).collect();
        assert_eq!(tags, (0..100).collect::<Vec<_>>());
        assert!(done.iter().all(|c| c.latency() >= Duration::from_micros(605)));
    }

    #[test]
    fn test_drive_iodepth_one_has_fixed_latency() {
        let mut s = sim();
        let mut w = Workload::new(Pattern::RandRead, 4096, 1 << 20, 1);
        let running = AtomicBool::new(true);
        let done = drive(&mut s, &mut w, 1, 20, &running, None).unwrap();
        assert_eq!(done.len(), 20);
        assert!(done.iter().all(|c| c.latency() == Duration::from_micros(55)));
    }

    #[test]
    fn test_drive_stops_when_not_running() {
        let mut s = sim();
        let mut w = Workload::new(Pattern::SeqWrite, 4096, 1 << 20, 1);
        let running = AtomicBool::new(false);
        let done = drive(&mut s, &mut w, 4, 100, &running, None).unwrap();
        assert!(done.is_empty());
    }

    // -----------------------------------------------------------------------
    // LatencyReport tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_latency_report_empty() {
        assert!(LatencyReport::from_latencies(Vec::new()).is_none());
    }

    #[test]
    fn test_latency_report_percentiles() {
        let ns: Vec<u64> = (1..=100).map(|i| i * 1000).collect();
        let r = LatencyReport::from_latencies(ns).unwrap();
        assert_eq!(r.count, 100);
        assert_eq!(r.min_us, 1.0);
        assert_eq!(r.max_us, 100.0);
        assert!((r.mean_us - 50.5).abs() < 1e-9);
        assert_eq!(r.p50_us, 51.0);
        assert_eq!(r.p99_us, 99.0);
    }
}
