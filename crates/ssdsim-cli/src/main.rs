//! CLI for ssdsim: flash-shaped latency without the flash.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ssdsim")]
#[command(about = "ssdsim: discrete-event SSD latency simulator")]
#[command(version = ssdsim_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a synthetic workload through the simulator and report latency.
    /// Offsets map to LBAs in 512-byte units, as benchmark plugins do.
    Run {
        /// Config file (JSON). Missing file means built-in defaults.
        #[arg(long)]
        config: Option<String>,

        /// Access pattern
        #[arg(long, default_value = "randwrite", value_parser = ["write", "read", "randwrite", "randread", "randrw"])]
        rw: String,

        /// Block size per request (accepts k/m/g suffixes)
        #[arg(long, default_value = "4k")]
        bs: String,

        /// Addressable span the workload touches (accepts k/m/g suffixes)
        #[arg(long, default_value = "64m")]
        size: String,

        /// Maximum requests in flight
        #[arg(long, default_value = "32")]
        iodepth: usize,

        /// Number of requests to complete (default: size / bs)
        #[arg(long)]
        ios: Option<u64>,

        /// Stop after this many wall-clock seconds
        #[arg(long)]
        runtime: Option<f64>,

        /// Override the config's RNG seed for random patterns
        #[arg(long)]
        seed: Option<u64>,

        /// Write a JSON report to this path
        #[arg(long)]
        output: Option<String>,
    },

    /// Write a simulator config file
    GenConfig {
        /// Number of dies
        #[arg(long, default_value = "2")]
        dies: u32,

        /// Blocks per die
        #[arg(long, default_value = "256")]
        blocks: u32,

        /// Pages per block
        #[arg(long, default_value = "128")]
        ppb: u32,

        /// Page size in bytes
        #[arg(long, default_value = "4096")]
        psize: u32,

        /// Output path
        #[arg(long, default_value = "config/generated.json")]
        out: String,
    },

    /// Load libssdsim dynamically and run a one-request smoke cycle
    Probe {
        /// Library path (default: $SSD_SIM_LIB_PATH, then ./libssdsim.so)
        #[arg(long)]
        lib: Option<String>,

        /// Config path passed to ssdsim_init
        #[arg(long, default_value = "config/default.json")]
        config: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            rw,
            bs,
            size,
            iodepth,
            ios,
            runtime,
            seed,
            output,
        } => commands::run::run(commands::run::RunCommandConfig {
            config_path: config.as_deref(),
            rw: &rw,
            bs: &bs,
            size: &size,
            iodepth,
            ios,
            runtime_secs: runtime,
            seed,
            output_path: output.as_deref(),
        }),
        Commands::GenConfig {
            dies,
            blocks,
            ppb,
            psize,
            out,
        } => commands::gen_config::run(dies, blocks, ppb, psize, &out),
        Commands::Probe { lib, config } => commands::probe::run(lib.as_deref(), &config),
    }
}
