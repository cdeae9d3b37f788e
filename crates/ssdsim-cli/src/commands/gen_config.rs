//! `ssdsim gen-config`: write a simulator config file.

use ssdsim_core::{NandConfig, SimConfig};

/// Build a config with the given geometry and default timing.
pub fn build(dies: u32, blocks: u32, ppb: u32, psize: u32) -> SimConfig {
    SimConfig {
        nand: NandConfig {
            dies,
            blocks_per_die: blocks,
            pages_per_block: ppb,
            page_size_bytes: psize,
            ..NandConfig::default()
        },
        ..SimConfig::default()
    }
}

/// Run the gen-config command.
pub fn run(dies: u32, blocks: u32, ppb: u32, psize: u32, out: &str) {
    let config = build(dies, blocks, ppb, psize);
    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    match config.save(out) {
        Ok(()) => println!("Wrote {out}"),
        Err(e) => {
            eprintln!("Failed to write {out}: {e}");
            std::process::exit(1);
        }
    }
}
