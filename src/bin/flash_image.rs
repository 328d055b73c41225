// CLASSIFICATION: COMMUNITY
// Filename: flash_image.rs v1.0
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! `flash_image [-d] <partition> <image>`

use std::path::PathBuf;

use clap::Parser;
use cohrecovery::config;
use cohrecovery::flash::{flash_image_file, FlashOutcome, PartitionFlasher, PartitionTable};

#[derive(Parser)]
#[command(name = "flash_image", about = "Write an image to a raw partition")]
struct Cli {
    /// Delete the image file afterwards, also when nothing was written
    #[arg(short = 'd')]
    delete: bool,
    /// Partition name as listed in /proc/mtd
    partition: String,
    /// Image file to write
    image: PathBuf,
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let cfg = config::load_active();
    let table = PartitionTable::scan(&cfg.proc_mtd, &cfg.mtd_dev_dir)?;
    let mut partition = table.find(&cli.partition)?;
    let flasher = PartitionFlasher::default();
    match flash_image_file(&flasher, partition.as_mut(), &cli.image, cli.delete)? {
        FlashOutcome::AlreadyCurrent => {}
        FlashOutcome::Flashed { bytes } => {
            log::info!("wrote {} to {}", cli.image.display(), cli.partition);
            log::debug!("{bytes} bytes after the header");
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
