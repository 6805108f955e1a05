// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Single entry point, no subcommands:
//
//   fault-watch [--new-dir DIR] [--epochs N] [--device cuda|cpu]
//               [--batch N] [--poll-interval SECS] [--move-only]
//
// Parsing and wiring only. The loop itself lives in
// application::watch_use_case.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::WatchArgs;

use crate::application::watch_use_case::{WatchConfig, Watcher};
use crate::infra::shutdown::Shutdown;
use crate::ml::trainer::YoloTrainer;

#[derive(Parser, Debug)]
#[command(
    name = "fault-watch",
    version,
    about = "Move new image/label pairs into the training set and fine-tune the model."
)]
pub struct Cli {
    #[command(flatten)]
    pub watch: WatchArgs,
}

impl Cli {
    /// Build the watcher, hook up ctrl-c and poll until stopped.
    pub fn run(self) -> Result<()> {
        let config: WatchConfig = self.watch.into();
        tracing::debug!("Config: {:?}", config);

        let trainer = YoloTrainer::new(&config.trainer_bin);
        let watcher = Watcher::new(config, trainer)?;

        let shutdown = Shutdown::new();
        shutdown.install_ctrlc_handler()?;

        watcher.run(&shutdown)
    }
}
