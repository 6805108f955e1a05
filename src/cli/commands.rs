// ============================================================
// Layer 1 - CLI Arguments
// ============================================================
// Every flag of the watcher, with the documented defaults.
// clap validates ranges and choices; WatchArgs then converts
// into the application-layer WatchConfig so nothing below this
// layer sees clap types.

use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::application::watch_use_case::WatchConfig;
use crate::domain::retrain::Device;

/// `--device` choices
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceArg {
    Cuda,
    Cpu,
}

impl From<DeviceArg> for Device {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cuda => Device::Cuda,
            DeviceArg::Cpu => Device::Cpu,
        }
    }
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory that holds new samples (with images/ and labels/ inside)
    #[arg(long, default_value = "data/new annotations")]
    pub new_dir: PathBuf,

    /// Number of fine-tuning epochs
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..))]
    pub epochs: u32,

    /// Computation device
    #[arg(long, value_enum, default_value_t = DeviceArg::Cuda)]
    pub device: DeviceArg,

    /// Batch size for fine-tuning
    #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch: u32,

    /// Seconds between checks for new samples
    #[arg(long, default_value_t = 5.0, value_parser = parse_poll_interval)]
    pub poll_interval: f64,

    /// Only move the data into the training split without launching fine-tuning
    #[arg(long)]
    pub move_only: bool,

    /// Dataset descriptor passed to the trainer
    #[arg(long = "data", default_value = "data/data.yaml")]
    pub data_yaml: PathBuf,

    /// Ultralytics CLI used for fine-tuning
    #[arg(long, default_value = "yolo")]
    pub trainer_bin: PathBuf,
}

fn parse_poll_interval(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("expected a non-negative number of seconds, got {s}"));
    }
    Ok(secs)
}

impl From<WatchArgs> for WatchConfig {
    fn from(a: WatchArgs) -> Self {
        WatchConfig {
            new_dir: a.new_dir,
            data_yaml: a.data_yaml,
            trainer_bin: a.trainer_bin,
            epochs: a.epochs,
            device: a.device.into(),
            batch: a.batch,
            poll_interval: a.poll_interval,
            move_only: a.move_only,
            ..WatchConfig::default()
        }
    }
}
