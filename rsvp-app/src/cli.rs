use clap::{Parser, ValueEnum};
use rsvp_experiment::SimulationMode;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Rapid serial visual presentation target detection")]
pub struct Args {
    /// Session config (JSON); image paths resolve relative to its directory
    #[arg(long, value_name = "PATH")]
    pub config: PathBuf,

    /// Run headless and write simulated records instead of opening a window
    #[arg(long, value_enum)]
    pub simulate: Option<SimulateArg>,

    /// RNG seed (overrides the config and the subject id)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use a normal window instead of borderless fullscreen
    #[arg(long, default_value_t = false)]
    pub windowed: bool,

    /// Font for instruction and caption text
    #[arg(long, value_name = "PATH")]
    pub font: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulateArg {
    DataOnly,
    Visual,
}

impl From<SimulateArg> for SimulationMode {
    fn from(arg: SimulateArg) -> Self {
        match arg {
            SimulateArg::DataOnly => SimulationMode::DataOnly,
            SimulateArg::Visual => SimulationMode::Visual,
        }
    }
}
