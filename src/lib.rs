pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod menu;
pub mod signal;
pub mod state;
pub mod storage;
pub mod theme;

use clap::Parser;

pub use config::ColorModeConfig;
pub use controller::ThemeModeController;
pub use error::{AppError, AppResult};
pub use menu::{MenuEntry, ThemeMenu};
pub use theme::{EffectiveMode, ThemeChoice};

/// Entrypoint used by the CLI binary.
pub fn run() -> AppResult<()> {
    logging::init();
    let cli = cli::Cli::parse();
    tracing::debug!(?cli, "starting colormode");
    cli::run_with(cli)
}
