use std::rc::Rc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::config::{load_config, ColorModeConfig};
use crate::controller::ThemeModeController;
use crate::error::AppResult;
use crate::menu::ThemeMenu;
use crate::signal::{CommandPreferenceSignal, PreferenceSignal};
use crate::storage::{JsonFileStore, PreferenceStore};
use crate::theme::{EffectiveMode, ThemeChoice};

#[derive(Debug, Parser)]
#[command(name = "colormode", version, about = "Select and persist the color mode")]
pub struct Cli {
    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Show the current choice and effective mode.
    Show,
    /// Select system, light or dark.
    Set {
        #[arg(value_parser = parse_choice)]
        choice: ThemeChoice,
    },
    /// Print the selector menu.
    Menu,
    /// Follow system preference changes and print each effective mode.
    Watch,
}

fn parse_choice(raw: &str) -> Result<ThemeChoice, crate::theme::ThemeError> {
    raw.parse()
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub choice: ThemeChoice,
    pub effective: EffectiveMode,
    pub following_system: bool,
}

impl StatusReport {
    fn from_controller<S: PreferenceStore>(controller: &ThemeModeController<S>) -> Self {
        Self {
            choice: controller.choice(),
            effective: controller.effective_mode(),
            following_system: controller.is_following_system(),
        }
    }

    fn render(&self) -> String {
        let source = if self.following_system { " (system)" } else { "" };
        format!(
            "{} {}{source}\nchoice: {}",
            self.effective.glyph(),
            self.effective,
            self.choice
        )
    }
}

pub fn run_with(cli: Cli) -> AppResult<()> {
    let config = load_config();
    let store = JsonFileStore::with_default_path();
    if let Some(path) = store.path() {
        tracing::debug!(path = %path.display(), "using preference store");
    }
    let signal = Rc::new(CommandPreferenceSignal::detect());

    let mut controller = ThemeModeController::new(
        config.clone(),
        store,
        Rc::clone(&signal) as Rc<dyn PreferenceSignal>,
    );
    controller.initialize()?;

    match cli.command.unwrap_or(Commands::Show) {
        Commands::Show => print_status(&controller, cli.json)?,
        Commands::Set { choice } => {
            controller.select(choice)?;
            print_status(&controller, cli.json)?;
        }
        Commands::Menu => print_menu(&controller.menu(), cli.json)?,
        Commands::Watch => watch(&mut controller, &signal, &config, cli.json)?,
    }
    Ok(())
}

fn print_status<S: PreferenceStore>(
    controller: &ThemeModeController<S>,
    json: bool,
) -> AppResult<()> {
    let report = StatusReport::from_controller(controller);
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}

fn print_menu(menu: &ThemeMenu, json: bool) -> AppResult<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(menu)?);
        return Ok(());
    }
    println!("{}", menu.trigger_glyph);
    for (index, entry) in menu.entries.iter().enumerate() {
        let marker = if entry.active { "*" } else { " " };
        println!("{marker} {}. {}", index + 1, entry.text());
    }
    Ok(())
}

fn watch<S: PreferenceStore>(
    controller: &mut ThemeModeController<S>,
    signal: &CommandPreferenceSignal,
    config: &ColorModeConfig,
    json: bool,
) -> AppResult<()> {
    print_status(controller, json)?;
    controller.on_change(move |mode| {
        if json {
            println!("{}", serde_json::json!({ "effective": mode }));
        } else {
            println!("{} {mode}", mode.glyph());
        }
    });
    if !controller.is_following_system() {
        tracing::info!(
            choice = %controller.choice(),
            "explicit choice set; system changes are ignored"
        );
    }
    tracing::info!(
        poll_interval = ?config.poll_interval,
        "watching system color scheme"
    );
    loop {
        std::thread::sleep(config.poll_interval);
        signal.refresh();
    }
}
