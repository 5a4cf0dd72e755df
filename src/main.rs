mod app;
mod backend;
mod config;
mod error;
mod gate;
mod import;
mod progress;
mod protocol;
mod registry;
mod selection;
mod ui;

use anyhow::{bail, Result};
use config::{AppConfig, EntrySource};

/// Command-line overrides applied on top of the stored config for this run.
#[derive(Debug, Default, PartialEq, Eq)]
struct Overrides {
    program: Option<String>,
    args: Vec<String>,
    games: bool,
    help: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Overrides> {
    let mut args = args.into_iter();
    let mut overrides = Overrides::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--backend" | "-b" => match args.next() {
                Some(program) => overrides.program = Some(program),
                None => bail!("--backend requires a program"),
            },
            "--arg" => match args.next() {
                Some(value) => overrides.args.push(value),
                None => bail!("--arg requires a value"),
            },
            "--games" | "-g" => overrides.games = true,
            "--help" | "-h" => overrides.help = true,
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(overrides)
}

fn apply_overrides(config: &mut AppConfig, overrides: Overrides) {
    if let Some(program) = overrides.program {
        config.backend.program = program;
        config.backend.args = overrides.args;
    } else if !overrides.args.is_empty() {
        config.backend.args = overrides.args;
    }
    if overrides.games {
        config.entry_source = EntrySource::Games;
    }
}

fn print_help() {
    println!("PlayDeck");
    println!("  --backend, -b <program>  Backend executable speaking the JSON-lines protocol");
    println!("  --arg <value>            Extra argument for the backend (repeatable)");
    println!("  --games, -g              List the game catalog instead of profiles");
    println!("  --help, -h               Show this help");
}

fn main() -> Result<()> {
    let overrides = parse_args(std::env::args().skip(1))?;
    if overrides.help {
        print_help();
        return Ok(());
    }

    let mut config = AppConfig::load_or_create()?;
    apply_overrides(&mut config, overrides);

    let mut app = app::App::initialize(config);
    ui::run(&mut app)
}
