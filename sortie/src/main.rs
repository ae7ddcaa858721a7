//! `sortie` command line: offline checks for task manifests and strategies.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use sortie::compile::compile_from_path;
use sortie::core::types::Location;
use sortie::exit_codes;
use sortie::logging;
use sortie::select::{SelectOutcome, select_from_path};
use sortie::validate::validate_manifest;

#[derive(Parser)]
#[command(
    name = "sortie",
    version,
    about = "Task scheduling and execution engine for scripted game sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a task manifest against its schema and dependency rules.
    Validate {
        manifest: PathBuf,
        /// Engine config to validate as well.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the name of the next available task.
    Select {
        manifest: PathBuf,
        /// Flat TOML table of session settings the conditions read.
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Print the macro compiled from a JSON combat strategy.
    Compile {
        strategy: PathBuf,
        /// Location passed to default action generators.
        #[arg(long)]
        location: Option<String>,
        /// Print the auto-attack macro instead.
        #[arg(long)]
        autoattack: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate { manifest, config } => {
            let outcome = validate_manifest(&manifest, config.as_deref())?;
            println!("ok: {} quests, {} tasks", outcome.quests, outcome.tasks);
            Ok(exit_codes::OK)
        }
        Command::Select { manifest, settings } => {
            match select_from_path(&manifest, settings.as_deref())? {
                SelectOutcome::Next(name) => {
                    println!("{}", name);
                    Ok(exit_codes::OK)
                }
                SelectOutcome::Complete => {
                    eprintln!("all tasks completed");
                    Ok(exit_codes::COMPLETE)
                }
                SelectOutcome::Stuck { pending } => {
                    eprintln!("no task available; pending: {}", pending.join(", "));
                    Ok(exit_codes::STUCK)
                }
            }
        }
        Command::Compile {
            strategy,
            location,
            autoattack,
        } => {
            let location = location.map(Location::new);
            let compiled = compile_from_path(&strategy, location.as_ref())?;
            if autoattack {
                println!("{}", compiled.autoattack);
            } else {
                println!("{}", compiled.macro_text);
            }
            Ok(exit_codes::OK)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_select_with_settings() {
        let cli = Cli::parse_from(["sortie", "select", "tasks.toml", "--settings", "s.toml"]);
        match cli.command {
            Command::Select { manifest, settings } => {
                assert_eq!(manifest, PathBuf::from("tasks.toml"));
                assert_eq!(settings, Some(PathBuf::from("s.toml")));
            }
            _ => panic!("expected select"),
        }
    }

    #[test]
    fn parse_compile_autoattack() {
        let cli = Cli::parse_from(["sortie", "compile", "s.json", "--autoattack"]);
        assert!(matches!(
            cli.command,
            Command::Compile {
                autoattack: true,
                location: None,
                ..
            }
        ));
    }
}
