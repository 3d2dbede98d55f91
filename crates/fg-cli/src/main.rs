// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

mod commands;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use commands::CheckRequest;
use fg_config::{FieldgateConfig, PolicyMode, load_config};
use fg_error::FgError;
use fg_telemetry::{JsonExporter, TelemetryExporter};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fieldgate", version, about = "Field-level authorization policy tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a fieldgate.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective policy tree as JSON.
    Tree {
        /// Authoring style; defaults to the configured one.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Evaluate one (type, field) against a fixture.
    Check {
        /// JSON fixture with the records to consult.
        #[arg(long)]
        fixture: PathBuf,

        /// Schema type name, e.g. `Event` or `Mutation`.
        #[arg(long = "type")]
        type_name: String,

        /// Field or operation name.
        #[arg(long)]
        field: String,

        /// Id of the calling user; anonymous when omitted.
        #[arg(long)]
        caller: Option<String>,

        /// Parent record as KIND:ID, e.g. `Event:5c9b...`.
        #[arg(long)]
        parent: Option<String>,

        /// Arguments as a JSON object.
        #[arg(long)]
        args: Option<String>,

        /// Authoring style; defaults to the configured one.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Compare both authoring styles over a fixture.
    Diff {
        /// JSON fixture with the records to consult.
        #[arg(long)]
        fixture: PathBuf,

        /// Also print decision statistics as JSON.
        #[arg(long)]
        summary: bool,
    },

    /// Validate a config file and print diagnostics.
    ConfigCheck {
        /// Config path; falls back to --config.
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Flat,
    RoleBased,
}

impl From<ModeArg> for PolicyMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Flat => PolicyMode::Flat,
            ModeArg::RoleBased => PolicyMode::RoleBased,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

/// Exit status for a failed command: 2 when a fieldgate error in the chain
/// is a startup fault (config or policy), 1 otherwise.
fn exit_code(err: &anyhow::Error) -> i32 {
    let fatal = err
        .chain()
        .filter_map(|e| e.downcast_ref::<FgError>())
        .any(|e| e.code.is_fatal());
    if fatal { 2 } else { 1 }
}

async fn run(cli: Cli) -> Result<()> {
    // config-check reports load failures itself.
    let config = match &cli.command {
        Commands::ConfigCheck { .. } => FieldgateConfig::default(),
        _ => load_config(cli.config.as_deref())
            .map_err(FgError::from)
            .context("load config")?,
    };

    let level = if cli.debug {
        "debug"
    } else {
        config.log_level.as_deref().unwrap_or("info")
    };
    let filter = EnvFilter::new(format!("fieldgate={level},fg_={level}"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Tree { mode } => {
            let mode = mode.map_or(config.policy_mode, PolicyMode::from);
            println!("{}", commands::tree_json(mode)?);
            Ok(())
        }
        Commands::Check {
            fixture,
            type_name,
            field,
            caller,
            parent,
            args,
            mode,
        } => {
            let config = FieldgateConfig {
                policy_mode: mode.map_or(config.policy_mode, PolicyMode::from),
                ..config
            };
            let request = CheckRequest {
                type_name,
                field,
                caller,
                parent,
                args,
            };
            let report = commands::check(&fixture, &config, &request).await?;
            println!("{report}");
            Ok(())
        }
        Commands::Diff { fixture, summary } => cmd_diff(&fixture, summary).await,
        Commands::ConfigCheck { path } => cmd_config_check(path.or(cli.config).as_deref()),
    }
}

async fn cmd_diff(fixture: &Path, summary: bool) -> Result<()> {
    let report = commands::diff(fixture).await?;
    for line in &report.disagreements {
        println!("{line}");
    }
    if summary {
        println!(
            "{}",
            JsonExporter
                .export(&report.summary)
                .map_err(anyhow::Error::msg)?
        );
    }
    println!(
        "{} decisions compared, {} disagreements",
        report.checked,
        report.disagreements.len()
    );
    if !report.is_clean() {
        bail!("authoring styles disagree");
    }
    Ok(())
}

fn cmd_config_check(path: Option<&Path>) -> Result<()> {
    let warnings = commands::config_check(path)?;
    for w in &warnings {
        println!("warning: {w}");
    }
    println!("ok ({} warnings)", warnings.len());
    Ok(())
}
