/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Syu Upgrade. Collects repository, AUR
    and development upgrade candidates, lets the operator hold
    packages back, and emits the resulting upgrade plan for
    the Syn-Syu orchestrator.

  Security / Safety Notes:
    Operates within user privileges. Executes pacman, vercmp
    and git commands and performs HTTPS GET requests only.

  Dependencies:
    clap for CLI parsing, chrono for timestamps.

  Operational Scope:
    Invoked by the Syn-Syu Bash layer via `syn-syu upgrade` or
    directly by operators reviewing pending upgrades.

  Revision History:
    2025-10-28 COD  Authored Syn-Syu Core runtime.
    2026-10-18 COD  Reworked into the interactive upgrade resolver.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

mod aggregate;
mod aur;
mod candidate;
mod config;
mod correlate;
mod devel;
mod display;
mod error;
mod ignore;
mod logger;
mod package;
mod pacman;
mod providers;
mod selection;
mod upgrade;
mod vcs;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{ArgAction, Parser};
use tokio::io::BufReader;

use aggregate::SourceAggregator;
use aur::AurClient;
use candidate::CandidateBuilder;
use config::SynsyuConfig;
use correlate::RegistryCorrelator;
use devel::DevelTracker;
use error::{Result, SynsyuError};
use ignore::IgnoreList;
use logger::Logger;
use pacman::{PacmanSnapshot, PacmanSyncDb, Vercmp};
use upgrade::{write_plan, UpgradeFlow, UpgradeOutcome, UpgradePlan};
use vcs::VcsStore;

/// Command-line arguments for Syn-Syu-Upgrade.
#[derive(Debug, Parser)]
#[command(
    name = "Syn-Syu-Upgrade",
    version,
    author = "Synavera Systems",
    about = "Conscious upgrade resolver for Syn-Syu"
)]
struct Cli {
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override upgrade plan output path.
    #[arg(long, value_name = "PATH")]
    plan: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Check tracked development packages for new upstream revisions.
    #[arg(long, action = ArgAction::SetTrue)]
    devel: bool,
    /// Treat a newer AUR modification time as an upgrade.
    #[arg(long = "timeupdate", action = ArgAction::SetTrue)]
    time_update: bool,
    /// Upgrade everything without asking for exclusions.
    #[arg(long = "noconfirm", action = ArgAction::SetTrue)]
    no_confirm: bool,
    /// Skip AUR lookups.
    #[arg(long, action = ArgAction::SetTrue)]
    no_aur: bool,
    /// Skip repository lookups.
    #[arg(long, action = ArgAction::SetTrue)]
    no_repo: bool,
    /// Do not write the plan; print targets only.
    #[arg(long, action = ArgAction::SetTrue)]
    dry_run: bool,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Syu-Upgrade] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.no_aur && cli.no_repo {
        return Err(SynsyuError::Config(
            "Cannot disable both repo and AUR resolution".into(),
        ));
    }

    let mut config = SynsyuConfig::load_from_optional_path(cli.config.as_deref())?;
    config.upgrade.devel |= cli.devel;
    config.upgrade.time_update |= cli.time_update;
    config.upgrade.no_confirm |= cli.no_confirm;

    let plan_path = cli.plan.clone().unwrap_or_else(|| config.plan_path());

    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .or_else(|| Some(config.log_dir().join(format!("upgrade_{session_stamp}.log"))));
    let logger = Arc::new(Logger::new(log_path, cli.verbose)?);
    logger.info("INIT", "Syn-Syu Upgrade awakening.");

    let ignore = IgnoreList::load(
        &config.pacman_conf_path(),
        &config.upgrade.ignore,
        &logger,
    );
    logger.debug("IGNORE", format!("{} ignore patterns active", ignore.len()));
    let builder = CandidateBuilder::new(Arc::new(Vercmp), Arc::new(ignore), logger.clone());

    let mut aggregator = SourceAggregator::new(
        builder.clone(),
        logger.clone(),
        config.upgrade.channel_capacity,
    );
    if !cli.no_repo {
        aggregator = aggregator.with_sync(Arc::new(PacmanSyncDb));
    }
    if !cli.no_aur {
        let client = AurClient::new(&config.aur)?;
        aggregator = aggregator.with_registry(RegistryCorrelator::new(
            Arc::new(client),
            builder.clone(),
            config.upgrade.request_split_n,
            config.upgrade.time_update,
        ));
    }
    if config.upgrade.devel {
        let store = VcsStore::open(&config.vcs_store_path(), logger.clone())?;
        aggregator = aggregator.with_devel(DevelTracker::new(
            Arc::new(store),
            builder.clone(),
            logger.clone(),
        ));
    }

    let flow = UpgradeFlow::new(
        Arc::new(PacmanSnapshot),
        aggregator,
        logger.clone(),
        config.upgrade.no_confirm,
    );
    let mut stdin = BufReader::new(tokio::io::stdin());

    match flow.run(&mut stdin).await? {
        UpgradeOutcome::NothingToDo => {}
        UpgradeOutcome::Planned(plan) => {
            print_summary(&plan);
            if cli.dry_run {
                logger.info("DRYRUN", "Plan not written");
            } else if plan.is_empty() {
                logger.info("PLAN", "Every candidate was held back; no plan written");
            } else {
                write_plan(&plan, &plan_path)?;
                logger.info(
                    "PLAN",
                    format!("Upgrade plan written to {}", plan_path.display()),
                );
            }
        }
    }

    if let Some(path) = logger.path() {
        logger.debug("LOG", format!("Session log at {}", path.display()));
    }
    logger.info("COMPLETE", "Consciousness synchronised.");
    logger.finalize()?;

    Ok(ExitCode::SUCCESS)
}

fn print_summary(plan: &UpgradePlan) {
    if plan.is_empty() {
        println!("→ No packages left to upgrade.");
        return;
    }
    println!(
        "→ Upgrading {} package(s): {}",
        plan.targets().count(),
        plan.targets().collect::<Vec<_>>().join(" ")
    );
}
