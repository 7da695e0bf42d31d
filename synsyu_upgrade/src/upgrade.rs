/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::upgrade
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Drive one upgrade resolution: snapshot, aggregate, sort,
    render, prompt, and produce the upgrade plan handed to the
    installer.

  Security / Safety Notes:
    The plan is written to operator-controlled paths; nothing
    is installed here.

  Dependencies:
    serde for plan serialization, tokio io for the prompt.

  Operational Scope:
    Invoked once by the entry point; the plan is consumed by
    the Syn-Syu orchestrator.

  Revision History:
    2024-11-04 COD  Authored manifest builder.
    2026-10-18 COD  Replaced manifest with interactive upgrade plan.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Empty results are benign, not errors
    - Selection is applied after sorting, never before
    - Explicit source attribution for each target
============================================================*/

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use colored::Colorize;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::aggregate::SourceAggregator;
use crate::display::{print_lists, sort_candidates};
use crate::error::{Result, SynsyuError};
use crate::logger::Logger;
use crate::package::UpgradeCandidate;
use crate::providers::PackageSnapshot;
use crate::selection::{parse_exclusions, retain_targets, ExclusionSet};

/// Targets handed to the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradePlan {
    pub generated_at: String,
    pub generated_by: String,
    /// Packages to take from the sync databases.
    pub repo_targets: Vec<String>,
    /// Packages to build from the AUR, development packages included.
    pub aur_targets: Vec<String>,
    /// Candidates the operator held back.
    pub excluded: Vec<String>,
}

impl UpgradePlan {
    /// Apply `exclusions` to the sorted lists the operator looked at.
    pub fn from_selection(
        local: &[UpgradeCandidate],
        registry: &[UpgradeCandidate],
        exclusions: &ExclusionSet,
    ) -> Self {
        let names = |items: Vec<&UpgradeCandidate>| -> Vec<String> {
            items.into_iter().map(|item| item.name().to_string()).collect()
        };
        let excluded = exclusions
            .local
            .iter()
            .filter_map(|idx| local.get(*idx))
            .chain(exclusions.registry.iter().filter_map(|idx| registry.get(*idx)))
            .map(|item| item.name().to_string())
            .collect();

        Self {
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            generated_by: "synsyu_upgrade".to_string(),
            repo_targets: names(retain_targets(local, &exclusions.local)),
            aur_targets: names(retain_targets(registry, &exclusions.registry)),
            excluded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.repo_targets.is_empty() && self.aur_targets.is_empty()
    }

    /// All targets, repository packages first.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.repo_targets
            .iter()
            .chain(self.aur_targets.iter())
            .map(String::as_str)
    }
}

/// How a resolution ended.
#[derive(Debug)]
pub enum UpgradeOutcome {
    NothingToDo,
    Planned(UpgradePlan),
}

/// One pass of upgrade resolution.
pub struct UpgradeFlow {
    snapshot: Arc<dyn PackageSnapshot>,
    aggregator: SourceAggregator,
    logger: Arc<Logger>,
    no_confirm: bool,
}

impl UpgradeFlow {
    pub fn new(
        snapshot: Arc<dyn PackageSnapshot>,
        aggregator: SourceAggregator,
        logger: Arc<Logger>,
        no_confirm: bool,
    ) -> Self {
        Self {
            snapshot,
            aggregator,
            logger,
            no_confirm,
        }
    }

    /// Resolve upgrades, reading the exclusion line from `input` unless
    /// confirmation is disabled.
    pub async fn run<R>(&self, input: &mut R) -> Result<UpgradeOutcome>
    where
        R: AsyncBufRead + Unpin,
    {
        let installed = self.snapshot.installed().await?;
        self.logger.info(
            "PACKAGES",
            format!("Detected {} installed packages", installed.len()),
        );

        let mut outcome = self.aggregator.collect(Arc::new(installed)).await?;
        if outcome.is_empty() {
            self.logger.info("EMPTY", "There is nothing to do");
            println!("\nThere is nothing to do");
            return Ok(UpgradeOutcome::NothingToDo);
        }

        self.logger.info(
            "CANDIDATES",
            format!(
                "{} upgrade candidates ({} repo, {} aur)",
                outcome.total(),
                outcome.local.len(),
                outcome.registry.len()
            ),
        );
        sort_candidates(&mut outcome.local);
        sort_candidates(&mut outcome.registry);
        print_lists(&outcome.local, &outcome.registry);

        let exclusions = if self.no_confirm {
            ExclusionSet::default()
        } else {
            let line = read_selection(input).await?;
            self.logger.debug("SELECT", format!("Operator input `{}`", line.trim()));
            parse_exclusions(&line, outcome.registry.len(), outcome.local.len())
        };

        let plan = UpgradePlan::from_selection(&outcome.local, &outcome.registry, &exclusions);
        self.logger.info(
            "PLAN",
            format!(
                "repo={} aur={} excluded={}",
                plan.repo_targets.len(),
                plan.aur_targets.len(),
                plan.excluded.len()
            ),
        );
        Ok(UpgradeOutcome::Planned(plan))
    }
}

async fn read_selection<R>(input: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    println!("{}", "Enter packages you don't want to upgrade.".green());
    print!("Numbers: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .await
        .map_err(|err| SynsyuError::Input(format!("Failed to read selection: {err}")))?;
    if read == 0 {
        return Err(SynsyuError::Input(
            "Input closed before a selection was entered".into(),
        ));
    }
    Ok(line)
}

/// Persist the plan to the given path.
pub fn write_plan(plan: &UpgradePlan, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynsyuError::Filesystem(format!(
                "Failed to create plan directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = File::create(path).map_err(|err| {
        SynsyuError::Filesystem(format!("Failed to create plan file {}: {err}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, plan).map_err(|err| {
        SynsyuError::Serialization(format!("Failed to write plan {}: {err}", path.display()))
    })?;
    Ok(())
}
