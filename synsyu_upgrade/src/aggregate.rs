/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::aggregate
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Run the repository unit and the registry unit (AUR batches
    plus development tracking) concurrently and merge their
    candidates into two lists.

  Security / Safety Notes:
    Shares the snapshot and providers read-only; merging is
    single-consumer and needs no locking.

  Dependencies:
    tokio mpsc for the bounded hand-off, JoinSet for sub-units.

  Operational Scope:
    Called once per run by the upgrade flow.

  Revision History:
    2026-10-18 COD  Authored concurrent source aggregation.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Completion counted explicitly, never inferred
    - One unit's failure never cancels the other
    - Only total failure is fatal
============================================================*/

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::candidate::CandidateBuilder;
use crate::correlate::RegistryCorrelator;
use crate::devel::DevelTracker;
use crate::error::{Result, SynsyuError};
use crate::logger::Logger;
use crate::package::{InstalledPackage, SourceKind, UpgradeCandidate};
use crate::providers::SyncDatabase;

/// Top-level units whose completion the aggregator waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceUnit {
    Repo,
    Registry,
}

impl SourceUnit {
    const ALL: [SourceUnit; 2] = [SourceUnit::Repo, SourceUnit::Registry];
}

impl fmt::Display for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceUnit::Repo => f.write_str("sync databases"),
            SourceUnit::Registry => f.write_str("AUR"),
        }
    }
}

/// Messages flowing from source units to the aggregator.
#[derive(Debug)]
pub enum SourceEvent {
    Candidate(UpgradeCandidate),
    Finished {
        unit: SourceUnit,
        outcome: Result<usize>,
    },
}

/// Sending half handed to every candidate producer.
#[derive(Clone)]
pub struct CandidateSink {
    tx: mpsc::Sender<SourceEvent>,
}

impl CandidateSink {
    pub fn new(tx: mpsc::Sender<SourceEvent>) -> Self {
        Self { tx }
    }

    /// Hand over one candidate. `false` once the aggregator is gone.
    pub async fn emit(&self, candidate: UpgradeCandidate) -> bool {
        self.tx.send(SourceEvent::Candidate(candidate)).await.is_ok()
    }

    async fn finish(self, unit: SourceUnit, outcome: Result<usize>) {
        // A closed channel means the aggregator already gave up on us.
        let _ = self.tx.send(SourceEvent::Finished { unit, outcome }).await;
    }
}

/// Result of one task spawned inside a unit.
pub struct SubUnitReport {
    pub label: String,
    pub outcome: Result<usize>,
}

/// The two merged candidate lists.
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    /// Candidates from the sync databases.
    pub local: Vec<UpgradeCandidate>,
    /// Candidates from the AUR and development tracking.
    pub registry: Vec<UpgradeCandidate>,
    pub failed: Vec<SourceUnit>,
}

impl AggregateOutcome {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.registry.is_empty()
    }

    pub fn total(&self) -> usize {
        self.local.len() + self.registry.len()
    }
}

/// Per-list merge that keeps the first candidate seen for a name.
#[derive(Default)]
struct Merger {
    outcome: AggregateOutcome,
    local_names: HashSet<String>,
    registry_names: HashSet<String>,
}

impl Merger {
    /// Returns the candidate back when its name is already taken.
    fn push(&mut self, candidate: UpgradeCandidate) -> Option<UpgradeCandidate> {
        let (list, names) = if candidate.source().is_registry() {
            (&mut self.outcome.registry, &mut self.registry_names)
        } else {
            (&mut self.outcome.local, &mut self.local_names)
        };
        if !names.insert(candidate.name().to_string()) {
            return Some(candidate);
        }
        list.push(candidate);
        None
    }
}

/// Concurrent aggregation over the configured sources.
#[derive(Clone)]
pub struct SourceAggregator {
    builder: CandidateBuilder,
    logger: Arc<Logger>,
    channel_capacity: usize,
    sync: Option<Arc<dyn SyncDatabase>>,
    correlator: Option<RegistryCorrelator>,
    devel: Option<Arc<DevelTracker>>,
}

impl SourceAggregator {
    pub fn new(builder: CandidateBuilder, logger: Arc<Logger>, channel_capacity: usize) -> Self {
        Self {
            builder,
            logger,
            channel_capacity: channel_capacity.max(1),
            sync: None,
            correlator: None,
            devel: None,
        }
    }

    pub fn with_sync(mut self, sync: Arc<dyn SyncDatabase>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_registry(mut self, correlator: RegistryCorrelator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    pub fn with_devel(mut self, tracker: DevelTracker) -> Self {
        self.devel = Some(Arc::new(tracker));
        self
    }

    /// Run both units over `installed` and merge what they produce.
    ///
    /// Fails only when every unit failed.
    pub async fn collect(&self, installed: Arc<Vec<InstalledPackage>>) -> Result<AggregateOutcome> {
        let (tx, mut rx) = mpsc::channel(self.channel_capacity);

        self.logger.info("SOURCES", "Searching databases for updates...");
        let repo_sink = CandidateSink::new(tx.clone());
        let sync = self.sync.clone();
        let builder = self.builder.clone();
        let repo_installed = Arc::clone(&installed);
        tokio::spawn(async move {
            let outcome = match sync {
                Some(sync) => repo_unit(sync.as_ref(), &builder, &repo_installed, &repo_sink).await,
                None => Ok(0),
            };
            repo_sink.finish(SourceUnit::Repo, outcome).await;
        });

        self.logger.info("SOURCES", "Searching AUR for updates...");
        let registry_sink = CandidateSink::new(tx);
        let correlator = self.correlator.clone();
        let devel = self.devel.clone();
        let logger = Arc::clone(&self.logger);
        tokio::spawn(async move {
            let outcome =
                registry_unit(correlator, devel, installed, &registry_sink, &logger).await;
            registry_sink.finish(SourceUnit::Registry, outcome).await;
        });

        let mut merger = Merger::default();
        let mut finished: HashSet<SourceUnit> = HashSet::new();
        while finished.len() < SourceUnit::ALL.len() {
            let Some(event) = rx.recv().await else {
                break;
            };
            match event {
                SourceEvent::Candidate(candidate) => {
                    if let Some(duplicate) = merger.push(candidate) {
                        self.logger
                            .debug("MERGE", format!("Dropped duplicate candidate {duplicate}"));
                    }
                }
                SourceEvent::Finished { unit, outcome } => {
                    finished.insert(unit);
                    match outcome {
                        Ok(count) => self
                            .logger
                            .info("SOURCES", format!("{unit}: {count} candidates")),
                        Err(err) => {
                            self.logger.error("SOURCES", format!("{unit}: {err}"));
                            merger.outcome.failed.push(unit);
                        }
                    }
                }
            }
        }

        for unit in SourceUnit::ALL {
            if !finished.contains(&unit) {
                self.logger
                    .error("SOURCES", format!("{unit}: ended without reporting completion"));
                merger.outcome.failed.push(unit);
            }
        }

        let outcome = merger.outcome;
        if outcome.failed.len() == SourceUnit::ALL.len() {
            return Err(SynsyuError::SourcesExhausted(
                "both the sync databases and the AUR failed".into(),
            ));
        }
        Ok(outcome)
    }
}

async fn repo_unit(
    sync: &dyn SyncDatabase,
    builder: &CandidateBuilder,
    installed: &[InstalledPackage],
    sink: &CandidateSink,
) -> Result<usize> {
    let index = sync.index().await?;
    if index.is_empty() {
        return Ok(0);
    }
    let mut produced = 0;
    for package in installed.iter().filter(|pkg| !pkg.foreign) {
        let Some(entry) = index.latest(&package.name) else {
            continue;
        };
        if let Some(candidate) = builder
            .build(
                &package.name,
                SourceKind::Repo,
                &package.version,
                &entry.version,
                &entry.repository,
            )
            .await
        {
            produced += 1;
            if !sink.emit(candidate).await {
                break;
            }
        }
    }
    Ok(produced)
}

/// AUR batches and development tracking, joined as one unit. The unit
/// fails only when it attempted work and every piece of it failed.
async fn registry_unit(
    correlator: Option<RegistryCorrelator>,
    devel: Option<Arc<DevelTracker>>,
    installed: Arc<Vec<InstalledPackage>>,
    sink: &CandidateSink,
    logger: &Logger,
) -> Result<usize> {
    let mut tasks: JoinSet<SubUnitReport> = JoinSet::new();

    if let Some(tracker) = devel {
        logger.info("SOURCES", "Checking development packages...");
        let installed = Arc::clone(&installed);
        let sink = sink.clone();
        tasks.spawn(async move {
            let outcome = tracker.run(&installed, &sink).await;
            SubUnitReport {
                label: "devel".to_string(),
                outcome,
            }
        });
    }

    if let Some(correlator) = correlator {
        let foreign: Arc<Vec<InstalledPackage>> = Arc::new(
            installed
                .iter()
                .filter(|pkg| pkg.foreign)
                .cloned()
                .collect(),
        );
        let batches = correlator.spawn_batches(&foreign, &mut tasks, sink);
        logger.debug(
            "AUR",
            format!("{} foreign packages in {batches} batches", foreign.len()),
        );
    }

    let mut attempted = 0;
    let mut failed = 0;
    let mut produced = 0;
    let mut last_error: Option<SynsyuError> = None;
    while let Some(joined) = tasks.join_next().await {
        attempted += 1;
        let report = joined.unwrap_or_else(|err| SubUnitReport {
            label: "registry task".to_string(),
            outcome: Err(SynsyuError::Runtime(format!("task aborted: {err}"))),
        });
        match report.outcome {
            Ok(count) => produced += count,
            Err(err) => {
                failed += 1;
                logger.error("AUR", format!("{}: {err}", report.label));
                last_error = Some(err);
            }
        }
    }

    match last_error {
        Some(err) if failed == attempted => Err(err),
        _ => Ok(produced),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::candidate::testing::{NameSet, NumericComparator};
    use crate::package::{RegistryEntry, SyncEntry, SyncIndex};
    use crate::providers::{RegistryClient, RevisionStore, TrackedRevision};

    struct FakeSync(Option<Vec<(&'static str, &'static str, &'static str)>>);

    #[async_trait]
    impl SyncDatabase for FakeSync {
        async fn index(&self) -> Result<SyncIndex> {
            let Some(rows) = &self.0 else {
                return Err(SynsyuError::CommandFailure {
                    command: "pacman -Sl".into(),
                    status: 1,
                    stderr: "could not open database".into(),
                });
            };
            let mut index = SyncIndex::default();
            for (repository, name, version) in rows {
                index.insert(
                    *name,
                    SyncEntry {
                        repository: repository.to_string(),
                        version: version.to_string(),
                    },
                );
            }
            Ok(index)
        }
    }

    /// Serves a fixed version table, or fails every request.
    struct FakeAur(Option<HashMap<&'static str, &'static str>>);

    #[async_trait]
    impl RegistryClient for FakeAur {
        async fn info(&self, names: &[String]) -> Result<Vec<RegistryEntry>> {
            let Some(table) = &self.0 else {
                return Err(SynsyuError::Network("aur.archlinux.org unreachable".into()));
            };
            Ok(names
                .iter()
                .filter_map(|name| {
                    table.get(name.as_str()).map(|version| RegistryEntry {
                        name: name.clone(),
                        version: version.to_string(),
                        last_modified: 0,
                    })
                })
                .collect())
        }
    }

    struct AlwaysStale(Vec<&'static str>);

    #[async_trait]
    impl RevisionStore for AlwaysStale {
        async fn tracked(&self) -> Result<Vec<TrackedRevision>> {
            Ok(self
                .0
                .iter()
                .map(|name| TrackedRevision {
                    name: name.to_string(),
                    last_revision: "1234567890".into(),
                })
                .collect())
        }

        async fn needs_update(&self, _entry: &TrackedRevision) -> bool {
            true
        }

        async fn forget(&self, _names: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn builder(ignored: &[&str]) -> CandidateBuilder {
        CandidateBuilder::new(
            Arc::new(NumericComparator),
            Arc::new(NameSet::of(ignored)),
            Arc::new(Logger::stderr_only()),
        )
    }

    fn installed() -> Arc<Vec<InstalledPackage>> {
        Arc::new(vec![
            InstalledPackage::new("bash", "5.2-1"),
            InstalledPackage::new("linux", "6.1-1"),
            InstalledPackage::new("mesa", "24.1-1"),
            InstalledPackage::new("neovim-git", "0.10-1").foreign(),
            InstalledPackage::new("paru", "2.0-1").foreign(),
            InstalledPackage::new("yay", "12.3-1").foreign(),
            InstalledPackage::new("zoom", "6.0-1").foreign(),
        ])
    }

    fn healthy_sync() -> FakeSync {
        FakeSync(Some(vec![
            ("core", "bash", "5.2-1"),
            ("core", "linux", "6.2-1"),
            ("extra", "mesa", "24.2-1"),
            ("extra", "yay", "99.0-1"),
        ]))
    }

    fn healthy_aur() -> FakeAur {
        FakeAur(Some(HashMap::from([
            ("paru", "2.1-1"),
            ("yay", "12.4-1"),
            ("neovim-git", "0.10-1"),
        ])))
    }

    fn aggregator(sync: FakeSync, aur: FakeAur, ignored: &[&str]) -> SourceAggregator {
        let builder = builder(ignored);
        let correlator = RegistryCorrelator::new(Arc::new(aur), builder.clone(), 2, false);
        SourceAggregator::new(builder, Arc::new(Logger::stderr_only()), 2)
            .with_sync(Arc::new(sync))
            .with_registry(correlator)
    }

    fn names(list: &[UpgradeCandidate]) -> Vec<&str> {
        let mut names: Vec<&str> = list.iter().map(|candidate| candidate.name()).collect();
        names.sort_unstable();
        names
    }

    #[tokio::test]
    async fn both_sources_feed_their_own_lists() {
        let outcome = aggregator(healthy_sync(), healthy_aur(), &["mesa"])
            .collect(installed())
            .await
            .unwrap();
        assert_eq!(names(&outcome.local), vec!["linux"]);
        assert_eq!(names(&outcome.registry), vec!["paru", "yay"]);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.total(), 3);
    }

    #[tokio::test]
    async fn failed_sync_databases_keep_aur_results() {
        let outcome = aggregator(FakeSync(None), healthy_aur(), &[])
            .collect(installed())
            .await
            .unwrap();
        assert!(outcome.local.is_empty());
        assert_eq!(names(&outcome.registry), vec!["paru", "yay"]);
        assert_eq!(outcome.failed, vec![SourceUnit::Repo]);
    }

    #[tokio::test]
    async fn unreachable_aur_keeps_repo_results() {
        let outcome = aggregator(healthy_sync(), FakeAur(None), &[])
            .collect(installed())
            .await
            .unwrap();
        assert_eq!(names(&outcome.local), vec!["linux", "mesa"]);
        assert!(outcome.registry.is_empty());
        assert_eq!(outcome.failed, vec![SourceUnit::Registry]);
    }

    #[tokio::test]
    async fn total_failure_is_fatal() {
        let err = aggregator(FakeSync(None), FakeAur(None), &[])
            .collect(installed())
            .await
            .unwrap_err();
        assert!(matches!(err, SynsyuError::SourcesExhausted(_)));
    }

    #[tokio::test]
    async fn nothing_newer_is_an_empty_success() {
        let outcome = aggregator(
            FakeSync(Some(vec![("core", "bash", "5.2-1")])),
            FakeAur(Some(HashMap::new())),
            &[],
        )
        .collect(installed())
        .await
        .unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn devel_and_aur_duplicates_collapse_to_one_entry() {
        let builder = builder(&[]);
        let logger = Arc::new(Logger::stderr_only());
        let aur = FakeAur(Some(HashMap::from([("neovim-git", "0.11-1")])));
        let correlator = RegistryCorrelator::new(Arc::new(aur), builder.clone(), 150, false);
        let tracker = DevelTracker::new(
            Arc::new(AlwaysStale(vec!["neovim-git"])),
            builder.clone(),
            logger.clone(),
        );
        let outcome = SourceAggregator::new(builder, logger, 1)
            .with_registry(correlator)
            .with_devel(tracker)
            .collect(installed())
            .await
            .unwrap();

        assert_eq!(names(&outcome.registry), vec!["neovim-git"]);
        assert!(outcome.local.is_empty());
    }

    #[tokio::test]
    async fn devel_skips_packages_now_installed_from_a_repo() {
        let builder = builder(&[]);
        let logger = Arc::new(Logger::stderr_only());
        let tracker = DevelTracker::new(
            Arc::new(AlwaysStale(vec!["neovim-git"])),
            builder.clone(),
            logger.clone(),
        );
        let installed = Arc::new(vec![InstalledPackage::new("neovim-git", "0.10-1")]);
        let outcome = SourceAggregator::new(builder, logger, 4)
            .with_sync(Arc::new(FakeSync(Some(vec![("chaotic", "neovim-git", "0.11-1")]))))
            .with_devel(tracker)
            .collect(installed)
            .await
            .unwrap();

        assert_eq!(names(&outcome.local), vec!["neovim-git"]);
        assert!(outcome.registry.is_empty());
    }

    #[tokio::test]
    async fn disabled_units_finish_empty() {
        let outcome = SourceAggregator::new(builder(&[]), Arc::new(Logger::stderr_only()), 4)
            .collect(installed())
            .await
            .unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.failed.is_empty());
    }
}
