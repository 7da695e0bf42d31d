/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::devel
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Propose development packages whose upstream revision moved
    past the recorded one, and retire tracking entries for
    packages that are no longer installed.

  Security / Safety Notes:
    Upstream checks run through the injected RevisionStore.

  Dependencies:
    tokio JoinSet for concurrent freshness checks.

  Operational Scope:
    Runs inside the registry unit when devel checking is on.

  Revision History:
    2026-10-18 COD  Authored development package tracker.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Independent of AUR availability
    - Removal is a side channel, never an upgrade
============================================================*/

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::aggregate::CandidateSink;
use crate::candidate::CandidateBuilder;
use crate::error::{Result, SynsyuError};
use crate::logger::Logger;
use crate::package::{InstalledPackage, SourceKind, UpgradeCandidate};
use crate::providers::{RevisionStore, TrackedRevision};

/// Origin label shown for development candidates.
pub const DEVEL_ORIGIN: &str = "devel";
/// Candidate version marking "latest upstream revision".
pub const DEVEL_SENTINEL: &str = "git";

const SHORT_REVISION: usize = 6;

pub struct DevelTracker {
    store: Arc<dyn RevisionStore>,
    builder: CandidateBuilder,
    logger: Arc<Logger>,
}

impl DevelTracker {
    pub fn new(store: Arc<dyn RevisionStore>, builder: CandidateBuilder, logger: Arc<Logger>) -> Self {
        Self {
            store,
            builder,
            logger,
        }
    }

    /// Emit candidates for stale tracked packages that are installed as
    /// foreign packages. Tracked names missing from the foreign set are
    /// forgotten. Returns the number of candidates produced.
    pub async fn run(&self, installed: &[InstalledPackage], sink: &CandidateSink) -> Result<usize> {
        let stale = self.stale_entries().await?;
        let by_name: HashMap<&str, &InstalledPackage> = installed
            .iter()
            .filter(|pkg| pkg.foreign)
            .map(|pkg| (pkg.name.as_str(), pkg))
            .collect();

        let mut produced = 0;
        let mut vanished = Vec::new();
        for entry in stale {
            let Some(package) = by_name.get(entry.name.as_str()) else {
                vanished.push(entry.name);
                continue;
            };
            if self
                .builder
                .held_back(&package.name, &package.version, DEVEL_SENTINEL)
            {
                continue;
            }
            let candidate = UpgradeCandidate::new(
                &package.name,
                SourceKind::Devel,
                short_revision(&entry.last_revision),
                DEVEL_SENTINEL,
                DEVEL_ORIGIN,
            );
            produced += 1;
            if !sink.emit(candidate).await {
                break;
            }
        }

        if !vanished.is_empty() {
            self.logger.info(
                "DEVEL",
                format!("Tracked packages no longer installed as foreign: {}", vanished.join(", ")),
            );
            self.store.forget(&vanished).await?;
        }
        Ok(produced)
    }

    /// Tracked entries whose upstream moved, in store order.
    async fn stale_entries(&self) -> Result<Vec<TrackedRevision>> {
        let tracked = self.store.tracked().await?;
        let mut checks = JoinSet::new();
        for (idx, entry) in tracked.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            checks.spawn(async move {
                let stale = store.needs_update(&entry).await;
                (idx, entry, stale)
            });
        }

        let mut stale = Vec::new();
        while let Some(joined) = checks.join_next().await {
            let (idx, entry, is_stale) = joined
                .map_err(|err| SynsyuError::Runtime(format!("Revision check failed: {err}")))?;
            if is_stale {
                stale.push((idx, entry));
            }
        }
        stale.sort_by_key(|(idx, _)| *idx);
        Ok(stale.into_iter().map(|(_, entry)| entry).collect())
    }
}

fn short_revision(revision: &str) -> String {
    revision.chars().take(SHORT_REVISION).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::aggregate::SourceEvent;
    use crate::candidate::testing::{NameSet, NumericComparator};

    struct FakeStore {
        entries: Vec<TrackedRevision>,
        stale: Vec<&'static str>,
        forgotten: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RevisionStore for FakeStore {
        async fn tracked(&self) -> Result<Vec<TrackedRevision>> {
            Ok(self.entries.clone())
        }

        async fn needs_update(&self, entry: &TrackedRevision) -> bool {
            self.stale.contains(&entry.name.as_str())
        }

        async fn forget(&self, names: &[String]) -> Result<()> {
            self.forgotten.lock().unwrap().extend_from_slice(names);
            Ok(())
        }
    }

    fn tracked(name: &str, sha: &str) -> TrackedRevision {
        TrackedRevision {
            name: name.to_string(),
            last_revision: sha.to_string(),
        }
    }

    #[tokio::test]
    async fn stale_installed_packages_become_candidates() {
        let store = Arc::new(FakeStore {
            entries: vec![
                tracked("neovim-git", "a1b2c3d4e5f6"),
                tracked("fresh-git", "ffffffffffff"),
                tracked("gone-git", "0123456789ab"),
                tracked("pinned-git", "abcdefabcdef"),
                tracked("tiny-git", "abc"),
            ],
            stale: vec!["neovim-git", "gone-git", "pinned-git", "tiny-git"],
            forgotten: Mutex::new(Vec::new()),
        });
        let logger = Arc::new(Logger::stderr_only());
        let builder = CandidateBuilder::new(
            Arc::new(NumericComparator),
            Arc::new(NameSet::of(&["pinned-git"])),
            logger.clone(),
        );
        let tracker = DevelTracker::new(store.clone(), builder, logger);

        let installed = vec![
            InstalledPackage::new("fresh-git", "r10.ffff-1").foreign(),
            InstalledPackage::new("neovim-git", "r100.a1b2-1").foreign(),
            InstalledPackage::new("pinned-git", "r5.abcd-1").foreign(),
            InstalledPackage::new("tiny-git", "r1.abc-1").foreign(),
        ];

        let (tx, mut rx) = mpsc::channel(8);
        let produced = tracker.run(&installed, &CandidateSink::new(tx)).await.unwrap();
        assert_eq!(produced, 2);

        let mut candidates = Vec::new();
        while let Ok(SourceEvent::Candidate(candidate)) = rx.try_recv() {
            candidates.push(candidate);
        }
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name(), "neovim-git");
        assert_eq!(candidates[0].installed_version(), "a1b2c3");
        assert_eq!(candidates[0].candidate_version(), DEVEL_SENTINEL);
        assert_eq!(candidates[0].origin(), DEVEL_ORIGIN);
        assert_eq!(candidates[1].installed_version(), "abc");

        assert_eq!(*store.forgotten.lock().unwrap(), vec!["gone-git".to_string()]);
    }

    #[tokio::test]
    async fn tracked_package_installed_from_a_repo_is_forgotten() {
        let store = Arc::new(FakeStore {
            entries: vec![
                tracked("neovim-git", "abcdefabcdef"),
                tracked("paru-git", "123456123456"),
            ],
            stale: vec!["neovim-git", "paru-git"],
            forgotten: Mutex::new(Vec::new()),
        });
        let logger = Arc::new(Logger::stderr_only());
        let builder = CandidateBuilder::new(
            Arc::new(NumericComparator),
            Arc::new(NameSet::default()),
            logger.clone(),
        );
        let tracker = DevelTracker::new(store.clone(), builder, logger);

        let installed = vec![
            InstalledPackage::new("neovim-git", "0.10-1"),
            InstalledPackage::new("paru-git", "r9.1234-1").foreign(),
        ];

        let (tx, mut rx) = mpsc::channel(8);
        let produced = tracker.run(&installed, &CandidateSink::new(tx)).await.unwrap();
        assert_eq!(produced, 1);

        let mut names = Vec::new();
        while let Ok(SourceEvent::Candidate(candidate)) = rx.try_recv() {
            names.push(candidate.name().to_string());
        }
        assert_eq!(names, vec!["paru-git".to_string()]);
        assert_eq!(*store.forgotten.lock().unwrap(), vec!["neovim-git".to_string()]);
    }

    #[tokio::test]
    async fn ignored_warning_names_the_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("devel.log");
        let logger = Arc::new(Logger::new(Some(log_path.clone()), false).unwrap());
        let store = Arc::new(FakeStore {
            entries: vec![tracked("pinned-git", "abcdefabcdef")],
            stale: vec!["pinned-git"],
            forgotten: Mutex::new(Vec::new()),
        });
        let builder = CandidateBuilder::new(
            Arc::new(NumericComparator),
            Arc::new(NameSet::of(&["pinned-git"])),
            logger.clone(),
        );
        let tracker = DevelTracker::new(store, builder, logger);

        let installed = vec![InstalledPackage::new("pinned-git", "r5.abcd-1").foreign()];
        let (tx, _rx) = mpsc::channel(8);
        let produced = tracker.run(&installed, &CandidateSink::new(tx)).await.unwrap();
        assert_eq!(produced, 0);

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("pinned-git ignoring package upgrade (r5.abcd-1 => git)"));
        assert!(!log.contains("abcdef =>"));
    }
}
