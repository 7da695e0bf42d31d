/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::correlate
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Check foreign packages against the AUR in bounded batches
    and correlate each batch's ordered results back onto the
    local packages.

  Security / Safety Notes:
    Network access goes through the injected RegistryClient.

  Dependencies:
    tokio JoinSet for per-batch tasks.

  Operational Scope:
    Spawned by the registry unit of the source aggregator.

  Revision History:
    2026-10-18 COD  Authored batched AUR correlation.
  ------------------------------------------------------------
  SSE Principles Observed:
    - A failed batch loses only its own candidates
    - Single forward pass, no quadratic lookups
============================================================*/

use std::ops::Range;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::aggregate::{CandidateSink, SubUnitReport};
use crate::candidate::CandidateBuilder;
use crate::package::{InstalledPackage, RegistryEntry, SourceKind, UpgradeCandidate};
use crate::providers::RegistryClient;

/// Origin label shown for AUR candidates.
pub const AUR_ORIGIN: &str = "aur";

/// Contiguous batches of at most `split` items, carved from the end.
pub fn batch_bounds(len: usize, split: usize) -> Vec<Range<usize>> {
    let split = split.max(1);
    let mut bounds = Vec::new();
    let mut end = len;
    while end != 0 {
        let start = end.saturating_sub(split);
        bounds.push(start..end);
        end = start;
    }
    bounds
}

/// Pair local packages with registry results.
///
/// `results` must follow the order of `local` and may omit any names. For
/// local index `i` the expected result sits at `i - missing`; a mismatch
/// means the local package is unknown to the registry.
pub fn match_batch(local: &[InstalledPackage], results: &[RegistryEntry]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut missing = 0;
    for (idx, package) in local.iter().enumerate() {
        let cursor = idx - missing;
        let Some(remote) = results.get(cursor) else {
            break;
        };
        if remote.name == package.name {
            pairs.push((idx, cursor));
        } else {
            missing += 1;
        }
    }
    pairs
}

/// Batched AUR lookups for foreign packages.
#[derive(Clone)]
pub struct RegistryCorrelator {
    client: Arc<dyn RegistryClient>,
    builder: CandidateBuilder,
    request_split_n: usize,
    time_update: bool,
}

impl RegistryCorrelator {
    pub fn new(
        client: Arc<dyn RegistryClient>,
        builder: CandidateBuilder,
        request_split_n: usize,
        time_update: bool,
    ) -> Self {
        Self {
            client,
            builder,
            request_split_n,
            time_update,
        }
    }

    /// Spawn one task per batch of `foreign`. Each task emits its
    /// candidates into `sink` and reports how many it produced.
    pub fn spawn_batches(
        &self,
        foreign: &Arc<Vec<InstalledPackage>>,
        tasks: &mut JoinSet<SubUnitReport>,
        sink: &CandidateSink,
    ) -> usize {
        let bounds = batch_bounds(foreign.len(), self.request_split_n);
        let count = bounds.len();
        for range in bounds {
            let correlator = self.clone();
            let foreign = Arc::clone(foreign);
            let sink = sink.clone();
            tasks.spawn(async move {
                let label = format!("aur batch {}..{}", range.start, range.end);
                let outcome = correlator.run_batch(&foreign[range], &sink).await;
                SubUnitReport { label, outcome }
            });
        }
        count
    }

    async fn run_batch(
        &self,
        batch: &[InstalledPackage],
        sink: &CandidateSink,
    ) -> crate::error::Result<usize> {
        let names: Vec<String> = batch.iter().map(|pkg| pkg.name.clone()).collect();
        let results = self.client.info(&names).await?;
        let candidates = self.evaluate(batch, &results).await;
        let produced = candidates.len();
        for candidate in candidates {
            if !sink.emit(candidate).await {
                break;
            }
        }
        Ok(produced)
    }

    /// Candidates for one batch and its registry results.
    pub async fn evaluate(
        &self,
        batch: &[InstalledPackage],
        results: &[RegistryEntry],
    ) -> Vec<UpgradeCandidate> {
        let mut candidates = Vec::new();
        for (local_idx, remote_idx) in match_batch(batch, results) {
            let local = &batch[local_idx];
            let remote = &results[remote_idx];

            let touched_since_build = self.time_update
                && local
                    .build_date
                    .is_some_and(|built| remote.last_modified > built);
            let newer = touched_since_build
                || self
                    .builder
                    .is_newer(&local.name, &local.version, &remote.version)
                    .await;
            if !newer {
                continue;
            }
            if let Some(candidate) = self.builder.admit(
                &remote.name,
                SourceKind::Aur,
                &local.version,
                &remote.version,
                AUR_ORIGIN,
            ) {
                candidates.push(candidate);
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::aggregate::SourceEvent;
    use crate::candidate::testing::{NameSet, NumericComparator};
    use crate::error::{Result, SynsyuError};
    use crate::logger::Logger;

    fn local(names: &[&str]) -> Vec<InstalledPackage> {
        names
            .iter()
            .map(|name| InstalledPackage::new(*name, "1.0-1").foreign())
            .collect()
    }

    fn remote(name: &str, version: &str) -> RegistryEntry {
        RegistryEntry {
            name: name.to_string(),
            version: version.to_string(),
            last_modified: 0,
        }
    }

    fn builder(ignored: &[&str]) -> CandidateBuilder {
        CandidateBuilder::new(
            Arc::new(NumericComparator),
            Arc::new(NameSet::of(ignored)),
            Arc::new(Logger::stderr_only()),
        )
    }

    /// Serves fixed versions; fails any batch containing `poison`.
    struct FakeAur {
        versions: Vec<RegistryEntry>,
        poison: Option<String>,
    }

    #[async_trait]
    impl RegistryClient for FakeAur {
        async fn info(&self, names: &[String]) -> Result<Vec<RegistryEntry>> {
            if let Some(poison) = &self.poison {
                if names.contains(poison) {
                    return Err(SynsyuError::Network(format!("{poison} broke the batch")));
                }
            }
            Ok(names
                .iter()
                .filter_map(|name| self.versions.iter().find(|entry| &entry.name == name))
                .cloned()
                .collect())
        }
    }

    #[test]
    fn batches_are_carved_from_the_end() {
        assert_eq!(batch_bounds(7, 3), vec![4..7, 1..4, 0..1]);
        assert_eq!(batch_bounds(6, 3), vec![3..6, 0..3]);
        assert_eq!(batch_bounds(2, 150), vec![0..2]);
        assert!(batch_bounds(0, 3).is_empty());
        assert_eq!(batch_bounds(2, 0), vec![1..2, 0..1]);
    }

    #[test]
    fn every_missing_subset_is_skipped_exactly() {
        let names = ["a", "b", "c", "d", "e", "f"];
        let packages = local(&names);
        for mask in 0u32..(1 << names.len()) {
            let present: Vec<RegistryEntry> = names
                .iter()
                .enumerate()
                .filter(|(idx, _)| mask & (1 << idx) == 0)
                .map(|(_, name)| remote(name, "2.0-1"))
                .collect();
            let pairs = match_batch(&packages, &present);

            let matched: Vec<&str> = pairs
                .iter()
                .map(|(local_idx, remote_idx)| {
                    assert_eq!(packages[*local_idx].name, present[*remote_idx].name);
                    packages[*local_idx].name.as_str()
                })
                .collect();
            let expected: Vec<&str> = present.iter().map(|entry| entry.name.as_str()).collect();
            assert_eq!(matched, expected, "mask {mask:06b}");
        }
    }

    #[tokio::test]
    async fn only_strictly_newer_matches_become_candidates() {
        let packages = local(&["alpha", "beta", "gamma", "delta"]);
        let results = vec![
            remote("alpha", "1.0-1"),
            remote("gamma", "1.1-1"),
            remote("delta", "0.9-1"),
        ];
        let correlator = RegistryCorrelator::new(
            Arc::new(FakeAur {
                versions: Vec::new(),
                poison: None,
            }),
            builder(&[]),
            10,
            false,
        );
        let candidates = correlator.evaluate(&packages, &results).await;
        let names: Vec<&str> = candidates.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["gamma"]);
        assert_eq!(candidates[0].origin(), AUR_ORIGIN);
        assert_eq!(candidates[0].source(), SourceKind::Aur);
    }

    #[tokio::test]
    async fn time_update_promotes_recently_modified_packages() {
        let packages = vec![
            InstalledPackage::new("stale", "1.0-1").foreign().built_at(100),
            InstalledPackage::new("fresh", "1.0-1").foreign().built_at(500),
            InstalledPackage::new("unknown", "1.0-1").foreign(),
        ];
        let results = vec![
            RegistryEntry {
                name: "stale".into(),
                version: "1.0-1".into(),
                last_modified: 200,
            },
            RegistryEntry {
                name: "fresh".into(),
                version: "1.0-1".into(),
                last_modified: 200,
            },
            RegistryEntry {
                name: "unknown".into(),
                version: "1.0-1".into(),
                last_modified: 900,
            },
        ];
        let fake = Arc::new(FakeAur {
            versions: Vec::new(),
            poison: None,
        });

        let with_time = RegistryCorrelator::new(fake.clone(), builder(&[]), 10, true);
        let names: Vec<String> = with_time
            .evaluate(&packages, &results)
            .await
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["stale"]);

        let without_time = RegistryCorrelator::new(fake, builder(&[]), 10, false);
        assert!(without_time.evaluate(&packages, &results).await.is_empty());
    }

    #[tokio::test]
    async fn failed_batch_loses_only_its_own_candidates() {
        let names = ["a", "b", "c", "d", "e"];
        let foreign = Arc::new(local(&names));
        let fake = FakeAur {
            versions: names.iter().map(|name| remote(name, "2.0-1")).collect(),
            poison: Some("e".to_string()),
        };
        let correlator = RegistryCorrelator::new(Arc::new(fake), builder(&["b"]), 2, false);

        let (tx, mut rx) = mpsc::channel(4);
        let sink = CandidateSink::new(tx);
        let mut tasks = JoinSet::new();
        assert_eq!(correlator.spawn_batches(&foreign, &mut tasks, &sink), 3);
        drop(sink);

        let collector = tokio::spawn(async move {
            let mut seen = HashSet::new();
            while let Some(event) = rx.recv().await {
                if let SourceEvent::Candidate(candidate) = event {
                    seen.insert(candidate.name().to_string());
                }
            }
            seen
        });

        let mut failures = 0;
        while let Some(joined) = tasks.join_next().await {
            if joined.unwrap().outcome.is_err() {
                failures += 1;
            }
        }
        let seen = collector.await.unwrap();

        assert_eq!(failures, 1);
        let expected: HashSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(seen, expected);
    }
}
