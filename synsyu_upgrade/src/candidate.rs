/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::candidate
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Turn an (installed, available) version pair into at most
    one upgrade candidate, honouring the ignore list.

  Security / Safety Notes:
    Pure decision logic; the comparator may spawn vercmp.

  Dependencies:
    Provider traits only.

  Operational Scope:
    Shared by the repo unit, the AUR correlator, and the devel
    tracker.

  Revision History:
    2026-10-18 COD  Authored candidate builder.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Ignored upgrades are reported, never silently dropped
    - Comparator failures degrade to "no upgrade"
============================================================*/

use std::cmp::Ordering;
use std::sync::Arc;

use crate::logger::Logger;
use crate::package::{SourceKind, UpgradeCandidate};
use crate::providers::{IgnorePredicate, VersionComparator};

/// Builds candidates against a shared comparator and ignore list.
#[derive(Clone)]
pub struct CandidateBuilder {
    comparator: Arc<dyn VersionComparator>,
    ignore: Arc<dyn IgnorePredicate>,
    logger: Arc<Logger>,
}

impl CandidateBuilder {
    pub fn new(
        comparator: Arc<dyn VersionComparator>,
        ignore: Arc<dyn IgnorePredicate>,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            comparator,
            ignore,
            logger,
        }
    }

    /// Whether `available` is strictly newer than `installed`.
    ///
    /// A version the comparator cannot handle counts as not newer.
    pub async fn is_newer(&self, name: &str, installed: &str, available: &str) -> bool {
        match self.comparator.compare(installed, available).await {
            Ok(ordering) => ordering == Ordering::Less,
            Err(err) => {
                self.logger.debug(
                    "VERCMP",
                    format!("{name}: cannot compare {installed} with {available}: {err}"),
                );
                false
            }
        }
    }

    /// Candidate for a version pair when `available` is newer and `name` is
    /// not ignored.
    pub async fn build(
        &self,
        name: &str,
        source: SourceKind,
        installed: &str,
        available: &str,
        origin: &str,
    ) -> Option<UpgradeCandidate> {
        if !self.is_newer(name, installed, available).await {
            return None;
        }
        self.admit(name, source, installed, available, origin)
    }

    /// Final ignore check for an upgrade already judged worthwhile.
    pub fn admit(
        &self,
        name: &str,
        source: SourceKind,
        installed: &str,
        available: &str,
        origin: &str,
    ) -> Option<UpgradeCandidate> {
        if self.held_back(name, installed, available) {
            return None;
        }
        Some(UpgradeCandidate::new(
            name, source, installed, available, origin,
        ))
    }

    /// `true` when `name` is ignored; logs the skipped transition.
    pub fn held_back(&self, name: &str, installed: &str, available: &str) -> bool {
        if !self.ignore.is_ignored(name) {
            return false;
        }
        self.logger.warn(
            "IGNORED",
            format!("{name} ignoring package upgrade ({installed} => {available})"),
        );
        true
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory providers shared by the source unit tests.

    use std::cmp::Ordering;
    use std::collections::HashSet;

    use async_trait::async_trait;

    use crate::error::{Result, SynsyuError};
    use crate::providers::{IgnorePredicate, VersionComparator};

    /// Compares dotted numeric versions; anything else is malformed.
    pub struct NumericComparator;

    fn parse(version: &str) -> Result<Vec<u64>> {
        version
            .split(['.', '-'])
            .map(|part| {
                part.parse::<u64>()
                    .map_err(|_| SynsyuError::Serialization(format!("malformed version {version}")))
            })
            .collect()
    }

    #[async_trait]
    impl VersionComparator for NumericComparator {
        async fn compare(&self, local: &str, remote: &str) -> Result<Ordering> {
            Ok(parse(local)?.cmp(&parse(remote)?))
        }
    }

    /// Ignores an exact set of names.
    #[derive(Default)]
    pub struct NameSet(pub HashSet<String>);

    impl NameSet {
        pub fn of(names: &[&str]) -> Self {
            Self(names.iter().map(|name| name.to_string()).collect())
        }
    }

    impl IgnorePredicate for NameSet {
        fn is_ignored(&self, name: &str) -> bool {
            self.0.contains(name)
        }
    }
}
