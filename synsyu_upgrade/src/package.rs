/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::package
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Shared structures describing installed packages, what the
    sync databases and the AUR report for them, and the upgrade
    candidates derived from both.

  Security / Safety Notes:
    Pure data containers; no I/O performed in this module.

  Dependencies:
    None beyond std.

  Operational Scope:
    Passed between providers, source units, the selection
    parser, and the renderer.

  Revision History:
    2024-11-04 COD  Introduced shared VersionInfo type.
    2026-10-18 COD  Replaced manifest types with upgrade candidates.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between modules
    - Immutable candidates once constructed
============================================================*/

use std::collections::HashMap;
use std::fmt;

/// A package currently installed on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    /// Build date as unix seconds, when pacman reported one we could parse.
    pub build_date: Option<i64>,
    /// No configured sync database provides this package.
    pub foreign: bool,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            build_date: None,
            foreign: false,
        }
    }

    pub fn foreign(mut self) -> Self {
        self.foreign = true;
        self
    }

    pub fn built_at(mut self, unix_seconds: i64) -> Self {
        self.build_date = Some(unix_seconds);
        self
    }
}

/// Latest version a sync database offers for a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    pub repository: String,
    pub version: String,
}

/// Name-indexed view over every configured sync database.
///
/// When several repositories carry the same name, the first one inserted
/// wins, matching pacman's repository priority.
#[derive(Debug, Clone, Default)]
pub struct SyncIndex {
    entries: HashMap<String, SyncEntry>,
}

impl SyncIndex {
    pub fn insert(&mut self, name: impl Into<String>, entry: SyncEntry) {
        self.entries.entry(name.into()).or_insert(entry);
    }

    pub fn latest(&self, name: &str) -> Option<&SyncEntry> {
        self.entries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One AUR info result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub version: String,
    /// Unix seconds of the last package base modification.
    pub last_modified: i64,
}

/// Where an upgrade candidate originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A configured sync repository.
    Repo,
    /// The AUR.
    Aur,
    /// A development package tracked by upstream revision.
    Devel,
}

impl SourceKind {
    /// Repo candidates fill the local list, everything else the registry list.
    pub fn is_registry(self) -> bool {
        !matches!(self, SourceKind::Repo)
    }
}

/// A package proposed for upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCandidate {
    name: String,
    source: SourceKind,
    installed_version: String,
    candidate_version: String,
    origin: String,
}

impl UpgradeCandidate {
    pub fn new(
        name: impl Into<String>,
        source: SourceKind,
        installed_version: impl Into<String>,
        candidate_version: impl Into<String>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            installed_version: installed_version.into(),
            candidate_version: candidate_version.into(),
            origin: origin.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn installed_version(&self) -> &str {
        &self.installed_version
    }

    pub fn candidate_version(&self) -> &str {
        &self.candidate_version
    }

    /// Repository name, `aur`, or `devel`.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl fmt::Display for UpgradeCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({} => {})",
            self.origin, self.name, self.installed_version, self.candidate_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_index_keeps_first_repository() {
        let mut index = SyncIndex::default();
        index.insert(
            "firefox",
            SyncEntry {
                repository: "testing".into(),
                version: "131.0-1".into(),
            },
        );
        index.insert(
            "firefox",
            SyncEntry {
                repository: "extra".into(),
                version: "130.0-1".into(),
            },
        );
        assert_eq!(index.latest("firefox").unwrap().version, "131.0-1");
        assert_eq!(index.latest("firefox").unwrap().repository, "testing");
        assert!(index.latest("chromium").is_none());
    }

    #[test]
    fn candidate_display_reads_like_a_transition() {
        let candidate = UpgradeCandidate::new("yay", SourceKind::Aur, "12.3.0-1", "12.4.0-1", "aur");
        assert_eq!(candidate.to_string(), "aur/yay (12.3.0-1 => 12.4.0-1)");
        assert!(candidate.source().is_registry());
        assert!(!SourceKind::Repo.is_registry());
    }
}
