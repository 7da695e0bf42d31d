/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::providers
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Declare the capabilities the upgrade resolver consumes:
    installed-package snapshot, sync databases, the AUR, the
    ignore list, development revision state, and vercmp.

  Security / Safety Notes:
    Traits only. Implementations decide which commands run or
    which hosts are contacted.

  Dependencies:
    async-trait for object-safe async methods.

  Operational Scope:
    Injected into the source units as Arc<dyn ...> so no unit
    reaches for global state.

  Revision History:
    2024-11-04 COD  Added future expansion scaffolding.
    2026-10-18 COD  Promoted the comparator placeholder into the
                    provider seams used by the resolver.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Capabilities passed explicitly, never consulted globally
    - Read-only sharing across concurrent units
============================================================*/

use std::cmp::Ordering;

use async_trait::async_trait;

use crate::error::Result;
use crate::package::{InstalledPackage, RegistryEntry, SyncIndex};

/// Enumerates installed packages.
#[async_trait]
pub trait PackageSnapshot: Send + Sync {
    /// Installed packages sorted by name.
    async fn installed(&self) -> Result<Vec<InstalledPackage>>;
}

/// Resolves what the configured sync repositories offer.
#[async_trait]
pub trait SyncDatabase: Send + Sync {
    async fn index(&self) -> Result<SyncIndex>;
}

/// Bounded-size info lookups against the AUR.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Info for `names`. Entries come back in query order and names the
    /// registry does not know are simply absent.
    async fn info(&self, names: &[String]) -> Result<Vec<RegistryEntry>>;
}

/// Three-way version ordering.
#[async_trait]
pub trait VersionComparator: Send + Sync {
    /// Order `local` against `remote`; `Less` means `remote` is newer.
    async fn compare(&self, local: &str, remote: &str) -> Result<Ordering>;
}

/// Whether upgrades to a package are suppressed.
pub trait IgnorePredicate: Send + Sync {
    fn is_ignored(&self, name: &str) -> bool;
}

/// Last revision recorded for a tracked development package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedRevision {
    pub name: String,
    pub last_revision: String,
}

/// External revision-state store for development packages.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    async fn tracked(&self) -> Result<Vec<TrackedRevision>>;

    /// Whether upstream moved past the recorded revision.
    async fn needs_update(&self, entry: &TrackedRevision) -> bool;

    /// Stop tracking packages that are no longer installed.
    async fn forget(&self, names: &[String]) -> Result<()>;
}
