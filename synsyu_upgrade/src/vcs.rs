/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::vcs
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Revision-state store for development (VCS) packages. Reads
    the recorded upstream commit per package and checks it
    against `git ls-remote`.

  Security / Safety Notes:
    Runs `git ls-remote` with terminal prompts disabled and a
    bounded timeout. Only removals are written back.

  Dependencies:
    serde_json for the store file, tokio::process for git.

  Operational Scope:
    Production RevisionStore consumed by the devel tracker.

  Revision History:
    2026-10-18 COD  Authored JSON revision store.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Unknown upstream state never forces an upgrade
    - Missing store file means nothing is tracked
============================================================*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::{Result, SynsyuError};
use crate::logger::Logger;
use crate::providers::{RevisionStore, TrackedRevision};

const LS_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// One upstream source of a development package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsSource {
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    pub sha: String,
}

fn default_branch() -> String {
    "HEAD".to_string()
}

/// Package name → repository URL → recorded source state.
type VcsEntries = BTreeMap<String, BTreeMap<String, VcsSource>>;

/// JSON-file backed revision store.
pub struct VcsStore {
    path: PathBuf,
    entries: Mutex<VcsEntries>,
    logger: Arc<Logger>,
}

impl VcsStore {
    /// Open the store at `path`; an absent file yields an empty store.
    pub fn open(path: &Path, logger: Arc<Logger>) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => VcsEntries::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
                SynsyuError::Serialization(format!("Failed to parse {}: {err}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => VcsEntries::new(),
            Err(err) => {
                return Err(SynsyuError::Filesystem(format!(
                    "Failed to read {}: {err}",
                    path.display()
                )))
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
            logger,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VcsEntries>> {
        self.entries
            .lock()
            .map_err(|_| SynsyuError::Runtime("VCS store lock poisoned".into()))
    }

    fn sources_of(&self, name: &str) -> Vec<(String, VcsSource)> {
        match self.lock() {
            Ok(entries) => entries
                .get(name)
                .map(|sources| {
                    sources
                        .iter()
                        .map(|(url, source)| (url.clone(), source.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn persist(&self, entries: &VcsEntries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                SynsyuError::Filesystem(format!(
                    "Failed to create VCS store directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let payload = serde_json::to_string_pretty(entries).map_err(|err| {
            SynsyuError::Serialization(format!("Failed to encode VCS store: {err}"))
        })?;
        std::fs::write(&self.path, payload).map_err(|err| {
            SynsyuError::Filesystem(format!(
                "Failed to write VCS store {}: {err}",
                self.path.display()
            ))
        })
    }

    async fn remote_head(&self, url: &str, source: &VcsSource) -> Option<String> {
        let protocol = source
            .protocols
            .first()
            .map(String::as_str)
            .unwrap_or("https");
        let remote = format!("{protocol}://{url}");
        let command = Command::new("git")
            .arg("ls-remote")
            .arg(&remote)
            .arg(&source.branch)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output();

        let output = match timeout(LS_REMOTE_TIMEOUT, command).await {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(output)) => {
                self.logger.debug(
                    "VCS",
                    format!("git ls-remote {remote} exited with {:?}", output.status.code()),
                );
                return None;
            }
            Ok(Err(err)) => {
                self.logger.debug("VCS", format!("git ls-remote {remote} failed: {err}"));
                return None;
            }
            Err(_) => {
                self.logger
                    .warn("VCS", format!("git ls-remote {remote} timed out"));
                return None;
            }
        };
        first_commit(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl RevisionStore for VcsStore {
    async fn tracked(&self) -> Result<Vec<TrackedRevision>> {
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .filter_map(|(name, sources)| {
                sources.values().next().map(|source| TrackedRevision {
                    name: name.clone(),
                    last_revision: source.sha.clone(),
                })
            })
            .collect())
    }

    async fn needs_update(&self, entry: &TrackedRevision) -> bool {
        for (url, source) in self.sources_of(&entry.name) {
            if let Some(head) = self.remote_head(&url, &source).await {
                if head != source.sha {
                    return true;
                }
            }
        }
        false
    }

    async fn forget(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut entries = self.lock()?;
        let before = entries.len();
        for name in names {
            entries.remove(name);
        }
        if entries.len() != before {
            self.persist(&entries)?;
            self.logger.info(
                "VCS",
                format!("Stopped tracking {}", names.join(", ")),
            );
        }
        Ok(())
    }
}

/// First commit hash from `git ls-remote` output.
fn first_commit(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .find(|sha| !sha.is_empty())
        .map(str::to_string)
}
