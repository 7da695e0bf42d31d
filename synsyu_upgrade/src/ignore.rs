/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::ignore
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Build the ignore predicate from pacman.conf `IgnorePkg`
    entries and operator-configured patterns.

  Security / Safety Notes:
    Reads pacman.conf; never writes it.

  Dependencies:
    glob for shell-style pattern matching, as pacman uses.

  Operational Scope:
    Injected read-only into every source unit.

  Revision History:
    2026-10-18 COD  Authored ignore list.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Unreadable pacman.conf degrades to config-only patterns
============================================================*/

use std::path::Path;

use glob::Pattern;

use crate::logger::Logger;
use crate::providers::IgnorePredicate;

/// Set of ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    patterns: Vec<Pattern>,
}

impl IgnoreList {
    /// Compile `patterns`, dropping (and reporting) invalid ones.
    pub fn from_patterns<I, S>(patterns: I, logger: &Logger) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for raw in patterns {
            let raw = raw.as_ref();
            match Pattern::new(raw) {
                Ok(pattern) => compiled.push(pattern),
                Err(err) => logger.warn("IGNORE", format!("Skipping ignore pattern `{raw}`: {err}")),
            }
        }
        Self { patterns: compiled }
    }

    /// Combine `IgnorePkg` from `pacman_conf` with `extra` patterns.
    pub fn load(pacman_conf: &Path, extra: &[String], logger: &Logger) -> Self {
        let mut patterns = match std::fs::read_to_string(pacman_conf) {
            Ok(contents) => ignore_pkg_entries(&contents),
            Err(err) => {
                logger.warn(
                    "IGNORE",
                    format!("Could not read {}: {err}", pacman_conf.display()),
                );
                Vec::new()
            }
        };
        patterns.extend(extra.iter().cloned());
        Self::from_patterns(patterns, logger)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

impl IgnorePredicate for IgnoreList {
    fn is_ignored(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(name))
    }
}

/// `IgnorePkg` values from the `[options]` section.
fn ignore_pkg_entries(contents: &str) -> Vec<String> {
    let mut in_options = false;
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.split('#').next().unwrap_or_default().trim();
        if line.starts_with('[') && line.ends_with(']') {
            in_options = line == "[options]";
            continue;
        }
        if !in_options {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "IgnorePkg" {
                entries.extend(value.split_whitespace().map(str::to_string));
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACMAN_CONF: &str = "
[options]
HoldPkg     = pacman glibc
IgnorePkg   = linux nvidia-*   # pinned drivers
#IgnorePkg  = commented
IgnorePkg = firefox

[core]
IgnorePkg = not-an-option
Include = /etc/pacman.d/mirrorlist
";

    #[test]
    fn reads_only_options_section() {
        let entries = ignore_pkg_entries(PACMAN_CONF);
        assert_eq!(entries, vec!["linux", "nvidia-*", "firefox"]);
    }

    #[test]
    fn globs_match_like_pacman() {
        let logger = Logger::stderr_only();
        let list = IgnoreList::from_patterns(["linux", "nvidia-*"], &logger);
        assert!(list.is_ignored("linux"));
        assert!(list.is_ignored("nvidia-dkms"));
        assert!(!list.is_ignored("linux-headers"));
        assert!(!list.is_ignored("mesa"));
    }

    #[test]
    fn load_merges_config_patterns_and_survives_missing_file() {
        let logger = Logger::stderr_only();
        let dir = tempfile::tempdir().unwrap();
        let conf = dir.path().join("pacman.conf");
        std::fs::write(&conf, PACMAN_CONF).unwrap();

        let list = IgnoreList::load(&conf, &["yay*".to_string()], &logger);
        assert_eq!(list.len(), 4);
        assert!(list.is_ignored("yay-bin"));
        assert!(list.is_ignored("firefox"));

        let fallback = IgnoreList::load(&dir.path().join("absent.conf"), &["vim".to_string()], &logger);
        assert_eq!(fallback.len(), 1);
        assert!(fallback.is_ignored("vim"));
    }

    #[test]
    fn invalid_patterns_are_dropped() {
        let logger = Logger::stderr_only();
        let list = IgnoreList::from_patterns(["[unclosed", "ok"], &logger);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn load_counts_only_compiled_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("ignore.log");
        let logger = Logger::new(Some(log_path.clone()), false).unwrap();
        let conf = dir.path().join("pacman.conf");
        std::fs::write(&conf, PACMAN_CONF).unwrap();

        let list = IgnoreList::load(&conf, &["[unclosed".to_string()], &logger);
        assert_eq!(list.len(), 3);

        let log = std::fs::read_to_string(&log_path).unwrap();
        assert!(log.contains("Skipping ignore pattern `[unclosed`"));
        assert!(!log.contains("ignore patterns active"));
    }
}
