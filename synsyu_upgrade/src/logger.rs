/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Provide structured, append-only logging for the upgrade
    resolver. Shared across source tasks behind an Arc.

  Security / Safety Notes:
    Entries contain package names and versions only. The log
    file is sealed with a SHA-256 digest on completion.

  Dependencies:
    std::sync::Mutex, chrono for stamps, sha2 for digests.

  Operational Scope:
    Used by every source unit, the selection prompt, and the
    entry point to emit RFC-3339 UTC stamped entries.

  Revision History:
    2024-11-04 COD  Established logging module for Syn-Syu-Core.
    2026-10-18 COD  Made the logger shareable across source tasks.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynsyuError};

/// Structured log level for Syn-Syu-Upgrade events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }

    fn always_echoed(self) -> bool {
        matches!(self, LogLevel::Warn | LogLevel::Error)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared logger that emits append-only entries in Synavera format.
///
/// Safe to share between tasks: the file writer sits behind a mutex and
/// stderr echoes are line-atomic.
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    verbose: bool,
}

impl Logger {
    /// Build a logger that writes to stderr and optionally to a file.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = match path.as_deref() {
            Some(file_path) => Some(Mutex::new(BufWriter::new(open_log_file(file_path)?))),
            None => None,
        };

        Ok(Self {
            file,
            path,
            verbose,
        })
    }

    /// Logger without a backing file that only echoes warnings and errors.
    pub fn stderr_only() -> Self {
        Self {
            file: None,
            path: None,
            verbose: false,
        }
    }

    /// Emit a log entry with the given level, code, and message.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let payload = format!("{timestamp} [{level}] [{code}] {}", message.as_ref());

        if self.verbose || level.always_echoed() {
            eprintln!("{payload}");
        }

        let Some(file) = &self.file else {
            return;
        };
        if let Ok(mut guard) = file.lock() {
            if writeln!(guard, "{payload}").is_err() {
                eprintln!("{timestamp} [{}] [LOGGER] Failed to write to log file", LogLevel::Error);
            }
            if guard.flush().is_err() {
                eprintln!("{timestamp} [{}] [LOGGER] Failed to flush log writer", LogLevel::Warn);
            }
        }
    }

    /// Convenience wrapper for `INFO` level events.
    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    /// Convenience wrapper for `WARN` level events.
    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    /// Convenience wrapper for `ERROR` level events.
    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    /// Convenience wrapper for `DEBUG` level events.
    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Return the path backing this logger, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Compute and persist SHA-256 digest of the log file.
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        let data = std::fs::read(path).map_err(|err| {
            SynsyuError::Filesystem(format!(
                "Failed to read log for hashing {}: {err}",
                path.display()
            ))
        })?;
        let digest = Sha256::digest(&data);
        let hash_path = digest_path(path);
        let mut file = File::create(&hash_path).map_err(|err| {
            SynsyuError::Filesystem(format!(
                "Failed to create hash file {}: {err}",
                hash_path.display()
            ))
        })?;
        writeln!(
            file,
            "{:x}  {}",
            digest,
            path.file_name().unwrap_or_default().to_string_lossy()
        )
        .map_err(|err| {
            SynsyuError::Filesystem(format!(
                "Failed to write hash file {}: {err}",
                hash_path.display()
            ))
        })?;
        Ok(())
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynsyuError::Filesystem(format!(
                "Failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            SynsyuError::Filesystem(format!(
                "Failed to open log file {}: {err}",
                path.display()
            ))
        })
}

fn digest_path(path: &Path) -> PathBuf {
    let mut hash_os = path.as_os_str().to_os_string();
    hash_os.push(".hash");
    PathBuf::from(hash_os)
}
