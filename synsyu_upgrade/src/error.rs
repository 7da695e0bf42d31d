/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Syu-Upgrade error types so every source,
    provider, and the selection prompt share one taxonomy and
    one exit-code table.

  Security / Safety Notes:
    Error contexts carry package names, commands, and paths
    only; request bodies and credentials are never embedded.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2024-11-04 COD  Established shared error definitions.
    2026-10-18 COD  Added source exhaustion and input errors.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - Partial failures degrade, only total failures abort
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Syu-Upgrade operations.
pub type Result<T> = std::result::Result<T, SynsyuError>;

/// Enumerates high-level error domains surfaced by Syn-Syu-Upgrade.
#[derive(Debug, Error)]
pub enum SynsyuError {
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error("Operator input: {0}")]
    Input(String),
    #[error("No upgrade source produced a result: {0}")]
    SourcesExhausted(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynsyuError {
    /// Map error category to a deterministic exit code.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            SynsyuError::CommandMissing { .. } => ExitCode::from(10),
            SynsyuError::CommandFailure { .. } => ExitCode::from(11),
            SynsyuError::Config(_) => ExitCode::from(20),
            SynsyuError::Network(_) => ExitCode::from(30),
            SynsyuError::Serialization(_) => ExitCode::from(31),
            SynsyuError::Filesystem(_) => ExitCode::from(40),
            SynsyuError::Io(_) => ExitCode::from(41),
            SynsyuError::Runtime(_) => ExitCode::from(50),
            SynsyuError::SourcesExhausted(_) => ExitCode::from(60),
            SynsyuError::Input(_) => ExitCode::from(61),
        }
    }
}
