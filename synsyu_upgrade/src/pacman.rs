/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::pacman
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Interface with pacman utilities to enumerate installed
    packages, index the sync databases, and compare versions.

  Security / Safety Notes:
    Executes pacman/vercmp binaries with user privileges only;
    no privilege escalation is attempted and no database is
    modified.

  Dependencies:
    tokio::process for async command execution, chrono for
    build-date parsing.

  Operational Scope:
    Production implementations of the snapshot, sync-database
    and comparator capabilities.

  Revision History:
    2024-11-04 COD  Crafted pacman integration layer.
    2026-10-18 COD  Split into snapshot, sync index, and vercmp
                    providers; added foreign detection.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Structured parsing with clear failure modes
    - Reusable helpers for external command diagnostics
============================================================*/

use std::cmp::Ordering;
use std::collections::HashSet;
use std::io;
use std::process::{Output, Stdio};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use tokio::process::Command;

use crate::error::{Result, SynsyuError};
use crate::package::{InstalledPackage, SyncEntry, SyncIndex};
use crate::providers::{PackageSnapshot, SyncDatabase, VersionComparator};

/// Installed packages as reported by the local pacman database.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacmanSnapshot;

#[async_trait]
impl PackageSnapshot for PacmanSnapshot {
    async fn installed(&self) -> Result<Vec<InstalledPackage>> {
        let info = run_pacman(&["-Qi"], false).await?;
        let foreign_names = run_pacman(&["-Qqm"], true).await?;
        let foreign: HashSet<&str> = foreign_names.lines().map(str::trim).collect();
        Ok(parse_query_info(&info, &foreign))
    }
}

/// Sync databases as listed by `pacman -Sl`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacmanSyncDb;

#[async_trait]
impl SyncDatabase for PacmanSyncDb {
    async fn index(&self) -> Result<SyncIndex> {
        let listing = run_pacman(&["-Sl"], false).await?;
        Ok(parse_sync_list(&listing))
    }
}

/// Comparator backed by the `vercmp` binary shipped with pacman.
#[derive(Debug, Default, Clone, Copy)]
pub struct Vercmp;

#[async_trait]
impl VersionComparator for Vercmp {
    async fn compare(&self, local: &str, remote: &str) -> Result<Ordering> {
        if local == remote {
            return Ok(Ordering::Equal);
        }
        let output = Command::new("vercmp")
            .arg(local)
            .arg(remote)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| map_spawn_error(err, "vercmp"))?;

        if !output.status.success() {
            return Err(command_failure(format!("vercmp {local} {remote}"), &output));
        }

        let stdout = String::from_utf8(output.stdout).map_err(|err| {
            SynsyuError::Serialization(format!("vercmp emitted invalid UTF-8: {err}"))
        })?;
        let verdict = stdout.trim();
        let ordering = i32::from_str(verdict).map_err(|err| {
            SynsyuError::Serialization(format!("Failed to parse vercmp output `{verdict}`: {err}"))
        })?;

        Ok(ordering.cmp(&0))
    }
}

/// Run pacman under the C locale. With `empty_on_one`, exit status 1 with
/// no output means "no matches" rather than a failure.
async fn run_pacman(args: &[&str], empty_on_one: bool) -> Result<String> {
    let output = Command::new("pacman")
        .args(args)
        .env("LC_ALL", "C")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|err| map_spawn_error(err, "pacman"))?;

    if !output.status.success() {
        if empty_on_one && output.status.code() == Some(1) && output.stdout.is_empty() {
            return Ok(String::new());
        }
        return Err(command_failure(format!("pacman {}", args.join(" ")), &output));
    }

    String::from_utf8(output.stdout).map_err(|err| {
        SynsyuError::Serialization(format!(
            "pacman {} emitted invalid UTF-8: {err}",
            args.join(" ")
        ))
    })
}

fn parse_query_info(stdout: &str, foreign: &HashSet<&str>) -> Vec<InstalledPackage> {
    let mut packages = Vec::new();
    for block in stdout.split("\n\n") {
        let mut name: Option<String> = None;
        let mut version: Option<String> = None;
        let mut build_date: Option<i64> = None;

        for line in block.lines() {
            if let Some((raw_key, raw_value)) = line.split_once(':') {
                let value = raw_value.trim();
                match raw_key.trim() {
                    "Name" => name = Some(value.to_string()),
                    "Version" => version = Some(value.to_string()),
                    "Build Date" => build_date = parse_build_date(value),
                    _ => {}
                }
            }
        }

        if let (Some(name), Some(version)) = (name, version) {
            let is_foreign = foreign.contains(name.as_str());
            packages.push(InstalledPackage {
                name,
                version,
                build_date,
                foreign: is_foreign,
            });
        }
    }

    packages.sort_by(|a, b| a.name.cmp(&b.name));
    packages
}

/// `pacman -Qi` under the C locale prints dates as `%c`, e.g.
/// `Tue Oct  1 10:00:00 2024`, in local time.
fn parse_build_date(value: &str) -> Option<i64> {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, "%a %b %d %H:%M:%S %Y").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|stamp| stamp.timestamp())
}

fn parse_sync_list(stdout: &str) -> SyncIndex {
    let mut index = SyncIndex::default();
    for line in stdout.lines() {
        let mut fields = line.split_whitespace();
        if let (Some(repository), Some(name), Some(version)) =
            (fields.next(), fields.next(), fields.next())
        {
            index.insert(
                name,
                SyncEntry {
                    repository: repository.to_string(),
                    version: version.to_string(),
                },
            );
        }
    }
    index
}

fn command_failure(command: String, output: &Output) -> SynsyuError {
    SynsyuError::CommandFailure {
        command,
        status: output.status.code().unwrap_or(-1),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn map_spawn_error(err: io::Error, command: &str) -> SynsyuError {
    if err.kind() == io::ErrorKind::NotFound {
        SynsyuError::CommandMissing {
            command: command.into(),
        }
    } else {
        SynsyuError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}
