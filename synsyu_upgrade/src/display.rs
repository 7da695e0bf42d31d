/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::display
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Order candidate lists for display and render them with the
    combined numbering the selection prompt refers to.

  Security / Safety Notes:
    Writes to stdout only.

  Dependencies:
    colored for terminal styling.

  Operational Scope:
    Called by the upgrade flow before prompting.

  Revision History:
    2026-10-18 COD  Authored candidate rendering.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Malformed versions render a marker, never abort
    - Sorting is total and stable
============================================================*/

use std::cmp::Ordering;

use colored::{Color, ColoredString, Colorize};

use crate::package::{SourceKind, UpgradeCandidate};

const INVALID_VERSION: &str = "Invalid Version";
const ARROW_COLUMN: usize = 50;

/// Descending origin order: lowercase first, exact characters as the
/// tie-break, longer origin first when one is a prefix of the other.
pub fn compare_origin(a: &str, b: &str) -> Ordering {
    for (left, right) in a.chars().zip(b.chars()) {
        let folded = right.to_lowercase().cmp(left.to_lowercase());
        if folded != Ordering::Equal {
            return folded;
        }
        if left != right {
            return right.cmp(&left);
        }
    }
    b.chars().count().cmp(&a.chars().count())
}

/// Stable sort grouping candidates by origin.
pub fn sort_candidates(list: &mut [UpgradeCandidate]) {
    list.sort_by(|a, b| compare_origin(a.origin(), b.origin()));
}

/// A pacman version split into its display parts.
#[derive(Debug, PartialEq, Eq)]
struct DisplayVersion<'a> {
    epoch: Option<&'a str>,
    version: &'a str,
    pkgrel: &'a str,
}

impl<'a> DisplayVersion<'a> {
    /// `[epoch:]pkgver-pkgrel`, or `None` when malformed.
    fn parse(raw: &'a str) -> Option<Self> {
        let (rest, pkgrel) = raw.rsplit_once('-')?;
        if pkgrel.is_empty() || !pkgrel.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return None;
        }
        let (epoch, version) = match rest.split_once(':') {
            Some((epoch, version)) => {
                if epoch.is_empty() || !epoch.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                (Some(epoch), version)
            }
            None => (None, rest),
        };
        if version.is_empty()
            || version
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ':' | '-' | '/'))
        {
            return None;
        }
        Some(Self {
            epoch,
            version,
            pkgrel,
        })
    }

    fn base(&self) -> String {
        match self.epoch {
            Some(epoch) => format!("{epoch}:{}", self.version),
            None => self.version.to_string(),
        }
    }
}

/// Plain and styled text for the `old -> new` columns.
fn version_columns(candidate: &UpgradeCandidate) -> ((String, String), (String, String)) {
    let installed = candidate.installed_version();
    let available = candidate.candidate_version();
    if candidate.source() == SourceKind::Devel {
        return (
            (installed.to_string(), installed.red().to_string()),
            (available.to_string(), available.bold().green().to_string()),
        );
    }

    match (DisplayVersion::parse(installed), DisplayVersion::parse(available)) {
        (Some(old), Some(new)) if old.base() == new.base() => (
            (
                installed.to_string(),
                format!("{}-{}", old.base(), old.pkgrel.red()),
            ),
            (
                available.to_string(),
                format!("{}-{}", new.base(), new.pkgrel.green()),
            ),
        ),
        (Some(old), Some(new)) => (
            (
                installed.to_string(),
                format!("{}-{}", old.base().red(), old.pkgrel),
            ),
            (
                available.to_string(),
                format!("{}-{}", new.base().bold().green(), new.pkgrel),
            ),
        ),
        (old, new) => (plain_or_invalid(installed, old.is_some()), plain_or_invalid(available, new.is_some())),
    }
}

fn plain_or_invalid(raw: &str, valid: bool) -> (String, String) {
    if valid {
        (raw.to_string(), raw.to_string())
    } else {
        (INVALID_VERSION.to_string(), INVALID_VERSION.red().to_string())
    }
}

fn origin_color(origin: &str) -> Color {
    let hash = origin
        .bytes()
        .fold(5381_u64, |hash, byte| {
            u64::from(byte).wrapping_add(hash.wrapping_shl(5).wrapping_add(hash))
        });
    match hash % 6 {
        0 => Color::Red,
        1 => Color::Green,
        2 => Color::Yellow,
        3 => Color::Blue,
        4 => Color::Magenta,
        _ => Color::Cyan,
    }
}

fn styled_origin(origin: &str) -> ColoredString {
    origin.color(origin_color(origin)).bold()
}

/// Render `list` numbered so element `k` shows `len + start - k - 1`.
pub fn render_list(list: &[UpgradeCandidate], start: usize) -> Vec<String> {
    list.iter()
        .enumerate()
        .map(|(idx, candidate)| {
            let number = list.len() + start - idx - 1;
            let ((left_plain, left), (_, right)) = version_columns(candidate);
            let prefix_width = 3 + candidate.origin().chars().count() + 1 + candidate.name().chars().count();
            let pad = ARROW_COLUMN
                .saturating_sub(prefix_width + left_plain.chars().count())
                .max(1);
            format!(
                "{} {}/{}{}{} -> {}",
                format!("{number:>2}").yellow(),
                styled_origin(candidate.origin()),
                candidate.name().bold(),
                " ".repeat(pad),
                left,
                right
            )
        })
        .collect()
}

/// Print both lists: local first numbered after the registry list, then
/// the registry list numbered from 1.
pub fn print_lists(local: &[UpgradeCandidate], registry: &[UpgradeCandidate]) {
    println!(
        "{} {} {}",
        "::".bold().blue(),
        local.len() + registry.len(),
        "Packages to upgrade.".bold()
    );
    for line in render_list(local, registry.len() + 1)
        .into_iter()
        .chain(render_list(registry, 1))
    {
        println!("{line}");
    }
}
