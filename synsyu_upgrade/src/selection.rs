/*============================================================
  Synavera Project: Syn-Syu
  Module: synsyu_upgrade::selection
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Parse the operator's exclusion line and map the displayed
    numbers back onto the two candidate lists.

  Security / Safety Notes:
    Pure functions over untrusted input; malformed words are
    dropped and ranges are clamped before expansion.

  Dependencies:
    None beyond std.

  Operational Scope:
    Used by the upgrade flow after the lists were sorted and
    rendered.

  Revision History:
    2026-10-18 COD  Authored selection mini-language.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Index arithmetic lives in one tested function
    - Garbage input is ignored, never fatal
============================================================*/

use std::collections::BTreeSet;

/// One word of operator input: `N`, `N-M`, `^N` or `^N-M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionToken {
    pub negated: bool,
    pub low: usize,
    pub high: usize,
}

impl SelectionToken {
    /// Parse a single word; anything that is not a number or a range of
    /// two numbers yields `None`. Reversed ranges are normalized.
    pub fn parse(word: &str) -> Option<Self> {
        let (negated, body) = match word.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, word),
        };

        let (low, high) = match body.split_once('-') {
            Some((start, end)) => (parse_number(start)?, parse_number(end)?),
            None => {
                let single = parse_number(body)?;
                (single, single)
            }
        };

        Some(Self {
            negated,
            low: low.min(high),
            high: low.max(high),
        })
    }
}

fn parse_number(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Position inside one of the two displayed lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListIndex {
    Registry(usize),
    Local(usize),
}

/// Map a displayed number onto its list.
///
/// Numbers `1..=registry_len` cover the registry list bottom-up, the rest
/// cover the local list bottom-up. Out-of-range numbers map to nothing.
pub fn display_to_internal(display: usize, registry_len: usize, local_len: usize) -> Option<ListIndex> {
    let total = registry_len + local_len;
    if display == 0 || display > total {
        return None;
    }
    if display <= registry_len {
        Some(ListIndex::Registry(registry_len - display))
    } else {
        Some(ListIndex::Local(total - display))
    }
}

/// Indices removed from each list's upgrade batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    pub registry: BTreeSet<usize>,
    pub local: BTreeSet<usize>,
}

impl ExclusionSet {
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty() && self.local.is_empty()
    }

    fn insert(&mut self, index: ListIndex) {
        match index {
            ListIndex::Registry(idx) => self.registry.insert(idx),
            ListIndex::Local(idx) => self.local.insert(idx),
        };
    }

    fn subtract(&mut self, other: &ExclusionSet) {
        self.registry.retain(|idx| !other.registry.contains(idx));
        self.local.retain(|idx| !other.local.contains(idx));
    }
}

/// Turn an input line into the final exclusion sets.
///
/// Plain tokens exclude, `^` tokens protect. When the line holds only
/// protect tokens, everything starts out excluded so that the protected
/// entries are the only ones left to upgrade.
pub fn parse_exclusions(line: &str, registry_len: usize, local_len: usize) -> ExclusionSet {
    let total = registry_len + local_len;
    let mut excluded = ExclusionSet::default();
    let mut protected = ExclusionSet::default();

    for token in line.split_whitespace().filter_map(SelectionToken::parse) {
        let low = token.low.max(1);
        let high = token.high.min(total);
        for display in low..=high {
            let Some(index) = display_to_internal(display, registry_len, local_len) else {
                continue;
            };
            if token.negated {
                protected.insert(index);
            } else {
                excluded.insert(index);
            }
        }
    }

    if excluded.is_empty() && !protected.is_empty() {
        excluded.registry = (0..registry_len).collect();
        excluded.local = (0..local_len).collect();
    }
    excluded.subtract(&protected);
    excluded
}

/// Items whose index is not in `excluded`, in list order.
pub fn retain_targets<'a, T>(items: &'a [T], excluded: &BTreeSet<usize>) -> Vec<&'a T> {
    items
        .iter()
        .enumerate()
        .filter(|(idx, _)| !excluded.contains(idx))
        .map(|(_, item)| item)
        .collect()
}
