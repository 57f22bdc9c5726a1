//! Merging of per-VM exposition text into one scrape document.
//!
//! Each VM's helper script prints plain exposition text. To serve all VMs
//! from a single endpoint every sample line gets a `vm_id` label, samples
//! are grouped by metric family, and `HELP`/`TYPE` metadata is kept once per
//! family (first seen wins).
//!
//! Line handling is an explicit classification ([`classify_line`]) with a
//! fixed policy per class:
//!
//! | Class       | Policy                                   |
//! |-------------|------------------------------------------|
//! | `Blank`     | skipped                                  |
//! | `Header`    | kept once per metric name (first wins)   |
//! | `Comment`   | dropped                                  |
//! | `Sample`    | relabeled with `vm_id` and kept          |
//! | `Malformed` | dropped                                  |

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::types::VmId;

/// Label injected into every sample to identify the originating VM.
pub const VM_ID_LABEL: &str = "vm_id";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^# (HELP|TYPE) (\S+)").expect("valid regex"));

/// `name{labels} value`, labels greedy up to the last `}` followed by whitespace.
static LABELED_SAMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z_:][a-zA-Z0-9_:]*)\{(.*)\}\s+(.*)$").expect("valid regex")
});

/// `name value`
static BARE_SAMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z_:][a-zA-Z0-9_:]*)\s+(.*)$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Help,
    Type,
}

/// Classification of a single exposition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    /// `# HELP <name> ...` or `# TYPE <name> ...`.
    Header { kind: HeaderKind, name: &'a str },
    /// Any other `#` line.
    Comment,
    /// A sample; `labels` is the text between the braces, if present.
    Sample {
        name: &'a str,
        labels: Option<&'a str>,
        value: &'a str,
    },
    /// Not blank, not a comment, and not a well-formed sample.
    Malformed,
}

/// Classify one line of exposition text.
pub fn classify_line(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }

    if line.starts_with('#') {
        return match HEADER_RE.captures(line) {
            Some(caps) => {
                let kind = if &caps[1] == "HELP" {
                    HeaderKind::Help
                } else {
                    HeaderKind::Type
                };
                let name = caps.get(2).map_or("", |m| m.as_str());
                LineKind::Header { kind, name }
            }
            None => LineKind::Comment,
        };
    }

    let (name, labels, value) = if let Some(caps) = LABELED_SAMPLE_RE.captures(line) {
        (
            caps.get(1).map_or("", |m| m.as_str()),
            caps.get(2).map(|m| m.as_str()),
            caps.get(3).map_or("", |m| m.as_str()),
        )
    } else if let Some(caps) = BARE_SAMPLE_RE.captures(line) {
        (
            caps.get(1).map_or("", |m| m.as_str()),
            None,
            caps.get(2).map_or("", |m| m.as_str()),
        )
    } else {
        return LineKind::Malformed;
    };

    let value = value.trim_end();
    if value.is_empty() {
        return LineKind::Malformed;
    }

    LineKind::Sample {
        name,
        labels,
        value,
    }
}

/// Render a sample with `vm_id` appended to its label set.
pub fn relabel_sample(name: &str, labels: Option<&str>, value: &str, vm_id: VmId) -> String {
    let existing = labels.map(|l| {
        let l = l.trim_end();
        l.strip_suffix(',').unwrap_or(l)
    });

    match existing {
        Some(inner) if !inner.trim().is_empty() => {
            format!("{name}{{{inner},{VM_ID_LABEL}=\"{vm_id}\"}} {value}")
        }
        _ => format!("{name}{{{VM_ID_LABEL}=\"{vm_id}\"}} {value}"),
    }
}

#[derive(Debug, Default)]
struct FamilyHeaders {
    help: Option<String>,
    type_line: Option<String>,
}

/// Accumulates exposition text from many VMs and renders one document.
///
/// Feed targets with [`add_target`](Self::add_target) in the order their
/// samples should appear, then call [`render`](Self::render). Families are
/// emitted in ascending name order; within a family, samples keep encounter
/// order.
#[derive(Debug, Default)]
pub struct ExpositionMerger {
    headers: HashMap<String, FamilyHeaders>,
    families: BTreeMap<String, Vec<String>>,
    dropped_lines: usize,
}

impl ExpositionMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_target(&mut self, vm_id: VmId, text: &str) {
        for line in text.lines() {
            match classify_line(line) {
                LineKind::Blank | LineKind::Comment => {}
                LineKind::Header { kind, name } => {
                    let headers = self.headers.entry(name.to_string()).or_default();
                    let slot = match kind {
                        HeaderKind::Help => &mut headers.help,
                        HeaderKind::Type => &mut headers.type_line,
                    };
                    if slot.is_none() {
                        *slot = Some(line.to_string());
                    }
                }
                LineKind::Sample {
                    name,
                    labels,
                    value,
                } => {
                    let sample = relabel_sample(name, labels, value, vm_id);
                    self.families
                        .entry(name.to_string())
                        .or_default()
                        .push(sample);
                }
                LineKind::Malformed => {
                    self.dropped_lines += 1;
                }
            }
        }
    }

    /// Lines discarded as malformed so far.
    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines
    }

    /// Number of families that have at least one sample.
    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    /// Render the merged document.
    ///
    /// Each family is its `HELP` line, its `TYPE` line, then its samples,
    /// with an empty line between families. Families that only carried
    /// metadata are omitted.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (i, (name, samples)) in self.families.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if let Some(headers) = self.headers.get(name) {
                for line in [&headers.help, &headers.type_line].into_iter().flatten() {
                    out.push_str(line);
                    out.push('\n');
                }
            }
            for sample in samples {
                out.push_str(sample);
                out.push('\n');
            }
        }

        out
    }
}

/// Merge a cache snapshot into one exposition document.
///
/// Iteration order of the snapshot decides which VM's `HELP`/`TYPE` lines
/// win and the order of samples inside each family.
pub fn merge_snapshot<S: AsRef<str>>(snapshot: &BTreeMap<VmId, S>) -> String {
    let mut merger = ExpositionMerger::new();
    for (vm_id, text) in snapshot {
        merger.add_target(*vm_id, text.as_ref());
    }
    merger.render()
}
