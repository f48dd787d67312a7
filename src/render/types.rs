use serde::Deserialize;

use crate::pr::diff::{DiffLine, DiffParseError, ParsedDiff};
use crate::pr::{AggregatedPR, ChangedFile, ReviewComment};
use crate::tree::FileTreeNode;

/// Diff layout. Only affects rendering; parsing is identical for both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// One column, old and new lines interleaved
    #[default]
    Unified,
    /// Old file on the left, new file on the right
    Split,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewMode::Unified => write!(f, "unified"),
            ViewMode::Split => write!(f, "split"),
        }
    }
}

/// Rendering state of one file's diff.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffState {
    /// Binary file or metadata-only change
    NoDiff,
    Parsed(ParsedDiff),
    /// Patch could not be parsed; only this file is degraded
    Failed(DiffParseError),
}

/// A changed file together with its parsed diff and review comments.
#[derive(Debug)]
pub struct FileView<'a> {
    pub file: &'a ChangedFile,
    pub diff: DiffState,
    /// Comments whose path matches this file, in the order GitHub returned them
    pub comments: Vec<&'a ReviewComment>,
}

/// Everything needed to print one PR.
#[derive(Debug)]
pub struct ReviewView<'a> {
    pub pr: &'a AggregatedPR,
    pub tree: Vec<FileTreeNode>,
    pub files: Vec<FileView<'a>>,
}

/// One row of the side-by-side layout. Context lines fill both sides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRow<'a> {
    pub left: Option<&'a DiffLine>,
    pub right: Option<&'a DiffLine>,
}
