use thiserror::Error;

use super::types::ChangedFile;

/// A file's patch could not be turned into hunks.
/// Only that file is affected; the rest of the PR still renders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse diff for {filename}: {message}")]
pub struct DiffParseError {
    pub filename: String,
    pub message: String,
}

/// Why a block of unified diff text was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Invalid hunk header: {0:?}")]
    InvalidHunkHeader(String),

    #[error("Unterminated hunk header: {0:?}")]
    UnterminatedHunkHeader(String),

    #[error("Missing {0} range")]
    MissingRange(&'static str),

    #[error("Invalid range {field} in {part}")]
    InvalidRange { field: &'static str, part: String },

    #[error("Hunk range out of bounds in {0}")]
    RangeOutOfBounds(String),

    #[error("Unexpected line in hunk {header}: {line:?}")]
    UnexpectedHunkLine { header: String, line: String },

    #[error("Hunk {0} has more lines than its header declares")]
    HunkTooLong(String),

    #[error("Hunk {header} ended early: expected {old} more old and {new} more new lines")]
    HunkEndedEarly { header: String, old: usize, new: usize },

    #[error("Hunk found before any file header")]
    HunkBeforeFileHeader,

    #[error("Found +++ without a preceding --- line")]
    NewPathWithoutOldPath,

    #[error("Unexpected line outside of a hunk: {0:?}")]
    StrayLine(String),

    #[error("Unrecognized diff header line: {0:?}")]
    UnrecognizedHeader(String),

    #[error("Missing {0} path in diff header")]
    MissingGitPath(&'static str),
}

/// What the diff does to the file as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Add,
    Delete,
    Modify,
    Rename,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Insert,
    Delete,
}

/// One line of a hunk, without its `+`/`-`/` ` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
    /// Line number in the old file (None for insertions)
    pub old_line: Option<usize>,
    /// Line number in the new file (None for deletions)
    pub new_line: Option<usize>,
}

/// A contiguous region of changes within a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// The `@@ ... @@` line, including any section heading
    pub header: String,
    /// Starting line number in the old file
    pub old_start: usize,
    /// Number of lines in the old file
    pub old_count: usize,
    /// Starting line number in the new file
    pub new_start: usize,
    /// Number of lines in the new file
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// Structured form of a single file's unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDiff {
    pub kind: DiffKind,
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<Hunk>,
}

impl ParsedDiff {
    pub fn additions(&self) -> usize {
        self.count(LineKind::Insert)
    }

    pub fn deletions(&self) -> usize {
        self.count(LineKind::Delete)
    }

    fn count(&self, kind: LineKind) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.kind == kind)
            .count()
    }
}

/// Parse the patch of one changed file.
///
/// Returns `Ok(None)` when there is nothing to render (binary file, pure
/// rename, mode change). GitHub's files endpoint sends bare hunks, so a
/// `diff --git` / `---` / `+++` header naming the file is prepended when the
/// patch has none.
pub fn parse_file(file: &ChangedFile) -> Result<Option<ParsedDiff>, DiffParseError> {
    let patch = file.patch.as_str();
    if patch.trim().is_empty() {
        return Ok(None);
    }

    let error = |message: String| DiffParseError {
        filename: file.filename.clone(),
        message,
    };

    let synthesized = !has_file_header(patch);
    let diff_text = if synthesized {
        format!(
            "diff --git a/{name} b/{name}\n--- a/{name}\n+++ b/{name}\n{patch}",
            name = file.filename
        )
    } else {
        patch.to_string()
    };

    let mut diff = parse_diff(&diff_text)
        .map_err(|err| error(err.to_string()))?
        .into_iter()
        .next()
        .ok_or_else(|| error("No diffs parsed".to_string()))?;

    if diff.hunks.is_empty() {
        return Err(error("Invalid diff structure - missing hunks".to_string()));
    }

    if synthesized {
        diff.kind = infer_kind(&diff.hunks);
    }
    Ok(Some(diff))
}

/// True when file markers appear before the first hunk.
fn has_file_header(patch: &str) -> bool {
    patch
        .lines()
        .take_while(|line| !line.starts_with("@@"))
        .any(|line| line.starts_with("diff --git ") || line.starts_with("--- ") || line.starts_with("+++ "))
}

/// Bare hunks carry no file markers; a file that only gains lines was added,
/// one that only loses lines was deleted.
fn infer_kind(hunks: &[Hunk]) -> DiffKind {
    if hunks.iter().all(|h| h.old_start == 0 && h.old_count == 0) {
        DiffKind::Add
    } else if hunks.iter().all(|h| h.new_start == 0 && h.new_count == 0) {
        DiffKind::Delete
    } else {
        DiffKind::Modify
    }
}

/// Hunk being filled, with the number of old/new lines still expected.
struct OpenHunk {
    hunk: Hunk,
    old_remaining: usize,
    new_remaining: usize,
    old_line: usize,
    new_line: usize,
}

impl OpenHunk {
    fn is_complete(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    fn push(&mut self, line: &str) -> Result<(), PatchError> {
        let (kind, content) = match line.chars().next() {
            None => (LineKind::Context, ""),
            Some(' ') => (LineKind::Context, &line[1..]),
            Some('+') => (LineKind::Insert, &line[1..]),
            Some('-') => (LineKind::Delete, &line[1..]),
            Some(_) => {
                return Err(PatchError::UnexpectedHunkLine {
                    header: self.hunk.header.clone(),
                    line: line.to_string(),
                })
            }
        };

        let (uses_old, uses_new) = match kind {
            LineKind::Context => (true, true),
            LineKind::Insert => (false, true),
            LineKind::Delete => (true, false),
        };
        if (uses_old && self.old_remaining == 0) || (uses_new && self.new_remaining == 0) {
            return Err(PatchError::HunkTooLong(self.hunk.header.clone()));
        }

        let old_line = uses_old.then(|| {
            self.old_remaining -= 1;
            self.old_line += 1;
            self.old_line - 1
        });
        let new_line = uses_new.then(|| {
            self.new_remaining -= 1;
            self.new_line += 1;
            self.new_line - 1
        });

        self.hunk.lines.push(DiffLine {
            kind,
            content: content.to_string(),
            old_line,
            new_line,
        });
        Ok(())
    }
}

/// Parse unified diff text into one ParsedDiff per file section.
///
/// Each file section starts with `diff --git a/{path} b/{path}` or with a bare
/// `--- {path}` / `+++ {path}` pair. New files have `--- /dev/null`, deleted
/// files `+++ /dev/null`. Hunks start with
/// `@@ -{old_start},{old_count} +{new_start},{new_count} @@` and hold exactly
/// the number of lines their header declares.
pub fn parse_diff(raw_diff: &str) -> Result<Vec<ParsedDiff>, PatchError> {
    let mut files: Vec<ParsedDiff> = Vec::new();
    let mut current_file: Option<ParsedDiff> = None;
    let mut current_hunk: Option<OpenHunk> = None;

    let finish_hunk = |file: &mut Option<ParsedDiff>, hunk: &mut Option<OpenHunk>| -> Result<(), PatchError> {
        if let Some(open) = hunk.take() {
            if !open.is_complete() {
                return Err(PatchError::HunkEndedEarly {
                    header: open.hunk.header,
                    old: open.old_remaining,
                    new: open.new_remaining,
                });
            }
            if let Some(file) = file.as_mut() {
                file.hunks.push(open.hunk);
            }
        }
        Ok(())
    };

    for line in raw_diff.lines() {
        if let Some(open) = current_hunk.as_mut() {
            if !open.is_complete() {
                if !line.starts_with('\\') {
                    open.push(line)?;
                }
                continue;
            }
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_hunk(&mut current_file, &mut current_hunk)?;
            files.extend(current_file.take());
            let (old_path, new_path) = parse_git_paths(rest)?;
            current_file = Some(ParsedDiff {
                kind: DiffKind::Modify,
                old_path,
                new_path,
                hunks: Vec::new(),
            });
            continue;
        }

        if line.starts_with("@@") {
            finish_hunk(&mut current_file, &mut current_hunk)?;
            if current_file.is_none() {
                return Err(PatchError::HunkBeforeFileHeader);
            }
            let (old_start, old_count, new_start, new_count) = parse_hunk_header(line)?;
            current_hunk = Some(OpenHunk {
                hunk: Hunk {
                    header: line.to_string(),
                    old_start,
                    old_count,
                    new_start,
                    new_count,
                    lines: Vec::new(),
                },
                old_remaining: old_count,
                new_remaining: new_count,
                old_line: old_start,
                new_line: new_start,
            });
            continue;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            finish_hunk(&mut current_file, &mut current_hunk)?;
            // A `---` after hunks, or without `diff --git`, opens a new section.
            let starts_section = current_file.as_ref().map_or(true, |f| !f.hunks.is_empty());
            if starts_section {
                files.extend(current_file.take());
                current_file = Some(ParsedDiff {
                    kind: DiffKind::Modify,
                    old_path: String::new(),
                    new_path: String::new(),
                    hunks: Vec::new(),
                });
            }
            if let Some(file) = current_file.as_mut() {
                let path = path.trim();
                if path == "/dev/null" {
                    file.kind = DiffKind::Add;
                } else {
                    file.old_path = strip_side_prefix(path, "a/");
                }
            }
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            let file = current_file
                .as_mut()
                .ok_or(PatchError::NewPathWithoutOldPath)?;
            let path = path.trim();
            if path == "/dev/null" {
                file.kind = DiffKind::Delete;
            } else {
                file.new_path = strip_side_prefix(path, "b/");
            }
            continue;
        }

        if line.starts_with('\\') || line.trim().is_empty() {
            continue;
        }

        match current_file.as_mut() {
            Some(file) if file.hunks.is_empty() && current_hunk.is_none() => {
                apply_extended_header(file, line)?;
            }
            _ => return Err(PatchError::StrayLine(line.to_string())),
        }
    }

    finish_hunk(&mut current_file, &mut current_hunk)?;
    files.extend(current_file.take());
    Ok(files)
}

/// Git's extended header lines between `diff --git` and the first hunk.
fn apply_extended_header(file: &mut ParsedDiff, line: &str) -> Result<(), PatchError> {
    if line.starts_with("new file mode") {
        file.kind = DiffKind::Add;
    } else if line.starts_with("deleted file mode") {
        file.kind = DiffKind::Delete;
    } else if let Some(from) = line.strip_prefix("rename from ") {
        file.kind = DiffKind::Rename;
        file.old_path = from.trim().to_string();
    } else if let Some(to) = line.strip_prefix("rename to ") {
        file.kind = DiffKind::Rename;
        file.new_path = to.trim().to_string();
    } else if !EXTENDED_HEADERS.iter().any(|prefix| line.starts_with(prefix)) {
        return Err(PatchError::UnrecognizedHeader(line.to_string()));
    }
    Ok(())
}

const EXTENDED_HEADERS: &[&str] = &[
    "index ",
    "old mode ",
    "new mode ",
    "similarity index ",
    "dissimilarity index ",
    "copy from ",
    "copy to ",
    "Binary files ",
];

fn parse_git_paths(rest: &str) -> Result<(String, String), PatchError> {
    let mut parts = rest.split_whitespace();
    let a_path = parts.next().ok_or(PatchError::MissingGitPath("a/"))?;
    let b_path = parts.next().ok_or(PatchError::MissingGitPath("b/"))?;
    Ok((strip_side_prefix(a_path, "a/"), strip_side_prefix(b_path, "b/")))
}

fn strip_side_prefix(path: &str, prefix: &str) -> String {
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

fn parse_hunk_header(line: &str) -> Result<(usize, usize, usize, usize), PatchError> {
    let header = line
        .strip_prefix("@@ ")
        .ok_or_else(|| PatchError::InvalidHunkHeader(line.to_string()))?;
    let (ranges, _section) = header
        .split_once(" @@")
        .ok_or_else(|| PatchError::UnterminatedHunkHeader(line.to_string()))?;
    let mut parts = ranges.split_whitespace();
    let old_part = parts.next().ok_or(PatchError::MissingRange("old"))?;
    let new_part = parts.next().ok_or(PatchError::MissingRange("new"))?;

    let (old_start, old_count) = parse_range(old_part, '-')?;
    let (new_start, new_count) = parse_range(new_part, '+')?;

    Ok((old_start, old_count, new_start, new_count))
}

/// `-start,count` or `+start,count`; a missing count means 1.
/// Line numbers are counted up from `start`, so `start + count` must fit.
fn parse_range(part: &str, prefix: char) -> Result<(usize, usize), PatchError> {
    let invalid = |field: &'static str| PatchError::InvalidRange {
        field,
        part: part.to_string(),
    };
    let range = part.strip_prefix(prefix).ok_or_else(|| invalid("prefix"))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    let start = start_str.parse::<usize>().map_err(|_| invalid("start"))?;
    let count = count_str.parse::<usize>().map_err(|_| invalid("count"))?;
    if start.checked_add(count).is_none() {
        return Err(PatchError::RangeOutOfBounds(part.to_string()));
    }
    Ok((start, count))
}
