pub mod types;

pub use types::{DiffState, FileView, ReviewView, SplitRow, ViewMode};

use crate::pr::diff::{self, DiffLine, Hunk, LineKind};
use crate::pr::{AggregatedPR, FileStatus, ReviewComment};
use crate::tree::{self, FileTreeNode};
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Width of one side of the split layout, in characters.
const SPLIT_COLUMN_WIDTH: usize = 60;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write output file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Build the review view of an aggregated PR.
///
/// Each file's patch is parsed on its own: a patch that fails to parse marks
/// only that file as Failed. Review comments are attached to the file whose
/// name equals their path.
pub fn build(pr: &AggregatedPR) -> ReviewView<'_> {
    let tree = tree::build_tree(&pr.files);

    let files = pr
        .files
        .iter()
        .map(|file| {
            let diff = match diff::parse_file(file) {
                Ok(Some(parsed)) => DiffState::Parsed(parsed),
                Ok(None) => DiffState::NoDiff,
                Err(err) => {
                    warn!(file = %err.filename, error = %err.message, "could not parse diff");
                    DiffState::Failed(err)
                }
            };
            let comments: Vec<&ReviewComment> = pr.review_comments_for(&file.filename).collect();
            FileView {
                file,
                diff,
                comments,
            }
        })
        .collect();

    ReviewView { pr, tree, files }
}

/// Pair the lines of a hunk for side-by-side display.
///
/// Context lines appear on both sides. A run of deletions followed by a run
/// of insertions is laid out row by row, the shorter side padded with blanks.
pub fn split_rows(hunk: &Hunk) -> Vec<SplitRow<'_>> {
    let mut rows = Vec::new();
    let mut deletes: Vec<&DiffLine> = Vec::new();
    let mut inserts: Vec<&DiffLine> = Vec::new();

    for line in &hunk.lines {
        match line.kind {
            LineKind::Delete => {
                if !inserts.is_empty() {
                    flush_changes(&mut rows, &mut deletes, &mut inserts);
                }
                deletes.push(line);
            }
            LineKind::Insert => inserts.push(line),
            LineKind::Context => {
                flush_changes(&mut rows, &mut deletes, &mut inserts);
                rows.push(SplitRow {
                    left: Some(line),
                    right: Some(line),
                });
            }
        }
    }
    flush_changes(&mut rows, &mut deletes, &mut inserts);
    rows
}

fn flush_changes<'a>(rows: &mut Vec<SplitRow<'a>>, deletes: &mut Vec<&'a DiffLine>, inserts: &mut Vec<&'a DiffLine>) {
    let len = deletes.len().max(inserts.len());
    for i in 0..len {
        rows.push(SplitRow {
            left: deletes.get(i).copied(),
            right: inserts.get(i).copied(),
        });
    }
    deletes.clear();
    inserts.clear();
}

/// Output the review to terminal (default) or to a markdown file.
#[instrument(skip(view), fields(pr = view.pr.pr.number, files = view.files.len()))]
pub fn output(view: &ReviewView<'_>, mode: ViewMode, output_path: Option<&Path>) -> Result<(), RenderError> {
    match output_path {
        None => {
            debug!("writing review to terminal");
            print_terminal_review(view, mode);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing review to file");
            std::fs::write(path, render_markdown(view, mode))?;
            Ok(())
        }
    }
}

/// Format and print the review to the terminal with colors.
///
/// PR #42: "Add OAuth2 login flow"
/// alice | open | feature -> main | Files changed: 7 | +320 -45
///
/// ═══ Files ═══
/// src/
///   lib.rs [M] +3 -1
///
/// ═══ src/lib.rs (Modified) +3 -1 ═══
/// ...
fn print_terminal_review(view: &ReviewView<'_>, mode: ViewMode) {
    let summary = &view.pr.pr;
    println!();
    println!("PR #{}: \"{}\"", summary.number, summary.title.bold());
    println!(
        "{} | {} | {} -> {} | Files changed: {} | {} {}",
        summary.author,
        summary.state,
        summary.head_branch,
        summary.base_branch,
        summary.changed_files,
        format!("+{}", summary.additions).green(),
        format!("-{}", summary.deletions).red(),
    );
    println!("{}", summary.html_url.dimmed());
    println!();
    println!("{}", summary.description);
    println!();

    println!("═══ Files ═══");
    for line in tree_lines(&view.tree) {
        println!("{}", line);
    }
    println!();

    for file_view in &view.files {
        print_terminal_file(file_view, mode);
    }

    let issue_comments = &view.pr.issue_comments;
    if !issue_comments.is_empty() {
        println!("═══ Conversation ({}) ═══", issue_comments.len());
        for comment in issue_comments {
            println!(
                "  {} • {}",
                comment.author.bold(),
                comment.created_at.format("%Y-%m-%d %H:%M")
            );
            for body_line in comment.body.lines() {
                println!("    {}", body_line);
            }
        }
        println!();
    }
}

fn print_terminal_file(file_view: &FileView<'_>, mode: ViewMode) {
    let file = file_view.file;
    let renamed = file
        .previous_filename
        .as_deref()
        .map(|prev| format!(" from {}", prev))
        .unwrap_or_default();
    println!(
        "═══ {} ({}){} {} {} ═══",
        file.filename.bold(),
        colorize_status(&file.status),
        renamed,
        format!("+{}", file.additions).green(),
        format!("-{}", file.deletions).red(),
    );

    match &file_view.diff {
        DiffState::NoDiff => println!("  {}", "Binary file or no changes".dimmed()),
        DiffState::Failed(err) => {
            println!("  {}", "Error parsing diff".red().bold());
            println!("  Unable to display diff. Error: {}", err.message);
        }
        DiffState::Parsed(parsed) => {
            for hunk in &parsed.hunks {
                println!("{}", hunk.header.cyan());
                match mode {
                    ViewMode::Unified => {
                        for line in &hunk.lines {
                            println!("{}", colorize_line(line, &unified_line(line)));
                        }
                    }
                    ViewMode::Split => {
                        for row in split_rows(hunk) {
                            println!(
                                "{} │ {}",
                                colorize_side(row.left, &split_side(row.left)),
                                colorize_side(row.right, &split_side(row.right)),
                            );
                        }
                    }
                }
            }
        }
    }

    if !file_view.comments.is_empty() {
        println!("  Comments ({})", file_view.comments.len());
        for comment in &file_view.comments {
            println!("  {} • {}", comment.author.bold(), comment_location(comment));
            for body_line in comment.body.lines() {
                println!("    {}", body_line);
            }
        }
    }
    println!();
}

/// Indented listing of the file tree, one line per node.
fn tree_lines(nodes: &[FileTreeNode]) -> Vec<String> {
    FileTreeNode::walk(nodes)
        .into_iter()
        .map(|(depth, node)| {
            let indent = "  ".repeat(depth);
            match node {
                FileTreeNode::Folder { name, .. } => format!("{}{}/", indent, name),
                FileTreeNode::File { name, file, .. } => format!(
                    "{}{} [{}] +{} -{}",
                    indent,
                    name,
                    status_letter(&file.status),
                    file.additions,
                    file.deletions
                ),
            }
        })
        .collect()
}

/// `  12    13 +content` style line for the unified layout.
fn unified_line(line: &DiffLine) -> String {
    format!(
        "{} {} {}{}",
        line_number(line.old_line),
        line_number(line.new_line),
        line_prefix(line.kind),
        line.content
    )
}

/// One half of a split row, padded or truncated to the column width.
fn split_side(line: Option<&DiffLine>) -> String {
    let text = match line {
        Some(line) => {
            let number = match line.kind {
                LineKind::Delete => line.old_line,
                LineKind::Insert => line.new_line,
                LineKind::Context => line.new_line.or(line.old_line),
            };
            format!("{} {}{}", line_number(number), line_prefix(line.kind), line.content)
        }
        None => String::new(),
    };
    fit(&text, SPLIT_COLUMN_WIDTH)
}

fn fit(text: &str, width: usize) -> String {
    let truncated: String = text.chars().take(width).collect();
    format!("{:<width$}", truncated, width = width)
}

fn line_number(number: Option<usize>) -> String {
    match number {
        Some(n) => format!("{:>5}", n),
        None => " ".repeat(5),
    }
}

fn line_prefix(kind: LineKind) -> char {
    match kind {
        LineKind::Context => ' ',
        LineKind::Insert => '+',
        LineKind::Delete => '-',
    }
}

fn comment_location(comment: &ReviewComment) -> String {
    match (comment.display_line(), comment.is_outdated()) {
        (Some(line), false) => format!("Line {}", line),
        (Some(line), true) => format!("Line {} (outdated)", line),
        (None, _) => "outdated".to_string(),
    }
}

fn status_letter(status: &FileStatus) -> char {
    status
        .to_string()
        .chars()
        .next()
        .unwrap_or('?')
}

/// Write the review as markdown.
///
/// # PR #42: "Add OAuth2 login flow"
/// **Author:** alice | **State:** open | **Files changed:** 7 | **+320 -45**
///
/// ## Files
/// - `src/`
///   - [`lib.rs`](#file-src-lib-rs) (Modified) +3 -1
///
/// <a id="file-src-lib-rs"></a>
/// ## src/lib.rs (Modified)
/// ```diff
/// ...
/// ```
pub fn render_markdown(view: &ReviewView<'_>, mode: ViewMode) -> String {
    let summary = &view.pr.pr;
    let mut md = String::new();
    md.push_str(&format!("# PR #{}: \"{}\"\n\n", summary.number, summary.title));
    md.push_str(&format!(
        "**Author:** {} | **State:** {} | **Branches:** `{}` → `{}` | **Files changed:** {} | **+{} -{}**\n\n",
        summary.author,
        summary.state,
        summary.head_branch,
        summary.base_branch,
        summary.changed_files,
        summary.additions,
        summary.deletions
    ));
    md.push_str(&format!("{}\n\n", summary.html_url));
    md.push_str(&format!("{}\n\n", summary.description));

    md.push_str("## Files\n\n");
    for (depth, node) in FileTreeNode::walk(&view.tree) {
        let indent = "  ".repeat(depth);
        match node {
            FileTreeNode::Folder { name, .. } => {
                md.push_str(&format!("{}- `{}/`\n", indent, name));
            }
            FileTreeNode::File { name, file, .. } => {
                md.push_str(&format!(
                    "{}- [`{}`](#{}) ({}) +{} -{}\n",
                    indent,
                    name,
                    anchor(node.path()),
                    file.status,
                    file.additions,
                    file.deletions
                ));
            }
        }
    }
    md.push('\n');

    for file_view in &view.files {
        write_markdown_file(&mut md, file_view, mode);
    }

    if !view.pr.issue_comments.is_empty() {
        md.push_str(&format!("## Conversation ({})\n\n", view.pr.issue_comments.len()));
        for comment in &view.pr.issue_comments {
            md.push_str(&format!(
                "- **{}** ({}): {}\n",
                comment.author,
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.body
            ));
        }
        md.push('\n');
    }
    md
}

fn write_markdown_file(md: &mut String, file_view: &FileView<'_>, mode: ViewMode) {
    let file = file_view.file;
    md.push_str(&format!("<a id=\"{}\"></a>\n\n", anchor(&file.filename)));
    md.push_str(&format!("## {} ({})", file.filename, file.status));
    if let Some(prev) = &file.previous_filename {
        md.push_str(&format!(" from {}", prev));
    }
    md.push_str(&format!(" +{} -{}\n\n", file.additions, file.deletions));

    match &file_view.diff {
        DiffState::NoDiff => md.push_str("_Binary file or no changes_\n\n"),
        DiffState::Failed(err) => {
            md.push_str(&format!("**Error parsing diff:** {}\n\n", err.message));
        }
        DiffState::Parsed(parsed) => match mode {
            ViewMode::Unified => {
                md.push_str("```diff\n");
                for hunk in &parsed.hunks {
                    md.push_str(&format!("{}\n", hunk.header));
                    for line in &hunk.lines {
                        md.push_str(&format!("{}{}\n", line_prefix(line.kind), line.content));
                    }
                }
                md.push_str("```\n\n");
            }
            ViewMode::Split => {
                md.push_str("| Old | | New | |\n|---:|---|---:|---|\n");
                for hunk in &parsed.hunks {
                    md.push_str(&format!("| | `{}` | | |\n", escape_cell(&hunk.header)));
                    for row in split_rows(hunk) {
                        let (old_no, old_text) = markdown_side(row.left, true);
                        let (new_no, new_text) = markdown_side(row.right, false);
                        md.push_str(&format!("| {} | {} | {} | {} |\n", old_no, old_text, new_no, new_text));
                    }
                }
                md.push('\n');
            }
        },
    }

    if !file_view.comments.is_empty() {
        md.push_str(&format!("**Comments ({})**\n\n", file_view.comments.len()));
        for comment in &file_view.comments {
            md.push_str(&format!(
                "- **{}** ({}): {}\n",
                comment.author,
                comment_location(comment),
                comment.body
            ));
        }
        md.push('\n');
    }
}

fn markdown_side(line: Option<&DiffLine>, old_side: bool) -> (String, String) {
    match line {
        Some(line) => {
            let number = if old_side { line.old_line } else { line.new_line };
            let number = number.map(|n| n.to_string()).unwrap_or_default();
            let text = format!("`{}{}`", line_prefix(line.kind), escape_cell(&line.content));
            (number, text)
        }
        None => (String::new(), String::new()),
    }
}

/// Link target for a file section: `src/lib.rs` becomes `file-src-lib-rs`.
fn anchor(path: &str) -> String {
    let slug: String = path
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("file-{}", slug)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn colorize_line(line: &DiffLine, text: &str) -> colored::ColoredString {
    match line.kind {
        LineKind::Insert => text.green(),
        LineKind::Delete => text.red(),
        LineKind::Context => text.normal(),
    }
}

fn colorize_side(line: Option<&DiffLine>, text: &str) -> colored::ColoredString {
    match line {
        Some(line) => colorize_line(line, text),
        None => text.normal(),
    }
}

/// Helper to colorize a file status for terminal output.
fn colorize_status(status: &FileStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        FileStatus::Added => text.green().bold(),
        FileStatus::Removed => text.red().bold(),
        FileStatus::Modified => text.yellow().bold(),
        FileStatus::Renamed => text.cyan().bold(),
        FileStatus::Other(_) => text.normal(),
    }
}
