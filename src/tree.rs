//! Folder hierarchy for navigating the files of a PR.

use std::cmp::Ordering;

use crate::pr::ChangedFile;

/// Node in the file tree. Folders own their children; there are no parent links.
#[derive(Debug, Clone)]
pub enum FileTreeNode {
    Folder {
        name: String,
        path: String,
        children: Vec<FileTreeNode>,
    },
    File {
        name: String,
        path: String,
        file: ChangedFile,
    },
}

impl FileTreeNode {
    pub fn name(&self) -> &str {
        match self {
            FileTreeNode::Folder { name, .. } | FileTreeNode::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FileTreeNode::Folder { path, .. } | FileTreeNode::File { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileTreeNode::Folder { .. })
    }

    /// Depth-first walk yielding each node with its nesting depth.
    pub fn walk<'a>(nodes: &'a [FileTreeNode]) -> Vec<(usize, &'a FileTreeNode)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, &FileTreeNode)> = nodes.iter().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            if let FileTreeNode::Folder { children, .. } = node {
                stack.extend(children.iter().rev().map(|c| (depth + 1, c)));
            }
        }
        out
    }
}

/// Build a sorted file tree from a flat list of changed files.
///
/// Files sharing a directory share one folder node. Every sibling list is
/// ordered folders first, then by name.
pub fn build_tree(files: &[ChangedFile]) -> Vec<FileTreeNode> {
    let mut root: Vec<FileTreeNode> = Vec::new();

    for file in files {
        let parts: Vec<&str> = file.filename.split('/').collect();
        insert_path(&mut root, &parts, 0, file);
    }

    sort_recursive(&mut root);
    root
}

/// Insert the path `parts` below `level`; `depth` is how many parts are already consumed.
fn insert_path(level: &mut Vec<FileTreeNode>, parts: &[&str], depth: usize, file: &ChangedFile) {
    let Some((name, rest)) = parts[depth..].split_first() else {
        return;
    };
    let path = parts[..=depth].join("/");

    if rest.is_empty() {
        // Paths are unique per PR; keep the first entry if upstream repeats one.
        let exists = level
            .iter()
            .any(|n| !n.is_folder() && n.name() == *name);
        if !exists {
            level.push(FileTreeNode::File {
                name: name.to_string(),
                path,
                file: file.clone(),
            });
        }
        return;
    }

    let index = match level.iter().position(|n| n.is_folder() && n.name() == *name) {
        Some(index) => index,
        None => {
            level.push(FileTreeNode::Folder {
                name: name.to_string(),
                path,
                children: Vec::new(),
            });
            level.len() - 1
        }
    };

    if let FileTreeNode::Folder { children, .. } = &mut level[index] {
        insert_path(children, parts, depth + 1, file);
    }
}

/// Sort children first, then the siblings themselves.
fn sort_recursive(nodes: &mut [FileTreeNode]) {
    for node in nodes.iter_mut() {
        if let FileTreeNode::Folder { children, .. } = node {
            sort_recursive(children);
        }
    }
    nodes.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_names(a.name(), b.name()),
    });
}

/// Dictionary-style order: case-insensitive first, lowercase before uppercase on ties.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::diff::tests::changed_file;
    use crate::pr::FileStatus;

    fn files(paths: &[&str]) -> Vec<ChangedFile> {
        paths
            .iter()
            .map(|p| changed_file(p, FileStatus::Modified, ""))
            .collect()
    }

    fn names(nodes: &[FileTreeNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name()).collect()
    }

    #[test]
    fn test_folders_sort_before_files() {
        let tree = build_tree(&files(&["src/b.ts", "README.md", "src/a.ts"]));
        assert_eq!(names(&tree), vec!["src", "README.md"]);
        match &tree[0] {
            FileTreeNode::Folder { path, children, .. } => {
                assert_eq!(path, "src");
                assert_eq!(names(children), vec!["a.ts", "b.ts"]);
                assert_eq!(children[0].path(), "src/a.ts");
            }
            other => panic!("expected folder, got {other:?}"),
        }
        assert!(!tree[1].is_folder());
    }

    #[test]
    fn test_shared_prefix_shares_one_folder() {
        let tree = build_tree(&files(&["src/pr/mod.rs", "src/pr/diff.rs", "src/main.rs"]));
        assert_eq!(tree.len(), 1);
        let FileTreeNode::Folder { children, .. } = &tree[0] else {
            panic!("expected src folder");
        };
        assert_eq!(names(children), vec!["pr", "main.rs"]);
        let FileTreeNode::Folder { children: pr, path, .. } = &children[0] else {
            panic!("expected pr folder");
        };
        assert_eq!(path, "src/pr");
        assert_eq!(names(pr), vec!["diff.rs", "mod.rs"]);
    }

    #[test]
    fn test_file_node_carries_changed_file() {
        let tree = build_tree(&files(&["Cargo.toml"]));
        match &tree[0] {
            FileTreeNode::File { file, path, .. } => {
                assert_eq!(file.filename, "Cargo.toml");
                assert_eq!(path, "Cargo.toml");
            }
            other => panic!("expected file, got {other:?}"),
        }
    }

    #[test]
    fn test_name_order_ignores_case() {
        let tree = build_tree(&files(&["b.txt", "Zeta.txt", "a.txt", "B.txt"]));
        assert_eq!(names(&tree), vec!["a.txt", "b.txt", "B.txt", "Zeta.txt"]);
    }

    #[test]
    fn test_file_and_folder_with_same_name() {
        let tree = build_tree(&files(&["docs", "docs/index.md"]));
        assert_eq!(tree.len(), 2);
        assert!(tree[0].is_folder());
        assert_eq!(tree[0].name(), "docs");
        assert!(!tree[1].is_folder());
    }

    #[test]
    fn test_duplicate_path_keeps_first() {
        let mut input = files(&["a.rs", "a.rs"]);
        input[1].additions = 99;
        let tree = build_tree(&input);
        assert_eq!(tree.len(), 1);
        let FileTreeNode::File { file, .. } = &tree[0] else {
            panic!("expected file");
        };
        assert_eq!(file.additions, 0);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_tree(&[]).is_empty());
    }

    #[test]
    fn test_walk_is_depth_first() {
        let tree = build_tree(&files(&["src/a.rs", "z.rs"]));
        let walked: Vec<(usize, &str)> = FileTreeNode::walk(&tree)
            .into_iter()
            .map(|(depth, node)| (depth, node.name()))
            .collect();
        assert_eq!(walked, vec![(0, "src"), (1, "a.rs"), (0, "z.rs")]);
    }
}
