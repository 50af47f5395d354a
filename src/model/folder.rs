//! In-memory folder tree produced by a directory scan.

use std::path::{Path, PathBuf};

/// One directory of the scanned tree.
///
/// Children and email files are sorted by name. Nothing here is persisted;
/// a new tree is built on every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    /// Directory name (the root keeps its full display path).
    pub name: String,
    /// Full path of the directory.
    pub path: PathBuf,
    /// Sub-directories.
    pub children: Vec<FolderNode>,
    /// Email files directly inside this directory.
    pub email_files: Vec<PathBuf>,
}

impl FolderNode {
    /// Create an empty node.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            children: Vec::new(),
            email_files: Vec::new(),
        }
    }

    /// Whether this directory directly contains email files (an "Emails" group).
    pub fn has_emails(&self) -> bool {
        !self.email_files.is_empty()
    }

    /// Number of email files in this directory and all descendants.
    pub fn total_emails(&self) -> usize {
        self.email_files.len()
            + self
                .children
                .iter()
                .map(FolderNode::total_emails)
                .sum::<usize>()
    }

    /// All folders that directly contain email files, in preorder.
    pub fn email_folders(&self) -> Vec<&FolderNode> {
        let mut out = Vec::new();
        self.collect_email_folders(&mut out);
        out
    }

    fn collect_email_folders<'a>(&'a self, out: &mut Vec<&'a FolderNode>) {
        if self.has_emails() {
            out.push(self);
        }
        for child in &self.children {
            child.collect_email_folders(out);
        }
    }

    /// Every email file in the tree, in preorder (directory files before sub-directories).
    pub fn all_email_files(&self) -> Vec<&Path> {
        self.email_folders()
            .into_iter()
            .flat_map(|f| f.email_files.iter().map(PathBuf::as_path))
            .collect()
    }

    /// Find the node for `path`, if it is part of this tree.
    pub fn find(&self, path: &Path) -> Option<&FolderNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children.iter().find_map(|c| c.find(path))
    }
}
