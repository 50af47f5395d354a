//! Filesystem walk that builds the [`FolderNode`] tree.
//!
//! Children and files are sorted while walking, so a preorder traversal of
//! the tree visits email files in path order.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{EmlError, Result};
use crate::model::folder::FolderNode;
use crate::scan::ScanOptions;

/// Walk `root` recursively and build its folder tree.
///
/// The root is canonicalized so record paths do not depend on the working
/// directory. Symlinked directories are not followed. A sub-directory that
/// cannot be read is logged and left empty; an unreadable root is an error.
pub fn build_tree(root: &Path, options: &ScanOptions) -> Result<FolderNode> {
    let root = fs::canonicalize(root).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EmlError::FileNotFound(root.to_path_buf()),
        _ => EmlError::io(root, e),
    })?;
    if !root.is_dir() {
        return Err(EmlError::InvalidPath(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let mut node = FolderNode::new(root.display().to_string(), &root);
    walk(&mut node, options).map_err(|e| EmlError::io(&root, e))?;
    debug!(
        root = %root.display(),
        emails = node.total_emails(),
        folders = node.email_folders().len(),
        "Folder tree built"
    );
    Ok(node)
}

fn walk(node: &mut FolderNode, options: &ScanOptions) -> std::io::Result<()> {
    for entry in fs::read_dir(&node.path)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %node.path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if (options.skip_hidden && name.starts_with('.')) || options.is_excluded(&path) {
                continue;
            }
            let mut child = FolderNode::new(name, path);
            if let Err(e) = walk(&mut child, options) {
                warn!(dir = %child.path.display(), error = %e, "Skipping unreadable directory");
            }
            node.children.push(child);
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && options.is_email_file(&path)
        {
            node.email_files.push(path);
        }
    }

    node.children.sort_by(|a, b| a.name.cmp(&b.name));
    node.email_files.sort();
    Ok(())
}
