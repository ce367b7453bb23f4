//! Thin directory-listing helpers around [std::fs]
//!
//! All listings are sorted by leaf name, so zero-padded partition
//! files come back in partition order.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// All entries of `dir`, sorted; an absent directory lists as empty
pub(crate) fn dir_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries: Vec<_> = dir
        .read_dir()?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();
    Ok(entries)
}

/// Sub-directories of `root`, sorted
pub(crate) fn sub_directories(root: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(dir_entries(root)?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect())
}

/// Regular files directly under `dir`, sorted
pub(crate) fn regular_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(dir_entries(dir)?
        .into_iter()
        .filter(|path| path.is_file())
        .collect())
}

/// Leaf name of `path` as a string
pub(crate) fn leaf_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Leaf names of the regular files directly under `dir`
pub(crate) fn file_leaves(dir: &Path) -> io::Result<BTreeSet<String>> {
    Ok(regular_files(dir)?
        .iter()
        .map(|path| leaf_name(path))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir, File};

    use super::*;

    #[test]
    fn listings_are_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("b.txt")).unwrap();
        File::create(dir.path().join("a.txt")).unwrap();

        let files = regular_files(dir.path()).unwrap();
        assert_eq!(
            files.iter().map(|p| leaf_name(p)).collect::<Vec<_>>(),
            ["a.txt", "b.txt"]
        );
        let subs = sub_directories(dir.path()).unwrap();
        assert_eq!(subs, [dir.path().join("sub")]);
        assert_eq!(
            file_leaves(dir.path())
                .unwrap()
                .into_iter()
                .collect::<Vec<_>>(),
            ["a.txt", "b.txt"]
        );
    }

    #[test]
    fn absent_directory_lists_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone");
        assert!(dir_entries(&gone).unwrap().is_empty());
        assert!(file_leaves(&gone).unwrap().is_empty());
    }
}
