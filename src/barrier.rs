//! Filesystem-observed stage barriers
//!
//! Sinks expose no completion signal beyond their on-disk output, so
//! the orchestrator polls the output roots: B1 waits until the map
//! root holds one sub-directory per input file, B2 until every map
//! partition file has a shuffled counterpart.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use log::{debug, trace};

use crate::file::{leaf_name, regular_files, sub_directories};

/// Barrier B1: block until `root` holds exactly `expected`
/// sub-directories
pub fn await_subdir_count(root: &Path, expected: usize, poll: Duration) {
    loop {
        let found = sub_directories(root).map(|d| d.len()).unwrap_or(0);
        if found == expected {
            debug!("all {expected} map outputs present under {root:?}");
            return;
        }
        trace!("{found} of {expected} map outputs under {root:?}");
        sleep(poll);
    }
}

/// Barrier B2: block until every `<file>/part-<k>` under `from` has a
/// counterpart under `to`
///
/// Stronger than B1: shuffling writes one file per partition, not per
/// input file.
pub fn await_matching_parts(from: &Path, to: &Path, poll: Duration) {
    loop {
        match missing_parts(from, to) {
            Ok(missing) if missing.is_empty() => {
                debug!("all partitions under {from:?} shuffled to {to:?}");
                return;
            }
            Ok(missing) => {
                trace!("{} partitions not yet shuffled", missing.len())
            }
            Err(err) => trace!("barrier observation failed: {err}"),
        }
        sleep(poll);
    }
}

/// Relative `<file>/<part>` paths present under `from` but not under
/// `to`
pub(crate) fn missing_parts(
    from: &Path,
    to: &Path,
) -> io::Result<Vec<String>> {
    let mut have = BTreeSet::new();
    for sub in sub_directories(to)? {
        for part in regular_files(&sub)? {
            have.insert(format!("{}/{}", leaf_name(&sub), leaf_name(&part)));
        }
    }
    let mut missing = Vec::new();
    for sub in sub_directories(from)? {
        for part in regular_files(&sub)? {
            let key = format!("{}/{}", leaf_name(&sub), leaf_name(&part));
            if !have.contains(&key) {
                missing.push(key);
            }
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir_all, File};
    use std::thread;

    use super::*;

    #[test]
    fn part_matching() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        create_dir_all(from.join("a.txt")).unwrap();
        File::create(from.join("a.txt").join("part-00")).unwrap();
        File::create(from.join("a.txt").join("part-01")).unwrap();
        create_dir_all(to.join("a.txt")).unwrap();
        File::create(to.join("a.txt").join("part-00")).unwrap();

        let missing = missing_parts(&from, &to).unwrap();
        assert_eq!(missing, ["a.txt/part-01"]);

        File::create(to.join("a.txt").join("part-01")).unwrap();
        assert!(missing_parts(&from, &to).unwrap().is_empty());
    }

    #[test]
    fn subdir_count_barrier_lifts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let late = root.join("late");
        let maker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            create_dir_all(late).unwrap();
        });
        await_subdir_count(&root, 1, Duration::from_millis(1));
        maker.join().unwrap();
    }
}
