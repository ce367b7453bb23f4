use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::PathBuf;

use log::trace;
use thiserror::Error;

use crate::file::{leaf_name, regular_files};
use crate::parsing::{parse_triple, RecordParseError};
use crate::plugin::BoxedShuffler;
use crate::record::{PartitionCounts, ShuffleOutput};
use crate::traits::Shuffle;

/// Shuffler for the map output of one file
///
/// Aggregates `word -> count` within each partition file; partitions
/// stay separate. The partition files are processed in leaf-name
/// order, which is partition order thanks to zero padding.
pub struct PartitionShuffler {
    map_dir: PathBuf,
}

impl PartitionShuffler {
    /// Shuffler over the partition files of `map_dir`, one
    /// `temp_mapper` sub-directory
    pub fn new(map_dir: PathBuf) -> Self {
        Self { map_dir }
    }
}

#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("Missing or unreadable shuffle input `{path}`")]
    ShuffleInputMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed map record in `{path}`")]
    MalformedRecord {
        path: PathBuf,
        #[source]
        source: RecordParseError,
    },
}

impl Shuffle for PartitionShuffler {
    type Error = ShuffleError;

    fn run_shuffle(&mut self) -> Result<ShuffleOutput, Self::Error> {
        use ShuffleError::*;

        if !self.map_dir.is_dir() {
            let source = std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not a directory",
            );
            return Err(ShuffleInputMissing {
                path: self.map_dir.clone(),
                source,
            });
        }
        let file_name = leaf_name(&self.map_dir);
        let parts =
            regular_files(&self.map_dir).map_err(|source| {
                ShuffleInputMissing {
                    path: self.map_dir.clone(),
                    source,
                }
            })?;
        let mut shuffled = Vec::with_capacity(parts.len());
        for part in parts {
            let content =
                read_to_string(&part).map_err(|source| ShuffleInputMissing {
                    path: part.clone(),
                    source,
                })?;
            let mut counts = PartitionCounts::new();
            for line in content.lines() {
                let triple =
                    parse_triple(line).map_err(|source| MalformedRecord {
                        path: part.clone(),
                        source,
                    })?;
                *counts.entry(triple.word).or_insert(0) += triple.count;
            }
            trace!("shuffled {part:?} into {} words", counts.len());
            shuffled.push(BTreeMap::from([(file_name.clone(), counts)]));
        }
        Ok(shuffled)
    }
}

pub fn create_shuffler(map_dir: PathBuf) -> BoxedShuffler {
    Box::new(PartitionShuffler::new(map_dir))
}

pub fn destroy_shuffler(shuffler: BoxedShuffler) {
    drop(shuffler)
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir_all, write};
    use std::path::Path;

    use super::*;

    fn fixture(dir: &Path, parts: &[&str]) -> PathBuf {
        let map_dir = dir.join("a.txt");
        create_dir_all(&map_dir).unwrap();
        for (k, content) in parts.iter().enumerate() {
            write(map_dir.join(format!("part-0{k}")), content).unwrap();
        }
        map_dir
    }

    #[test]
    fn aggregates_within_partition_only() {
        let dir = tempfile::tempdir().unwrap();
        let map_dir = fixture(
            dir.path(),
            &["the\t1\t0\ncat\t1\t0\nthe\t1\t0\n", "the\t1\t1\n"],
        );

        let shuffled =
            PartitionShuffler::new(map_dir).run_shuffle().unwrap();
        assert_eq!(shuffled.len(), 2);
        let first = &shuffled[0]["a.txt"];
        assert_eq!(first["the"], 2);
        assert_eq!(first["cat"], 1);
        let second = &shuffled[1]["a.txt"];
        assert_eq!(second["the"], 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn partition_sums_match_triple_counts() {
        let dir = tempfile::tempdir().unwrap();
        let map_dir = fixture(
            dir.path(),
            &["a\t1\t0\nb\t1\t0\na\t1\t0\nc\t1\t0\n", "b\t1\t1\nb\t1\t1\n"],
        );

        let shuffled =
            PartitionShuffler::new(map_dir).run_shuffle().unwrap();
        let sums: Vec<u64> = shuffled
            .iter()
            .map(|m| m["a.txt"].values().sum())
            .collect();
        assert_eq!(sums, [4, 2]);
    }

    #[test]
    fn keys_are_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let map_dir =
            fixture(dir.path(), &["zebra\t1\t0\nant\t1\t0\nmole\t1\t0\n"]);

        let shuffled =
            PartitionShuffler::new(map_dir).run_shuffle().unwrap();
        let words: Vec<_> = shuffled[0]["a.txt"].keys().cloned().collect();
        assert_eq!(words, ["ant", "mole", "zebra"]);
    }

    #[test]
    fn empty_map_directory() {
        let dir = tempfile::tempdir().unwrap();
        let map_dir = dir.path().join("empty.txt");
        create_dir_all(&map_dir).unwrap();

        let shuffled =
            PartitionShuffler::new(map_dir).run_shuffle().unwrap();
        assert!(shuffled.is_empty());
    }

    #[test]
    fn missing_input_directory() {
        let dir = tempfile::tempdir().unwrap();
        let res = PartitionShuffler::new(dir.path().join("gone"))
            .run_shuffle();
        assert!(matches!(
            res,
            Err(ShuffleError::ShuffleInputMissing { .. })
        ));
    }
}
