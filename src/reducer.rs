use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::PathBuf;

use log::trace;
use thiserror::Error;

use crate::file::{leaf_name, regular_files};
use crate::parsing::{parse_count, RecordParseError};
use crate::plugin::BoxedReducer;
use crate::record::{PartitionCounts, ReduceOutput};
use crate::traits::Reduce;

/// Reducer for the shuffled output of one file
///
/// Sums each word's counts across every partition file of one
/// `temp_shuffler` sub-directory. The output always carries an entry
/// for the file, even when there are no partitions to sum.
pub struct CountReducer {
    shuffle_dir: PathBuf,
}

impl CountReducer {
    pub fn new(shuffle_dir: PathBuf) -> Self {
        Self { shuffle_dir }
    }
}

#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("Missing or unreadable reduce input `{path}`")]
    ReduceInputMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed shuffle record in `{path}`")]
    MalformedRecord {
        path: PathBuf,
        #[source]
        source: RecordParseError,
    },
}

impl Reduce for CountReducer {
    type Error = ReduceError;

    fn run_reduce(&mut self) -> Result<ReduceOutput, Self::Error> {
        use ReduceError::*;

        if !self.shuffle_dir.is_dir() {
            let source = std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "not a directory",
            );
            return Err(ReduceInputMissing {
                path: self.shuffle_dir.clone(),
                source,
            });
        }
        let file_name = leaf_name(&self.shuffle_dir);
        let parts =
            regular_files(&self.shuffle_dir).map_err(|source| {
                ReduceInputMissing {
                    path: self.shuffle_dir.clone(),
                    source,
                }
            })?;
        let mut totals = PartitionCounts::new();
        for part in parts {
            let content =
                read_to_string(&part).map_err(|source| ReduceInputMissing {
                    path: part.clone(),
                    source,
                })?;
            for line in content.lines() {
                let (word, count) =
                    parse_count(line).map_err(|source| MalformedRecord {
                        path: part.clone(),
                        source,
                    })?;
                *totals.entry(word).or_insert(0) += count;
            }
        }
        trace!(
            "reduced `{file_name}` to {} distinct words",
            totals.len()
        );
        Ok(BTreeMap::from([(file_name, totals)]))
    }
}

pub fn create_reducer(shuffle_dir: PathBuf) -> BoxedReducer {
    Box::new(CountReducer::new(shuffle_dir))
}

pub fn destroy_reducer(reducer: BoxedReducer) {
    drop(reducer)
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir_all, write};

    use super::*;

    #[test]
    fn sums_across_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let shuffle_dir = dir.path().join("a.txt");
        create_dir_all(&shuffle_dir).unwrap();
        write(shuffle_dir.join("part-00"), "cat\t1\nthe\t2\n").unwrap();
        write(shuffle_dir.join("part-01"), "mat\t1\nthe\t3\n").unwrap();

        let out = CountReducer::new(shuffle_dir).run_reduce().unwrap();
        let totals = &out["a.txt"];
        assert_eq!(totals["the"], 5);
        assert_eq!(totals["cat"], 1);
        assert_eq!(totals["mat"], 1);
        let words: Vec<_> = totals.keys().cloned().collect();
        assert_eq!(words, ["cat", "mat", "the"]);
    }

    #[test]
    fn empty_shuffle_directory_reduces_to_empty_entry() {
        let dir = tempfile::tempdir().unwrap();
        let shuffle_dir = dir.path().join("empty.txt");
        create_dir_all(&shuffle_dir).unwrap();

        let out = CountReducer::new(shuffle_dir).run_reduce().unwrap();
        assert!(out["empty.txt"].is_empty());
    }

    #[test]
    fn missing_input_directory() {
        let dir = tempfile::tempdir().unwrap();
        let res = CountReducer::new(dir.path().join("gone")).run_reduce();
        assert!(matches!(
            res,
            Err(ReduceError::ReduceInputMissing { .. })
        ));
    }
}
