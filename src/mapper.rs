use std::collections::BTreeMap;

use itertools::Itertools;
use log::trace;
use thiserror::Error;

use crate::plugin::BoxedMapper;
use crate::record::{FilePartition, MapOutput, WordTriple};
use crate::traits::Map;

/// Mapper for one partition of one file
///
/// Each whitespace-separated token is normalized and emitted as a
/// `(word, 1, partition)` triple. Duplicate words are kept; collapsing
/// them is the shuffler's job.
pub struct WordCountMapper {
    partition: usize,
    input: FilePartition,
}

impl WordCountMapper {
    /// Mapper for the given partition
    ///
    /// `input` must hold exactly one entry, the partition's lines keyed
    /// by the file name they came from.
    pub fn new(partition: usize, input: FilePartition) -> Self {
        Self { partition, input }
    }
}

/// Normalize one raw token into a word
///
/// Non-alphanumeric characters are trimmed from both ends, the rest is
/// lowercased. Tokens with nothing left are dropped.
pub fn normalize(token: &str) -> Option<String> {
    let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("Mapper failed for partition {partition} of `{file_name}`")]
    MapperFailed { file_name: String, partition: usize },
}

impl Map for WordCountMapper {
    type Error = MapError;

    fn run_map(&mut self) -> Result<MapOutput, Self::Error> {
        if self.input.len() != 1 {
            return Err(MapError::MapperFailed {
                file_name: self.input.keys().join(","),
                partition: self.partition,
            });
        }
        let (name, lines) = self.input.iter().next().unwrap();
        let mut triples = Vec::new();
        for line in lines {
            for token in line.split_whitespace() {
                if let Some(word) = normalize(token) {
                    triples.push(WordTriple::occurrence(word, self.partition));
                }
            }
        }
        trace!(
            "partition {} of `{name}`: {} occurrences",
            self.partition,
            triples.len()
        );
        Ok(BTreeMap::from([(name.clone(), vec![triples])]))
    }
}

pub fn create_mapper(partition: usize, input: FilePartition) -> BoxedMapper {
    Box::new(WordCountMapper::new(partition, input))
}

pub fn destroy_mapper(mapper: BoxedMapper) {
    drop(mapper)
}
