use std::collections::BTreeMap;

use strum::Display;

/// Maximum number of lines per input partition
pub const PARTITION_RECORDS: usize = 2000;

/// Aggregated word count
pub type Count = u64;

/// Raw input lines of one file, partitioned
///
/// The outer map has exactly one entry, keyed by the leaf name of the
/// input file. Partitions are in index order; concatenating them
/// reproduces the file line for line.
pub type InputData = BTreeMap<String, Vec<Vec<String>>>;

/// A single partition of one file, as passed to a mapper
pub type FilePartition = BTreeMap<String, Vec<String>>;

/// One `(word, count, partition)` record emitted by a mapper
///
/// The count is always 1 at the map stage. Duplicate words are not
/// collapsed; aggregation happens during shuffling.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WordTriple {
    pub word: String,
    pub count: Count,
    pub partition: usize,
}

impl WordTriple {
    /// A fresh single occurrence of `word` in partition `partition`
    pub fn occurrence(word: String, partition: usize) -> Self {
        Self {
            word,
            count: 1,
            partition,
        }
    }
}

/// Mapper output: triples of one partition, keyed by file name
///
/// Like [InputData], the outer map has a single entry. The inner list
/// holds one element per mapped partition; a mapper working on a single
/// partition emits a single-element list.
pub type MapOutput = BTreeMap<String, Vec<Vec<WordTriple>>>;

/// Per-word counts within one partition
///
/// A `BTreeMap`, so iteration is in ascending lexicographic key order.
/// This ordering is part of the shuffle and reduce output contracts.
pub type PartitionCounts = BTreeMap<String, Count>;

/// Shuffler output: one single-entry `{file name -> counts}` map per
/// partition, in partition order
pub type ShuffleOutput = Vec<BTreeMap<String, PartitionCounts>>;

/// Reducer output: counts aggregated across all partitions of one file
pub type ReduceOutput = BTreeMap<String, PartitionCounts>;

/// The four pipeline stages
#[derive(Copy, Clone, Debug, Display, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Input,
    Map,
    Shuffle,
    Reduce,
}
