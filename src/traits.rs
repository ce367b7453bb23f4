use std::path::PathBuf;

use crate::record::{InputData, MapOutput, ReduceOutput, ShuffleOutput};

/// Read one input file into ordered partitions
pub trait ReadInput {
    type Error;

    /// Produce `{file name -> partitions}` for the file this reader
    /// was constructed with
    fn run_input(&mut self) -> Result<InputData, Self::Error>;
}

/// Map one partition of one file to word-count triples
pub trait Map {
    type Error;

    /// Produce one `(word, 1, partition)` triple per token occurrence,
    /// in emission order
    fn run_map(&mut self) -> Result<MapOutput, Self::Error>;
}

/// Aggregate word counts within each partition of one file
pub trait Shuffle {
    type Error;

    /// Produce one key-ordered count map per partition, in partition
    /// order. No aggregation across partitions.
    fn run_shuffle(&mut self) -> Result<ShuffleOutput, Self::Error>;
}

/// Aggregate word counts across all partitions of one file
pub trait Reduce {
    type Error;

    fn run_reduce(&mut self) -> Result<ReduceOutput, Self::Error>;
}

/// Persist a stage result to disk
///
/// Implementations choose their own output root and return it, so the
/// orchestrator can learn the root from the first completed write.
pub trait Persist {
    type Error;

    fn persist(&mut self) -> Result<PathBuf, Self::Error>;
}
