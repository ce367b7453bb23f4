use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::parsing::{format_count, format_triple, pad_width, part_file_name};
use crate::plugin::BoxedSink;
use crate::record::{MapOutput, PartitionCounts, ReduceOutput, ShuffleOutput};
use crate::traits::Persist;

/// Root directory for map-stage output, relative to the working
/// directory
pub(crate) const MAPPER_ROOT: &str = "temp_mapper";
/// Root directory for shuffle-stage output
pub(crate) const SHUFFLER_ROOT: &str = "temp_shuffler";
/// Root directory for the final per-file word counts
pub(crate) const FINAL_ROOT: &str = "final_output";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write stage output `{path}`")]
    SinkWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn write_failed(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
    |source| SinkError::SinkWriteFailed {
        path: path.to_owned(),
        source,
    }
}

fn write_counts(path: &Path, counts: &PartitionCounts) -> Result<(), SinkError> {
    let file = File::create(path).map_err(write_failed(path))?;
    let mut out = BufWriter::new(file);
    for (word, count) in counts {
        writeln!(out, "{}", format_count(word, *count))
            .map_err(write_failed(path))?;
    }
    out.flush().map_err(write_failed(path))
}

/// Persist one mapper result under `<work dir>/temp_mapper`
///
/// One `part-<k>` file per partition, each holding that partition's
/// triples in emission order. The partition list starts at index
/// `first_partition`; a mapper result for a single partition is a
/// one-element list. A result with no partitions still creates the
/// per-file directory, so empty input files stay visible to the
/// shuffle stage.
pub struct MapWriter {
    work_dir: PathBuf,
    raw: MapOutput,
    first_partition: usize,
    pad: usize,
}

impl MapWriter {
    pub fn new(
        work_dir: PathBuf,
        raw: MapOutput,
        first_partition: usize,
        pad: usize,
    ) -> Self {
        Self {
            work_dir,
            raw,
            first_partition,
            pad,
        }
    }
}

impl Persist for MapWriter {
    type Error = SinkError;

    fn persist(&mut self) -> Result<PathBuf, Self::Error> {
        let root = self.work_dir.join(MAPPER_ROOT);
        for (file_name, partitions) in &self.raw {
            let dir = root.join(file_name);
            create_dir_all(&dir).map_err(write_failed(&dir))?;
            for (offset, triples) in partitions.iter().enumerate() {
                let index = self.first_partition + offset;
                let path = dir.join(part_file_name(index, self.pad));
                let file = File::create(&path).map_err(write_failed(&path))?;
                let mut out = BufWriter::new(file);
                for triple in triples {
                    writeln!(out, "{}", format_triple(triple))
                        .map_err(write_failed(&path))?;
                }
                out.flush().map_err(write_failed(&path))?;
                debug!("wrote {} map records to {path:?}", triples.len());
            }
        }
        Ok(root)
    }
}

/// Persist one shuffler result under `<work dir>/temp_shuffler`
///
/// One `part-<k>` file per partition with `word <TAB> count` records in
/// key order. The file name is passed explicitly so that a result with
/// zero partitions still creates its per-file directory.
pub struct ShuffleWriter {
    work_dir: PathBuf,
    file_name: String,
    partitions: ShuffleOutput,
}

impl ShuffleWriter {
    pub fn new(
        work_dir: PathBuf,
        file_name: String,
        partitions: ShuffleOutput,
    ) -> Self {
        Self {
            work_dir,
            file_name,
            partitions,
        }
    }
}

impl Persist for ShuffleWriter {
    type Error = SinkError;

    fn persist(&mut self) -> Result<PathBuf, Self::Error> {
        let root = self.work_dir.join(SHUFFLER_ROOT);
        let dir = root.join(&self.file_name);
        create_dir_all(&dir).map_err(write_failed(&dir))?;
        let pad = pad_width(self.partitions.len());
        let empty = PartitionCounts::new();
        for (index, entry) in self.partitions.iter().enumerate() {
            let counts = entry.values().next().unwrap_or(&empty);
            let path = dir.join(part_file_name(index, pad));
            write_counts(&path, counts)?;
        }
        debug!(
            "wrote {} shuffled partitions for `{}`",
            self.partitions.len(),
            self.file_name
        );
        Ok(root)
    }
}

/// Persist one reducer result under `<work dir>/final_output`
///
/// One output file per input file, `word <TAB> count` records in key
/// order. An empty inner map yields an empty file.
pub struct ReduceWriter {
    work_dir: PathBuf,
    raw: ReduceOutput,
}

impl ReduceWriter {
    pub fn new(work_dir: PathBuf, raw: ReduceOutput) -> Self {
        Self { work_dir, raw }
    }
}

impl Persist for ReduceWriter {
    type Error = SinkError;

    fn persist(&mut self) -> Result<PathBuf, Self::Error> {
        let root = self.work_dir.join(FINAL_ROOT);
        create_dir_all(&root).map_err(write_failed(&root))?;
        for (file_name, counts) in &self.raw {
            let path = root.join(file_name);
            write_counts(&path, counts)?;
            debug!("wrote {} reduced words to {path:?}", counts.len());
        }
        Ok(root)
    }
}

pub fn read_mapper_op(
    work_dir: PathBuf,
    raw: MapOutput,
    first_partition: usize,
    pad: usize,
) -> BoxedSink {
    Box::new(MapWriter::new(work_dir, raw, first_partition, pad))
}

pub fn destroy_mapper_op(sink: BoxedSink) {
    drop(sink)
}

pub fn read_shuffler_op(
    work_dir: PathBuf,
    file_name: String,
    partitions: ShuffleOutput,
) -> BoxedSink {
    Box::new(ShuffleWriter::new(work_dir, file_name, partitions))
}

pub fn destroy_shuffler_op(sink: BoxedSink) {
    drop(sink)
}

pub fn read_reducer_op(work_dir: PathBuf, raw: ReduceOutput) -> BoxedSink {
    Box::new(ReduceWriter::new(work_dir, raw))
}

pub fn destroy_reducer_op(sink: BoxedSink) {
    drop(sink)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs::read_to_string;

    use super::*;
    use crate::record::WordTriple;

    fn triples(words: &[&str], partition: usize) -> Vec<WordTriple> {
        words
            .iter()
            .map(|w| WordTriple::occurrence(w.to_string(), partition))
            .collect()
    }

    #[test]
    fn map_writer_layout() {
        let dir = tempfile::tempdir().unwrap();
        let raw = BTreeMap::from([(
            "a.txt".to_owned(),
            vec![triples(&["the", "cat", "the"], 1)],
        )]);
        let root = MapWriter::new(dir.path().to_owned(), raw, 1, 2)
            .persist()
            .unwrap();
        assert_eq!(root, dir.path().join(MAPPER_ROOT));
        let part = root.join("a.txt").join("part-01");
        assert_eq!(
            read_to_string(part).unwrap(),
            "the\t1\t1\ncat\t1\t1\nthe\t1\t1\n"
        );
    }

    #[test]
    fn map_writer_empty_result_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let raw = BTreeMap::from([("empty.txt".to_owned(), vec![])]);
        let root = MapWriter::new(dir.path().to_owned(), raw, 0, 2)
            .persist()
            .unwrap();
        let sub = root.join("empty.txt");
        assert!(sub.is_dir());
        assert_eq!(sub.read_dir().unwrap().count(), 0);
    }

    #[test]
    fn map_writer_overwrites_existing_parts() {
        let dir = tempfile::tempdir().unwrap();
        let raw = BTreeMap::from([(
            "a.txt".to_owned(),
            vec![triples(&["old", "old", "old"], 0)],
        )]);
        MapWriter::new(dir.path().to_owned(), raw, 0, 2)
            .persist()
            .unwrap();
        let raw = BTreeMap::from([(
            "a.txt".to_owned(),
            vec![triples(&["new"], 0)],
        )]);
        let root = MapWriter::new(dir.path().to_owned(), raw, 0, 2)
            .persist()
            .unwrap();
        let part = root.join("a.txt").join("part-00");
        assert_eq!(read_to_string(part).unwrap(), "new\t1\t0\n");
    }

    #[test]
    fn shuffle_writer_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let counts =
            BTreeMap::from([("zebra".to_owned(), 2), ("ant".to_owned(), 5)]);
        let partitions =
            vec![BTreeMap::from([("b.txt".to_owned(), counts)])];
        let root = ShuffleWriter::new(
            dir.path().to_owned(),
            "b.txt".to_owned(),
            partitions,
        )
        .persist()
        .unwrap();
        let part = root.join("b.txt").join("part-00");
        assert_eq!(read_to_string(part).unwrap(), "ant\t5\nzebra\t2\n");
    }

    #[test]
    fn shuffle_writer_empty_result_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = ShuffleWriter::new(
            dir.path().to_owned(),
            "empty.txt".to_owned(),
            vec![],
        )
        .persist()
        .unwrap();
        assert!(root.join("empty.txt").is_dir());
    }

    #[test]
    fn reduce_writer_final_layout() {
        let dir = tempfile::tempdir().unwrap();
        let counts =
            BTreeMap::from([("green".to_owned(), 1), ("red".to_owned(), 1)]);
        let raw = BTreeMap::from([("a.txt".to_owned(), counts)]);
        let root = ReduceWriter::new(dir.path().to_owned(), raw)
            .persist()
            .unwrap();
        assert_eq!(root, dir.path().join(FINAL_ROOT));
        assert_eq!(
            read_to_string(root.join("a.txt")).unwrap(),
            "green\t1\nred\t1\n"
        );
    }
}
