use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use log::{debug, trace};
use thiserror::Error;

use crate::plugin::BoxedInput;
use crate::record::{InputData, PARTITION_RECORDS};
use crate::traits::ReadInput;

/// Reader for one input file, splitting it into partitions of at most
/// [PARTITION_RECORDS] lines
///
/// The final partition may be shorter. Concatenating all partitions in
/// index order reproduces the file line for line; an empty file yields
/// an entry with zero partitions.
pub struct PartitionedFileReader {
    path: PathBuf,
}

impl PartitionedFileReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Failed to read input file `{path}`")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReadInput for PartitionedFileReader {
    type Error = InputError;

    fn run_input(&mut self) -> Result<InputData, Self::Error> {
        let unreadable = |source| InputError::InputUnreadable {
            path: self.path.clone(),
            source,
        };
        let name = match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                let source = std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "path has no file name",
                );
                return Err(unreadable(source));
            }
        };
        let file = File::open(&self.path).map_err(unreadable)?;
        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()
            .map_err(unreadable)?;
        trace!("read {} lines from {:?}", lines.len(), self.path);
        let partitions: Vec<Vec<String>> = lines
            .chunks(PARTITION_RECORDS)
            .map(<[String]>::to_vec)
            .collect();
        debug!("split `{name}` into {} partitions", partitions.len());
        Ok(BTreeMap::from([(name, partitions)]))
    }
}

pub fn create_input(path: PathBuf) -> BoxedInput {
    Box::new(PartitionedFileReader::new(path))
}

pub fn destroy_input(reader: BoxedInput) {
    drop(reader)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn read(path: PathBuf) -> InputData {
        PartitionedFileReader::new(path).run_input().unwrap()
    }

    #[test]
    fn partition_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        let mut file = File::create(&path).unwrap();
        for n in 0..4500 {
            writeln!(file, "line {n}").unwrap();
        }
        drop(file);

        let data = read(path);
        let partitions = &data["lines.txt"];
        assert_eq!(partitions.len(), 3);
        assert_eq!(partitions[0].len(), 2000);
        assert_eq!(partitions[1].len(), 2000);
        assert_eq!(partitions[2].len(), 500);
        let rejoined: Vec<_> = partitions.iter().flatten().collect();
        for (n, line) in rejoined.iter().enumerate() {
            assert_eq!(**line, format!("line {n}"));
        }
    }

    #[test]
    fn empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        File::create(&path).unwrap();

        let data = read(path);
        assert_eq!(data.len(), 1);
        assert!(data["empty.txt"].is_empty());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = PartitionedFileReader::new(dir.path().join("nope.txt"))
            .run_input();
        assert!(matches!(
            res,
            Err(InputError::InputUnreadable { .. })
        ));
    }
}
