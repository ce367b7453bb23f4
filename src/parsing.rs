use nom::{
    bytes::complete::take_while1,
    character::complete::{char, u64},
    sequence::preceded,
    IResult, Parser,
};
use thiserror::Error;

use crate::record::{Count, WordTriple};

/// Field separator within partition files
const SEP: char = '\t';

/// A record that could not be parsed back from a partition file
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("Malformed record `{0}`")]
pub struct RecordParseError(pub String);

pub(crate) fn word_entry(line: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != SEP && c != '\n').parse(line)
}

pub(crate) fn count_entry(line: &str) -> IResult<&str, Count> {
    preceded(char(SEP), u64).parse(line)
}

/// Encode one mapper triple as a partition file record
pub fn format_triple(triple: &WordTriple) -> String {
    format!(
        "{}{SEP}{}{SEP}{}",
        triple.word, triple.count, triple.partition
    )
}

/// Parse a mapper triple back from a partition file record
pub fn parse_triple(line: &str) -> Result<WordTriple, RecordParseError> {
    let malformed = || RecordParseError(line.to_owned());
    let (rest, word) = word_entry(line).map_err(|_| malformed())?;
    let (rest, count) = count_entry(rest).map_err(|_| malformed())?;
    let (rest, partition) = count_entry(rest).map_err(|_| malformed())?;
    if !rest.is_empty() {
        return Err(malformed());
    }
    Ok(WordTriple {
        word: word.to_owned(),
        count,
        partition: partition as usize,
    })
}

/// Encode one aggregated `word -> count` entry
pub fn format_count(word: &str, count: Count) -> String {
    format!("{word}{SEP}{count}")
}

/// Parse an aggregated `word -> count` record
pub fn parse_count(line: &str) -> Result<(String, Count), RecordParseError> {
    let malformed = || RecordParseError(line.to_owned());
    let (rest, word) = word_entry(line).map_err(|_| malformed())?;
    let (rest, count) = count_entry(rest).map_err(|_| malformed())?;
    if !rest.is_empty() {
        return Err(malformed());
    }
    Ok((word.to_owned(), count))
}

/// Zero-padding width for the partition files of a file with `nparts`
/// partitions
///
/// At least two digits, enough for the largest index. Sorting the
/// resulting leaf names recovers partition order.
pub fn pad_width(nparts: usize) -> usize {
    let mut width = 1;
    let mut rest = nparts.saturating_sub(1) / 10;
    while rest > 0 {
        width += 1;
        rest /= 10;
    }
    width.max(2)
}

/// Leaf name of the partition file with the given index
pub fn part_file_name(index: usize, width: usize) -> String {
    format!("part-{index:0width$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_round_trip() {
        let triple = WordTriple::occurrence("gloin".to_owned(), 7);
        assert_eq!(format_triple(&triple), "gloin\t1\t7");
        assert_eq!(parse_triple("gloin\t1\t7"), Ok(triple));
    }

    #[test]
    fn count_round_trip() {
        assert_eq!(format_count("the", 42), "the\t42");
        assert_eq!(parse_count("the\t42"), Ok(("the".to_owned(), 42)));
    }

    #[test]
    fn malformed_records() {
        assert!(parse_triple("no separators here").is_err());
        assert!(parse_triple("word\tx\t0").is_err());
        assert!(parse_triple("word\t1\t0\ttrailing").is_err());
        assert!(parse_count("word only").is_err());
        assert!(parse_count("\t3").is_err());
    }

    #[test]
    fn padding() {
        assert_eq!(pad_width(0), 2);
        assert_eq!(pad_width(1), 2);
        assert_eq!(pad_width(3), 2);
        assert_eq!(pad_width(100), 2);
        assert_eq!(pad_width(101), 3);
        assert_eq!(pad_width(1001), 4);
        assert_eq!(part_file_name(0, 2), "part-00");
        assert_eq!(part_file_name(17, 3), "part-017");
    }
}
