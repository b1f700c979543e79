use bytes::Bytes;

use crate::error::FramingError;
use crate::splitter::{SplitOutcome, Splitter};

/// Splits on a single delimiter byte, optionally grouping `count`
/// delimiter-terminated chunks into a single record.
pub struct TokenSplitter {
    delimiter: u8,
    count: usize,
}

impl TokenSplitter {
    pub fn new(delimiter: u8) -> Self {
        TokenSplitter { delimiter, count: 1 }
    }

    pub fn with_count(delimiter: u8, count: usize) -> Self {
        TokenSplitter { delimiter, count: count.max(1) }
    }
}

impl Splitter for TokenSplitter {
    fn find_record(&mut self, buf: &[u8]) -> Result<SplitOutcome, FramingError> {
        let mut seen = 0;
        for (i, &b) in buf.iter().enumerate() {
            if b == self.delimiter {
                seen += 1;
                if seen == self.count {
                    return Ok(SplitOutcome::Record {
                        consumed: i + 1,
                        record: Bytes::copy_from_slice(&buf[..i + 1]),
                    });
                }
            }
        }
        Ok(SplitOutcome::NeedMoreData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_a_single_delimiter() {
        let mut splitter = TokenSplitter::new(b'\n');
        match splitter.find_record(b"hello\nworld").unwrap() {
            SplitOutcome::Record { consumed, record } => {
                assert_eq!(consumed, 6);
                assert_eq!(&record[..], b"hello\n");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn needs_more_data_without_a_delimiter() {
        let mut splitter = TokenSplitter::new(b'\n');
        assert!(matches!(
            splitter.find_record(b"no delimiter here").unwrap(),
            SplitOutcome::NeedMoreData
        ));
    }

    #[test]
    fn groups_count_delimiters_into_one_record() {
        let mut splitter = TokenSplitter::with_count(b'\n', 2);
        assert!(matches!(
            splitter.find_record(b"one\n").unwrap(),
            SplitOutcome::NeedMoreData
        ));
        match splitter.find_record(b"one\ntwo\n").unwrap() {
            SplitOutcome::Record { consumed, record } => {
                assert_eq!(consumed, 8);
                assert_eq!(&record[..], b"one\ntwo\n");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
