use bytes::Bytes;
use regex::bytes::Regex;

use crate::error::FramingError;
use crate::splitter::{SplitOutcome, Splitter};

/// Where the delimiter regex sits relative to the record it bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterPosition {
    /// The match is the record's terminator and is consumed with it.
    End,
    /// The match is the next record's opening marker; it stays in the
    /// buffer and becomes the start of the following record.
    Start,
}

/// Splits on a regular expression match rather than a fixed byte.
pub struct RegexSplitter {
    regex: Regex,
    position: DelimiterPosition,
    capture_group: Option<usize>,
}

impl RegexSplitter {
    pub fn new(pattern: &str, position: DelimiterPosition) -> Result<Self, FramingError> {
        Self::with_capture_group(pattern, position, None)
    }

    pub fn with_capture_group(
        pattern: &str,
        position: DelimiterPosition,
        capture_group: Option<usize>,
    ) -> Result<Self, FramingError> {
        let regex = Regex::new(pattern).map_err(FramingError::RegexCompile)?;
        Ok(RegexSplitter { regex, position, capture_group })
    }

    /// Locates the delimiter match starting the search at `start`, along
    /// with its capture group's span when one is configured and matched.
    fn delimiter_match(&self, buf: &[u8], start: usize) -> Option<DelimiterMatch> {
        let caps = self.regex.captures_at(buf, start)?;
        let full = caps.get(0)?;
        let captured = self.capture_group.and_then(|group| caps.get(group)).map(|m| (m.start(), m.end()));
        Some(DelimiterMatch { full: (full.start(), full.end()), captured })
    }
}

/// One delimiter match: its full span plus its capture group's span, if the
/// splitter is configured with one and it participated in the match.
struct DelimiterMatch {
    full: (usize, usize),
    captured: Option<(usize, usize)>,
}

impl Splitter for RegexSplitter {
    fn find_record(&mut self, buf: &[u8]) -> Result<SplitOutcome, FramingError> {
        match self.position {
            DelimiterPosition::End => match self.delimiter_match(buf, 0) {
                Some(m) => {
                    // The matched delimiter terminates the record ending at
                    // its start; with a capture group, the captured bytes
                    // are appended to that record and the rest of the
                    // match is discarded along with it.
                    let mut record = buf[..m.full.0].to_vec();
                    if let Some((start, end)) = m.captured {
                        record.extend_from_slice(&buf[start..end]);
                    }
                    Ok(SplitOutcome::Record { consumed: m.full.1, record: Bytes::from(record) })
                }
                None => Ok(SplitOutcome::NeedMoreData),
            },
            DelimiterPosition::Start => {
                let Some(first) = self.delimiter_match(buf, 0) else {
                    return Ok(SplitOutcome::NeedMoreData);
                };
                let Some(second) = self.delimiter_match(buf, first.full.1) else {
                    return Ok(SplitOutcome::NeedMoreData);
                };
                // The first match opens this record. Without a capture
                // group its whole matched text is kept as the record's
                // prefix; with one, only the captured bytes are kept and
                // the rest of the match is discarded. The second match
                // stays in the buffer, becoming the next record's opener.
                let mut record = match first.captured {
                    Some((start, end)) => buf[start..end].to_vec(),
                    None => buf[first.full.0..first.full.1].to_vec(),
                };
                record.extend_from_slice(&buf[first.full.1..second.full.0]);
                Ok(SplitOutcome::Record { consumed: second.full.0, record: Bytes::from(record) })
            }
        }
    }
}
