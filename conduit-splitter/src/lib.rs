//! Splitters that find self-delimited records in a byte stream: a fixed
//! token, a regular expression, or a length-prefixed frame with optional
//! HMAC authentication.

mod error;
mod framed;
mod regex;
mod splitter;
mod token;

pub use error::FramingError;
pub use framed::{FramedSplitter, HmacHashFunction, KeyProvider};
pub use regex::{DelimiterPosition, RegexSplitter};
pub use splitter::{SkipReason, SplitOutcome, Splitter, StreamSplitter};
pub use token::TokenSplitter;
