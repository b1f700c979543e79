use thiserror::Error;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("failed to compile splitter regex: {0}")]
    RegexCompile(#[source] regex::Error),
    #[error("underlying stream read failed: {0}")]
    Io(#[source] std::io::Error),
}
