use crate::error::CheckpointError;

/// Parses a spool checkpoint file's content: exactly two whitespace
/// separated decimal tokens, `"<readId> <readOffset>"`.
pub fn parse(content: &str) -> Result<(u64, u64), CheckpointError> {
    let mut tokens = content.split_whitespace();
    let id_tok = tokens.next().ok_or(CheckpointError::InvalidFormat)?;
    let offset_tok = tokens.next().ok_or(CheckpointError::InvalidFormat)?;
    if tokens.next().is_some() {
        return Err(CheckpointError::InvalidFormat);
    }
    let read_id = id_tok.parse::<u64>().map_err(|_| CheckpointError::InvalidId)?;
    let read_offset = offset_tok.parse::<u64>().map_err(|_| CheckpointError::InvalidOffset)?;
    Ok((read_id, read_offset))
}

/// Renders a checkpoint back to its on-disk textual form.
pub fn format(read_id: u64, read_offset: u64) -> String {
    format!("{read_id} {read_offset}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_checkpoint_parses() {
        assert_eq!(parse("43 22"), Ok((43, 22)));
    }

    #[test]
    fn empty_content_is_invalid_format() {
        assert_eq!(parse(""), Err(CheckpointError::InvalidFormat));
    }

    #[test]
    fn single_token_is_invalid_format() {
        assert_eq!(parse("22"), Err(CheckpointError::InvalidFormat));
    }

    #[test]
    fn three_tokens_is_invalid_format() {
        assert_eq!(parse("43 22 1"), Err(CheckpointError::InvalidFormat));
    }

    #[test]
    fn non_integer_id_is_invalid_id() {
        assert_eq!(parse("aa 22"), Err(CheckpointError::InvalidId));
    }

    #[test]
    fn non_integer_offset_is_invalid_offset() {
        assert_eq!(parse("43 aa"), Err(CheckpointError::InvalidOffset));
    }

    #[test]
    fn round_trips_through_format() {
        let (id, offset) = parse(&format(7, 1024)).unwrap();
        assert_eq!((id, offset), (7, 1024));
    }
}
