use std::path::{Path, PathBuf};

use crate::error::SpoolError;

pub(crate) fn segment_path(dir: &Path, id: u64) -> PathBuf {
    dir.join(format!("{id}.log"))
}

/// Scans a spool directory for `<id>.log` segment files and returns the
/// minimum and maximum ids present, if any.
pub(crate) async fn discover_segments(dir: &Path) -> Result<Option<(u64, u64)>, SpoolError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut min = None;
    let mut max = None;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".log") else { continue };
        let Ok(id) = stem.parse::<u64>() else { continue };
        min = Some(min.map_or(id, |m: u64| m.min(id)));
        max = Some(max.map_or(id, |m: u64| m.max(id)));
    }
    Ok(min.zip(max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_directory_has_no_segments() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover_segments(dir.path()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn finds_min_and_max_segment_ids() {
        let dir = tempfile::tempdir().unwrap();
        for id in [3, 1, 2] {
            tokio::fs::write(segment_path(dir.path(), id), b"").await.unwrap();
        }
        tokio::fs::write(dir.path().join("checkpoint"), b"").await.unwrap();
        assert_eq!(discover_segments(dir.path()).await.unwrap(), Some((1, 3)));
    }
}
