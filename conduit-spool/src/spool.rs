use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::checkpoint;
use crate::error::SpoolError;
use crate::segment::{discover_segments, segment_path};

const CHECKPOINT_FILE: &str = "checkpoint";
const CHECKPOINT_TMP_FILE: &str = "checkpoint.tmp";
const DEFAULT_MAX_SEGMENT_BYTES: u64 = 16 * 1024 * 1024;

struct SpoolState {
    write_id: u64,
    write_file: File,
    write_len: u64,
    read_id: u64,
    read_offset: u64,
    read_file: Option<File>,
}

/// A durable, file-backed, single-producer/single-consumer FIFO.
///
/// Records are opaque byte slices; callers are expected to hand `conduit`
/// envelopes already serialized to their framed wire form (§6) — the spool
/// itself only worries about appending, rolling, and replaying them.
pub struct Spool {
    dir: PathBuf,
    max_segment_bytes: u64,
    state: Mutex<SpoolState>,
}

impl Spool {
    /// Opens (creating if necessary) a spool directory, reconciling any
    /// existing segments against the persisted checkpoint per §4.4's
    /// `startup()` contract.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, SpoolError> {
        Self::open_with_max_segment_bytes(dir, DEFAULT_MAX_SEGMENT_BYTES).await
    }

    pub async fn open_with_max_segment_bytes(
        dir: impl AsRef<Path>,
        max_segment_bytes: u64,
    ) -> Result<Self, SpoolError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let (min, max) = match discover_segments(&dir).await? {
            Some(bounds) => bounds,
            None => {
                let path = segment_path(&dir, 0);
                OpenOptions::new().create(true).write(true).open(&path).await?;
                (0, 0)
            }
        };

        let write_file =
            OpenOptions::new().append(true).create(true).open(segment_path(&dir, max)).await?;
        let write_len = write_file.metadata().await?.len();

        let (read_id, read_offset) = match read_checkpoint(&dir).await? {
            None => (min, 0),
            Some((read_id, read_offset)) if read_id > max => {
                tracing::warn!(
                    checkpoint_read_id = read_id,
                    max_segment = max,
                    "spool checkpoint names a segment past the highest on disk, resuming at the tail"
                );
                (max, 0)
            }
            Some((read_id, _)) if read_id < min => {
                tracing::warn!(
                    checkpoint_read_id = read_id,
                    min_segment = min,
                    "spool checkpoint names a segment no longer on disk, resuming at the oldest available"
                );
                (min, 0)
            }
            Some(pos) => pos,
        };

        Ok(Spool {
            dir,
            max_segment_bytes,
            state: Mutex::new(SpoolState {
                write_id: max,
                write_file,
                write_len,
                read_id,
                read_offset,
                read_file: None,
            }),
        })
    }

    /// Appends a record to the current write segment, rolling to a new
    /// segment first if doing so would exceed `max_segment_bytes`.
    ///
    /// Single-producer contract: concurrent callers serialize on this
    /// method's internal lock, but the spool assumes records arrive from
    /// one logical producer — interleaving from independent producers
    /// would still be safe but breaks per-producer ordering.
    pub async fn queue_record(&self, record: &[u8]) -> Result<(), SpoolError> {
        let mut state = self.state.lock().await;
        let record_on_disk_len = 4 + record.len() as u64;
        if state.write_len > 0 && state.write_len + record_on_disk_len > self.max_segment_bytes {
            self.roll(&mut state).await?;
        }
        state.write_file.write_all(&(record.len() as u32).to_be_bytes()).await?;
        state.write_file.write_all(record).await?;
        state.write_file.flush().await?;
        state.write_len += record_on_disk_len;
        Ok(())
    }

    async fn roll(&self, state: &mut SpoolState) -> Result<(), SpoolError> {
        state.write_file.sync_all().await?;
        state.write_id += 1;
        state.write_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(segment_path(&self.dir, state.write_id))
            .await?;
        state.write_len = 0;
        Ok(())
    }

    /// Reads the next record starting from the persisted read cursor,
    /// advancing across segment boundaries as needed. Returns `None` when
    /// the queue has no complete record available yet.
    pub async fn read_next(&self) -> Result<Option<Bytes>, SpoolError> {
        let mut state = self.state.lock().await;
        loop {
            if state.read_file.is_none() {
                let path = segment_path(&self.dir, state.read_id);
                state.read_file = Some(OpenOptions::new().read(true).open(path).await?);
            }
            let read_id = state.read_id;
            let read_offset = state.read_offset;
            let write_id = state.write_id;
            let file = state.read_file.as_mut().expect("just populated above");
            file.seek(SeekFrom::Start(read_offset)).await?;

            let mut len_buf = [0u8; 4];
            let header_bytes = read_fully(file, &mut len_buf).await?;
            if header_bytes == 0 {
                if read_id < write_id {
                    state.read_id += 1;
                    state.read_offset = 0;
                    state.read_file = None;
                    continue;
                }
                return Ok(None);
            }
            if header_bytes < len_buf.len() {
                // Partial header: the writer hasn't finished this record yet.
                return Ok(None);
            }

            let len = u32::from_be_bytes(len_buf) as usize;
            let mut body = vec![0u8; len];
            let body_bytes = read_fully(file, &mut body).await?;
            if body_bytes < len {
                if read_id < write_id {
                    return Err(SpoolError::Corruption(
                        read_id,
                        "segment truncated mid-record".into(),
                    ));
                }
                return Ok(None);
            }

            state.read_offset = read_offset + 4 + len as u64;
            return Ok(Some(Bytes::from(body)));
        }
    }

    /// Persists `(readId, readOffset)` as the committed checkpoint,
    /// reflecting the cursor left by the most recent successful
    /// [`Spool::read_next`].
    pub async fn commit(&self) -> Result<(), SpoolError> {
        let state = self.state.lock().await;
        write_checkpoint(&self.dir, state.read_id, state.read_offset).await
    }

    pub async fn position(&self) -> (u64, u64) {
        let state = self.state.lock().await;
        (state.read_id, state.read_offset)
    }
}

/// Reads until `buf` is full or the file is exhausted, returning the number
/// of bytes actually read (which may be 0 or a partial fill at EOF).
async fn read_fully(file: &mut File, buf: &mut [u8]) -> Result<usize, SpoolError> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..]).await?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

async fn read_checkpoint(dir: &Path) -> Result<Option<(u64, u64)>, SpoolError> {
    let path = dir.join(CHECKPOINT_FILE);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(Some(checkpoint::parse(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_checkpoint(dir: &Path, read_id: u64, read_offset: u64) -> Result<(), SpoolError> {
    let tmp_path = dir.join(CHECKPOINT_TMP_FILE);
    let mut tmp = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path).await?;
    tmp.write_all(checkpoint::format(read_id, read_offset).as_bytes()).await?;
    tmp.sync_all().await?;
    tokio::fs::rename(&tmp_path, dir.join(CHECKPOINT_FILE)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_and_read_round_trips_a_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::open(dir.path()).await.unwrap();
        spool.queue_record(b"hello").await.unwrap();
        assert_eq!(spool.read_next().await.unwrap().as_deref(), Some(&b"hello"[..]));
        assert_eq!(spool.read_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn reads_multiple_records_in_fifo_order() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::open(dir.path()).await.unwrap();
        for rec in [&b"a"[..], b"bb", b"ccc"] {
            spool.queue_record(rec).await.unwrap();
        }
        assert_eq!(spool.read_next().await.unwrap().as_deref(), Some(&b"a"[..]));
        assert_eq!(spool.read_next().await.unwrap().as_deref(), Some(&b"bb"[..]));
        assert_eq!(spool.read_next().await.unwrap().as_deref(), Some(&b"ccc"[..]));
        assert_eq!(spool.read_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn commit_and_restart_resumes_exactly_at_the_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        {
            let spool = Spool::open(dir.path()).await.unwrap();
            for i in 0..5u8 {
                spool.queue_record(&[i]).await.unwrap();
            }
            // read and commit the first two records
            spool.read_next().await.unwrap();
            spool.read_next().await.unwrap();
            spool.commit().await.unwrap();
        }
        let spool = Spool::open(dir.path()).await.unwrap();
        let next = spool.read_next().await.unwrap().unwrap();
        assert_eq!(&next[..], &[2]);
    }

    #[tokio::test]
    async fn rolls_to_a_new_segment_when_the_max_size_is_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let spool = Spool::open_with_max_segment_bytes(dir.path(), 10).await.unwrap();
        spool.queue_record(b"12345").await.unwrap(); // 9 bytes on disk, fits
        spool.queue_record(b"67890").await.unwrap(); // would exceed 10, rolls
        assert!(tokio::fs::metadata(segment_path(dir.path(), 1)).await.is_ok());
        assert_eq!(spool.read_next().await.unwrap().as_deref(), Some(&b"12345"[..]));
        assert_eq!(spool.read_next().await.unwrap().as_deref(), Some(&b"67890"[..]));
    }

    #[tokio::test]
    async fn missing_checkpoint_resumes_at_the_oldest_segment() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(segment_path(dir.path(), 3), b"").await.unwrap();
        tokio::fs::write(segment_path(dir.path(), 5), b"").await.unwrap();
        let spool = Spool::open(dir.path()).await.unwrap();
        assert_eq!(spool.position().await, (3, 0));
    }

    #[tokio::test]
    async fn checkpoint_beyond_the_highest_segment_resumes_at_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(segment_path(dir.path(), 0), b"").await.unwrap();
        write_checkpoint(dir.path(), 99, 0).await.unwrap();
        let spool = Spool::open(dir.path()).await.unwrap();
        assert_eq!(spool.position().await, (0, 0));
    }
}
