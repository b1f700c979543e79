use std::sync::Arc;

use bytes::Bytes;
use hmac::{Hmac, Mac};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::error::FramingError;
use crate::splitter::{SkipReason, SplitOutcome, Splitter};

const RECORD_SEPARATOR: u8 = 0x1E;
const UNIT_SEPARATOR: u8 = 0x1F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HmacHashFunction {
    Md5,
    Sha1,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrameHeader {
    message_length: u32,
    hmac: Option<Vec<u8>>,
    hmac_hash_function: Option<HmacHashFunction>,
    hmac_signer: Option<String>,
    hmac_key_version: Option<u32>,
}

/// Looks up the signing key for a given `(signer, key_version)` pair, the
/// same lookup key as the wire format's `"<signer>_<keyVersion>"` string.
pub trait KeyProvider: Send + Sync {
    fn key_for(&self, signer: &str, key_version: u32) -> Option<Vec<u8>>;
}

/// Splits records framed as `RS HL HEADER US BODY`, where `HEADER` is a
/// MessagePack-encoded [`FrameHeader`] and `BODY` is `message_length` bytes
/// of opaque payload. Optionally verifies an HMAC over the body before
/// releasing it.
pub struct FramedSplitter {
    keys: Option<Arc<dyn KeyProvider>>,
    last_signer: Option<String>,
}

impl FramedSplitter {
    pub fn new() -> Self {
        FramedSplitter { keys: None, last_signer: None }
    }

    pub fn with_keys(keys: Arc<dyn KeyProvider>) -> Self {
        FramedSplitter { keys: Some(keys), last_signer: None }
    }

    /// The signer id HMAC-verified on the most recently returned record, if
    /// any. A decoder stamps this onto the envelope it populates from that
    /// record, per the framer's contract (a signer id only ever describes
    /// the single record it was verified alongside).
    pub fn last_signer(&self) -> Option<&str> {
        self.last_signer.as_deref()
    }

    fn verify_hmac(&self, header: &FrameHeader, body: &[u8]) -> bool {
        let (Some(mac_bytes), Some(alg), Some(signer)) =
            (&header.hmac, header.hmac_hash_function, &header.hmac_signer)
        else {
            return true; // unsigned frame, nothing to verify
        };
        let key_version = header.hmac_key_version.unwrap_or(0);
        let Some(keys) = &self.keys else { return false };
        let Some(key) = keys.key_for(signer, key_version) else { return false };

        let computed = match alg {
            HmacHashFunction::Md5 => compute_hmac_md5(&key, body),
            HmacHashFunction::Sha1 => compute_hmac_sha1(&key, body),
        };
        bool::from(computed.ct_eq(mac_bytes))
    }
}

impl Default for FramedSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_hmac_md5(key: &[u8], body: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Md5>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

fn compute_hmac_sha1(key: &[u8], body: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

impl Splitter for FramedSplitter {
    fn find_record(&mut self, buf: &[u8]) -> Result<SplitOutcome, FramingError> {
        let Some(rs) = buf.iter().position(|&b| b == RECORD_SEPARATOR) else {
            return Ok(SplitOutcome::NeedMoreData);
        };
        if rs > 0 {
            return Ok(SplitOutcome::Skip { consumed: rs, reason: SkipReason::Resync });
        }

        if buf.len() < 2 {
            return Ok(SplitOutcome::NeedMoreData);
        }
        let header_len = buf[1] as usize;
        let header_start = 2;
        let header_end = header_start + header_len;
        if buf.len() < header_end + 1 {
            return Ok(SplitOutcome::NeedMoreData);
        }
        if buf[header_end] != UNIT_SEPARATOR {
            return Ok(SplitOutcome::Skip { consumed: 1, reason: SkipReason::Resync });
        }

        let header: FrameHeader = match rmp_serde::from_slice(&buf[header_start..header_end]) {
            Ok(h) => h,
            Err(_) => return Ok(SplitOutcome::Skip { consumed: 1, reason: SkipReason::Resync }),
        };

        let body_start = header_end + 1;
        let body_end = body_start + header.message_length as usize;
        if buf.len() < body_end {
            return Ok(SplitOutcome::NeedMoreData);
        }
        let body = &buf[body_start..body_end];

        if self.verify_hmac(&header, body) {
            self.last_signer = header.hmac_signer.clone();
            Ok(SplitOutcome::Record { consumed: body_end, record: Bytes::copy_from_slice(body) })
        } else {
            Ok(SplitOutcome::Skip { consumed: body_end, reason: SkipReason::AuthFailure })
        }
    }
}
