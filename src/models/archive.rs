//! The envelope persisted for every shared file.

use crate::errors::{StoreError, StoreResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An encrypted file together with its name and the moment it stops being
/// downloadable.
///
/// `content` always holds AEAD ciphertext; the server never sees plaintext.
/// An archive is immutable: a new expiry or payload means a new archive.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Archive {
    /// Original file name, used by the receiver when writing to disk.
    name: String,

    /// Sealed file content.
    content: Vec<u8>,

    /// Absolute expiry instant.
    #[serde(with = "chrono::serde::ts_nanoseconds")]
    expiry: DateTime<Utc>,
}

impl Archive {
    pub fn new(name: impl Into<String>, content: Vec<u8>, expiry: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            content,
            expiry,
        }
    }

    /// Build an archive that expires `lifetime` from now.
    ///
    /// Fails with [`StoreError::Encode`] when the expiry cannot be encoded.
    pub fn with_lifetime(
        name: impl Into<String>,
        content: Vec<u8>,
        lifetime: Duration,
    ) -> StoreResult<Self> {
        Ok(Self::new(name, content, expiry_after(Utc::now(), lifetime)?))
    }

    /// Decode an archive from its wire form.
    ///
    /// Rejects truncated input, unknown layouts and trailing bytes.
    pub fn from_bytes(bin: &[u8]) -> StoreResult<Self> {
        let (archive, rest) = postcard::take_from_bytes::<Archive>(bin)
            .map_err(|err| StoreError::Decode(format!("decoding archive to data: {err}")))?;
        if !rest.is_empty() {
            return Err(StoreError::Decode(format!(
                "decoding archive to data: {} trailing bytes",
                rest.len()
            )));
        }
        Ok(archive)
    }

    /// Encode the archive into its wire form.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        postcard::to_allocvec(self)
            .map_err(|err| StoreError::Encode(format!("encoding data to archive: {err}")))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Whether the archive is past its expiry at the time of the call.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry < now
    }
}

/// `now + lifetime`, provided the result fits the nanosecond timestamp the
/// wire form carries (roughly years 1677 to 2262).
pub fn expiry_after(now: DateTime<Utc>, lifetime: Duration) -> StoreResult<DateTime<Utc>> {
    now.checked_add_signed(lifetime)
        .filter(|expiry| expiry.timestamp_nanos_opt().is_some())
        .ok_or_else(|| {
            StoreError::Encode(format!(
                "lifetime of {lifetime} reaches past the supported expiry range"
            ))
        })
}
