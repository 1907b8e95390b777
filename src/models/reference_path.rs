//! The `soubise://` capability string handed from sender to receiver.
//!
//! ```text
//! soubise://<base64url(server)>/<id>/<encryption key>[/<owner key>]
//! ```
//!
//! Knowing the id is enough to download the ciphertext from the server; the
//! encryption key is what makes it readable. Reference paths are built and
//! consumed by clients only and never reach the server.

use crate::errors::{StoreError, StoreResult};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use std::{fmt, str::FromStr};

pub const PREFIX: &str = "soubise://";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferencePath {
    /// Base URL of the server holding the archive.
    pub server: String,

    /// Opaque object id issued by the server.
    pub id: String,

    /// URL-safe base64 key material used to seal the archive.
    pub encryption_key: String,

    /// Reserved for a future management capability.
    pub owner_key: Option<String>,
}

impl ReferencePath {
    pub fn new(
        server: impl Into<String>,
        id: impl Into<String>,
        encryption_key: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            id: id.into(),
            encryption_key: encryption_key.into(),
            owner_key: None,
        }
    }

    /// Render the canonical textual form.
    pub fn encode(&self) -> String {
        let server = URL_SAFE.encode(self.server.as_bytes());
        match &self.owner_key {
            Some(owner) => format!(
                "{PREFIX}{server}/{}/{}/{owner}",
                self.id, self.encryption_key
            ),
            None => format!("{PREFIX}{server}/{}/{}", self.id, self.encryption_key),
        }
    }

    /// Parse a textual reference path.
    pub fn decode(input: &str) -> StoreResult<Self> {
        let invalid =
            || StoreError::Decode(format!("provided {input} is not a valid reference path"));

        let rest = input.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let segments: Vec<&str> = rest.split('/').collect();
        if !(3..=4).contains(&segments.len()) || !segments.iter().all(|s| is_segment(s)) {
            return Err(invalid());
        }

        let server = URL_SAFE
            .decode(segments[0])
            .map_err(|err| StoreError::Decode(format!("decoding server of {input}: {err}")))?;
        let server = String::from_utf8(server)
            .map_err(|err| StoreError::Decode(format!("decoding server of {input}: {err}")))?;

        Ok(Self {
            server,
            id: segments[1].to_string(),
            encryption_key: segments[2].to_string(),
            owner_key: segments.get(3).map(|s| s.to_string()),
        })
    }
}

/// Segments are drawn from the URL-safe base64 alphabet plus padding.
fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='))
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ReferencePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReferencePath {
        ReferencePath::new(
            "https://pub.soubise.org:8080/base",
            "q0vPx1bKD-2_aZ9yLr3mNw4T",
            "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8gISIjJCUmJygpKis=",
        )
    }

    #[test]
    fn encode_uses_canonical_form() {
        let reference = sample();
        let encoded = reference.encode();
        assert!(encoded.starts_with(PREFIX));
        assert_eq!(encoded.matches('/').count(), 4);
        assert!(encoded.ends_with(&format!("/{}/{}", reference.id, reference.encryption_key)));
    }

    #[test]
    fn decode_inverts_encode() {
        let reference = sample();
        assert_eq!(ReferencePath::decode(&reference.encode()).unwrap(), reference);

        let with_owner = ReferencePath {
            owner_key: Some("b3duZXI=".into()),
            ..sample()
        };
        let encoded = with_owner.to_string();
        assert!(encoded.ends_with("/b3duZXI="));
        assert_eq!(encoded.parse::<ReferencePath>().unwrap(), with_owner);
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        let encoded = format!("{}/", sample().encode());
        assert_eq!(ReferencePath::decode(&encoded).unwrap(), sample());
    }

    #[test]
    fn rejects_paths_outside_the_grammar() {
        let cases = [
            "https://example.com/a/b/c",
            "soubise://",
            "soubise://aGk=/only-id",
            "soubise://aGk=/id/key/owner/extra",
            "soubise://aGk=/id//key",
            "soubise://aGk=/i.d/key",
            "soubise://aGk=/id/k ey",
        ];

        for case in cases {
            match ReferencePath::decode(case) {
                Err(StoreError::Decode(msg)) => {
                    assert!(msg.contains("not a valid reference path"), "{case}: {msg}")
                }
                other => panic!("{case}: expected decode failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn undecodable_server_is_reported() {
        let err = ReferencePath::decode("soubise://a/id/key").unwrap_err();
        assert!(err.to_string().contains("decoding server"));
    }
}
