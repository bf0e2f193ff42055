//! Artifact text encoding
//!
//! Artifacts are stored as data URLs: `data:<media-type>;base64,<payload>`.
//! The media type travels with the bytes, so a stored clip can be decoded
//! without any side information.

use crate::recorder::Artifact;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),
}

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::MalformedEncoding(reason.into())
}

/// Encode an artifact as a data URL
pub fn encode(artifact: &Artifact) -> String {
    let payload = BASE64.encode(artifact.bytes());
    let capacity =
        DATA_PREFIX.len() + artifact.mime_type().len() + BASE64_MARKER.len() + payload.len();
    let mut text = String::with_capacity(capacity);
    text.push_str(DATA_PREFIX);
    text.push_str(artifact.mime_type());
    text.push_str(BASE64_MARKER);
    text.push_str(&payload);
    text
}

/// Decode a data URL back into an artifact
pub fn decode(text: &str) -> Result<Artifact, CodecError> {
    let rest = text
        .strip_prefix(DATA_PREFIX)
        .ok_or_else(|| malformed("missing 'data:' prefix"))?;

    let (mime_type, payload) = rest
        .split_once(BASE64_MARKER)
        .ok_or_else(|| malformed("missing ';base64,' marker"))?;

    if !is_media_type(mime_type) {
        return Err(malformed(format!("invalid media type '{}'", mime_type)));
    }
    if payload.is_empty() {
        return Err(malformed("empty payload"));
    }

    let bytes = BASE64
        .decode(payload)
        .map_err(|e| malformed(format!("invalid base64 payload: {}", e)))?;
    if bytes.is_empty() {
        return Err(malformed("empty payload"));
    }

    Ok(Artifact::new(mime_type, bytes))
}

/// Check that an artifact's encoding would decode again
pub fn validate(artifact: &Artifact) -> Result<(), CodecError> {
    if !is_media_type(artifact.mime_type()) {
        return Err(malformed(format!(
            "invalid media type '{}'",
            artifact.mime_type()
        )));
    }
    if artifact.is_empty() {
        return Err(malformed("empty payload"));
    }
    Ok(())
}

/// Whether `text` decodes to an artifact
pub fn is_well_formed(text: &str) -> bool {
    decode(text).is_ok()
}

/// `type/subtype` with optional `;key=value` parameters
fn is_media_type(value: &str) -> bool {
    let mut parts = value.split(';');
    let essence = parts.next().unwrap_or("");
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    let is_token = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
    };
    is_token(kind)
        && is_token(subtype)
        && parts.all(|param| {
            param
                .split_once('=')
                .is_some_and(|(key, val)| is_token(key.trim()) && !val.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let artifact = Artifact::new("video/webm", b"hello".to_vec());
        assert_eq!(encode(&artifact), "data:video/webm;base64,aGVsbG8=");
    }

    #[test]
    fn test_decode_restores_artifact() {
        let artifact = Artifact::new("video/mp4", vec![0, 1, 2, 253, 254, 255]);
        let decoded = decode(&encode(&artifact)).unwrap();
        assert_eq!(decoded, artifact);
    }

    #[test]
    fn test_media_type_parameters_are_kept() {
        let artifact = Artifact::new("video/webm;codecs=vp8", b"x".to_vec());
        let decoded = decode(&encode(&artifact)).unwrap();
        assert_eq!(decoded.mime_type(), "video/webm;codecs=vp8");
    }

    #[test]
    fn test_rejects_malformed_text() {
        let cases = [
            "",
            "video/webm;base64,aGVsbG8=",
            "data:;base64,aGVsbG8=",
            "data:video;base64,aGVsbG8=",
            "data:video/webm,aGVsbG8=",
            "data:video/webm;base64,",
            "data:video/webm;base64,not base64!",
            "data:video/webm;codecs;base64,aGVsbG8=",
        ];
        for text in cases {
            assert!(
                matches!(decode(text), Err(CodecError::MalformedEncoding(_))),
                "accepted {:?}",
                text
            );
            assert!(!is_well_formed(text));
        }
    }

    #[test]
    fn test_validate_rejects_what_decode_would_reject() {
        assert!(validate(&Artifact::new("video/webm", b"x".to_vec())).is_ok());
        assert!(matches!(
            validate(&Artifact::new("video/webm", Vec::new())),
            Err(CodecError::MalformedEncoding(_))
        ));
        assert!(matches!(
            validate(&Artifact::new("webm", b"x".to_vec())),
            Err(CodecError::MalformedEncoding(_))
        ));
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("data:video/webm;base64,aGVsbG8="));
    }
}
