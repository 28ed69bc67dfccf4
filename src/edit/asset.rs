use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::ImageFormat;
use sha2::{Digest, Sha256};

use crate::edit::orchestrator::ValidationError;

const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Immutable image payload held as base64 text.
///
/// Clones share the same buffer, so snapshots pushed into the edit history do
/// not copy the image data.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    media_type: Arc<str>,
    payload: Arc<str>,
}

impl ImageAsset {
    /// Accepts a `data:` URI or bare base64 text.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingImage);
        }

        let (header, payload) = match trimmed.split_once(',') {
            Some((header, payload)) => (Some(header), payload.trim()),
            None => (None, trimmed),
        };
        if payload.is_empty() {
            return Err(ValidationError::InvalidImage(String::from(
                "image payload is empty",
            )));
        }

        let bytes = BASE64_STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| ValidationError::InvalidImage(format!("image base64 decode failed: {e}")))?;

        let media_type = header
            .and_then(media_type_from_data_uri_header)
            .or_else(|| sniff_media_type(bytes.as_slice()))
            .unwrap_or_else(|| String::from(FALLBACK_MEDIA_TYPE));

        Ok(Self {
            media_type: Arc::from(media_type),
            payload: Arc::from(payload),
        })
    }

    pub fn from_bytes(bytes: &[u8], media_type: Option<&str>) -> Result<Self, ValidationError> {
        if bytes.is_empty() {
            return Err(ValidationError::InvalidImage(String::from(
                "image payload is empty",
            )));
        }
        let media_type = media_type
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .or_else(|| sniff_media_type(bytes))
            .unwrap_or_else(|| String::from(FALLBACK_MEDIA_TYPE));

        Ok(Self {
            media_type: Arc::from(media_type),
            payload: Arc::from(BASE64_STANDARD.encode(bytes)),
        })
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Base64 text without any data URI prefix.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.payload)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(self.payload.as_bytes())
    }

    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.payload.as_bytes());
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{byte:02x}");
        }
        out
    }

    pub fn file_extension(&self) -> &'static str {
        match self.media_type.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => "png",
        }
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("media_type", &self.media_type)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

fn media_type_from_data_uri_header(header: &str) -> Option<String> {
    let rest = header.trim().strip_prefix("data:")?;
    let media_type = rest.split(';').next().unwrap_or_default().trim();
    if media_type.is_empty() {
        return None;
    }
    Some(media_type.to_ascii_lowercase())
}

fn sniff_media_type(bytes: &[u8]) -> Option<String> {
    let format = image::guess_format(bytes).ok()?;
    let media_type = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        _ => return None,
    };
    Some(String::from(media_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn parse_strips_data_uri_prefix_and_keeps_media_type() {
        let payload = BASE64_STANDARD.encode(b"jpeg-ish bytes");
        let asset = ImageAsset::parse(&format!("data:image/jpeg;base64,{payload}"))
            .expect("data uri should parse");

        assert_eq!(asset.payload(), payload);
        assert_eq!(asset.media_type(), "image/jpeg");
        assert_eq!(asset.file_extension(), "jpg");
    }

    #[test]
    fn parse_sniffs_media_type_for_bare_base64() {
        let asset = ImageAsset::parse(&BASE64_STANDARD.encode(PNG_SIGNATURE))
            .expect("bare base64 should parse");

        assert_eq!(asset.media_type(), "image/png");
        assert_eq!(
            asset.to_data_uri(),
            format!("data:image/png;base64,{}", BASE64_STANDARD.encode(PNG_SIGNATURE))
        );
    }

    #[test]
    fn parse_falls_back_to_octet_stream_for_unknown_bytes() {
        let asset = ImageAsset::parse(&BASE64_STANDARD.encode(b"not an image"))
            .expect("unknown bytes are still an opaque payload");
        assert_eq!(asset.media_type(), FALLBACK_MEDIA_TYPE);
        assert_eq!(asset.file_extension(), "png");
    }

    #[test]
    fn parse_rejects_empty_and_invalid_payloads() {
        assert!(matches!(
            ImageAsset::parse("   "),
            Err(ValidationError::MissingImage)
        ));
        assert!(matches!(
            ImageAsset::parse("data:image/png;base64,"),
            Err(ValidationError::InvalidImage(_))
        ));
        assert!(matches!(
            ImageAsset::parse("%%% not base64 %%%"),
            Err(ValidationError::InvalidImage(_))
        ));
    }

    #[test]
    fn from_bytes_round_trips_through_decode() {
        let asset = ImageAsset::from_bytes(PNG_SIGNATURE, None).expect("bytes should load");
        assert_eq!(asset.media_type(), "image/png");
        assert_eq!(
            asset.decode_bytes().expect("payload should decode"),
            PNG_SIGNATURE.to_vec()
        );
    }

    #[test]
    fn fingerprint_is_stable_and_content_addressed() {
        let a = ImageAsset::from_bytes(b"first", Some("image/png")).expect("asset a");
        let b = ImageAsset::from_bytes(b"second", Some("image/png")).expect("asset b");

        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
