use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// An image held inline as mime type plus base64 text, the same shape as a
/// `data:` URI. The base64 text is only decoded when the image is embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    pub base64: String,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, base64: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            base64: base64.into(),
        }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, BASE64.encode(bytes))
    }

    /// Reads an image file; the mime type comes from the extension.
    pub fn from_file_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let mime = mime_for_extension(&ext)
            .ok_or_else(|| anyhow!("Unsupported image type: {}", path.display()))?;
        Ok(Self::from_bytes(mime, bytes))
    }

    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("Not a data URI"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("Data URI has no payload"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("Only base64 data URIs are supported"))?;
        let mime = if mime.is_empty() { DEFAULT_IMAGE_MIME } else { mime };
        Ok(Self::new(mime, data))
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.base64.trim().as_bytes())
    }

    pub fn to_data_uri(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.base64)
    }
}

pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_format() {
        let payload = ImagePayload::from_bytes("image/png", b"abc");
        assert_eq!(payload.to_data_uri(), "data:image/png;base64,YWJj");
        assert_eq!(payload.decode().unwrap(), b"abc");
    }

    #[test]
    fn test_parse_data_uri() {
        let payload = ImagePayload::parse("data:image/jpeg;base64,YWJj").unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        assert_eq!(payload.base64, "YWJj");

        assert!(ImagePayload::parse("http://example.com/a.png").is_err());
        assert!(ImagePayload::parse("data:image/png,rawtext").is_err());
    }

    #[test]
    fn test_corrupt_base64_fails_to_decode() {
        let payload = ImagePayload::new("image/png", "!!not base64!!");
        assert!(payload.decode().is_err());
    }

    #[test]
    fn test_mime_from_extension() {
        let payload = ImagePayload::from_file_bytes(Path::new("cover.JPG"), b"x").unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
        assert!(ImagePayload::from_file_bytes(Path::new("cover.bmp"), b"x").is_err());
        assert!(ImagePayload::from_file_bytes(Path::new("cover"), b"x").is_err());
    }
}
