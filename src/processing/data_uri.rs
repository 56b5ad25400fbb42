//! Base64 data URIs (`data:<mime>;base64,<payload>`), the in-memory image
//! representation handed from acquisition to panels.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose};

/// Fallback mime type when neither extension nor content identify the image.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Encode raw bytes as a base64 data URI.
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// A parsed base64 data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DataUri {
    /// Parse a `data:` URI with a base64 payload.
    pub fn parse(uri: &str) -> Result<Self, String> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| "missing 'data:' prefix".to_string())?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| "missing ',' separator".to_string())?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| "payload is not base64 encoded".to_string())?;
        if mime.is_empty() {
            return Err("missing mime type".to_string());
        }
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| format!("invalid base64 payload: {}", e))?;
        Ok(Self {
            mime: mime.to_string(),
            bytes,
        })
    }
}

/// Mime type for an image file, judged by its extension.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        "heic" => "image/heic",
        _ => return None,
    };
    Some(mime)
}

/// Mime type for image bytes, judged by their magic number.
pub fn mime_from_content(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|format| format.to_mime_type())
}
