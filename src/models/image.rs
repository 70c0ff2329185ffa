use std::path::Path;

use image::ImageFormat;
use tracing::warn;

use crate::error::ClientError;

/// Type assumed when neither the declared type nor the bytes identify the image.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// MIME types the service accepts, with the file extension sent alongside.
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/heic", "heic"),
    ("image/heif", "heif"),
    ("image/gif", "gif"),
    ("image/bmp", "bmp"),
    ("image/webp", "webp"),
];

/// Raw label image plus its resolved MIME type, owned by the client until
/// the service has accepted the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    bytes: Vec<u8>,
    mime_type: &'static str,
}

impl ImageUpload {
    /// Build an upload from bytes and a declared MIME type.
    ///
    /// An unrecognized type is not an error: the bytes are sniffed, and if
    /// that fails too the image is sent as JPEG.
    pub fn new(bytes: Vec<u8>, declared_mime: &str) -> Result<Self, ClientError> {
        if bytes.is_empty() {
            return Err(ClientError::InvalidInput("image is empty".to_string()));
        }
        let mime_type = resolve_mime_type(&bytes, declared_mime);
        Ok(Self { bytes, mime_type })
    }

    /// Read an image from disk, taking the declared type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
        })?;
        let declared = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(mime_for_extension)
            .unwrap_or("");
        Self::new(bytes, declared)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name for the multipart part. The service rejects names without
    /// an image extension, so it always matches the resolved type.
    pub fn file_name(&self) -> String {
        let ext = KNOWN_TYPES
            .iter()
            .find(|(mime, _)| *mime == self.mime_type)
            .map(|(_, ext)| *ext)
            .unwrap_or("jpg");
        format!("photo.{}", ext)
    }
}

/// Map a file extension to a MIME type. Unknown extensions yield `""`.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "",
    }
}

fn resolve_mime_type(bytes: &[u8], declared: &str) -> &'static str {
    let normalized = declared
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let normalized = if normalized == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        normalized
    };

    if let Some(&(mime, _)) = KNOWN_TYPES.iter().find(|(mime, _)| *mime == normalized) {
        return mime;
    }

    match image::guess_format(bytes).ok().and_then(sniffed_mime_type) {
        Some(sniffed) => {
            warn!(declared = %declared, detected = sniffed, "Unrecognized image type, using detected format");
            sniffed
        }
        None => {
            warn!(declared = %declared, fallback = DEFAULT_MIME_TYPE, "Unrecognized image type, sending as JPEG");
            DEFAULT_MIME_TYPE
        }
    }
}

fn sniffed_mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}
