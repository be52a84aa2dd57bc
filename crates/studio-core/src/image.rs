//! Image payloads for the image studio.
//!
//! Images travel as raw bytes plus a media type. At the edges they are
//! base64 strings or `data:` URLs, the form browsers hand out for uploads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

// ============================================================================
// ImageFormat
// ============================================================================

/// Image media types accepted by the image provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG image format.
    Png,
    /// JPEG image format.
    Jpeg,
    /// GIF image format.
    Gif,
    /// WebP image format.
    Webp,
    /// HEIC image format.
    Heic,
    /// HEIF image format.
    Heif,
}

impl ImageFormat {
    /// Detects the format from a MIME type such as `image/png`.
    ///
    /// Parameters after `;` are ignored. Returns `None` for anything else.
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::Webp),
            "image/heic" => Some(Self::Heic),
            "image/heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Detects the format from a file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "heic" => Some(Self::Heic),
            "heif" => Some(Self::Heif),
            _ => None,
        }
    }

    /// Canonical MIME type.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
            Self::Heif => "image/heif",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Gif => write!(f, "gif"),
            Self::Webp => write!(f, "webp"),
            Self::Heic => write!(f, "heic"),
            Self::Heif => write!(f, "heif"),
        }
    }
}

// ============================================================================
// ImagePayload
// ============================================================================

/// Image bytes tagged with their format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    format: ImageFormat,
    bytes: Vec<u8>,
}

impl ImagePayload {
    /// Wraps raw bytes.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::InvalidImage` if `bytes` is empty.
    pub fn new(format: ImageFormat, bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(StudioError::invalid_image("image data is empty"));
        }
        Ok(Self { format, bytes })
    }

    /// Decodes base64 image data with the given MIME type.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::InvalidImage` for an unsupported MIME type,
    /// invalid base64, or empty data.
    pub fn from_base64(mime_type: &str, data: &str) -> Result<Self> {
        let format = ImageFormat::from_mime_type(mime_type).ok_or_else(|| {
            StudioError::invalid_image(format!("unsupported media type '{mime_type}'"))
        })?;
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| StudioError::invalid_image(format!("invalid base64 data: {e}")))?;
        Self::new(format, bytes)
    }

    /// Parses a `data:<mime>;base64,<data>` URL.
    ///
    /// # Errors
    ///
    /// Returns `StudioError::InvalidImage` if the URL is not a base64 data URL
    /// or its payload is rejected by [`ImagePayload::from_base64`].
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .trim()
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::invalid_image("not a data URL"))?;
        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| StudioError::invalid_image("data URL has no payload"))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| StudioError::invalid_image("data URL is not base64 encoded"))?;
        Self::from_base64(mime_type, data)
    }

    /// Image format.
    #[must_use]
    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    /// MIME type of the image.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`; empty payloads are rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64 encoding of the bytes.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// Formats the image as a `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }

    /// Wire form with base64 bytes and a data URL.
    #[must_use]
    pub fn to_encoded(&self) -> EncodedImage {
        EncodedImage {
            mime_type: self.mime_type().to_string(),
            image_bytes: self.to_base64(),
            data_url: self.to_data_url(),
        }
    }
}

/// Image as sent to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    /// MIME type.
    pub mime_type: String,
    /// Base64 bytes.
    pub image_bytes: String,
    /// Same image as a `data:` URL.
    pub data_url: String,
}

// ============================================================================
// ImageStudio
// ============================================================================

/// State owned by the image studio view.
#[derive(Debug, Clone, Default)]
pub struct ImageStudio {
    /// The uploaded image.
    pub source: Option<ImagePayload>,
    /// The latest transformed image.
    pub result: Option<ImagePayload>,
}

impl ImageStudio {
    /// Replaces the source image and clears any previous result.
    pub fn set_source(&mut self, image: ImagePayload) {
        self.source = Some(image);
        self.result = None;
    }

    /// Drops both images.
    pub fn clear(&mut self) {
        self.source = None;
        self.result = None;
    }

    /// Renders the studio for the snapshot.
    #[must_use]
    pub fn view(&self, transforming: bool) -> ImageStudioView {
        ImageStudioView {
            source: self.source.as_ref().map(ImageInfo::of),
            result: self.result.as_ref().map(ImageInfo::of),
            transforming,
        }
    }
}

/// Metadata about a stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: usize,
}

impl ImageInfo {
    fn of(image: &ImagePayload) -> Self {
        Self {
            mime_type: image.mime_type().to_string(),
            size: image.len(),
        }
    }
}

/// Snapshot of the image studio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStudioView {
    /// Uploaded image, if any.
    pub source: Option<ImageInfo>,
    /// Transformed image, if any.
    pub result: Option<ImageInfo>,
    /// Whether a transform is outstanding.
    pub transforming: bool,
}
