//! Content classification.
//!
//! Upstream stores frequently report `application/octet-stream` for video.
//! The locator's extension is therefore checked against a fixed table first;
//! a known video extension always wins over the reported type.

use super::types::UpstreamLocator;

/// Fallback MIME type when nothing better is known.
pub const GENERIC_BINARY_MIME: &str = "application/octet-stream";

/// Reported types that carry no real information.
const GENERIC_MIME_TYPES: &[&str] = &[GENERIC_BINARY_MIME, "binary/octet-stream"];

/// Media formats the gateway recognises by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Mp4,
    Webm,
    QuickTime,
    Matroska,
    Avi,
    Ogv,
    ThreeGp,
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

impl MediaFormat {
    /// Look up a format by lowercase extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let format = match ext {
            "mp4" | "m4v" => MediaFormat::Mp4,
            "webm" => MediaFormat::Webm,
            "mov" => MediaFormat::QuickTime,
            "mkv" => MediaFormat::Matroska,
            "avi" => MediaFormat::Avi,
            "ogv" => MediaFormat::Ogv,
            "3gp" => MediaFormat::ThreeGp,
            "jpg" | "jpeg" => MediaFormat::Jpeg,
            "png" => MediaFormat::Png,
            "gif" => MediaFormat::Gif,
            "webp" => MediaFormat::Webp,
            "bmp" => MediaFormat::Bmp,
            _ => return None,
        };
        Some(format)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Webm => "video/webm",
            MediaFormat::QuickTime => "video/quicktime",
            MediaFormat::Matroska => "video/x-matroska",
            MediaFormat::Avi => "video/x-msvideo",
            MediaFormat::Ogv => "video/ogg",
            MediaFormat::ThreeGp => "video/3gpp",
            MediaFormat::Jpeg => "image/jpeg",
            MediaFormat::Png => "image/png",
            MediaFormat::Gif => "image/gif",
            MediaFormat::Webp => "image/webp",
            MediaFormat::Bmp => "image/bmp",
        }
    }

    pub fn is_video(self) -> bool {
        match self {
            MediaFormat::Mp4
            | MediaFormat::Webm
            | MediaFormat::QuickTime
            | MediaFormat::Matroska
            | MediaFormat::Avi
            | MediaFormat::Ogv
            | MediaFormat::ThreeGp => true,
            MediaFormat::Jpeg
            | MediaFormat::Png
            | MediaFormat::Gif
            | MediaFormat::Webp
            | MediaFormat::Bmp => false,
        }
    }
}

/// Result of classifying one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub mime_type: String,
    pub supports_range: bool,
}

/// Decide the definitive content type and range eligibility.
pub fn classify(reported: Option<&str>, locator: &UpstreamLocator) -> Classification {
    let format = locator
        .extension()
        .and_then(|ext| MediaFormat::from_extension(&ext));
    let reported = reported
        .map(str::trim)
        .filter(|mime| !mime.is_empty());

    let mime_type = match (format, reported) {
        (Some(format), _) if format.is_video() => format.mime_type().to_string(),
        (Some(format), reported) if reported.map_or(true, is_generic) => {
            format.mime_type().to_string()
        }
        (_, Some(reported)) => reported.to_string(),
        (_, None) => GENERIC_BINARY_MIME.to_string(),
    };

    let supports_range = format.is_some_and(MediaFormat::is_video)
        || mime_type.to_ascii_lowercase().starts_with("video/");

    Classification {
        mime_type,
        supports_range,
    }
}

fn is_generic(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    GENERIC_MIME_TYPES
        .iter()
        .any(|generic| essence.eq_ignore_ascii_case(generic))
}
