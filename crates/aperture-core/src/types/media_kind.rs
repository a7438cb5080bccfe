//! Media kind detection from file extension.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Broad media categories the engine tracks.
///
/// Detection is extension-based only; the engine never sniffs content
/// (interpreting file payloads is the extractors' job).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    /// Metadata sidecar written next to a media file (XMP and friends).
    Sidecar,
    Other,
}

impl MediaKind {
    /// Detect the media kind from a file extension string.
    pub fn from_extension(ext: Option<&str>) -> MediaKind {
        let Some(ext) = ext else {
            return MediaKind::Other;
        };
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "tif" | "tiff" | "bmp" | "webp" | "heic"
            | "heif" | "avif" | "dng" | "cr2" | "cr3" | "nef" | "arw" | "orf" | "raf"
            | "rw2" => MediaKind::Image,
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" | "mpg" | "mpeg" | "wmv"
            | "mts" | "m2ts" | "3gp" => MediaKind::Video,
            "xmp" | "thm" | "aae" => MediaKind::Sidecar,
            _ => MediaKind::Other,
        }
    }

    /// Detect the media kind from a path.
    pub fn from_path(path: &Path) -> MediaKind {
        Self::from_extension(path.extension().and_then(|e| e.to_str()))
    }

    /// Stable lowercase name used in the file_info table.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Sidecar => "sidecar",
            MediaKind::Other => "other",
        }
    }

    /// Parse the stable name back. Unknown strings are `Other`.
    pub fn parse(s: &str) -> MediaKind {
        match s {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "sidecar" => MediaKind::Sidecar,
            _ => MediaKind::Other,
        }
    }

    /// Whether this kind is primary media (image or video), as opposed to
    /// a sidecar or unclassified file.
    pub fn is_media(&self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_extensions() {
        assert_eq!(MediaKind::from_path(Path::new("a/b/photo.JPG")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("clip.mov")), MediaKind::Video);
        assert_eq!(MediaKind::from_path(Path::new("photo.xmp")), MediaKind::Sidecar);
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), MediaKind::Other);
        assert_eq!(MediaKind::from_path(Path::new("no_extension")), MediaKind::Other);
    }

    #[test]
    fn names_round_trip() {
        for kind in [
            MediaKind::Image,
            MediaKind::Video,
            MediaKind::Sidecar,
            MediaKind::Other,
        ] {
            assert_eq!(MediaKind::parse(kind.as_str()), kind);
        }
    }
}
