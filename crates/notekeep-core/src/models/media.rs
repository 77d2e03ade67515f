//! Attachment classification for note uploads.
//!
//! The notes service accepts attachments as separate multipart fields
//! per media type. Files are bucketed by extension on the client before
//! upload; this is a convenience filter, not a security boundary - the
//! backend validates again.

/// Accepted video file extensions
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".avi", ".webm"];

/// Accepted image file extensions
const IMAGE_EXTENSIONS: &[&str] = &[".jpeg", ".jpg", ".png", ".webp"];

/// Accepted audio file extensions
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".ogg", ".wav"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

impl MediaKind {
    /// Classify a file by its extension; `None` for unsupported types.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let matches = |exts: &[&str]| exts.iter().any(|ext| lower.ends_with(ext));
        if matches(VIDEO_EXTENSIONS) {
            Some(MediaKind::Video)
        } else if matches(IMAGE_EXTENSIONS) {
            Some(MediaKind::Image)
        } else if matches(AUDIO_EXTENSIONS) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    /// Multipart field name for this media type on `/notes/create`
    pub fn form_field(self) -> &'static str {
        match self {
            MediaKind::Video => "video_files",
            MediaKind::Image => "image_files",
            MediaKind::Audio => "audio_files",
        }
    }
}

/// A file attached to a note, read into memory so the upload can be
/// rebuilt if the request is retried after a token refresh.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_file_name(&self.file_name)
    }
}
