use serde::{Deserialize, Serialize};

/// A note as returned by the notes service: title, text content, and
/// zero or more attached media URLs grouped by type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub video_urls: Vec<String>,
    #[serde(default)]
    pub audio_urls: Vec<String>,
}

impl Note {
    pub fn attachment_count(&self) -> usize {
        self.image_urls.len() + self.video_urls.len() + self.audio_urls.len()
    }
}

/// Envelope for `GET /notes/get_all_notes`
#[derive(Debug, Deserialize)]
pub struct NoteListResponse {
    #[serde(default)]
    pub data: Vec<Note>,
}

/// Envelope for `GET /notes/get_note/{id}/`
#[derive(Debug, Deserialize)]
pub struct NoteResponse {
    pub data: Note,
}
