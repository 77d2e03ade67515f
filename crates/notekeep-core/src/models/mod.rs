//! Data types exchanged with the notes and users services.

pub mod media;
pub mod note;
pub mod user;

pub use media::{MediaKind, UploadFile};
pub use note::{Note, NoteListResponse, NoteResponse};
pub use user::{RegisterRequest, UserInfo};
