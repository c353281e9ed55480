//! Infrastructure layer for filesystem and media-reference interactions.
//!
//! The session controller never touches media bytes. It asks a
//! [`MediaResolver`] for viewable references and for the media type of bare
//! targets; [`LocalResolver`] is the filesystem/URL implementation.

pub mod media;
pub mod paths;

pub use media::{batch_references, BaseUrl, LocalResolver, MediaResolver, VIDEO_EXTENSIONS};
pub use paths::{expand_tilde, get_data_dir, relative_within};
