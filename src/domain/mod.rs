//! Domain layer: labeling items and the crate error type.
//!
//! This module holds the types every other layer speaks in, independent of
//! persistence, media resolution or UI concerns.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`item`]: Item, target and media type model
//!
//! # Examples
//!
//! ```
//! use batchlabel::domain::{Item, MediaType, Result};
//!
//! fn video(path: &str) -> Result<Item> {
//!     Ok(Item::new(path).with_type(MediaType::Video))
//! }
//! # assert!(video("clip.mp4").is_ok());
//! ```

pub mod error;
pub mod item;

pub use error::{LabelerError, Result};
pub use item::{display_value, Fingerprint, Item, MediaType, Metadata, Target};
