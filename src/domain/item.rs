//! Labeling item model.
//!
//! An [`Item`] is one labeling target plus its metadata and label state. The
//! media kind is a closed [`MediaType`] enum; every call site that needs to
//! know "can this be batched", "is the label payload a sequence" or "can this
//! be prefetched" asks the enum instead of comparing type strings.

use crate::domain::error::{LabelerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// String-keyed metadata attached to an item.
pub type Metadata = BTreeMap<String, Value>;

/// Kind of media an item refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaType {
    /// A single still image. The only type that may share a batch.
    #[default]
    Image,
    /// A single video.
    Video,
    /// Inline time-series values.
    TimeSeries,
    /// Several images labeled together as one item.
    ImageGroup,
    /// A stack of images (e.g. slices) labeled as one item.
    ImageStack,
    /// Two video segments compared side by side.
    VideoSegmentPairs,
}

impl MediaType {
    /// Whether items of this type may be grouped with other items in a batch.
    #[must_use]
    pub const fn is_batchable(self) -> bool {
        matches!(self, Self::Image)
    }

    /// Whether label payloads for this type are sequences (per-frame or
    /// per-segment) rather than mappings.
    ///
    /// Video-like items also stay visible after a save, since labeling them is
    /// an ongoing multi-step process.
    #[must_use]
    pub const fn is_video_like(self) -> bool {
        matches!(self, Self::Video | Self::VideoSegmentPairs)
    }

    /// Whether a viewable reference can be resolved ahead of time.
    ///
    /// Time-series values are served inline and groups are resolved as a unit,
    /// so only plain images are prefetched.
    #[must_use]
    pub const fn is_preloadable(self) -> bool {
        matches!(self, Self::Image)
    }

    /// The payload used when an item has neither labels nor defaults.
    #[must_use]
    pub fn empty_payload(self) -> Value {
        if self.is_video_like() {
            Value::Array(Vec::new())
        } else {
            Value::Object(serde_json::Map::new())
        }
    }

    /// Wire name of the type (`image`, `time-series`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::TimeSeries => "time-series",
            Self::ImageGroup => "image-group",
            Self::ImageStack => "image-stack",
            Self::VideoSegmentPairs => "video-segment-pairs",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the media being labeled.
///
/// Plain strings are paths, URLs or S3 keys. Structured targets describe
/// grouped media (image groups, segment pairs) or inline time-series values.
/// Anything else (raw pixel arrays and similar handles) is kept as-is but
/// cannot be fingerprinted or persisted to a session document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    /// Path, URL, S3 key or `data:` URI.
    Reference(String),
    /// Grouped or inline media described as a JSON document.
    Structured(serde_json::Map<String, Value>),
    /// Opaque in-memory handle.
    Raw(Value),
}

impl Target {
    /// Human-readable representation used in the index view and for sorting.
    #[must_use]
    pub fn repr(&self, media_type: MediaType) -> String {
        match self {
            Self::Reference(reference) if reference.starts_with("data:") => {
                "base64-encoded data".to_string()
            }
            Self::Reference(reference) => reference.clone(),
            Self::Raw(Value::Array(_)) => "array".to_string(),
            Self::Raw(_) => String::new(),
            Self::Structured(document) => match media_type {
                MediaType::TimeSeries => "Time Series".to_string(),
                MediaType::ImageGroup | MediaType::ImageStack => {
                    let count = document
                        .get("images")
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len);
                    format!("Group of {count} images")
                }
                _ => String::new(),
            },
        }
    }

    /// Whether this target is an opaque in-memory handle.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

impl From<&str> for Target {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_string())
    }
}

impl From<String> for Target {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

/// Key used to recognise the same item across two item lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One labeling target with its metadata and label state.
///
/// An item is *labeled* iff `labels` is present. `defaults` seed the editor
/// the first time the item is shown but are never written to `labels` until
/// the user saves. `ignored` is tri-state so that a freshly supplied item
/// does not clobber a persisted ignore flag during a merge.
///
/// The persisted field names follow the established document format (`type`,
/// `ignore`), so existing label files load unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    /// Media kind; `None` until ingested, after which it is always set.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<Value>,

    #[serde(rename = "ignore", alias = "ignored", default, skip_serializing_if = "Option::is_none")]
    pub ignored: Option<bool>,

    /// External per-item persistence location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonpath: Option<PathBuf>,
}

impl Item {
    /// Creates an unlabeled item for a target.
    ///
    /// ```
    /// use batchlabel::{Item, MediaType};
    ///
    /// let item = Item::new("images/cat.jpg").with_type(MediaType::Image);
    /// assert!(!item.is_labeled());
    /// ```
    #[must_use]
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Creates an item identified only by its metadata.
    #[must_use]
    pub fn from_metadata(metadata: Metadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: Value) -> Self {
        self.labels = Some(labels);
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.defaults = Some(defaults);
        self
    }

    #[must_use]
    pub fn with_jsonpath(mut self, jsonpath: impl Into<PathBuf>) -> Self {
        self.jsonpath = Some(jsonpath.into());
        self
    }

    /// Media type, defaulting to [`MediaType::Image`] when not yet known.
    #[must_use]
    pub fn media_type(&self) -> MediaType {
        self.media_type.unwrap_or_default()
    }

    #[must_use]
    pub const fn is_labeled(&self) -> bool {
        self.labels.is_some()
    }

    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored.unwrap_or(false)
    }

    /// Labeled or ignored; counts towards progress.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.is_labeled() || self.is_ignored()
    }

    /// Representation of the target for display, sorting and filtering.
    #[must_use]
    pub fn target_repr(&self) -> String {
        self.target
            .as_ref()
            .map(|target| target.repr(self.media_type()))
            .unwrap_or_default()
    }

    /// Short text summary of the labels for tabular display.
    ///
    /// Mapping payloads list their image-level labels (`name: a, b; other: c`),
    /// sequence payloads report how many entries they hold.
    #[must_use]
    pub fn label_summary(&self) -> String {
        match &self.labels {
            Some(Value::Object(labels)) => labels
                .get("image")
                .and_then(Value::as_object)
                .map(|image| {
                    image
                        .iter()
                        .map(|(name, values)| {
                            let joined = values
                                .as_array()
                                .map(|values| {
                                    values
                                        .iter()
                                        .map(display_value)
                                        .collect::<Vec<_>>()
                                        .join(", ")
                                })
                                .unwrap_or_default();
                            format!("{name}: {joined}")
                        })
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_default(),
            Some(Value::Array(entries)) => entries.len().to_string(),
            Some(other) => display_value(other),
            None => String::new(),
        }
    }

    /// Derives the key used to match this item against another item list.
    ///
    /// The key comes from the target when present, otherwise from the
    /// metadata.
    ///
    /// # Errors
    ///
    /// Returns [`LabelerError::UnhashableKey`] if the target is a raw handle,
    /// if metadata holds nested values, or if there is nothing to key on.
    pub fn fingerprint(&self) -> Result<Fingerprint> {
        match &self.target {
            Some(Target::Reference(reference)) => Ok(Fingerprint(format!("target:{reference}"))),
            Some(Target::Structured(document)) => Ok(Fingerprint(format!(
                "target:{}",
                serde_json::to_string(document)?
            ))),
            Some(Target::Raw(_)) => Err(LabelerError::UnhashableKey(
                "targets must be strings or structured documents".to_string(),
            )),
            None if self.metadata.is_empty() => Err(LabelerError::UnhashableKey(
                "item has neither a target nor metadata".to_string(),
            )),
            None => {
                if let Some((key, _)) = self
                    .metadata
                    .iter()
                    .find(|(_, value)| value.is_array() || value.is_object())
                {
                    return Err(LabelerError::UnhashableKey(format!(
                        "metadata value for `{key}` is not a primitive"
                    )));
                }
                Ok(Fingerprint(format!(
                    "metadata:{}",
                    serde_json::to_string(&self.metadata)?
                )))
            }
        }
    }
}

/// Renders a JSON value the way a table cell shows it (strings unquoted).
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
