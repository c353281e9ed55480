//! Media reference resolution.
//!
//! Turning a target into something a viewer can load (a URL, a `data:` URI)
//! is a collaborator concern. The session only needs two answers: "what can I
//! show for this target?" and "what kind of media is this bare target?".

use crate::domain::error::Result;
use crate::domain::{MediaType, Target};
use crate::infrastructure::paths::{expand_tilde, relative_within};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File extensions treated as video when guessing the type of a bare target.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "3gp", "mp4", "m4v", "mkv", "webm", "mov", "avi", "wmv", "mpg", "flv",
];

/// Where local files are served from.
///
/// A file under `server_root` is reachable at `{url}/files/{relative path}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseUrl {
    pub url: String,
    #[serde(alias = "server_root")]
    pub server_root: String,
}

/// Resolves targets into viewable references.
///
/// `resolve` returns `Ok(None)` for targets that have no ahead-of-time
/// reference (inline data, files outside the served root, unsupported
/// schemes).
pub trait MediaResolver: Send {
    /// Builds a viewable reference for a target.
    ///
    /// # Errors
    ///
    /// Returns an error if resolution itself failed (as opposed to the target
    /// simply having no reference).
    fn resolve(&self, target: &Target) -> Result<Option<String>>;

    /// Guesses the media type of a target whose type was not supplied.
    fn guess_type(&self, target: &Target) -> MediaType;
}

/// Filesystem and URL resolver.
#[derive(Debug, Clone, Default)]
pub struct LocalResolver {
    base: Option<BaseUrl>,
}

impl LocalResolver {
    #[must_use]
    pub const fn new(base: Option<BaseUrl>) -> Self {
        Self { base }
    }

    fn resolve_reference(&self, reference: &str) -> Option<String> {
        let lower = reference.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:") {
            return Some(reference.to_string());
        }
        if lower.starts_with("s3://") {
            tracing::debug!(target = %reference, "object store references are resolved upstream");
            return None;
        }

        let path = expand_tilde(reference);
        if !path.is_file() {
            tracing::warn!(target = %reference, "local media file not found");
            return None;
        }

        let base = self.base.as_ref()?;
        let root = expand_tilde(&base.server_root);
        let Some(relative) = relative_within(&path, &root) else {
            tracing::debug!(target = %reference, "file is outside the served root");
            return None;
        };
        Some(format!("{}/files/{relative}", base.url.trim_end_matches('/')))
    }
}

impl MediaResolver for LocalResolver {
    fn resolve(&self, target: &Target) -> Result<Option<String>> {
        Ok(match target {
            Target::Reference(reference) => self.resolve_reference(reference),
            Target::Structured(_) | Target::Raw(_) => None,
        })
    }

    fn guess_type(&self, target: &Target) -> MediaType {
        match target {
            Target::Reference(reference) => {
                let name = reference.rsplit('/').next().unwrap_or(reference);
                let extension = name
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_lowercase())
                    .unwrap_or_default();
                if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
                    MediaType::Video
                } else {
                    MediaType::Image
                }
            }
            Target::Structured(document) => {
                if document.contains_key("images") {
                    MediaType::ImageGroup
                } else if document.contains_key("video1") && document.contains_key("video2") {
                    MediaType::VideoSegmentPairs
                } else {
                    MediaType::TimeSeries
                }
            }
            Target::Raw(_) => MediaType::Image,
        }
    }
}

/// Builds the viewable references for a homogeneous batch.
///
/// - time series are served inline (the target itself)
/// - image groups and stacks keep their structure with each image resolved
/// - segment pairs keep their structure with `video1`/`video2` resolved
/// - everything else yields one reference per member (`null` if unresolvable)
#[must_use]
pub fn batch_references(
    resolver: &dyn MediaResolver,
    media_type: MediaType,
    targets: &[Option<&Target>],
) -> Vec<Value> {
    let resolve = |target: Option<&Target>| -> Value {
        let Some(target) = target else {
            return Value::Null;
        };
        match resolver.resolve(target) {
            Ok(Some(reference)) => Value::String(reference),
            Ok(None) => Value::Null,
            Err(e) => {
                tracing::warn!(error = %e, "failed to resolve media reference");
                Value::Null
            }
        }
    };
    let resolve_nested = |entry: &mut Value| {
        if let Some(object) = entry.as_object_mut() {
            let nested = object
                .get("target")
                .and_then(|value| serde_json::from_value::<Target>(value.clone()).ok());
            object.insert("target".to_string(), resolve(nested.as_ref()));
        }
    };

    match media_type {
        MediaType::TimeSeries => targets
            .iter()
            .take(1)
            .map(|target| target.map_or(Value::Null, |t| serde_json::to_value(t).unwrap_or(Value::Null)))
            .collect(),
        MediaType::ImageGroup | MediaType::ImageStack | MediaType::VideoSegmentPairs => targets
            .iter()
            .take(1)
            .map(|target| {
                let mut document = target.map_or(Value::Null, |t| serde_json::to_value(t).unwrap_or(Value::Null));
                if media_type == MediaType::VideoSegmentPairs {
                    for key in ["video1", "video2"] {
                        if let Some(video) = document.get_mut(key) {
                            resolve_nested(video);
                        }
                    }
                } else if let Some(images) = document.get_mut("images").and_then(Value::as_array_mut) {
                    images.iter_mut().for_each(resolve_nested);
                }
                document
            })
            .collect(),
        MediaType::Image | MediaType::Video => targets.iter().map(|target| resolve(*target)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured(value: Value) -> Target {
        Target::Structured(value.as_object().cloned().unwrap())
    }

    #[test]
    fn urls_pass_through() {
        let resolver = LocalResolver::default();
        let target = Target::from("https://example.com/a.jpg");
        assert_eq!(
            resolver.resolve(&target).unwrap().as_deref(),
            Some("https://example.com/a.jpg")
        );
        assert!(resolver.resolve(&Target::from("s3://bucket/a.jpg")).unwrap().is_none());
    }

    #[test]
    fn local_files_under_root_become_urls() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("img").join("a.jpg");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, b"jpg").unwrap();

        let resolver = LocalResolver::new(Some(BaseUrl {
            url: "http://localhost:8080/".to_string(),
            server_root: dir.path().to_string_lossy().into_owned(),
        }));
        let target = Target::from(file.to_string_lossy().into_owned());
        assert_eq!(
            resolver.resolve(&target).unwrap().as_deref(),
            Some("http://localhost:8080/files/img/a.jpg")
        );
    }

    #[test]
    fn local_files_without_base_are_unresolvable() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        std::fs::write(&file, b"jpg").unwrap();
        let target = Target::from(file.to_string_lossy().into_owned());
        assert!(LocalResolver::default().resolve(&target).unwrap().is_none());
    }

    #[test]
    fn guesses_types_from_extension_and_structure() {
        let resolver = LocalResolver::default();
        assert_eq!(resolver.guess_type(&Target::from("clips/a.MP4")), MediaType::Video);
        assert_eq!(resolver.guess_type(&Target::from("a.png")), MediaType::Image);
        assert_eq!(resolver.guess_type(&Target::from("dir.v2/noext")), MediaType::Image);
        assert_eq!(
            resolver.guess_type(&structured(json!({"images": []}))),
            MediaType::ImageGroup
        );
        assert_eq!(
            resolver.guess_type(&structured(json!({"video1": {}, "video2": {}}))),
            MediaType::VideoSegmentPairs
        );
    }

    #[test]
    fn group_references_resolve_each_image() {
        let resolver = LocalResolver::default();
        let group = structured(json!({
            "images": [{"target": "https://x/a.jpg"}, {"target": "s3://b/c.jpg"}]
        }));
        let refs = batch_references(&resolver, MediaType::ImageGroup, &[Some(&group)]);
        assert_eq!(
            refs,
            vec![json!({"images": [{"target": "https://x/a.jpg"}, {"target": null}]})]
        );
    }

    #[test]
    fn segment_pair_references_resolve_both_videos() {
        let resolver = LocalResolver::default();
        let pair = structured(json!({
            "video1": {"target": "https://x/1.mp4", "start": 0},
            "video2": {"target": "https://x/2.mp4", "start": 5}
        }));
        let refs = batch_references(&resolver, MediaType::VideoSegmentPairs, &[Some(&pair)]);
        assert_eq!(refs[0]["video2"]["target"], "https://x/2.mp4");
        assert_eq!(refs[0]["video2"]["start"], 5);
    }

    #[test]
    fn time_series_is_served_inline() {
        let resolver = LocalResolver::default();
        let series = structured(json!({"plots": [{"x": [1, 2]}]}));
        let refs = batch_references(&resolver, MediaType::TimeSeries, &[Some(&series)]);
        assert_eq!(refs, vec![json!({"plots": [{"x": [1, 2]}]})]);
    }
}
