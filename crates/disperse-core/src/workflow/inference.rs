//! Version inference: current release from tags and manifest, next candidate

use tracing::debug;

use crate::error::{InferenceError, Result};
use crate::tag::TagTemplate;
use crate::traits::TagInfo;
use crate::version::{BumpLevel, Version};

/// The version currently released and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentVersion {
    pub version: Version,
    /// Tag carrying the version, when tag history had one
    pub tag: Option<String>,
}

/// Highest version among `tags` that match `template`
pub fn latest_tagged_version(tags: &[TagInfo], template: &TagTemplate) -> Option<(Version, String)> {
    tags.iter()
        .filter_map(|t| template.unexpand(&t.name).ok().map(|v| (v, t.name.clone())))
        .max_by(|a, b| a.0.cmp(&b.0))
}

/// Reconcile tag history with the manifest-declared version.
///
/// Both sources must agree exactly when both exist; a difference in
/// pre-release suffix alone still counts as a mismatch.
pub fn infer_current(
    tags: &[TagInfo],
    template: &TagTemplate,
    manifest_version: Option<&Version>,
) -> Result<CurrentVersion> {
    let tagged = latest_tagged_version(tags, template);
    debug!(
        tagged = ?tagged.as_ref().map(|t| t.1.as_str()),
        manifest = ?manifest_version.map(|v| v.to_string()),
        "inferring current version"
    );
    match (tagged, manifest_version) {
        (Some((tag_version, tag)), Some(manifest)) => {
            if &tag_version != manifest {
                return Err(InferenceError::Mismatch {
                    tag,
                    tag_version: tag_version.to_string(),
                    manifest_version: manifest.to_string(),
                }
                .into());
            }
            Ok(CurrentVersion {
                version: tag_version,
                tag: Some(tag),
            })
        }
        (Some((version, tag)), None) => Ok(CurrentVersion {
            version,
            tag: Some(tag),
        }),
        (None, Some(manifest)) => Ok(CurrentVersion {
            version: manifest.clone(),
            tag: None,
        }),
        (None, None) => Err(InferenceError::NoVersion {
            template: template.as_str().to_string(),
        }
        .into()),
    }
}

/// How the caller wants the next version chosen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NextVersionRequest {
    /// Exact version to release
    pub explicit: Option<Version>,
    pub level: Option<BumpLevel>,
    /// Version of the pending news entry, if it names one
    pub pending: Option<Version>,
}

/// Choose the next version.
///
/// Precedence: explicit version, requested level, pending news entry, then
/// the smallest (patch) bump. The result is always newer than `current`.
pub fn propose_next(current: &Version, request: &NextVersionRequest) -> Result<Version> {
    let next = if let Some(explicit) = &request.explicit {
        explicit.clone()
    } else if let Some(level) = request.level {
        current.increase(level)?
    } else if let Some(pending) = &request.pending {
        pending.clone()
    } else {
        current.increase(BumpLevel::Patch)?
    };
    if next <= *current {
        return Err(InferenceError::NotNewer {
            current: current.to_string(),
            next: next.to_string(),
        }
        .into());
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DisperseError;

    fn tag(name: &str) -> TagInfo {
        TagInfo {
            name: name.to_string(),
            target: "0000".to_string(),
        }
    }

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_manifest_only() {
        let template = TagTemplate::new("proj-$VERSION").unwrap();
        let current = infer_current(&[], &template, Some(&v("1.2.3"))).unwrap();
        assert_eq!(current.version, v("1.2.3"));
        assert_eq!(current.tag, None);

        let next = propose_next(&current.version, &NextVersionRequest::default()).unwrap();
        assert_eq!(next, v("1.2.4"));
        assert_eq!(template.expand(&next), "proj-1.2.4");
    }

    #[test]
    fn test_tag_manifest_mismatch() {
        let template = TagTemplate::new("proj-$VERSION").unwrap();
        let err = infer_current(&[tag("proj-1.2.4")], &template, Some(&v("1.2.3"))).unwrap_err();
        assert!(matches!(
            err,
            DisperseError::Inference(InferenceError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_suffix_only_difference_is_mismatch() {
        let template = TagTemplate::new("v$VERSION").unwrap();
        assert!(infer_current(&[tag("v1.0.0rc1")], &template, Some(&v("1.0.0"))).is_err());
    }

    #[test]
    fn test_takes_highest_matching_tag() {
        let template = TagTemplate::new("v$VERSION").unwrap();
        let tags = [
            tag("v1.9.0"),
            tag("v1.10.0"),
            tag("other-9.9.9"),
            tag("v1.2.0"),
        ];
        let current = infer_current(&tags, &template, None).unwrap();
        assert_eq!(current.version, v("1.10.0"));
        assert_eq!(current.tag.as_deref(), Some("v1.10.0"));
    }

    #[test]
    fn test_release_candidates_order_numerically() {
        let template = TagTemplate::new("v$VERSION").unwrap();
        let tags = [tag("v1.0.0rc10"), tag("v1.0.0rc2"), tag("v0.9.0")];
        let current = infer_current(&tags, &template, Some(&v("1.0.0rc10"))).unwrap();
        assert_eq!(current.version, v("1.0.0rc10"));
        assert_eq!(current.tag.as_deref(), Some("v1.0.0rc10"));
    }

    #[test]
    fn test_no_tags_no_manifest() {
        let template = TagTemplate::new("v$VERSION").unwrap();
        assert!(matches!(
            infer_current(&[tag("unrelated")], &template, None),
            Err(DisperseError::Inference(InferenceError::NoVersion { .. }))
        ));
    }

    #[test]
    fn test_propose_next_precedence() {
        let current = v("1.2.3");
        let request = NextVersionRequest {
            level: Some(BumpLevel::Minor),
            pending: Some(v("2.0.0")),
            ..Default::default()
        };
        assert_eq!(propose_next(&current, &request).unwrap(), v("1.3.0"));

        let request = NextVersionRequest {
            pending: Some(v("2.0.0")),
            ..Default::default()
        };
        assert_eq!(propose_next(&current, &request).unwrap(), v("2.0.0"));

        let request = NextVersionRequest {
            explicit: Some(v("1.2.3")),
            ..Default::default()
        };
        assert!(propose_next(&current, &request).is_err());
    }
}
