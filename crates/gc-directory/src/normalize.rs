//! Directory reference normalization
//!
//! Membership listings identify members in several encodings depending on the
//! endpoint: a bare `id`, or an `@odata.id` URL that may point at
//! `directoryObjects/` or `users/` and may carry a type segment such as
//! `Microsoft.DirectoryServices.User`. Everything is reduced to a
//! [`DirectoryId`] here so the rest of the engine only compares canonical ids.

use gc_common::DirectoryId;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::NormalizationError;

/// Anchors tried in priority order before falling back to the last path segment
const ANCHORS: [&str; 2] = ["directoryObjects/", "users/"];

/// A reference to a directory object as returned by a listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryReference {
    #[serde(rename = "@odata.id", default, skip_serializing_if = "Option::is_none")]
    pub odata_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@odata.type", default, skip_serializing_if = "Option::is_none")]
    pub odata_type: Option<String>,
}

impl DirectoryReference {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn from_odata_id(odata_id: impl Into<String>) -> Self {
        Self {
            odata_id: Some(odata_id.into()),
            ..Default::default()
        }
    }

    fn describe(&self) -> String {
        self.id
            .as_deref()
            .or(self.odata_id.as_deref())
            .unwrap_or("<empty>")
            .to_string()
    }
}

fn guid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("GUID pattern is valid")
    })
}

/// Reduce a directory reference to its canonical identifier
pub fn normalize(reference: &DirectoryReference) -> Result<DirectoryId, NormalizationError> {
    let fail = || NormalizationError {
        reference: reference.describe(),
    };

    let candidate = match (reference.id.as_deref(), reference.odata_id.as_deref()) {
        (Some(id), _) if !id.trim().is_empty() => id.trim(),
        (_, Some(odata_id)) if !odata_id.trim().is_empty() => trailing_segment(odata_id.trim()),
        _ => return Err(fail()),
    };

    let candidate = strip_suffixes(candidate);

    let candidate = if candidate.contains('.') {
        guid_pattern()
            .find(candidate)
            .map(|m| m.as_str())
            .unwrap_or(candidate)
    } else {
        candidate
    };

    DirectoryId::parse(candidate).map_err(|_| fail())
}

/// Text after the last known anchor, else the final `/` segment, else the whole string
fn trailing_segment(odata_id: &str) -> &str {
    for anchor in ANCHORS {
        if let Some(idx) = odata_id.rfind(anchor) {
            return &odata_id[idx + anchor.len()..];
        }
    }
    match odata_id.rfind('/') {
        Some(idx) => &odata_id[idx + 1..],
        None => odata_id,
    }
}

fn strip_suffixes(candidate: &str) -> &str {
    let end = candidate.find(&['?', '#'][..]).unwrap_or(candidate.len());
    &candidate[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUID: &str = "6e2f4a1c-93d8-4b7e-a5f0-12c3d4e5f607";

    fn canonical() -> DirectoryId {
        DirectoryId::parse(GUID).unwrap()
    }

    #[test]
    fn test_all_shapes_normalize_to_same_id() {
        let shapes = [
            DirectoryReference::from_id(GUID),
            DirectoryReference::from_odata_id(format!(
                "https://graph.microsoft.com/v1.0/directoryObjects/{}",
                GUID
            )),
            DirectoryReference::from_odata_id(format!("https://graph.microsoft.com/v1.0/users/{}", GUID)),
        ];
        for shape in &shapes {
            assert_eq!(normalize(shape).unwrap(), canonical(), "shape {:?}", shape);
        }
    }

    #[test]
    fn test_type_suffixed_reference() {
        let reference = DirectoryReference::from_odata_id(format!(
            "https://graph.microsoft.com/v2/tenant/directoryObjects/{}/Microsoft.DirectoryServices.User",
            GUID
        ));
        assert_eq!(normalize(&reference).unwrap(), canonical());
    }

    #[test]
    fn test_type_prefixed_id() {
        let reference = DirectoryReference::from_id(format!("Microsoft.DirectoryServices.User_{}", GUID));
        assert_eq!(normalize(&reference).unwrap(), canonical());
    }

    #[test]
    fn test_query_and_fragment_are_stripped() {
        let with_query = DirectoryReference::from_odata_id(format!("users/{}?$select=id", GUID));
        let with_fragment = DirectoryReference::from_odata_id(format!("directoryObjects/{}#member", GUID));
        assert_eq!(normalize(&with_query).unwrap(), canonical());
        assert_eq!(normalize(&with_fragment).unwrap(), canonical());
    }

    #[test]
    fn test_generic_last_segment_and_bare_value() {
        let generic = DirectoryReference::from_odata_id(format!("https://example.test/objects/{}", GUID));
        let bare = DirectoryReference::from_odata_id(GUID);
        assert_eq!(normalize(&generic).unwrap(), canonical());
        assert_eq!(normalize(&bare).unwrap(), canonical());
    }

    #[test]
    fn test_uppercase_is_canonicalized() {
        let reference = DirectoryReference::from_odata_id(format!("users/{}", GUID.to_uppercase()));
        let id = normalize(&reference).unwrap();
        assert_eq!(id.to_string(), GUID);
    }

    #[test]
    fn test_direct_id_takes_precedence() {
        let reference = DirectoryReference {
            odata_id: Some("https://graph.microsoft.com/v1.0/users/not-a-guid".to_string()),
            id: Some(GUID.to_string()),
            odata_type: None,
        };
        assert_eq!(normalize(&reference).unwrap(), canonical());
    }

    #[test]
    fn test_idempotent_on_canonical_ids() {
        let once = normalize(&DirectoryReference::from_id(GUID.to_uppercase())).unwrap();
        let twice = normalize(&DirectoryReference::from_id(once.to_string())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unrecognizable_references_fail() {
        let cases = [
            DirectoryReference::from_odata_id("no-delimiters-and-no-guid"),
            DirectoryReference::from_odata_id("https://graph.microsoft.com/v1.0/users/someone"),
            DirectoryReference::from_id("Microsoft.DirectoryServices.User"),
            DirectoryReference::from_id(""),
            DirectoryReference::default(),
        ];
        for case in &cases {
            assert!(normalize(case).is_err(), "expected failure for {:?}", case);
        }
    }

    #[test]
    fn test_deserializes_listing_entries() {
        let json = format!(
            r##"[{{"@odata.id": "https://graph.microsoft.com/v1.0/directoryObjects/{0}"}}, {{"id": "{0}", "@odata.type": "#microsoft.graph.user"}}]"##,
            GUID
        );
        let refs: Vec<DirectoryReference> = serde_json::from_str(&json).unwrap();
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| normalize(r).unwrap() == canonical()));
        assert_eq!(refs[1].odata_type.as_deref(), Some("#microsoft.graph.user"));
    }
}
