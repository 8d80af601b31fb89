use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub mod logging;

/// Default scope requesting the application permissions granted to the client
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Error message carried by a result whose identity could not be resolved
pub const IDENTITY_NOT_FOUND: &str = "identity not found";

// ============================================================================
// Directory Identifiers
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not a canonical directory identifier: {0:?}")]
pub struct InvalidDirectoryId(pub String);

/// Canonical directory object identifier.
///
/// Only constructed by parsing the 8-4-4-4-12 hyphenated form, so two values
/// compare equal regardless of the letter case they were parsed from. Always
/// displays as lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DirectoryId(Uuid);

impl DirectoryId {
    /// Length of the hyphenated textual form
    pub const LEN: usize = 36;

    pub fn parse(input: &str) -> Result<Self, InvalidDirectoryId> {
        // uuid also accepts simple, braced and urn forms; only hyphenated is canonical here
        if input.len() != Self::LEN {
            return Err(InvalidDirectoryId(input.to_string()));
        }
        Uuid::try_parse(input)
            .map(Self)
            .map_err(|_| InvalidDirectoryId(input.to_string()))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DirectoryId {
    type Err = InvalidDirectoryId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DirectoryId {
    type Error = InvalidDirectoryId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DirectoryId> for String {
    fn from(id: DirectoryId) -> Self {
        id.to_string()
    }
}

impl From<Uuid> for DirectoryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Core Value Types
// ============================================================================

/// A directory user resolved from a caller-supplied identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub directory_id: DirectoryId,
    pub email: String,
}

impl Identity {
    pub fn new(directory_id: DirectoryId, email: impl Into<String>) -> Self {
        Self {
            directory_id,
            email: email.into(),
        }
    }
}

/// The group whose membership is being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReference {
    pub group_id: DirectoryId,
}

impl GroupReference {
    pub fn new(group_id: DirectoryId) -> Self {
        Self { group_id }
    }
}

/// Terminal answer of a membership check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResult {
    pub is_member: bool,
    pub identity: Option<Identity>,
    pub error: Option<String>,
}

impl MembershipResult {
    pub fn decided(identity: Identity, is_member: bool) -> Self {
        Self {
            is_member,
            identity: Some(identity),
            error: None,
        }
    }

    pub fn member(identity: Identity) -> Self {
        Self::decided(identity, true)
    }

    pub fn not_member(identity: Identity) -> Self {
        Self::decided(identity, false)
    }

    /// The identifier did not resolve to any directory user
    pub fn identity_not_found() -> Self {
        Self {
            is_member: false,
            identity: None,
            error: Some(IDENTITY_NOT_FOUND.to_string()),
        }
    }

    pub fn is_identity_not_found(&self) -> bool {
        self.identity.is_none() && self.error.as_deref() == Some(IDENTITY_NOT_FOUND)
    }
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Service identity used for the client-credentials exchange.
///
/// Not serializable. `Debug` prints only the scope.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl Credentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &"<redacted>")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Which caller-supplied identifier a deployment accepts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Email address, looked up by address
    #[default]
    Email,
    /// Canonical directory object identifier
    UserId,
}

impl FromStr for IdentifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "user_id" | "userid" | "id" => Ok(Self::UserId),
            other => Err(format!("unknown identifier kind: {}", other)),
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::UserId => write!(f, "user_id"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "3f2504e0-4f89-11d3-9a0c-0305e82c3301";

    #[test]
    fn test_directory_id_is_case_insensitive() {
        let lower = DirectoryId::parse(ID).unwrap();
        let upper = DirectoryId::parse(&ID.to_uppercase()).unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), ID);
    }

    #[test]
    fn test_directory_id_rejects_non_canonical_forms() {
        assert!(DirectoryId::parse("3f2504e04f8911d39a0c0305e82c3301").is_err());
        assert!(DirectoryId::parse("{3f2504e0-4f89-11d3-9a0c-0305e82c3301}").is_err());
        assert!(DirectoryId::parse("not-a-guid").is_err());
        assert!(DirectoryId::parse("").is_err());
    }

    #[test]
    fn test_directory_id_serde() {
        let id: DirectoryId = serde_json::from_str(&format!("\"{}\"", ID.to_uppercase())).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", ID));
        assert!(serde_json::from_str::<DirectoryId>("\"nope\"").is_err());
    }

    #[test]
    fn test_identity_not_found_result() {
        let result = MembershipResult::identity_not_found();
        assert!(!result.is_member);
        assert!(result.identity.is_none());
        assert_eq!(result.error.as_deref(), Some("identity not found"));
        assert!(result.is_identity_not_found());

        let identity = Identity::new(DirectoryId::parse(ID).unwrap(), "a@example.com");
        assert!(!MembershipResult::not_member(identity).is_identity_not_found());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials::new("tenant-42", "client-42", "super-secret");
        let debug = format!("{:?}", creds);
        for value in ["tenant-42", "client-42", "super-secret"] {
            assert!(!debug.contains(value), "{} visible in {}", value, debug);
        }
        assert!(debug.contains("<redacted>"));
        assert_eq!(creds.scope, DEFAULT_SCOPE);
    }

    #[test]
    fn test_identifier_kind_parse() {
        assert_eq!("email".parse::<IdentifierKind>().unwrap(), IdentifierKind::Email);
        assert_eq!("USER_ID".parse::<IdentifierKind>().unwrap(), IdentifierKind::UserId);
        assert!("phone".parse::<IdentifierKind>().is_err());
        assert_eq!(IdentifierKind::default(), IdentifierKind::Email);
    }
}
