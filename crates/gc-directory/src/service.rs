//! Authorization service
//!
//! Entry point of the engine: validate the caller identifier, obtain a token,
//! resolve the identity and run the membership cascade.

use gc_common::{DirectoryId, GroupReference, IdentifierKind, Identity, MembershipResult};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, instrument};

use crate::client::DirectoryApi;
use crate::error::{AuthorizationError, IdentityError, Result};
use crate::identity::IdentityResolver;
use crate::membership::MembershipChecker;
use crate::token::{AccessToken, TokenSource};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"))
}

/// A validated caller identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    UserId(DirectoryId),
}

impl Identifier {
    /// Trim and validate raw input for the given kind. Never touches the network.
    pub fn parse(raw: &str, kind: IdentifierKind) -> Result<Self> {
        let value = raw.trim();
        match kind {
            IdentifierKind::Email => {
                if value.is_empty() {
                    return Err(AuthorizationError::validation("Email is required"));
                }
                if !email_pattern().is_match(value) {
                    return Err(AuthorizationError::validation("Please provide a valid email address"));
                }
                Ok(Identifier::Email(value.to_string()))
            }
            IdentifierKind::UserId => {
                if value.is_empty() {
                    return Err(AuthorizationError::validation("User id is required"));
                }
                DirectoryId::parse(value)
                    .map(Identifier::UserId)
                    .map_err(|_| AuthorizationError::validation("Please provide a valid user id"))
            }
        }
    }
}

pub struct AuthorizationService {
    tokens: Arc<dyn TokenSource>,
    resolver: IdentityResolver,
    checker: MembershipChecker,
    group: GroupReference,
    identifier_kind: IdentifierKind,
}

impl AuthorizationService {
    pub fn new(
        tokens: Arc<dyn TokenSource>,
        directory: Arc<dyn DirectoryApi>,
        group: GroupReference,
        identifier_kind: IdentifierKind,
    ) -> Self {
        Self {
            tokens,
            resolver: IdentityResolver::new(directory.clone()),
            checker: MembershipChecker::new(directory),
            group,
            identifier_kind,
        }
    }

    pub fn identifier_kind(&self) -> IdentifierKind {
        self.identifier_kind
    }

    pub fn group(&self) -> &GroupReference {
        &self.group
    }

    /// Decide whether the identified user belongs to the configured group
    #[instrument(skip_all, fields(kind = %self.identifier_kind))]
    pub async fn check_authorization(&self, raw: &str) -> Result<MembershipResult> {
        let identifier = Identifier::parse(raw, self.identifier_kind)?;

        let token = self.tokens.fetch_token().await?;

        let identity = match self.resolve(&identifier, &token).await {
            Ok(identity) => identity,
            Err(IdentityError::NotFound) => {
                info!("Identity not found in directory");
                return Ok(MembershipResult::identity_not_found());
            }
            Err(IdentityError::Directory(e)) => return Err(e.into()),
        };
        debug!(directory_id = %identity.directory_id, "Identity resolved");

        let result = self.checker.is_member(&identity, &self.group, &token).await?;
        info!(
            directory_id = %identity.directory_id,
            is_member = result.is_member,
            "Authorization check complete"
        );
        Ok(result)
    }

    async fn resolve(
        &self,
        identifier: &Identifier,
        token: &AccessToken,
    ) -> std::result::Result<Identity, IdentityError> {
        match identifier {
            Identifier::Email(email) => self.resolver.resolve_by_email(email, token).await,
            Identifier::UserId(id) => self.resolver.resolve_by_id(id, token).await,
        }
    }
}
