//! Group membership cascade
//!
//! Membership is decided by the first strategy that completes:
//!
//! 1. [`Strategy::ReferenceListing`] - `$ref` listing, entries normalized
//! 2. [`Strategy::FullListing`] - full member objects
//! 3. [`Strategy::GroupCheck`] - `checkMemberGroups` for the user
//!
//! Only a request-level failure moves on to the next strategy. A completed
//! strategy that answers "not a member" is final.

use gc_common::{DirectoryId, GroupReference, Identity, MembershipResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::DirectoryApi;
use crate::error::{DirectoryError, RequestError, StrategyFailure};
use crate::normalize::normalize;
use crate::token::AccessToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    ReferenceListing,
    FullListing,
    GroupCheck,
}

impl Strategy {
    /// Evaluation order
    pub const CASCADE: [Strategy; 3] = [
        Strategy::ReferenceListing,
        Strategy::FullListing,
        Strategy::GroupCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ReferenceListing => "reference_listing",
            Strategy::FullListing => "full_listing",
            Strategy::GroupCheck => "group_check",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single strategy attempt
#[derive(Debug)]
pub enum StrategyOutcome {
    Member,
    NotMember,
    RequestFailed(RequestError),
}

impl StrategyOutcome {
    fn decided(is_member: bool) -> Self {
        if is_member {
            StrategyOutcome::Member
        } else {
            StrategyOutcome::NotMember
        }
    }
}

pub struct MembershipChecker {
    directory: Arc<dyn DirectoryApi>,
}

impl MembershipChecker {
    pub fn new(directory: Arc<dyn DirectoryApi>) -> Self {
        Self { directory }
    }

    pub async fn is_member(
        &self,
        identity: &Identity,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<MembershipResult, DirectoryError> {
        let mut failures = Vec::new();

        for strategy in Strategy::CASCADE {
            match self.attempt(strategy, identity, group, token).await {
                StrategyOutcome::Member => {
                    info!(strategy = %strategy, "Membership confirmed");
                    return Ok(MembershipResult::member(identity.clone()));
                }
                StrategyOutcome::NotMember => {
                    info!(strategy = %strategy, "Not a member");
                    return Ok(MembershipResult::not_member(identity.clone()));
                }
                StrategyOutcome::RequestFailed(error) => {
                    warn!(strategy = %strategy, error = %error, "Membership strategy failed, falling back");
                    failures.push(StrategyFailure { strategy, error });
                }
            }
        }

        Err(DirectoryError::StrategiesExhausted(failures))
    }

    /// Run one strategy in isolation
    pub async fn attempt(
        &self,
        strategy: Strategy,
        identity: &Identity,
        group: &GroupReference,
        token: &AccessToken,
    ) -> StrategyOutcome {
        let target = &identity.directory_id;
        let result = match strategy {
            Strategy::ReferenceListing => self.reference_listing(target, group, token).await,
            Strategy::FullListing => self.full_listing(target, group, token).await,
            Strategy::GroupCheck => self.group_check(target, group, token).await,
        };

        match result {
            Ok(is_member) => StrategyOutcome::decided(is_member),
            Err(e) => StrategyOutcome::RequestFailed(e),
        }
    }

    async fn reference_listing(
        &self,
        target: &DirectoryId,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<bool, RequestError> {
        let references = self.directory.list_member_references(group, token).await?;
        let found = references.iter().any(|reference| match normalize(reference) {
            Ok(id) => id == *target,
            Err(e) => {
                debug!(error = %e, "Skipping member reference");
                false
            }
        });
        Ok(found)
    }

    async fn full_listing(
        &self,
        target: &DirectoryId,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<bool, RequestError> {
        let members = self.directory.list_members(group, token).await?;
        let found = members.iter().any(|member| {
            match member.id.as_deref().map(DirectoryId::parse) {
                Some(Ok(id)) => id == *target,
                _ => {
                    debug!(odata_type = ?member.odata_type, "Skipping member without a usable id");
                    false
                }
            }
        });
        Ok(found)
    }

    async fn group_check(
        &self,
        target: &DirectoryId,
        group: &GroupReference,
        token: &AccessToken,
    ) -> Result<bool, RequestError> {
        let groups = self
            .directory
            .check_member_groups(target, &[group.group_id], token)
            .await?;
        Ok(groups
            .iter()
            .filter_map(|g| DirectoryId::parse(g).ok())
            .any(|g| g == group.group_id))
    }
}
