//! GroupCheck Directory Engine
//!
//! Decides whether a user identified by email address (or directory id) is a
//! member of a configured directory group:
//! - **Token**: client-credentials exchange with optional expiry-aware caching
//! - **Client**: REST calls against the directory service, with paging
//! - **Normalize**: reduce member references to canonical identifiers
//! - **Identity**: map a caller identifier to a directory user
//! - **Membership**: ordered strategy cascade with typed outcomes
//! - **Service**: validation and the end-to-end authorization check

pub mod client;
pub mod error;
pub mod identity;
pub mod membership;
pub mod normalize;
pub mod service;
pub mod token;

pub use client::{DirectoryApi, GraphClient, GraphClientConfig, MemberObject, UserRecord};
pub use error::{
    AuthorizationError, CredentialError, DirectoryError, IdentityError, NormalizationError,
    RequestError, StrategyFailure,
};
pub use identity::IdentityResolver;
pub use membership::{MembershipChecker, Strategy, StrategyOutcome};
pub use normalize::{normalize, DirectoryReference};
pub use service::{AuthorizationService, Identifier};
pub use token::{AccessToken, CachingTokenProvider, ClientCredentialsProvider, TokenSource};
