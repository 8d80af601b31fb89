//! Identity resolution
//!
//! Maps a caller-supplied identifier to a directory [`Identity`]. Only a 404
//! from the directory means "no such user"; every other failure surfaces as a
//! [`DirectoryError`].

use gc_common::{DirectoryId, Identity};
use std::sync::Arc;
use tracing::debug;

use crate::client::{DirectoryApi, UserRecord};
use crate::error::{DirectoryError, IdentityError};
use crate::token::AccessToken;

pub struct IdentityResolver {
    directory: Arc<dyn DirectoryApi>,
}

impl IdentityResolver {
    pub fn new(directory: Arc<dyn DirectoryApi>) -> Self {
        Self { directory }
    }

    /// Resolve by email address. The returned identity carries the address as supplied.
    pub async fn resolve_by_email(
        &self,
        email: &str,
        token: &AccessToken,
    ) -> Result<Identity, IdentityError> {
        let email = email.trim();
        let user = self.lookup(email, token).await?;
        Ok(Identity::new(parse_user_id(&user)?, email))
    }

    /// Resolve by directory id. The email comes from `mail`, else `userPrincipalName`.
    pub async fn resolve_by_id(
        &self,
        id: &DirectoryId,
        token: &AccessToken,
    ) -> Result<Identity, IdentityError> {
        let user = self.lookup(&id.to_string(), token).await?;
        let directory_id = parse_user_id(&user)?;
        let email = user
            .mail
            .filter(|m| !m.is_empty())
            .or(user.user_principal_name)
            .unwrap_or_default();
        Ok(Identity::new(directory_id, email))
    }

    async fn lookup(&self, key: &str, token: &AccessToken) -> Result<UserRecord, IdentityError> {
        match self.directory.get_user(key, token).await {
            Ok(user) => Ok(user),
            Err(e) if e.is_not_found() => {
                debug!("Directory has no user for the supplied identifier");
                Err(IdentityError::NotFound)
            }
            Err(e) => Err(DirectoryError::IdentityLookup(e).into()),
        }
    }
}

fn parse_user_id(user: &UserRecord) -> Result<DirectoryId, DirectoryError> {
    DirectoryId::parse(&user.id).map_err(|e| DirectoryError::InvalidIdentity(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemberObject;
    use crate::error::RequestError;
    use crate::normalize::DirectoryReference;
    use async_trait::async_trait;
    use gc_common::GroupReference;
    use parking_lot::Mutex;

    const USER: &str = "1a2b3c4d-0000-4000-8000-00000000000a";

    /// Mock directory answering user lookups from a canned response
    struct MockDirectory {
        response: Mutex<Option<Result<UserRecord, RequestError>>>,
        keys: Mutex<Vec<String>>,
    }

    impl MockDirectory {
        fn new(response: Result<UserRecord, RequestError>) -> Self {
            Self {
                response: Mutex::new(Some(response)),
                keys: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DirectoryApi for MockDirectory {
        async fn get_user(&self, key: &str, _token: &AccessToken) -> Result<UserRecord, RequestError> {
            self.keys.lock().push(key.to_string());
            self.response.lock().take().expect("single lookup")
        }

        async fn list_member_references(
            &self,
            _group: &GroupReference,
            _token: &AccessToken,
        ) -> Result<Vec<DirectoryReference>, RequestError> {
            unreachable!("not used by identity resolution")
        }

        async fn list_members(
            &self,
            _group: &GroupReference,
            _token: &AccessToken,
        ) -> Result<Vec<MemberObject>, RequestError> {
            unreachable!("not used by identity resolution")
        }

        async fn check_member_groups(
            &self,
            _user: &DirectoryId,
            _groups: &[DirectoryId],
            _token: &AccessToken,
        ) -> Result<Vec<String>, RequestError> {
            unreachable!("not used by identity resolution")
        }
    }

    fn record(id: &str, mail: Option<&str>, upn: Option<&str>) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            mail: mail.map(String::from),
            user_principal_name: upn.map(String::from),
        }
    }

    fn token() -> AccessToken {
        AccessToken::new("t", None)
    }

    #[tokio::test]
    async fn test_resolve_by_email() {
        let directory = Arc::new(MockDirectory::new(Ok(record(USER, Some("Alice@Contoso.com"), None))));
        let resolver = IdentityResolver::new(directory.clone());

        let identity = resolver.resolve_by_email(" alice@contoso.com ", &token()).await.unwrap();
        assert_eq!(identity.directory_id.to_string(), USER);
        assert_eq!(identity.email, "alice@contoso.com");
        assert_eq!(directory.keys.lock().as_slice(), ["alice@contoso.com"]);
    }

    #[tokio::test]
    async fn test_not_found_maps_to_not_found() {
        let directory = Arc::new(MockDirectory::new(Err(RequestError::Status {
            status: 404,
            body: String::new(),
        })));
        let resolver = IdentityResolver::new(directory);

        let err = resolver.resolve_by_email("ghost@contoso.com", &token()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn test_other_failures_are_directory_errors() {
        for error in [
            RequestError::Timeout,
            RequestError::Status { status: 403, body: String::new() },
            RequestError::Status { status: 503, body: String::new() },
        ] {
            let resolver = IdentityResolver::new(Arc::new(MockDirectory::new(Err(error))));
            let err = resolver.resolve_by_email("alice@contoso.com", &token()).await.unwrap_err();
            assert!(
                matches!(err, IdentityError::Directory(DirectoryError::IdentityLookup(_))),
                "unexpected {:?}",
                err
            );
        }
    }

    #[tokio::test]
    async fn test_malformed_user_id_is_invalid_identity() {
        let resolver = IdentityResolver::new(Arc::new(MockDirectory::new(Ok(record("not-a-guid", None, None)))));
        let err = resolver.resolve_by_email("alice@contoso.com", &token()).await.unwrap_err();
        assert!(matches!(err, IdentityError::Directory(DirectoryError::InvalidIdentity(_))));
    }

    #[tokio::test]
    async fn test_resolve_by_id_prefers_mail_then_upn() {
        let id = DirectoryId::parse(USER).unwrap();

        let with_mail = IdentityResolver::new(Arc::new(MockDirectory::new(Ok(record(
            USER,
            Some("alice@contoso.com"),
            Some("alice@contoso.onmicrosoft.com"),
        )))));
        assert_eq!(with_mail.resolve_by_id(&id, &token()).await.unwrap().email, "alice@contoso.com");

        let upn_only = IdentityResolver::new(Arc::new(MockDirectory::new(Ok(record(
            USER,
            None,
            Some("alice@contoso.onmicrosoft.com"),
        )))));
        assert_eq!(
            upn_only.resolve_by_id(&id, &token()).await.unwrap().email,
            "alice@contoso.onmicrosoft.com"
        );

        let neither = IdentityResolver::new(Arc::new(MockDirectory::new(Ok(record(USER, None, None)))));
        assert_eq!(neither.resolve_by_id(&id, &token()).await.unwrap().email, "");
    }
}
