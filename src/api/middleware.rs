use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use super::error::ApiError;
use super::routes::GroupsState;
use crate::GroupError;
use crate::groups::{
    GroupRepository, InvitationLinkRepository, JoinRequestRepository, MembershipRepository,
};

/// Resolves a bearer token to a user id.
///
/// Session issuance lives outside this crate; implement this over whatever
/// auth service the application uses.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the user behind `token`, or `None` if the token is unknown.
    async fn resolve(&self, token: &str) -> Result<Option<i64>, GroupError>;
}

/// Fixed token-to-user table, for development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, i64>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user_id: i64) -> Self {
        self.tokens.insert(token.into(), user_id);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> Result<Option<i64>, GroupError> {
        Ok(self.tokens.get(token).copied())
    }
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
}

/// The authenticated caller, resolved through the state's [`IdentityProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub i64);

impl CurrentUser {
    pub fn id(self) -> i64 {
        self.0
    }
}

impl<G, M, L, J> FromRequestParts<GroupsState<G, M, L, J>> for CurrentUser
where
    G: GroupRepository + Clone + 'static,
    M: MembershipRepository + Clone + 'static,
    L: InvitationLinkRepository + 'static,
    J: JoinRequestRepository + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GroupsState<G, M, L, J>,
    ) -> Result<Self, Self::Rejection> {
        let token =
            extract_bearer_token(&parts.headers).ok_or(ApiError(GroupError::Unauthenticated))?;

        let user_id = state
            .identity
            .resolve(&token)
            .await?
            .ok_or(ApiError(GroupError::Unauthenticated))?;

        Ok(CurrentUser(user_id))
    }
}
