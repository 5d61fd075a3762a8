use crate::GroupError;
use crate::groups::{Membership, MembershipRepository, RoleSet};

/// Authorizes a caller against an explicit set of allowed roles.
///
/// There is no implied hierarchy: an operation open to owners and admins
/// must pass `RoleSet::GOVERNORS`, not just `Role::Admin`.
#[derive(Clone)]
pub struct RoleGuard<M>
where
    M: MembershipRepository,
{
    membership_repo: M,
}

impl<M> RoleGuard<M>
where
    M: MembershipRepository,
{
    pub fn new(membership_repo: M) -> Self {
        Self { membership_repo }
    }

    /// Returns the caller's active membership if its role is in `allowed`.
    ///
    /// # Returns
    ///
    /// - `Ok(membership)` - The caller may proceed
    /// - `Err(GroupError::NotMember)` - No active membership in the group
    /// - `Err(GroupError::InsufficientRole)` - Role not in `allowed`
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "authorize", skip(self), err)
    )]
    pub async fn authorize(
        &self,
        group_id: i64,
        user_id: i64,
        allowed: RoleSet,
    ) -> Result<Membership, GroupError> {
        let membership = self
            .membership_repo
            .find_active(group_id, user_id)
            .await?
            .ok_or(GroupError::NotMember)?;

        if !allowed.contains(membership.role) {
            log::debug!(
                target: "groupgate",
                "msg=\"role not allowed\", group_id={group_id}, user_id={user_id}, role={}, allowed={allowed:?}",
                membership.role
            );
            return Err(GroupError::InsufficientRole);
        }

        Ok(membership)
    }
}
