//! Governance services built on the repository traits.

mod guard;
mod invitation;
mod join_request;
mod membership;

pub use guard::RoleGuard;
pub use invitation::InvitationLinkService;
pub use join_request::JoinRequestWorkflow;
pub use membership::MembershipStore;
