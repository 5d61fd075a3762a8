//! Group membership governance.
//!
//! Domain types, role sets, repository traits and the services that
//! enforce who may join a group and who may change it.

mod actions;
mod facade;
mod repository;
mod response;
mod roles;
mod types;

pub use actions::{InvitationLinkService, JoinRequestWorkflow, MembershipStore, RoleGuard};
pub use facade::GroupAdminFacade;
pub use repository::{
    Admission, AdmissionSource, CreateGroup, CreateInvitationLink, CreateJoinRequest,
    GroupRepository, GroupSettings, InvitationLinkRepository, JoinRequestRepository,
    MembershipRepository,
};
pub use response::{
    ApiResponse, ApprovedRequest, BulkApproval, BulkFailure, BulkOutcome, BulkRejection,
    GroupInfo, INTERNAL_ERROR_MESSAGE, LinkView,
};
pub use roles::{Role, RoleSet};
pub use types::{
    Group, GroupStatus, GroupVisibility, InvitationLink, JoinRequest, JoinRequestStatus,
    Membership, MembershipStatus,
};

#[cfg(any(test, feature = "mocks"))]
mod mocks;

#[cfg(any(test, feature = "mocks"))]
pub use mocks::{
    MockDatabase, MockGroupRepository, MockInvitationLinkRepository, MockJoinRequestRepository,
    MockMembershipRepository,
};
