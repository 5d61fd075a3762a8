//! HTTP binding for [`GroupAdminFacade`](crate::groups::GroupAdminFacade).
//!
//! Every route answers with the [`ApiResponse`](crate::groups::ApiResponse)
//! envelope. The HTTP status follows the error kind.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use groupgate::api::{GroupsState, router};
//!
//! let state = GroupsState::new(Arc::new(facade), Arc::new(my_identity_provider));
//! let app = axum::Router::new().nest("/api", router(state));
//! ```

mod error;
mod handlers;
mod middleware;
mod routes;
mod types;

pub use error::{ApiError, status_for};
pub use middleware::{
    CurrentUser, IdentityProvider, StaticIdentityProvider, extract_bearer_token,
};
pub use routes::{GroupsState, group_routes, router};
pub use types::{
    BulkRemoveRequest, BulkRoleChangeRequest, ChangeRoleRequest, JoinGroupRequest, RoleChange,
};
