use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::GroupError;
use crate::groups::ApiResponse;

/// Maps an error kind onto an HTTP status.
pub fn status_for(error: &GroupError) -> StatusCode {
    match error {
        GroupError::Unauthenticated => StatusCode::UNAUTHORIZED,
        GroupError::NotMember | GroupError::InsufficientRole => StatusCode::FORBIDDEN,
        GroupError::GroupNotFound
        | GroupError::RequestNotFound
        | GroupError::MemberNotFound
        | GroupError::InvalidToken => StatusCode::NOT_FOUND,
        GroupError::CapacityExceeded
        | GroupError::AlreadyMember
        | GroupError::DuplicatePending
        | GroupError::RequestNotPending
        | GroupError::CannotRemoveOwner
        | GroupError::CannotAssignOwner
        | GroupError::CannotChangeOwnerRole => StatusCode::CONFLICT,
        GroupError::TokenExpired | GroupError::TokenRevoked => StatusCode::GONE,
        GroupError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GroupError::DatabaseError(_) | GroupError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// converts `GroupError` into an enveloped HTTP response
#[derive(Debug)]
pub struct ApiError(pub GroupError);

impl From<GroupError> for ApiError {
    fn from(err: GroupError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        (status, Json(ApiResponse::<()>::failure(self.0))).into_response()
    }
}

/// Renders a facade response, picking the status from its error if it failed.
pub(super) fn reply<T: Serialize>(response: ApiResponse<T>, success: StatusCode) -> Response {
    let status = response.error.as_ref().map_or(success, status_for);
    (status, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_map_to_distinct_statuses() {
        assert_eq!(status_for(&GroupError::InvalidToken), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&GroupError::TokenExpired), StatusCode::GONE);
        assert_eq!(status_for(&GroupError::TokenRevoked), StatusCode::GONE);
    }

    #[test]
    fn test_authorization_and_capacity() {
        assert_eq!(status_for(&GroupError::NotMember), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&GroupError::InsufficientRole), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&GroupError::CapacityExceeded), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&GroupError::DatabaseError("gone".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
