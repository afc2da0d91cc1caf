use axum::http::StatusCode;
use axum::Extension;
use serde::Serialize;

use super::ApiSuccess;
use crate::inbound::http::middleware::AuthenticatedUser;

pub async fn protected(
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiSuccess<ProtectedResponseData> {
    ApiSuccess::new(
        StatusCode::OK,
        ProtectedResponseData {
            message: "You are authenticated".to_string(),
            user_id: user.user_id.to_string(),
        },
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtectedResponseData {
    pub message: String,
    pub user_id: String,
}
