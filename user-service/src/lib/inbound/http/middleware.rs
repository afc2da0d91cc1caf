use axum::extract::Request;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::user::models::UserId;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::handlers::UNAUTHORIZED_MESSAGE;
use crate::inbound::http::router::AppState;

/// Extension type to store the authenticated caller in request extensions.
///
/// Inserted by [`authenticate`] and dropped with the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: String,
}

/// Why an `Authorization` header could not yield a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderRejection {
    Missing,
    NotVisibleAscii,
    MalformedScheme,
}

impl HeaderRejection {
    fn as_str(&self) -> &'static str {
        match self {
            HeaderRejection::Missing => "missing authorization header",
            HeaderRejection::NotVisibleAscii => "authorization header is not valid ASCII",
            HeaderRejection::MalformedScheme => "authorization header is not `Bearer <token>`",
        }
    }
}

/// Middleware that validates bearer tokens and adds the caller to request extensions.
///
/// Every rejection produces the same 401 response; the reason is only logged.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token_from_header(req.headers()).map_err(|rejection| {
        tracing::warn!(reason = rejection.as_str(), "Rejected unauthenticated request");
        unauthorized()
    })?;

    let claims = state.authenticator.validate_token(token).map_err(|e| {
        tracing::warn!(error = %e, "Token validation failed");
        unauthorized()
    })?;

    let user_id = UserId::from_string(&claims.sub).map_err(|e| {
        tracing::warn!(error = %e, "Token subject is not a user ID");
        unauthorized()
    })?;

    tracing::debug!(
        user_id = %user_id,
        issued_at = ?claims.issued_at(),
        expires_at = ?claims.expires_at(),
        "Request authenticated"
    );

    req.extensions_mut().insert(AuthenticatedUser {
        user_id,
        email: claims.email,
    });

    Ok(next.run(req).await)
}

fn unauthorized() -> ApiError {
    ApiError::Unauthorized(UNAUTHORIZED_MESSAGE.to_string())
}

fn extract_token_from_header(headers: &HeaderMap) -> Result<&str, HeaderRejection> {
    let auth_str = headers
        .get(header::AUTHORIZATION)
        .ok_or(HeaderRejection::Missing)?
        .to_str()
        .map_err(|_| HeaderRejection::NotVisibleAscii)?;

    let mut parts = auth_str.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(HeaderRejection::MalformedScheme),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use auth::Authenticator;
    use auth::JwtHandler;
    use axum::body::to_bytes;
    use axum::body::Body;
    use axum::http::HeaderValue;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Extension;
    use axum::Json;
    use axum::Router;
    use chrono::Duration;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::user::service::UserService;
    use crate::outbound::repositories::InMemoryUserRepository;

    const SECRET: &[u8] = b"test_secret_key_at_least_32_bytes!";

    async fn whoami(Extension(user): Extension<AuthenticatedUser>) -> Json<serde_json::Value> {
        Json(json!({ "user_id": user.user_id.to_string(), "email": user.email }))
    }

    fn app(validity: Duration) -> Router {
        let authenticator = Arc::new(Authenticator::new(SECRET, validity));
        let user_service = Arc::new(UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::clone(&authenticator),
        ));
        let state = AppState {
            user_service,
            authenticator,
        };

        Router::new()
            .route("/whoami", get(whoami))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                authenticate,
            ))
            .with_state(state)
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut request = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }

        let response = app
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn token_for(user_id: &str, validity: Duration) -> String {
        Authenticator::new(SECRET, validity)
            .generate_token(user_id, "alice@x.com")
            .unwrap()
    }

    #[test]
    fn test_extract_token_from_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            extract_token_from_header(&headers),
            Err(HeaderRejection::Missing)
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token_from_header(&headers), Ok("abc.def.ghi"));

        for malformed in ["Basic abc", "Bearer", "Bearer ", "bearer abc", "Bearer a b", "Token abc"] {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(malformed));
            assert_eq!(
                extract_token_from_header(&headers),
                Err(HeaderRejection::MalformedScheme),
                "{:?}",
                malformed
            );
        }

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
        );
        assert_eq!(
            extract_token_from_header(&headers),
            Err(HeaderRejection::NotVisibleAscii)
        );
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let user_id = UserId::new();
        let token = token_for(&user_id.to_string(), Duration::hours(1));
        let authorization = format!("Bearer {}", token);

        let (status, body) = call(app(Duration::hours(1)), Some(authorization.as_str())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], user_id.to_string());
        assert_eq!(body["email"], "alice@x.com");
    }

    #[tokio::test]
    async fn test_all_rejections_look_the_same() {
        let user_id = UserId::new().to_string();
        let expired = token_for(&user_id, Duration::zero());
        let foreign = Authenticator::new(b"another_secret_key_of_32_bytes!!", Duration::hours(1))
            .generate_token(&user_id, "alice@x.com")
            .unwrap();
        let not_a_uuid = token_for("user123", Duration::hours(1));
        let missing_claims = JwtHandler::new(SECRET)
            .encode(&json!({ "sub": user_id }))
            .unwrap();

        let headers = [
            None,
            Some("Basic dXNlcjpwYXNz".to_string()),
            Some("Bearer".to_string()),
            Some("Bearer garbage".to_string()),
            Some(format!("Bearer {}", expired)),
            Some(format!("Bearer {}", foreign)),
            Some(format!("Bearer {}", not_a_uuid)),
            Some(format!("Bearer {}", missing_claims)),
        ];

        for authorization in headers {
            let (status, body) = call(app(Duration::hours(1)), authorization.as_deref()).await;

            assert_eq!(status, StatusCode::UNAUTHORIZED, "{:?}", authorization);
            assert_eq!(body, json!({ "error": "Unauthorized" }), "{:?}", authorization);
        }
    }

    #[tokio::test]
    async fn test_identity_does_not_leak_between_requests() {
        let router = app(Duration::hours(1));
        let token = token_for(&UserId::new().to_string(), Duration::hours(1));
        let authorization = format!("Bearer {}", token);

        let (first, _) = call(router.clone(), Some(authorization.as_str())).await;
        let (second, _) = call(router, None).await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::UNAUTHORIZED);
    }
}
