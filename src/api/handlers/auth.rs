//! Login, refresh, current-user and logout endpoints.
//!
//! Flow Overview:
//! 1) Login verifies the form credentials on the blocking pool and returns a
//!    token pair.
//! 2) Refresh trades a refresh token for a new access token.
//! 3) `/auth/me` and logout resolve the bearer access token.
//!
//! Every token failure answers the same 401 body so probing learns nothing.

use axum::{
    extract::{Extension, Form},
    http::{header::WWW_AUTHENTICATE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::{
    principal::{extract_bearer_token, extract_client_ip, require_auth},
    types::{AccessTokenResponse, ErrorBody, LoginForm, RefreshRequest, UserResponse},
};
use crate::auth::{session::TOKEN_TYPE_BEARER, AuthError, SessionFacade, SessionTokens};

/// Map a core error to its HTTP response. Causes stay in the logs.
pub(crate) fn auth_error_response(err: &AuthError) -> Response {
    let status = match err {
        AuthError::PolicyViolation(_) => StatusCode::BAD_REQUEST,
        AuthError::BadCredentials
        | AuthError::InvalidToken
        | AuthError::WrongTokenUse
        | AuthError::UnknownIdentity => StatusCode::UNAUTHORIZED,
        AuthError::AccountLocked => StatusCode::LOCKED,
        AuthError::Internal(cause) => {
            error!("Internal authentication error: {cause}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut response = (status, Json(ErrorBody::new(err.to_string()))).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Credentials accepted.", body = SessionTokens),
        (status = 400, description = "Malformed form or identity.", body = ErrorBody),
        (status = 401, description = "Incorrect username or password.", body = ErrorBody),
        (status = 423, description = "Too many failed attempts.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(facade, headers, form))]
pub async fn login(
    facade: Extension<Arc<SessionFacade>>,
    headers: HeaderMap,
    form: Option<Form<LoginForm>>,
) -> Response {
    let Some(Form(form)) = form else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Missing username or password")),
        )
            .into_response();
    };

    let client_ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    let username = form.username;

    // bcrypt is CPU-bound
    let verify_facade = Arc::clone(&facade.0);
    let verify_username = username.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        verify_facade.authenticate(&verify_username, &form.password)
    })
    .await;

    let identity = match outcome {
        Ok(Ok(identity)) => identity,
        Ok(Err(err)) => {
            warn!(identity = %username, client_ip = %client_ip, "login rejected: {err:?}");
            return auth_error_response(&err);
        }
        Err(err) => {
            error!("Login task failed: {err}");
            return auth_error_response(&AuthError::Internal(err.to_string()));
        }
    };

    let mut claims = serde_json::Map::new();
    claims.insert(
        "name".to_string(),
        serde_json::Value::from(identity.display_name.clone()),
    );

    match facade.issue_session_with_claims(&identity, Some(claims)) {
        Ok(tokens) => {
            info!(identity = %identity.identity_key, client_ip = %client_ip, "session issued");
            (StatusCode::OK, Json(tokens)).into_response()
        }
        Err(err) => auth_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token.", body = AccessTokenResponse),
        (status = 400, description = "Missing refresh token.", body = ErrorBody),
        (status = 401, description = "Refresh token rejected.", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip(facade, headers, payload))]
pub async fn refresh(
    facade: Extension<Arc<SessionFacade>>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("Missing refresh_token")),
        )
            .into_response();
    };

    match facade.refresh_access(request.refresh_token.trim()) {
        Ok(access_token) => {
            let response = AccessTokenResponse {
                access_token,
                token_type: TOKEN_TYPE_BEARER.to_string(),
                expires_in_seconds: facade.access_ttl_seconds(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            let client_ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
            warn!(client_ip = %client_ip, "refresh rejected: {err:?}");
            auth_error_response(&err)
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "The authenticated identity.", body = UserResponse),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(facade: Extension<Arc<SessionFacade>>, headers: HeaderMap) -> Response {
    match require_auth(&headers, &facade) {
        Ok(identity) => {
            let response = UserResponse {
                email: identity.identity_key,
                name: identity.display_name,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            debug!("/auth/me rejected: {err:?}");
            auth_error_response(&err)
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out. Tokens stay valid until they expire."),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(facade: Extension<Arc<SessionFacade>>, headers: HeaderMap) -> StatusCode {
    let client_ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    match extract_bearer_token(&headers).map(|token| facade.resolve_current_user(&token)) {
        Some(Ok(identity)) => {
            info!(identity = %identity.identity_key, client_ip = %client_ip, "logout");
        }
        Some(Err(err)) => debug!(client_ip = %client_ip, "logout with unusable token: {err:?}"),
        None => debug!(client_ip = %client_ip, "logout without token"),
    }
    StatusCode::NO_CONTENT
}
