use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    auth::auth_error_response,
    principal::{extract_client_ip, require_auth},
    types::{AnalyzeRequest, AnalyzeResponse, ErrorBody},
    valid_email,
};
use crate::{
    analysis::{self, AnalysisError, TextAnalyzer},
    auth::SessionFacade,
};

fn analysis_error_response(err: &AnalysisError) -> Response {
    let (status, detail) = match err {
        AnalysisError::Validation(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        AnalysisError::NotConfigured => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        AnalysisError::Upstream(_) => (
            StatusCode::BAD_GATEWAY,
            "text analysis failed".to_string(),
        ),
    };
    (status, Json(ErrorBody::new(detail))).into_response()
}

#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis result.", body = AnalyzeResponse),
        (status = 400, description = "Description too short or invalid payload.", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token.", body = ErrorBody),
        (status = 502, description = "Analysis provider failed.", body = ErrorBody),
        (status = 503, description = "Analysis provider not configured.", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "analysis"
)]
#[instrument(skip(facade, analyzer, headers, payload))]
pub async fn analyze(
    facade: Extension<Arc<SessionFacade>>,
    analyzer: Extension<Arc<dyn TextAnalyzer>>,
    headers: HeaderMap,
    payload: Option<Json<AnalyzeRequest>>,
) -> Response {
    let identity = match require_auth(&headers, &facade) {
        Ok(identity) => identity,
        Err(err) => return auth_error_response(&err),
    };

    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::new("Missing payload"))).into_response();
    };

    if !valid_email(request.email.trim()) {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::new("Invalid email"))).into_response();
    }

    let client_ip = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());

    match analysis::analyze(analyzer.0.as_ref(), &request.description).await {
        Ok(result) => {
            info!(identity = %identity.identity_key, client_ip = %client_ip, "analysis served");
            (StatusCode::OK, Json(AnalyzeResponse { result })).into_response()
        }
        Err(err) => {
            match &err {
                AnalysisError::Validation(_) => warn!(identity = %identity.identity_key, "{err}"),
                _ => error!(identity = %identity.identity_key, client_ip = %client_ip, "{err}"),
            }
            analysis_error_response(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping() {
        assert_eq!(
            analysis_error_response(&AnalysisError::Validation("short".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            analysis_error_response(&AnalysisError::NotConfigured).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            analysis_error_response(&AnalysisError::Upstream("timeout".to_string())).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
