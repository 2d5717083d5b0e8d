//! HTTP error mapping.
//!
//! Handlers return [`ApiError`]; the response it produces only carries the
//! status and an [`ErrorDetails`] extension. [`render_errors`] then turns that
//! into the JSON error body, because only the outer middleware knows the
//! request path and id.

use crate::security::AuthError;
use crate::session::SessionError;
use axum::{
    body::Body,
    extract::{Extension, Request},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use super::REQUEST_ID_HEADER;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid Credentials")]
    InvalidCredentials,
    #[error("{1}")]
    Rejected(StatusCode, String),
    #[error("Access Denied")]
    Forbidden,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("{0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::Task(message) => Self::Internal(message),
        }
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Rejected(status, _) => *status,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Marker left on error responses for [`render_errors`].
#[derive(Clone, Debug)]
pub struct ErrorDetails {
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Forbidden => return status.into_response(),
            Self::Session(_) | Self::Internal(_) => error!("{self}"),
            Self::InvalidCredentials | Self::Rejected(..) => debug!("{self}"),
        }

        let details = ErrorDetails {
            message: self.to_string(),
        };
        (status, Extension(details)).into_response()
    }
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    timestamp: String,
    path: String,
    status: u16,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

pub async fn render_errors(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);

    let response = next.run(request).await;

    let Some(details) = response.extensions().get::<ErrorDetails>().cloned() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    parts.extensions.remove::<ErrorDetails>();

    let body = ErrorBody {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        path,
        status: parts.status.as_u16(),
        error: parts.status.canonical_reason().unwrap_or("Unknown"),
        message: details.message,
        request_id,
    };

    parts.headers.remove(CONTENT_LENGTH);
    match serde_json::to_vec(&body) {
        Ok(bytes) => {
            parts
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            error!("Failed to serialize error body: {err}");
            Response::from_parts(parts, Body::empty())
        }
    }
}
