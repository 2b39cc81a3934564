use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};
use vdl_keys::KeyError;
use vdl_store::StoreError;
use vdl_sync::SyncError;

/// Errors from server bootstrap and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Error produced by a request handler, mapped to a status code.
///
/// The core classifies (`NotFound`, `DocExists`, `MalformedKey`,
/// `StoreError`); user-facing messaging and logging happen here at the
/// gateway, nowhere deeper.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_body(&self) -> (StatusCode, String) {
        match self {
            ApiError::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "not found\n".into())
            }
            ApiError::Store(StoreError::DocExists(_)) => {
                (StatusCode::CONFLICT, "document already exists\n".into())
            }
            ApiError::Store(StoreError::MalformedKey(_)) | ApiError::Key(_) => {
                (StatusCode::BAD_REQUEST, "malformed key\n".into())
            }
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server error\n".into()),
            ApiError::Sync(SyncError::Transport(_)) => {
                (StatusCode::BAD_GATEWAY, "peer unreachable\n".into())
            }
            ApiError::Sync(SyncError::Codec(_)) | ApiError::Sync(SyncError::Key(_)) => {
                (StatusCode::BAD_GATEWAY, "peer sent a malformed stream\n".into())
            }
            ApiError::Sync(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server error\n".into()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, format!("{msg}\n")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            error!(%status, err = %self, "request failed");
        } else if status == StatusCode::CONFLICT {
            warn!(err = %self, "create conflict");
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_distinct_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                StoreError::NotFound("k".into()).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::DocExists("d".into()).into(),
                StatusCode::CONFLICT,
            ),
            (
                KeyError::Malformed("bad".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                StoreError::Backend("disk".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                SyncError::Transport("refused".into()).into(),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_and_body().0, expected);
        }
    }
}
