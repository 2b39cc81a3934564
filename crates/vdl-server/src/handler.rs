use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use vdl_keys::VersionKey;
use vdl_store::StoreError;
use vdl_sync::{JsonArrayDecoder, JsonArrayEncoder, SyncError, SyncRecord, SyncResult};

use crate::error::ApiError;
use crate::state::AppState;

/// `?output=json` switches the line-oriented text responses to JSON.
#[derive(Debug, Default, Deserialize)]
pub struct OutputQuery {
    output: Option<String>,
}

impl OutputQuery {
    fn is_json(&self) -> bool {
        self.output.as_deref() == Some("json")
    }
}

/// `GET /_data` — all document ids.
pub async fn list_docs(
    State(state): State<AppState>,
    Query(query): Query<OutputQuery>,
) -> Result<Response, ApiError> {
    let docs = state.store.docs()?;
    Ok(if query.is_json() {
        Json(docs).into_response()
    } else {
        plain_lines(&docs)
    })
}

/// `GET /_data/:doc` — version labels, newest first.
pub async fn doc_history(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Query(query): Query<OutputQuery>,
) -> Result<Response, ApiError> {
    let labels: Vec<String> = state
        .store
        .history(&doc)?
        .iter()
        .map(VersionKey::version_label)
        .collect();
    Ok(if query.is_json() {
        Json(labels).into_response()
    } else {
        plain_lines(&labels)
    })
}

/// `POST /_data/:doc` — create the document's root version.
pub async fn create_doc(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    Query(query): Query<OutputQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let key = state.store.create(&doc, &body)?;
    Ok(if query.is_json() {
        Json(json!({ "key": key.encode() })).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    })
}

/// `GET /_data/:doc/:version` — read one version's bytes.
pub async fn read_version(
    State(state): State<AppState>,
    Path((doc, version)): Path<(String, String)>,
    Query(query): Query<OutputQuery>,
) -> Result<Response, ApiError> {
    let key = VersionKey::from_label(&doc, &version)?;
    let value = state.store.read(&key)?;
    Ok(if query.is_json() {
        // Same {key, value-as-base64} shape as the sync wire format.
        Json(SyncRecord::new(key.encode(), value)).into_response()
    } else {
        bytes_with_guessed_type(&doc, value)
    })
}

/// `POST /_data/:doc/:version` — write a new version with this parent.
pub async fn update_version(
    State(state): State<AppState>,
    Path((doc, version)): Path<(String, String)>,
    Query(query): Query<OutputQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let parent = VersionKey::from_label(&doc, &version)?;
    let update = state.store.update(&parent, &body)?;
    Ok(if query.is_json() {
        Json(json!({
            "key": update.key.encode(),
            "prev": update.prev.encode(),
        }))
        .into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    })
}

/// `DELETE /_data/:doc/:version` — remove one version record.
pub async fn delete_version(
    State(state): State<AppState>,
    Path((doc, version)): Path<(String, String)>,
    Query(query): Query<OutputQuery>,
) -> Result<Response, ApiError> {
    let key = VersionKey::from_label(&doc, &version)?;
    state.store.del(&key)?;
    Ok(if query.is_json() {
        Json(json!({ "key": key.encode() })).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    })
}

/// `GET /_files/:doc` — the most recent version's bytes.
pub async fn latest_file(
    State(state): State<AppState>,
    Path(doc): Path<String>,
) -> Result<Response, ApiError> {
    let (_key, value) = state.store.latest(&doc)?;
    Ok(bytes_with_guessed_type(&doc, value))
}

/// `GET /_sync` — stream the full dataset as an incrementally produced
/// JSON array.
pub async fn sync_export(State(state): State<AppState>) -> Response {
    let chunks = JsonArrayEncoder::new(state.engine.export_all())
        .map(|chunk| chunk.map(Bytes::from));
    let body = Body::from_stream(futures_util::stream::iter(chunks));
    (
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

/// `POST /_sync` — body is a peer base URL; pull its export and merge.
pub async fn sync_pull(
    State(state): State<AppState>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let peer = body.trim().trim_end_matches('/').to_owned();
    if peer.is_empty() {
        return Err(ApiError::BadRequest("missing peer url".into()));
    }

    let response = state
        .http
        .get(format!("{peer}/_sync"))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| SyncError::Transport(e.to_string()))?;

    // The merge consumes a blocking iterator; feed it decoded records from
    // the response stream over a channel. If the merge bails out early the
    // channel closes and we stop pulling from the peer.
    let (tx, rx) = std::sync::mpsc::channel::<SyncResult<SyncRecord>>();
    let engine = state.engine.clone();
    let merge = tokio::task::spawn_blocking(move || engine.merge_from(rx));

    let mut decoder = JsonArrayDecoder::new();
    let mut stream = response.bytes_stream();
    let feed: SyncResult<()> = async {
        'chunks: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SyncError::Transport(e.to_string()))?;
            decoder.feed(&chunk);
            while let Some(record) = decoder.next_record()? {
                if tx.send(Ok(record)).is_err() {
                    break 'chunks;
                }
            }
        }
        decoder.finish()
    }
    .await;
    if let Err(err) = feed {
        let _ = tx.send(Err(err));
    }
    drop(tx);

    let outcome = merge
        .await
        .map_err(|e| {
            SyncError::Store(StoreError::Backend(format!("merge task failed: {e}")))
        })??;
    info!(
        %peer,
        received = outcome.received,
        applied = outcome.applied,
        skipped = outcome.skipped,
        "synchronisation from peer completed"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// Catch-all for unknown routes.
pub async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "not found\n")
}

fn plain_lines(lines: &[String]) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("{}\n", lines.join("\n")),
    )
        .into_response()
}

fn bytes_with_guessed_type(doc: &str, value: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(doc).first_or_octet_stream();
    ([(header::CONTENT_TYPE, mime.to_string())], value).into_response()
}
