use axum::{extract::State, response::Json, routing::post, Router};
use engine::ClipContext;
use serde::Deserialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::AppState;
use crate::error::{CoreError, CoreResult};
use crate::preprocess::ClipSource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessRequest {
    path: PathBuf,
    clip_id: Option<String>,
    #[serde(default)]
    start: f64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/preprocess", post(preprocess_clip))
        .with_state(state)
}

async fn preprocess_clip(
    State(state): State<AppState>,
    Json(req): Json<PreprocessRequest>,
) -> CoreResult<Json<ClipContext>> {
    if !req.start.is_finite() || req.start < 0.0 {
        return Err(CoreError::InvalidRequest(format!(
            "start must be a non-negative number of seconds, got {}",
            req.start
        )));
    }
    let clip = ClipSource {
        clip_id: req
            .clip_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        path: req.path,
        start_offset: req.start,
    };
    info!(clip_id = %clip.clip_id, path = %clip.path.display(), "preprocess requested");

    // Cancelled when the client goes away and this future is dropped.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let context = state.preprocessor.preprocess(&clip, &cancel).await?;
    Ok(Json(context))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{send, test_app};
    use crate::tasks::executor::tests::ScriptedModel;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let app = test_app(ScriptedModel::new(Vec::new()));
        let (status, body) = send(
            &app,
            Method::POST,
            "/preprocess",
            Some(json!({ "path": "/no/such/clip.mp4", "clipId": "c1" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "SourceUnreadable");
    }

    #[tokio::test]
    async fn negative_start_is_rejected() {
        let app = test_app(ScriptedModel::new(Vec::new()));
        let (status, body) = send(
            &app,
            Method::POST,
            "/preprocess",
            Some(json!({ "path": "/no/such/clip.mp4", "start": -1.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "InvalidRequest");
    }
}
