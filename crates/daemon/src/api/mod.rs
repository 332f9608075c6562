use axum::Router;
use std::sync::Arc;

use crate::planner::Planner;
use crate::preprocess::Preprocessor;
use crate::tasks::{PlanExecutor, TaskStore};

pub mod chat;
pub mod preprocess;
pub mod tasks;

/// Shared services behind every route.
#[derive(Clone)]
pub struct AppState {
    pub preprocessor: Arc<Preprocessor>,
    pub planner: Arc<Planner>,
}

impl AppState {
    pub fn executor(&self) -> &Arc<PlanExecutor> {
        self.planner.executor()
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        self.executor().store()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(preprocess::router(state.clone()))
        .merge(chat::router(state.clone()))
        .nest("/tasks", tasks::router(state))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CoreResult;
    use crate::llm::{FrameDescriber, Transcriber};
    use crate::tasks::executor::tests::ScriptedModel;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use engine::transcript::Transcript;
    use engine::visual::SampledFrame;
    use serde_json::Value;
    use std::path::Path;
    use tower::ServiceExt;

    struct BlankDescriber;

    #[async_trait]
    impl FrameDescriber for BlankDescriber {
        async fn describe(&self, _frame: &SampledFrame) -> CoreResult<String> {
            Ok(String::new())
        }
    }

    struct SilentTranscriber;

    #[async_trait]
    impl Transcriber for SilentTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> CoreResult<Transcript> {
            Ok(Transcript::default())
        }
    }

    pub(crate) fn test_app(model: ScriptedModel) -> Router {
        let model = Arc::new(model);
        let store = Arc::new(TaskStore::new());
        let executor = Arc::new(PlanExecutor::new(store, model.clone()));
        let state = AppState {
            preprocessor: Arc::new(Preprocessor::new(
                Arc::new(BlankDescriber),
                Arc::new(SilentTranscriber),
                2,
                64,
                std::env::temp_dir(),
            )),
            planner: Arc::new(Planner::new(model, executor)),
        };
        router(state)
    }

    /// Send one request through `app` and decode the JSON body.
    pub(crate) async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}
