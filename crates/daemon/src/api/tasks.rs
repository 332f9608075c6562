use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use engine::{Task, TaskId};

use super::AppState;
use crate::error::CoreResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/:id", get(get_task).delete(end_task))
        .with_state(state)
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> CoreResult<Json<Task>> {
    Ok(Json(state.store().get(id).await?))
}

async fn end_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> CoreResult<Json<Task>> {
    Ok(Json(state.executor().terminate(id).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{send, test_app};
    use crate::llm::PlanDecision;
    use crate::tasks::executor::tests::{call, ScriptedModel};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn task_can_be_read_then_ended() {
        let model = ScriptedModel::new(vec![call("deleteClip", json!({ "clipId": "b" }))])
            .with_plans(vec![Ok(PlanDecision::Steps(vec![
                "delete clip b".into(),
                "fade in clip a".into(),
            ]))]);
        let app = test_app(model);
        let (_, body) = send(
            &app,
            Method::POST,
            "/chat",
            Some(json!({ "type": "new_chat", "messages": [] })),
        )
        .await;
        let task_id = body["taskId"].as_u64().unwrap();
        let uri = format!("/tasks/{task_id}");

        let (status, task) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(task["taskId"], task_id);
        assert_eq!(task["currentStepIndex"], 0);
        assert_eq!(task["steps"], json!(["delete clip b", "fade in clip a"]));

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "UnknownTask");
    }
}
