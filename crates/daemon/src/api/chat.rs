use axum::{extract::State, response::Json, routing::post, Router};
use engine::{render_context, ClipContext, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::AppState;
use crate::error::CoreResult;
use crate::llm::ChatMessage;
use crate::planner::PlanOutcome;
use crate::preprocess::validate_contexts;
use crate::tasks::AdvanceOutcome;

/// One conversation exchange. Clip contexts are the ones previously returned
/// by `/preprocess`, sent back by the client for every turn.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatRequest {
    #[serde(rename_all = "camelCase")]
    NewChat {
        messages: Vec<ChatMessage>,
        #[serde(default)]
        clip_contexts: Vec<ClipContext>,
    },
    #[serde(rename_all = "camelCase")]
    ContinueTask {
        task_id: TaskId,
        #[serde(default)]
        clip_contexts: Vec<ClipContext>,
    },
    #[serde(rename_all = "camelCase")]
    EndTask { task_id: TaskId },
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatResponse {
    #[serde(rename_all = "camelCase")]
    FunctionCall {
        task_id: TaskId,
        step_index: usize,
        step_text: String,
        function_name: String,
        function_args: Value,
    },
    #[serde(rename_all = "camelCase")]
    Message {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<TaskId>,
    },
    #[serde(rename_all = "camelCase")]
    TaskComplete { task_id: TaskId },
}

impl From<AdvanceOutcome> for ChatResponse {
    fn from(outcome: AdvanceOutcome) -> Self {
        match outcome {
            AdvanceOutcome::Action(step) => ChatResponse::FunctionCall {
                task_id: step.task_id,
                step_index: step.step_index,
                step_text: step.step_text,
                function_name: step.action.name().to_string(),
                function_args: step.action.arguments(),
            },
            AdvanceOutcome::Reply {
                task_id, message, ..
            } => ChatResponse::Message {
                message,
                task_id: Some(task_id),
            },
            AdvanceOutcome::Completed { task_id } => ChatResponse::TaskComplete { task_id },
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(state)
}

fn rendered(clips: &[ClipContext]) -> CoreResult<String> {
    validate_contexts(clips)?;
    Ok(render_context(clips))
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> CoreResult<Json<ChatResponse>> {
    let response = match req {
        ChatRequest::NewChat {
            messages,
            clip_contexts,
        } => {
            let context = rendered(&clip_contexts)?;
            info!(messages = messages.len(), clips = clip_contexts.len(), "new chat");
            match state.planner.request_for_plan(&context, &messages).await? {
                PlanOutcome::Reply(message) => ChatResponse::Message {
                    message,
                    task_id: None,
                },
                PlanOutcome::Started { first, .. } => first.into(),
            }
        }
        ChatRequest::ContinueTask {
            task_id,
            clip_contexts,
        } => {
            let context = rendered(&clip_contexts)?;
            state.executor().advance(task_id, &context).await?.into()
        }
        ChatRequest::EndTask { task_id } => {
            let task = state.executor().terminate(task_id).await?;
            ChatResponse::Message {
                message: format!(
                    "Ended task {task_id} after {} of {} steps.",
                    task.completed_steps().len(),
                    task.steps.len()
                ),
                task_id: Some(task_id),
            }
        }
    };
    Ok(Json(response))
}
