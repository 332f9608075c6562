use async_trait::async_trait;
use base64::Engine as _;
use engine::actions::function_definitions;
use engine::transcript::Transcript;
use engine::visual::SampledFrame;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use super::prompts;
use super::{
    ActionRequest, ActionSelection, ChatMessage, FrameDescriber, PlanDecision, PlanningRequest,
    ReasoningModel, Role, Transcriber,
};
use crate::error::{CoreError, CoreResult};

/// Answer shape shared by the reasoning endpoints.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModelResponse {
    FunctionCall {
        function_name: String,
        #[serde(default)]
        function_args: Value,
    },
    Message {
        #[serde(default)]
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct DescribeResponse {
    description: String,
}

#[derive(Debug, Deserialize)]
struct CreateTaskArgs {
    steps: Vec<String>,
}

/// Failure of one ML service call. Callers fold it into the `CoreError` kind
/// of the model they were talking to.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned {status}: {body}")]
    Status {
        path: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid response from {path}: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl ServiceError {
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            ServiceError::Transport { source, .. } | ServiceError::Decode { source, .. } => {
                source.status()
            }
        }
    }
}

/// HTTP client for the ML service that fronts the vision, reasoning and
/// transcription models.
#[derive(Clone)]
pub struct MlServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl MlServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        MlServiceClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &'static str,
        body: &Value,
    ) -> Result<T, ServiceError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|source| ServiceError::Transport { path, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ServiceError::Status { path, status, body });
        }
        response
            .json()
            .await
            .map_err(|source| ServiceError::Decode { path, source })
    }
}

fn encode_png(frame: &SampledFrame) -> CoreResult<String> {
    let image = image::RgbImage::from_raw(frame.frame.width, frame.frame.height, frame.frame.data.clone())
        .ok_or_else(|| CoreError::Internal("frame buffer does not match its dimensions".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|e| CoreError::Internal(format!("encoding frame {}: {e}", frame.second)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}

fn messages_json(system: &str, history: &[ChatMessage]) -> Value {
    let system = ChatMessage {
        role: Role::System,
        content: system.to_string(),
    };
    json!(std::iter::once(&system).chain(history).collect::<Vec<_>>())
}

#[async_trait]
impl FrameDescriber for MlServiceClient {
    async fn describe(&self, frame: &SampledFrame) -> CoreResult<String> {
        let body = json!({
            "second": frame.second,
            "image": encode_png(frame)?,
        });
        let response: DescribeResponse = self
            .post_json("/vision/describe", &body)
            .await
            .map_err(|e| {
                warn!(status = ?e.status(), error = %e, "ML service call failed");
                CoreError::DescribeUnavailable(e.to_string())
            })?;
        debug!(second = frame.second, "frame described");
        Ok(response.description)
    }
}

#[async_trait]
impl ReasoningModel for MlServiceClient {
    async fn select_action(&self, request: &ActionRequest) -> CoreResult<ActionSelection> {
        let step = ChatMessage::user(prompts::action_step_message(
            &request.completed_steps,
            &request.step,
        ));
        let body = json!({
            "context": request.context,
            "messages": messages_json(prompts::ACTION_SYSTEM_PROMPT, &[step]),
            "functions": function_definitions(&request.allowed),
            "function_call": "auto",
        });
        let response: ModelResponse = self
            .post_json("/reason/select_action", &body)
            .await
            .map_err(|e| {
                warn!(status = ?e.status(), error = %e, "ML service call failed");
                CoreError::ModelUnavailable(e.to_string())
            })?;

        Ok(match response {
            ModelResponse::FunctionCall {
                function_name,
                function_args,
            } => ActionSelection::Call {
                name: function_name,
                arguments: function_args,
            },
            ModelResponse::Message { message } => ActionSelection::Reply(message),
        })
    }

    async fn decompose_plan(&self, request: &PlanningRequest) -> CoreResult<PlanDecision> {
        let body = json!({
            "context": request.context,
            "messages": messages_json(prompts::PLAN_SYSTEM_PROMPT, &request.history),
            "functions": [prompts::create_task_function()],
            "function_call": "auto",
        });
        let response: ModelResponse = self
            .post_json("/reason/plan", &body)
            .await
            .map_err(|e| {
                warn!(status = ?e.status(), error = %e, "ML service call failed");
                CoreError::ModelUnavailable(e.to_string())
            })?;

        match response {
            ModelResponse::Message { message } => Ok(PlanDecision::Reply(message)),
            ModelResponse::FunctionCall {
                function_name,
                function_args,
            } if function_name == "create_task" => {
                let args = match function_args {
                    Value::String(raw) => serde_json::from_str::<CreateTaskArgs>(&raw),
                    other => serde_json::from_value::<CreateTaskArgs>(other),
                }
                .map_err(|e| CoreError::ModelUnavailable(format!("malformed create_task call: {e}")))?;
                Ok(PlanDecision::Steps(args.steps))
            }
            ModelResponse::FunctionCall { function_name, .. } => {
                warn!(%function_name, "planner called an unexpected function");
                Err(CoreError::ModelUnavailable(format!(
                    "planner called unexpected function '{function_name}'"
                )))
            }
        }
    }
}

#[async_trait]
impl Transcriber for MlServiceClient {
    async fn transcribe(&self, audio_path: &Path) -> CoreResult<Transcript> {
        let body = json!({ "mediaPath": audio_path.to_string_lossy() });
        self.post_json("/transcribe", &body)
            .await
            .map_err(|e| {
                warn!(status = ?e.status(), error = %e, "ML service call failed");
                CoreError::TranscriptionUnavailable(e.to_string())
            })
    }
}
