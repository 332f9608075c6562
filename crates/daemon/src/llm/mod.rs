//! Boundary to the external reasoning, vision and transcription models.
//!
//! The core talks to these only through the traits below; `MlServiceClient`
//! is the HTTP implementation used by the daemon.

pub mod client;
pub mod prompts;

use async_trait::async_trait;
use engine::transcript::Transcript;
use engine::visual::SampledFrame;
use engine::ActionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::CoreResult;

pub use client::MlServiceClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Everything the model sees when resolving one plan step to an action.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub context: String,
    pub completed_steps: String,
    pub step: String,
    pub allowed: Vec<ActionKind>,
}

/// Raw answer to an action-selection call, before schema validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionSelection {
    Call { name: String, arguments: Value },
    Reply(String),
}

#[derive(Debug, Clone)]
pub struct PlanningRequest {
    pub context: String,
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanDecision {
    Reply(String),
    Steps(Vec<String>),
}

/// Turns one sampled frame into a sentence. Fails with `DescribeUnavailable`.
#[async_trait]
pub trait FrameDescriber: Send + Sync {
    async fn describe(&self, frame: &SampledFrame) -> CoreResult<String>;
}

/// Fails with `ModelUnavailable`.
#[async_trait]
pub trait ReasoningModel: Send + Sync {
    async fn select_action(&self, request: &ActionRequest) -> CoreResult<ActionSelection>;

    async fn decompose_plan(&self, request: &PlanningRequest) -> CoreResult<PlanDecision>;
}

/// Word-level transcription of an extracted audio track. Fails with
/// `TranscriptionUnavailable`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> CoreResult<Transcript>;
}
