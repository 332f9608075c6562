use engine::TaskId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::CoreResult;
use crate::llm::{ChatMessage, PlanDecision, PlanningRequest, ReasoningModel};
use crate::tasks::{AdvanceOutcome, PlanExecutor};

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// The model answered the conversation directly.
    Reply(String),
    /// A task was created and its first step dispatched.
    Started {
        task_id: TaskId,
        first: AdvanceOutcome,
    },
}

/// One-shot planning over the whole conversation: either a direct answer, or
/// a decomposition into single-action steps that becomes a new task. A new
/// task is advanced once before returning; if that first step fails the task
/// is discarded along with the error.
pub struct Planner {
    model: Arc<dyn ReasoningModel>,
    executor: Arc<PlanExecutor>,
}

impl Planner {
    pub fn new(model: Arc<dyn ReasoningModel>, executor: Arc<PlanExecutor>) -> Self {
        Planner { model, executor }
    }

    pub fn executor(&self) -> &Arc<PlanExecutor> {
        &self.executor
    }

    pub async fn request_for_plan(
        &self,
        context: &str,
        history: &[ChatMessage],
    ) -> CoreResult<PlanOutcome> {
        let request = PlanningRequest {
            context: context.to_string(),
            history: history.to_vec(),
        };

        match self.model.decompose_plan(&request).await? {
            PlanDecision::Reply(message) => Ok(PlanOutcome::Reply(message)),
            PlanDecision::Steps(steps) => {
                let steps: Vec<String> = steps
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                let task_id = self.executor.store().create(steps).await;
                info!(task_id, "plan decomposed into task");
                match self.executor.advance(task_id, context).await {
                    Ok(first) => Ok(PlanOutcome::Started { task_id, first }),
                    Err(e) => {
                        // a task only outlives this call if its id is returned
                        if let Err(remove_err) = self.executor.terminate(task_id).await {
                            warn!(task_id, error = %remove_err, "could not discard unstarted task");
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}
