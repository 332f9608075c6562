use engine::{ActionKind, EditAction, StepStart, Task, TaskId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::TaskStore;
use crate::error::{CoreError, CoreResult};
use crate::llm::{ActionRequest, ActionSelection, ReasoningModel};

/// A step resolved to one validated edit action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAction {
    pub task_id: TaskId,
    pub step_index: usize,
    pub step_text: String,
    pub action: EditAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    Action(StepAction),
    /// The model answered in prose; the step was not consumed.
    Reply {
        task_id: TaskId,
        step_index: usize,
        message: String,
    },
    Completed { task_id: TaskId },
}

/// Walks task plans one step at a time, asking the reasoning model to pick
/// one action per step.
pub struct PlanExecutor {
    store: Arc<TaskStore>,
    model: Arc<dyn ReasoningModel>,
    allowed: Vec<ActionKind>,
}

impl PlanExecutor {
    pub fn new(store: Arc<TaskStore>, model: Arc<dyn ReasoningModel>) -> Self {
        PlanExecutor {
            store,
            model,
            allowed: ActionKind::ALL.to_vec(),
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    /// Move `task_id` to its next step and dispatch it.
    ///
    /// The per-task lock is held across the model call, so concurrent
    /// advances on one task run one after another. If the call fails, the
    /// model answers in prose, or its action does not validate, the cursor is
    /// put back and the same step is dispatched by the next advance.
    pub async fn advance(&self, task_id: TaskId, context: &str) -> CoreResult<AdvanceOutcome> {
        let handle = self.store.handle(task_id).await?;
        let mut task = handle.lock().await;

        let (index, text) = match task.begin_next_step() {
            StepStart::Completed => {
                info!(task_id, "task completed");
                return Ok(AdvanceOutcome::Completed { task_id });
            }
            StepStart::Step { index, text } => (index, text),
        };
        info!(task_id, step = index, %text, "dispatching step");

        match self.dispatch(&task, context, &text).await {
            Ok(Dispatch::Action(action)) => {
                info!(task_id, step = index, action = action.name(), clip_id = action.clip_id(), "step resolved");
                Ok(AdvanceOutcome::Action(StepAction {
                    task_id,
                    step_index: index,
                    step_text: text,
                    action,
                }))
            }
            Ok(Dispatch::Reply(message)) => {
                task.rollback_step(index);
                info!(task_id, step = index, "model replied without an action");
                Ok(AdvanceOutcome::Reply {
                    task_id,
                    step_index: index,
                    message,
                })
            }
            Err(e) => {
                task.rollback_step(index);
                warn!(task_id, step = index, kind = e.kind(), error = %e, "step failed");
                Err(e)
            }
        }
    }

    async fn dispatch(&self, task: &Task, context: &str, step: &str) -> CoreResult<Dispatch> {
        let request = ActionRequest {
            context: context.to_string(),
            completed_steps: task.render_history(),
            step: step.to_string(),
            allowed: self.allowed.clone(),
        };
        match self.model.select_action(&request).await? {
            ActionSelection::Call { name, arguments } => {
                let action = EditAction::from_call(&self.allowed, &name, &arguments)?;
                Ok(Dispatch::Action(action))
            }
            ActionSelection::Reply(message) => Ok(Dispatch::Reply(message)),
        }
    }

    /// Remove a task, whatever its state.
    pub async fn terminate(&self, task_id: TaskId) -> CoreResult<Task> {
        self.store.remove(task_id).await
    }
}

enum Dispatch {
    Action(EditAction),
    Reply(String),
}
