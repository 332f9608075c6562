use serde::{Deserialize, Serialize};

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskPhase {
    NotStarted,
    Running { step: usize },
    Completed,
}

/// What `Task::begin_next_step` moved the cursor onto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStart {
    Step { index: usize, text: String },
    Completed,
}

/// An ordered plan of single-action steps plus a cursor.
/// `current_step_index` is -1 before the first step runs and equals
/// `steps.len()` once the plan is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub task_id: TaskId,
    pub steps: Vec<String>,
    current_step_index: i64,
}

impl Task {
    pub fn new(task_id: TaskId, steps: Vec<String>) -> Self {
        Task {
            task_id,
            steps,
            current_step_index: -1,
        }
    }

    pub fn current_step_index(&self) -> i64 {
        self.current_step_index
    }

    pub fn phase(&self) -> TaskPhase {
        match self.current_step_index {
            i if i < 0 => TaskPhase::NotStarted,
            i if i as usize >= self.steps.len() => TaskPhase::Completed,
            i => TaskPhase::Running { step: i as usize },
        }
    }

    pub fn is_completed(&self) -> bool {
        self.phase() == TaskPhase::Completed
    }

    /// Move the cursor to the next step. Once completed the cursor never
    /// moves again and every call reports `Completed`.
    pub fn begin_next_step(&mut self) -> StepStart {
        if self.is_completed() {
            return StepStart::Completed;
        }
        self.current_step_index += 1;
        let index = self.current_step_index as usize;
        match self.steps.get(index) {
            Some(text) => StepStart::Step {
                index,
                text: text.clone(),
            },
            None => StepStart::Completed,
        }
    }

    /// Undo a `begin_next_step` that landed on `index`, so the step is retried
    /// by the next advance. Does nothing if the cursor has moved elsewhere.
    pub fn rollback_step(&mut self, index: usize) {
        if self.current_step_index == index as i64 {
            self.current_step_index -= 1;
        }
    }

    /// Steps before the cursor.
    pub fn completed_steps(&self) -> &[String] {
        let done = self.current_step_index.clamp(0, self.steps.len() as i64) as usize;
        &self.steps[..done]
    }

    /// Numbered list of the steps already carried out, for continuity in the
    /// next action-selection prompt.
    pub fn render_history(&self) -> String {
        self.completed_steps()
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn task() -> Task {
        Task::new(
            1,
            vec![
                "cut the first clip at second 5".to_string(),
                "delete the second clip".to_string(),
            ],
        )
    }

    #[test]
    fn starts_not_started() {
        let task = task();
        assert_eq!(task.current_step_index(), -1);
        assert_eq!(task.phase(), TaskPhase::NotStarted);
        assert!(task.completed_steps().is_empty());
    }

    #[test]
    fn walks_steps_then_completes() {
        let mut task = task();
        assert_matches!(task.begin_next_step(), StepStart::Step { index: 0, text } if text.starts_with("cut"));
        assert_eq!(task.phase(), TaskPhase::Running { step: 0 });
        assert_matches!(task.begin_next_step(), StepStart::Step { index: 1, .. });
        assert_eq!(task.render_history(), "1. cut the first clip at second 5");
        assert_eq!(task.begin_next_step(), StepStart::Completed);
        assert!(task.is_completed());
        assert_eq!(task.current_step_index(), 2);
    }

    #[test]
    fn completed_is_terminal() {
        let mut task = task();
        for _ in 0..3 {
            task.begin_next_step();
        }
        for _ in 0..3 {
            assert_eq!(task.begin_next_step(), StepStart::Completed);
            assert_eq!(task.current_step_index(), 2);
        }
        assert_eq!(task.completed_steps().len(), 2);
    }

    #[test]
    fn rollback_returns_to_previous_step() {
        let mut task = task();
        task.begin_next_step();
        task.rollback_step(0);
        assert_eq!(task.phase(), TaskPhase::NotStarted);
        assert_matches!(task.begin_next_step(), StepStart::Step { index: 0, .. });

        task.rollback_step(5);
        assert_eq!(task.current_step_index(), 0);
    }

    #[test]
    fn empty_plan_completes_immediately() {
        let mut task = Task::new(9, Vec::new());
        assert_eq!(task.begin_next_step(), StepStart::Completed);
        assert!(task.is_completed());
    }

    #[test]
    fn serializes_cursor() {
        let value = serde_json::to_value(task()).unwrap();
        assert_eq!(value["taskId"], 1);
        assert_eq!(value["currentStepIndex"], -1);
    }
}
