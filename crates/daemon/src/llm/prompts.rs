use serde_json::{json, Value};

pub const ACTION_SYSTEM_PROMPT: &str = "You are a video editing assistant executing one step of a larger plan. \
Choose exactly one of the provided functions that carries out the current step on the timeline. \
Use the clip context to find clip IDs and the seconds that match the request. \
Only answer in plain text if the step cannot be mapped to any of the functions.";

pub const PLAN_SYSTEM_PROMPT: &str = "You are a video editing assistant. \
If the user asks a question about their clips, answer it directly using the clip context. \
If the user asks for edits, call create_task with the steps needed to carry them out.";

/// Function definition the planning call uses to hand back a step list.
pub fn create_task_function() -> Value {
    json!({
        "name": "create_task",
        "description": "Create a new task with a list of steps. The available steps are: cutting a clip into two, \
moving a clip, deleting a clip, trimming a clip, and altering the colors, brightness, saturation, blur or fades of a clip. \
Put each use of a tool in a new step. Each step should be a very basic and clear command naming which tool to apply to which clip. \
Every time a clip is cut, a new clip is created. Refer to clips by their clip IDs or their relative position, like 'the third clip'.",
        "parameters": {
            "type": "object",
            "properties": {
                "steps": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Ordered steps of the new task"
                }
            },
            "required": ["steps"]
        }
    })
}

/// User-turn text for the action-selection call.
pub fn action_step_message(completed_steps: &str, step: &str) -> String {
    if completed_steps.is_empty() {
        format!("Current step: {step}")
    } else {
        format!("Steps already completed:\n{completed_steps}\n\nCurrent step: {step}")
    }
}
