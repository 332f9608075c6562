use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Names of the edit actions a step can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "cutClip")]
    Cut,
    #[serde(rename = "moveClip")]
    Move,
    #[serde(rename = "deleteClip")]
    Delete,
    #[serde(rename = "trimClip")]
    Trim,
    #[serde(rename = "adjustBrightness")]
    Brightness,
    #[serde(rename = "convertToGrayscale")]
    Grayscale,
    #[serde(rename = "applyColorGrading")]
    ColorGrade,
    #[serde(rename = "adjustSaturation")]
    Saturation,
    #[serde(rename = "addBlurEffect")]
    Blur,
    #[serde(rename = "fadeIn")]
    FadeIn,
    #[serde(rename = "fadeOut")]
    FadeOut,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Cut,
        ActionKind::Move,
        ActionKind::Delete,
        ActionKind::Trim,
        ActionKind::Brightness,
        ActionKind::Grayscale,
        ActionKind::ColorGrade,
        ActionKind::Saturation,
        ActionKind::Blur,
        ActionKind::FadeIn,
        ActionKind::FadeOut,
    ];

    pub fn name(self) -> &'static str {
        self.schema().name
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ActionKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn schema(self) -> &'static ActionSchema {
        // registry entries are declared in variant order
        &ACTION_SCHEMAS[self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamType {
    String,
    Number { min: Option<f64>, max: Option<f64> },
}

#[derive(Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct ActionSchema {
    pub kind: ActionKind,
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

const CLIP_ID: ParamSpec = ParamSpec {
    name: "clipId",
    ty: ParamType::String,
    required: true,
    description: "ID of the clip to edit",
};

const fn number(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        ty: ParamType::Number { min: None, max: None },
        required: true,
        description,
    }
}

const fn non_negative(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        ty: ParamType::Number { min: Some(0.0), max: None },
        required: true,
        description,
    }
}

/// Static registry of every action the reasoning model may select.
pub static ACTION_SCHEMAS: [ActionSchema; 11] = [
    ActionSchema {
        kind: ActionKind::Cut,
        name: "cutClip",
        description: "Cut a video clip into two at a specified point",
        params: &[CLIP_ID, non_negative("cutPoint", "Time in seconds where the clip will be cut")],
    },
    ActionSchema {
        kind: ActionKind::Move,
        name: "moveClip",
        description: "Move a video clip to start from a specified timeline position",
        params: &[CLIP_ID, non_negative("start", "Time in seconds where the clip will now start from")],
    },
    ActionSchema {
        kind: ActionKind::Delete,
        name: "deleteClip",
        description: "Delete a clip from the timeline given its clip ID",
        params: &[CLIP_ID],
    },
    ActionSchema {
        kind: ActionKind::Trim,
        name: "trimClip",
        description: "Trim a clip to keep only the range between start and end times",
        params: &[
            CLIP_ID,
            non_negative("start_time", "Start time in seconds"),
            non_negative("end_time", "End time in seconds"),
        ],
    },
    ActionSchema {
        kind: ActionKind::Brightness,
        name: "adjustBrightness",
        description: "Adjust the brightness of a clip",
        params: &[
            CLIP_ID,
            ParamSpec {
                name: "brightness",
                ty: ParamType::Number { min: Some(0.0), max: Some(1.0) },
                required: true,
                description: "Brightness level between 0 and 1",
            },
        ],
    },
    ActionSchema {
        kind: ActionKind::Grayscale,
        name: "convertToGrayscale",
        description: "Convert a clip to grayscale",
        params: &[CLIP_ID],
    },
    ActionSchema {
        kind: ActionKind::ColorGrade,
        name: "applyColorGrading",
        description: "Apply color grading to a clip",
        params: &[
            CLIP_ID,
            number("contrast", "Contrast multiplier, 1.0 leaves it unchanged"),
            number("gamma", "Gamma correction, 1.0 leaves it unchanged"),
            non_negative("saturation", "Saturation multiplier, 1.0 leaves it unchanged"),
        ],
    },
    ActionSchema {
        kind: ActionKind::Saturation,
        name: "adjustSaturation",
        description: "Adjust the color saturation of a clip",
        params: &[CLIP_ID, non_negative("saturation", "Saturation multiplier, 1.0 leaves it unchanged")],
    },
    ActionSchema {
        kind: ActionKind::Blur,
        name: "addBlurEffect",
        description: "Blur a clip",
        params: &[CLIP_ID, non_negative("blurStrength", "Gaussian blur sigma")],
    },
    ActionSchema {
        kind: ActionKind::FadeIn,
        name: "fadeIn",
        description: "Fade a clip in from black",
        params: &[
            CLIP_ID,
            ParamSpec {
                name: "duration",
                ty: ParamType::Number { min: Some(0.0), max: None },
                required: false,
                description: "Fade length in seconds",
            },
        ],
    },
    ActionSchema {
        kind: ActionKind::FadeOut,
        name: "fadeOut",
        description: "Fade a clip out to black",
        params: &[
            CLIP_ID,
            ParamSpec {
                name: "duration",
                ty: ParamType::Number { min: Some(0.0), max: None },
                required: false,
                description: "Fade length in seconds",
            },
        ],
    },
];

impl ActionSchema {
    /// JSON function definition handed to the reasoning model.
    pub fn to_function_definition(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in self.params {
            let mut property = match param.ty {
                ParamType::String => json!({ "type": "string" }),
                ParamType::Number { min, max } => {
                    let mut p = json!({ "type": "number" });
                    if let Some(min) = min {
                        p["minimum"] = json!(min);
                    }
                    if let Some(max) = max {
                        p["maximum"] = json!(max);
                    }
                    p
                }
            };
            property["description"] = json!(param.description);
            properties.insert(param.name.to_string(), property);
            if param.required {
                required.push(param.name);
            }
        }
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }

    fn check(&self, args: &Map<String, Value>) -> Result<(), ActionError> {
        for param in self.params {
            let value = match args.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ActionError::MissingArgument {
                        action: self.name,
                        param: param.name,
                    })
                }
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            let invalid = |reason: String| ActionError::InvalidArgument {
                action: self.name,
                param: param.name,
                reason,
            };
            match param.ty {
                ParamType::String => {
                    if !value.is_string() {
                        return Err(invalid(format!("expected a string, got {value}")));
                    }
                }
                ParamType::Number { min, max } => {
                    let n = value
                        .as_f64()
                        .ok_or_else(|| invalid(format!("expected a number, got {value}")))?;
                    if min.is_some_and(|min| n < min) || max.is_some_and(|max| n > max) {
                        return Err(invalid(format!(
                            "{n} outside [{}, {}]",
                            min.map_or("-inf".to_string(), |v| v.to_string()),
                            max.map_or("inf".to_string(), |v| v.to_string()),
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Function definitions for every action in `allowed`.
pub fn function_definitions(allowed: &[ActionKind]) -> Vec<Value> {
    allowed
        .iter()
        .map(|kind| kind.schema().to_function_definition())
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("action '{0}' is not allowed for this step")]
    NotAllowed(String),
    #[error("arguments for '{action}' are not a JSON object")]
    NotAnObject { action: String },
    #[error("'{action}' is missing required argument '{param}'")]
    MissingArgument {
        action: &'static str,
        param: &'static str,
    },
    #[error("'{action}' argument '{param}': {reason}")]
    InvalidArgument {
        action: &'static str,
        param: &'static str,
        reason: String,
    },
    #[error("could not decode arguments: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One validated edit instruction for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "arguments")]
pub enum EditAction {
    #[serde(rename = "cutClip", rename_all = "camelCase")]
    CutClip { clip_id: String, cut_point: f64 },
    #[serde(rename = "moveClip", rename_all = "camelCase")]
    MoveClip { clip_id: String, start: f64 },
    #[serde(rename = "deleteClip", rename_all = "camelCase")]
    DeleteClip { clip_id: String },
    #[serde(rename = "trimClip")]
    TrimClip {
        #[serde(rename = "clipId")]
        clip_id: String,
        start_time: f64,
        end_time: f64,
    },
    #[serde(rename = "adjustBrightness", rename_all = "camelCase")]
    AdjustBrightness { clip_id: String, brightness: f64 },
    #[serde(rename = "convertToGrayscale", rename_all = "camelCase")]
    ConvertToGrayscale { clip_id: String },
    #[serde(rename = "applyColorGrading", rename_all = "camelCase")]
    ApplyColorGrading {
        clip_id: String,
        contrast: f64,
        gamma: f64,
        saturation: f64,
    },
    #[serde(rename = "adjustSaturation", rename_all = "camelCase")]
    AdjustSaturation { clip_id: String, saturation: f64 },
    #[serde(rename = "addBlurEffect", rename_all = "camelCase")]
    AddBlurEffect { clip_id: String, blur_strength: f64 },
    #[serde(rename = "fadeIn", rename_all = "camelCase")]
    FadeIn {
        clip_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
    #[serde(rename = "fadeOut", rename_all = "camelCase")]
    FadeOut {
        clip_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration: Option<f64>,
    },
}

impl EditAction {
    /// Validate a raw model function call against the registry and the
    /// step's allowed set. `arguments` may be an object or a JSON string
    /// holding one.
    pub fn from_call(
        allowed: &[ActionKind],
        name: &str,
        arguments: &Value,
    ) -> Result<Self, ActionError> {
        let kind =
            ActionKind::from_name(name).ok_or_else(|| ActionError::UnknownAction(name.to_string()))?;
        if !allowed.contains(&kind) {
            return Err(ActionError::NotAllowed(name.to_string()));
        }

        let parsed;
        let arguments = match arguments {
            Value::String(raw) => {
                parsed = serde_json::from_str::<Value>(raw)?;
                &parsed
            }
            other => other,
        };
        let object = arguments.as_object().ok_or_else(|| ActionError::NotAnObject {
            action: name.to_string(),
        })?;

        let schema = kind.schema();
        schema.check(object)?;

        // keep only declared parameters so extra keys from the model are dropped
        let declared: Map<String, Value> = object
            .iter()
            .filter(|(key, value)| {
                !value.is_null() && schema.params.iter().any(|p| p.name == key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(serde_json::from_value(json!({
            "action": schema.name,
            "arguments": declared,
        }))?)
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            EditAction::CutClip { .. } => ActionKind::Cut,
            EditAction::MoveClip { .. } => ActionKind::Move,
            EditAction::DeleteClip { .. } => ActionKind::Delete,
            EditAction::TrimClip { .. } => ActionKind::Trim,
            EditAction::AdjustBrightness { .. } => ActionKind::Brightness,
            EditAction::ConvertToGrayscale { .. } => ActionKind::Grayscale,
            EditAction::ApplyColorGrading { .. } => ActionKind::ColorGrade,
            EditAction::AdjustSaturation { .. } => ActionKind::Saturation,
            EditAction::AddBlurEffect { .. } => ActionKind::Blur,
            EditAction::FadeIn { .. } => ActionKind::FadeIn,
            EditAction::FadeOut { .. } => ActionKind::FadeOut,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn clip_id(&self) -> &str {
        match self {
            EditAction::CutClip { clip_id, .. }
            | EditAction::MoveClip { clip_id, .. }
            | EditAction::DeleteClip { clip_id }
            | EditAction::TrimClip { clip_id, .. }
            | EditAction::AdjustBrightness { clip_id, .. }
            | EditAction::ConvertToGrayscale { clip_id }
            | EditAction::ApplyColorGrading { clip_id, .. }
            | EditAction::AdjustSaturation { clip_id, .. }
            | EditAction::AddBlurEffect { clip_id, .. }
            | EditAction::FadeIn { clip_id, .. }
            | EditAction::FadeOut { clip_id, .. } => clip_id,
        }
    }

    /// The action's parameters as a JSON object, keyed by wire name.
    pub fn arguments(&self) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("arguments").map(Value::take))
            .unwrap_or_else(|| json!({}))
    }
}
