//! Validation for scripts coming from the editor or an import.

use crate::{Action, ActionKind, Point, Script};
use serde::{Deserialize, Serialize};

const COORDINATE_LIMIT: i32 = 100_000;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path to the problematic field (e.g., "actions[0].kind.at.x").
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.path, self.message)
    }
}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a script. An empty action list is allowed.
pub fn validate_script(script: &Script) -> ValidationResult {
    let mut errors = Vec::new();

    if script.id.trim().is_empty() {
        push(&mut errors, "id", "Script id cannot be empty");
    }
    if script.name.trim().is_empty() {
        push(&mut errors, "name", "Script name cannot be empty");
    }

    for (i, action) in script.actions.iter().enumerate() {
        validate_action(action, &format!("actions[{i}]"), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_action(action: &Action, path: &str, errors: &mut Vec<ValidationError>) {
    match action.kind {
        ActionKind::Click { at } | ActionKind::LongPress { at } | ActionKind::MultiTouch { at } => {
            validate_point(at, &format!("{path}.kind.at"), errors);
        }
        ActionKind::Swipe { from, to } => {
            validate_point(from, &format!("{path}.kind.from"), errors);
            validate_point(to, &format!("{path}.kind.to"), errors);
            if action.duration_ms == 0 {
                push(
                    errors,
                    &format!("{path}.duration_ms"),
                    "Swipe duration must be greater than 0",
                );
            }
        }
        ActionKind::Delay => {}
    }

    if matches!(action.kind, ActionKind::LongPress { .. }) && action.duration_ms == 0 {
        push(
            errors,
            &format!("{path}.duration_ms"),
            "Long press duration must be greater than 0",
        );
    }
}

fn validate_point(point: Point, path: &str, errors: &mut Vec<ValidationError>) {
    for (axis, value) in [("x", point.x), ("y", point.y)] {
        if !(-COORDINATE_LIMIT..=COORDINATE_LIMIT).contains(&value) {
            push(
                errors,
                &format!("{path}.{axis}"),
                "Coordinate value out of reasonable range",
            );
        }
    }
}

fn push(errors: &mut Vec<ValidationError>, path: &str, message: &str) {
    errors.push(ValidationError {
        path: path.to_string(),
        message: message.to_string(),
    });
}
