//! Structured edit commands and their tool-call decoding.
//!
//! DESIGN
//! ======
//! The command surface is a closed set. Toolbar actions construct
//! [`Command`] values directly; an agent's function calls arrive as a tool
//! name plus JSON arguments and go through [`Command::from_tool_call`].
//! Anything unknown or malformed decodes to `None` and is dropped without
//! touching the canvas.

#[cfg(test)]
#[path = "command_test.rs"]
mod command_test;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::layout::{Axis, Edge};
use crate::model::{ShapeKind, TextKind};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("malformed arguments for {tool}: {source}")]
    Malformed {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid arguments for {tool}: {reason}")]
    Invalid { tool: String, reason: &'static str },
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShape {
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMany {
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub count: u32,
    pub color: Option<String>,
    pub gap: Option<f64>,
    pub padding: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateText {
    pub text: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub font_size: Option<f64>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spacing {
    pub gap: Option<f64>,
    pub padding: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    pub width: Option<f64>,
    pub padding: Option<f64>,
    pub gap: Option<f64>,
    /// Button colour.
    pub color: Option<String>,
    pub title: Option<String>,
    pub button_text: Option<String>,
}

#[derive(Deserialize)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
struct Size {
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
struct Rotation {
    rotation: f64,
}

#[derive(Deserialize)]
struct Color {
    color: String,
}

#[derive(Deserialize)]
struct Align {
    position: Edge,
}

#[derive(Deserialize)]
struct Distribute {
    axis: Axis,
}

#[derive(Deserialize)]
struct TextKindArg {
    kind: TextKind,
}

// =============================================================================
// COMMAND
// =============================================================================

/// A structured edit command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateShape(CreateShape),
    CreateMany(CreateMany),
    CreateText(CreateText),
    MoveSelected { x: f64, y: f64 },
    ResizeSelected { width: f64, height: f64 },
    RotateSelected { rotation: f64 },
    SetColorSelected { color: String },
    /// Centre the selection on the canvas.
    ArrangeCenter,
    AlignSelected { position: Edge },
    DistributeObjects { axis: Axis },
    SetTextKindSelected { kind: TextKind },
    GridLayout(Spacing),
    RowLayout(Spacing),
    GenerateLoginForm(LoginForm),
    /// Row layout over every object with default spacing.
    AutoLayout,
}

impl Command {
    /// Decode an agent function call. Unknown or malformed calls yield `None`.
    #[must_use]
    pub fn from_tool_call(name: &str, arguments: &str) -> Option<Self> {
        match Self::try_from_tool_call(name, arguments) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                debug!(error = %e, "ignoring tool call");
                None
            }
        }
    }

    /// Decode an agent function call, reporting why it was rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] for unknown tool names, arguments that are not
    /// the expected JSON shape, and sizes or counts that are not positive.
    pub fn try_from_tool_call(name: &str, arguments: &str) -> Result<Self, CommandError> {
        let args: Value = if arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(arguments).map_err(|source| CommandError::Malformed { tool: name.to_owned(), source })?
        };

        let cmd = match name {
            "createShape" => Self::CreateShape(decode(name, args)?),
            "createMany" => Self::CreateMany(decode(name, args)?),
            "createText" => Self::CreateText(decode(name, args)?),
            "moveSelected" => {
                let Position { x, y } = decode(name, args)?;
                Self::MoveSelected { x, y }
            }
            "resizeSelected" => {
                let Size { width, height } = decode(name, args)?;
                Self::ResizeSelected { width, height }
            }
            "rotateSelected" => {
                let Rotation { rotation } = decode(name, args)?;
                Self::RotateSelected { rotation }
            }
            "setColorSelected" => {
                let Color { color } = decode(name, args)?;
                Self::SetColorSelected { color }
            }
            "arrangeCenter" => Self::ArrangeCenter,
            "alignSelected" => {
                let Align { position } = decode(name, args)?;
                Self::AlignSelected { position }
            }
            "distributeObjects" => {
                let Distribute { axis } = decode(name, args)?;
                Self::DistributeObjects { axis }
            }
            "setTextKindSelected" => {
                let TextKindArg { kind } = decode(name, args)?;
                Self::SetTextKindSelected { kind }
            }
            "gridLayout" => Self::GridLayout(decode(name, args)?),
            "rowLayout" => Self::RowLayout(decode(name, args)?),
            "generateLoginForm" => Self::GenerateLoginForm(decode(name, args)?),
            "autoLayout" => Self::AutoLayout,
            _ => return Err(CommandError::UnknownTool(name.to_owned())),
        };
        cmd.validate(name)?;
        Ok(cmd)
    }

    fn validate(&self, tool: &str) -> Result<(), CommandError> {
        let invalid =
            |reason: &'static str| -> Result<(), CommandError> { Err(CommandError::Invalid { tool: tool.to_owned(), reason }) };
        match self {
            Self::CreateMany(p) if p.count == 0 => invalid("count must be positive"),
            Self::ResizeSelected { width, height } if *width <= 0.0 || *height <= 0.0 => {
                invalid("size must be positive")
            }
            Self::CreateText(p) if p.font_size.is_some_and(|s| s <= 0.0) => invalid("fontSize must be positive"),
            Self::GenerateLoginForm(p) if p.width.is_some_and(|w| w <= 0.0) => invalid("width must be positive"),
            Self::GridLayout(s) | Self::RowLayout(s)
                if s.gap.is_some_and(|g| g < 0.0) || s.padding.is_some_and(|p| p < 0.0) =>
            {
                invalid("spacing must not be negative")
            }
            _ => Ok(()),
        }
    }
}

fn decode<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, CommandError> {
    serde_json::from_value(args).map_err(|source| CommandError::Malformed { tool: tool.to_owned(), source })
}
