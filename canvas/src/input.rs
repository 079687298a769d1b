//! Input model: tools, mouse buttons, keys, and the gesture state machine.
//!
//! `Tool` captures what a primary-button press does. `InputState` is the
//! gesture tracked between pointer-down and pointer-up, carrying what the
//! engine needs to emit items on move and commit on release.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::camera::Point;
use crate::consts::{DEFAULT_BRUSH_SIZE, DEFAULT_COLOR};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pick up and move text or images.
    #[default]
    Select,
    /// Freehand line, one segment per pointer move.
    Pencil,
    /// Freehand erase, one segment per pointer move.
    Eraser,
    Rect,
    Circle,
    /// Place text at the clicked point.
    Text,
}

impl Tool {
    /// Parse the tool name used by the host toolbar.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "select" | "selection" => Some(Self::Select),
            "pencil" => Some(Self::Pencil),
            "eraser" => Some(Self::Eraser),
            "rect" => Some(Self::Rect),
            "circle" => Some(Self::Circle),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Whether this tool emits segments while the pointer moves.
    #[must_use]
    pub fn is_freehand(self) -> bool {
        matches!(self, Self::Pencil | Self::Eraser)
    }

    /// Whether this tool previews a shape and commits it on release.
    #[must_use]
    pub fn is_shape(self) -> bool {
        matches!(self, Self::Rect | Self::Circle)
    }
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Left mouse button (or single-finger tap).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

impl Button {
    /// Map a DOM `MouseEvent.button` code.
    #[must_use]
    pub fn from_dom(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Primary),
            1 => Some(Self::Middle),
            2 => Some(Self::Secondary),
            _ => None,
        }
    }
}

/// A keyboard key, holding the name the browser reports (e.g. `" "`, `"Escape"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key(pub String);

impl Key {
    #[must_use]
    pub fn is_space(&self) -> bool {
        self.0 == " " || self.0 == "Space" || self.0 == "Spacebar"
    }
}

/// Toolbar state applied to newly drawn items.
#[derive(Debug, Clone, PartialEq)]
pub struct UiState {
    pub tool: Tool,
    pub color: String,
    pub brush_size: f64,
}

impl Default for UiState {
    fn default() -> Self {
        Self { tool: Tool::default(), color: DEFAULT_COLOR.to_owned(), brush_size: DEFAULT_BRUSH_SIZE }
    }
}

/// The gesture in progress.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// Space-held or middle-button drag moving the camera.
    Panning {
        /// Screen position of the previous pointer event.
        last_screen: Point,
    },
    /// Pencil or eraser drag.
    Freehand {
        tool: Tool,
        /// World position where the next segment starts.
        last_world: Point,
    },
    /// Rect or circle drag, previewed until release.
    Shaping { tool: Tool, start_world: Point },
    /// Moving a text or image item held by index.
    Dragging {
        index: usize,
        /// Pointer offset from the item origin at grab time.
        grab_dx: f64,
        grab_dy: f64,
    },
}
