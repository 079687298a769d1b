//! Whiteboard payload types: draw items and chat messages.
//!
//! DESIGN
//! ======
//! A [`DrawItem`] is an immutable value tagged by its `tool` field. Field
//! names on the wire are camelCase (`startX`, `startY`) so browser clients
//! can emit them without a mapping layer. Deserialization enforces presence
//! of every required field; [`DrawItem::validate`] enforces the value rules
//! serde cannot express (finite numbers, positive sizes, non-empty strings).
//!
//! Numbers that crossed the protobuf codec arrive as floats, so integer
//! fields such as [`ChatMessage::timestamp`] accept either representation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Validation failure for a draw item or chat message payload.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("history must be an array")]
    NotAnArray,
    #[error("history[{index}]: {source}")]
    AtIndex {
        index: usize,
        #[source]
        source: Box<ItemError>,
    },
}

/// Drawing tool that produced an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pencil,
    Eraser,
    Rect,
    Circle,
    Text,
    Image,
}

/// Two-point geometry shared by stroke segments and shapes.
///
/// For strokes the points are the ends of one line segment; for `rect` they
/// are opposite corners; for `circle` the start is the center and the
/// distance to the end is the radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub start_x: f64,
    pub start_y: f64,
    pub x: f64,
    pub y: f64,
    pub color: String,
    pub size: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: String,
    pub size: f64,
}

/// Embedded raster image. `src` is typically a data URL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageItem {
    pub x: f64,
    pub y: f64,
    pub src: String,
    pub width: f64,
    pub height: f64,
}

/// One entry in a room's draw history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "lowercase")]
pub enum DrawItem {
    Pencil(Segment),
    Eraser(Segment),
    Rect(Segment),
    Circle(Segment),
    Text(TextItem),
    Image(ImageItem),
}

impl DrawItem {
    /// Parse and validate a single item from a JSON payload value.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::Malformed`] when a required field is missing or
    /// mistyped, or the matching validation error otherwise.
    pub fn from_value(value: &Value) -> Result<Self, ItemError> {
        let item = Self::deserialize(value)?;
        item.validate()?;
        Ok(item)
    }

    /// Parse and validate a whole history array.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::NotAnArray`] for non-array values and
    /// [`ItemError::AtIndex`] naming the first invalid element.
    pub fn parse_history(value: &Value) -> Result<Vec<Self>, ItemError> {
        let Value::Array(values) = value else {
            return Err(ItemError::NotAnArray);
        };
        values
            .iter()
            .enumerate()
            .map(|(index, v)| {
                Self::from_value(v).map_err(|e| ItemError::AtIndex {
                    index,
                    source: Box::new(e),
                })
            })
            .collect()
    }

    /// Check value rules that deserialization alone cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first rule violation found.
    pub fn validate(&self) -> Result<(), ItemError> {
        match self {
            Self::Pencil(s) | Self::Eraser(s) | Self::Rect(s) | Self::Circle(s) => {
                finite("startX", s.start_x)?;
                finite("startY", s.start_y)?;
                finite("x", s.x)?;
                finite("y", s.y)?;
                positive("size", s.size)?;
                non_empty("color", &s.color)
            }
            Self::Text(t) => {
                finite("x", t.x)?;
                finite("y", t.y)?;
                positive("size", t.size)?;
                non_empty("text", &t.text)?;
                non_empty("color", &t.color)
            }
            Self::Image(i) => {
                finite("x", i.x)?;
                finite("y", i.y)?;
                positive("width", i.width)?;
                positive("height", i.height)?;
                non_empty("src", &i.src)
            }
        }
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        match self {
            Self::Pencil(_) => Tool::Pencil,
            Self::Eraser(_) => Tool::Eraser,
            Self::Rect(_) => Tool::Rect,
            Self::Circle(_) => Tool::Circle,
            Self::Text(_) => Tool::Text,
            Self::Image(_) => Tool::Image,
        }
    }

    /// Freehand segments can be painted on top of the existing bitmap
    /// without replaying the history.
    #[must_use]
    pub fn is_stroke(&self) -> bool {
        matches!(self, Self::Pencil(_) | Self::Eraser(_))
    }

    /// Anchor point of a movable item (text or image).
    #[must_use]
    pub fn origin(&self) -> Option<(f64, f64)> {
        match self {
            Self::Text(t) => Some((t.x, t.y)),
            Self::Image(i) => Some((i.x, i.y)),
            _ => None,
        }
    }

    /// Copy of this item anchored at `(x, y)`. Only text and images move.
    #[must_use]
    pub fn moved_to(&self, x: f64, y: f64) -> Option<Self> {
        match self {
            Self::Text(t) => Some(Self::Text(TextItem { x, y, ..t.clone() })),
            Self::Image(i) => Some(Self::Image(ImageItem { x, y, ..i.clone() })),
            _ => None,
        }
    }

    #[must_use]
    pub fn image_src(&self) -> Option<&str> {
        match self {
            Self::Image(i) => Some(&i.src),
            _ => None,
        }
    }

    /// JSON form used in frame payloads.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Serialize a history slice for a frame payload.
#[must_use]
pub fn history_to_value(items: &[DrawItem]) -> Value {
    Value::Array(items.iter().map(DrawItem::to_value).collect())
}

/// One chat line. Ordered by server arrival.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    #[serde(deserialize_with = "de_millis")]
    pub timestamp: i64,
}

#[derive(Deserialize)]
struct ChatRequest {
    author: String,
    text: String,
    #[serde(default, deserialize_with = "de_opt_millis")]
    timestamp: Option<i64>,
}

impl ChatMessage {
    /// Parse a client-submitted message, stamping `now_ms` when the client
    /// omitted a timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`ItemError::Malformed`] for missing fields and
    /// [`ItemError::Empty`] for blank author or text.
    pub fn from_request(value: &Value, now_ms: i64) -> Result<Self, ItemError> {
        let req = ChatRequest::deserialize(value)?;
        let message = Self {
            author: req.author,
            text: req.text,
            timestamp: req.timestamp.unwrap_or(now_ms),
        };
        message.validate()?;
        Ok(message)
    }

    /// # Errors
    ///
    /// Returns [`ItemError::Empty`] for blank author or text.
    pub fn validate(&self) -> Result<(), ItemError> {
        non_empty("author", &self.author)?;
        non_empty("text", &self.text)
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ItemError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ItemError::NotFinite(field))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ItemError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ItemError::NotPositive(field))
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ItemError> {
    if value.trim().is_empty() {
        Err(ItemError::Empty(field))
    } else {
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn millis_from_f64(value: f64) -> i64 {
    value as i64
}

fn de_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(serde::de::Error::custom("timestamp must be finite"));
    }
    Ok(millis_from_f64(raw))
}

fn de_opt_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(v) if v.is_finite() => Ok(Some(millis_from_f64(v))),
        Some(_) => Err(serde::de::Error::custom("timestamp must be finite")),
    }
}

#[cfg(test)]
#[path = "item_test.rs"]
mod tests;
