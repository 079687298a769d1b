//! Shared numeric constants for the canvas crate.

// ── Camera ──────────────────────────────────────────────────────

/// Smallest allowed zoom factor.
pub const MIN_ZOOM: f64 = 0.1;

/// Largest allowed zoom factor.
pub const MAX_ZOOM: f64 = 3.0;

/// Zoom change per wheel notch.
pub const ZOOM_STEP: f64 = 0.1;

// ── Presence ────────────────────────────────────────────────────

/// Minimum wall-clock gap between outbound cursor events, in milliseconds.
pub const CURSOR_THROTTLE_MS: f64 = 50.0;

// ── Text ────────────────────────────────────────────────────────

/// Estimated glyph width as a multiple of the item's `size`.
pub const TEXT_GLYPH_WIDTH: f64 = 3.0;

/// Rendered font height as a multiple of the item's `size`.
pub const TEXT_LINE_HEIGHT: f64 = 5.0;

// ── Images ──────────────────────────────────────────────────────

/// Dropped images are scaled to fit a square of this many world units.
pub const IMAGE_DROP_MAX: f64 = 300.0;

// ── Defaults ────────────────────────────────────────────────────

pub const DEFAULT_COLOR: &str = "#000000";

pub const DEFAULT_BRUSH_SIZE: f64 = 3.0;
