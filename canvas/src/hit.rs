#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use frames::DrawItem;

use crate::camera::Point;
use crate::consts::{TEXT_GLYPH_WIDTH, TEXT_LINE_HEIGHT};

/// Axis-aligned box in world coordinates, anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Edges are inclusive.
    #[must_use]
    pub fn contains(&self, pt: Point) -> bool {
        pt.x >= self.x && pt.x <= self.x + self.width && pt.y >= self.y && pt.y <= self.y + self.height
    }
}

/// Selectable box of a movable item. Strokes and shapes have none.
///
/// Text uses an estimated glyph box rather than measured metrics, so every
/// client agrees on what is under the pointer.
#[must_use]
pub fn bounds(item: &DrawItem) -> Option<Bounds> {
    match item {
        DrawItem::Image(img) => Some(Bounds { x: img.x, y: img.y, width: img.width, height: img.height }),
        DrawItem::Text(text) => {
            #[allow(clippy::cast_precision_loss)]
            let chars = text.text.chars().count() as f64;
            Some(Bounds {
                x: text.x,
                y: text.y,
                width: chars * text.size * TEXT_GLYPH_WIDTH,
                height: text.size * TEXT_LINE_HEIGHT,
            })
        }
        _ => None,
    }
}

/// Index of the topmost movable item under `world_pt`, scanning newest first.
#[must_use]
pub fn hit_test(items: &[DrawItem], world_pt: Point) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .rev()
        .find(|(_, item)| bounds(item).is_some_and(|b| b.contains(world_pt)))
        .map(|(index, _)| index)
}
