//! Rendering: replays draw items onto a [`Surface`].
//!
//! Two paths exist. A full redraw clears the bitmap, applies the current
//! camera, and replays the whole history in order; it is required whenever
//! the transform changes or a preview must be erased. An incremental draw
//! paints one freehand segment on top of the existing bitmap and relies on
//! the transform left behind by the last full redraw.
//!
//! Image items whose decode is not ready are skipped. They appear on the
//! next full redraw after the cache resolves them.

use frames::DrawItem;
use frames::item::{ImageItem, Segment, TextItem};

use crate::camera::Camera;
use crate::images::ImageCache;

/// Failure reported by a drawing backend.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface unavailable: {0}")]
    Unavailable(String),
    #[error("draw call failed: {0}")]
    Draw(String),
}

/// A 2D drawing target. Coordinates passed to the draw calls are in world
/// space; [`Surface::reset`] installs the camera transform.
pub trait Surface {
    /// Decoded image handle the backend can draw.
    type Image;

    /// Clear the whole bitmap and install the camera transform.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the backend rejects the call.
    fn reset(&mut self, camera: &Camera) -> Result<(), SurfaceError>;

    /// One freehand segment. `erase` punches through to the background.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the backend rejects the call.
    fn segment(&mut self, seg: &Segment, erase: bool) -> Result<(), SurfaceError>;

    /// Rectangle outline with corners at the segment ends.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the backend rejects the call.
    fn rect(&mut self, seg: &Segment) -> Result<(), SurfaceError>;

    /// Circle outline centered on the segment start through its end.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the backend rejects the call.
    fn circle(&mut self, seg: &Segment) -> Result<(), SurfaceError>;

    /// Text with its top-left corner at the item origin.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the backend rejects the call.
    fn text(&mut self, text: &TextItem) -> Result<(), SurfaceError>;

    /// A decoded image stretched to the item box.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the backend rejects the call.
    fn image(&mut self, item: &ImageItem, image: &Self::Image) -> Result<(), SurfaceError>;
}

/// Paint one item with whatever transform is current.
///
/// # Errors
///
/// Returns the first [`SurfaceError`] from the backend.
pub fn draw_item<S: Surface>(surface: &mut S, item: &DrawItem, images: &ImageCache<S::Image>) -> Result<(), SurfaceError> {
    match item {
        DrawItem::Pencil(seg) => surface.segment(seg, false),
        DrawItem::Eraser(seg) => surface.segment(seg, true),
        DrawItem::Rect(seg) => surface.rect(seg),
        DrawItem::Circle(seg) => surface.circle(seg),
        DrawItem::Text(text) => surface.text(text),
        DrawItem::Image(img) => match images.get(&img.src) {
            Some(decoded) => surface.image(img, decoded),
            None => Ok(()),
        },
    }
}

/// Full redraw: clear, apply `camera`, replay `items` in order, then the
/// optional in-progress preview on top.
///
/// # Errors
///
/// Returns the first [`SurfaceError`] from the backend.
pub fn replay<S: Surface>(
    surface: &mut S,
    camera: &Camera,
    items: &[DrawItem],
    preview: Option<&DrawItem>,
    images: &ImageCache<S::Image>,
) -> Result<(), SurfaceError> {
    surface.reset(camera)?;
    for item in items.iter().chain(preview) {
        draw_item(surface, item, images)?;
    }
    Ok(())
}
