//! In-memory [`Surface`] that records draw calls for assertions.

use frames::item::{ImageItem, Segment, TextItem};

use crate::camera::Camera;
use crate::render::{Surface, SurfaceError};

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Reset(Camera),
    Segment { x: f64, y: f64, erase: bool },
    Rect,
    Circle,
    Text(String),
    Image(String),
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<Op>,
    pub fail: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain recorded ops.
    pub fn take(&mut self) -> Vec<Op> {
        std::mem::take(&mut self.ops)
    }

    pub fn resets(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Reset(_))).count()
    }

    fn record(&mut self, op: Op) -> Result<(), SurfaceError> {
        if self.fail {
            return Err(SurfaceError::Draw("recording surface set to fail".into()));
        }
        self.ops.push(op);
        Ok(())
    }
}

impl Surface for RecordingSurface {
    /// Images are stood in for by a label.
    type Image = String;

    fn reset(&mut self, camera: &Camera) -> Result<(), SurfaceError> {
        self.record(Op::Reset(*camera))
    }

    fn segment(&mut self, seg: &Segment, erase: bool) -> Result<(), SurfaceError> {
        self.record(Op::Segment { x: seg.x, y: seg.y, erase })
    }

    fn rect(&mut self, _seg: &Segment) -> Result<(), SurfaceError> {
        self.record(Op::Rect)
    }

    fn circle(&mut self, _seg: &Segment) -> Result<(), SurfaceError> {
        self.record(Op::Circle)
    }

    fn text(&mut self, text: &TextItem) -> Result<(), SurfaceError> {
        self.record(Op::Text(text.text.clone()))
    }

    fn image(&mut self, _item: &ImageItem, image: &Self::Image) -> Result<(), SurfaceError> {
        self.record(Op::Image(image.clone()))
    }
}
