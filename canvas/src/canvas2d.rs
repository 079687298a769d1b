//! Browser [`Surface`] backed by `CanvasRenderingContext2d`.
//!
//! This is the only module that touches the 2D context. The bitmap is sized
//! in device pixels, so every transform folds in the device pixel ratio.

use std::f64::consts::TAU;

use frames::item::{ImageItem, Segment, TextItem};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::camera::Camera;
use crate::consts::TEXT_LINE_HEIGHT;
use crate::render::{Surface, SurfaceError};

pub struct Canvas2dSurface {
    ctx: CanvasRenderingContext2d,
    width_css: f64,
    height_css: f64,
    dpr: f64,
}

impl Canvas2dSurface {
    /// Acquire the 2D context of `canvas`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Unavailable`] if the element has no 2D context.
    pub fn new(canvas: &HtmlCanvasElement) -> Result<Self, SurfaceError> {
        let ctx = canvas
            .get_context("2d")
            .map_err(js_unavailable)?
            .ok_or_else(|| SurfaceError::Unavailable("canvas has no 2d context".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| SurfaceError::Unavailable("context is not CanvasRenderingContext2d".into()))?;
        Ok(Self { ctx, width_css: f64::from(canvas.width()), height_css: f64::from(canvas.height()), dpr: 1.0 })
    }

    /// Record the viewport in CSS pixels and the device pixel ratio.
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.width_css = width_css;
        self.height_css = height_css;
        self.dpr = dpr;
    }

    fn stroke_style(&self, color: &str, size: f64) {
        self.ctx.set_stroke_style_str(color);
        self.ctx.set_fill_style_str(color);
        self.ctx.set_line_width(size);
        self.ctx.set_line_cap("round");
    }
}

impl Surface for Canvas2dSurface {
    type Image = HtmlImageElement;

    fn reset(&mut self, camera: &Camera) -> Result<(), SurfaceError> {
        self.ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0).map_err(js_draw)?;
        self.ctx
            .clear_rect(0.0, 0.0, self.width_css * self.dpr, self.height_css * self.dpr);
        let scale = camera.zoom * self.dpr;
        self.ctx
            .set_transform(scale, 0.0, 0.0, scale, camera.pan_x * self.dpr, camera.pan_y * self.dpr)
            .map_err(js_draw)
    }

    fn segment(&mut self, seg: &Segment, erase: bool) -> Result<(), SurfaceError> {
        let op = if erase { "destination-out" } else { "source-over" };
        self.ctx.set_global_composite_operation(op).map_err(js_draw)?;
        self.stroke_style(&seg.color, seg.size);
        self.ctx.begin_path();
        self.ctx.move_to(seg.start_x, seg.start_y);
        self.ctx.line_to(seg.x, seg.y);
        self.ctx.stroke();
        self.ctx.set_global_composite_operation("source-over").map_err(js_draw)
    }

    fn rect(&mut self, seg: &Segment) -> Result<(), SurfaceError> {
        self.stroke_style(&seg.color, seg.size);
        self.ctx
            .stroke_rect(seg.start_x, seg.start_y, seg.x - seg.start_x, seg.y - seg.start_y);
        Ok(())
    }

    fn circle(&mut self, seg: &Segment) -> Result<(), SurfaceError> {
        let radius = (seg.x - seg.start_x).hypot(seg.y - seg.start_y);
        self.stroke_style(&seg.color, seg.size);
        self.ctx.begin_path();
        self.ctx.arc(seg.start_x, seg.start_y, radius, 0.0, TAU).map_err(js_draw)?;
        self.ctx.stroke();
        Ok(())
    }

    fn text(&mut self, text: &TextItem) -> Result<(), SurfaceError> {
        self.stroke_style(&text.color, text.size);
        self.ctx.set_text_baseline("top");
        self.ctx.set_font(&format!("{}px sans-serif", text.size * TEXT_LINE_HEIGHT));
        self.ctx.fill_text(&text.text, text.x, text.y).map_err(js_draw)
    }

    fn image(&mut self, item: &ImageItem, image: &Self::Image) -> Result<(), SurfaceError> {
        self.ctx
            .draw_image_with_html_image_element_and_dw_and_dh(image, item.x, item.y, item.width, item.height)
            .map_err(js_draw)
    }
}

fn js_draw(err: JsValue) -> SurfaceError {
    SurfaceError::Draw(format!("{err:?}"))
}

fn js_unavailable(err: JsValue) -> SurfaceError {
    SurfaceError::Unavailable(format!("{err:?}"))
}
