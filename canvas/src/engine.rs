//! Engine: the client-side reconciliation loop.
//!
//! DESIGN
//! ======
//! [`EngineCore`] owns the local mirror, the camera, the gesture state, and
//! a [`Surface`]. Relay events and pointer input both funnel through it, and
//! every state change ends in exactly one paint decision:
//!
//! - freehand segments (local or remote) are painted incrementally on top of
//!   the current bitmap;
//! - everything else (camera moves, previews, drags, replaces, undo/clear,
//!   snapshots, non-stroke arrivals, image decodes) triggers a full replay.
//!
//! Outbound traffic is returned as [`Action`]s; the host turns them into
//! frames with [`crate::net::Outbound`]. The core never touches the network
//! or a clock, which keeps it testable with a recording surface.
//!
//! [`Engine`] binds the core to a browser canvas, and [`crate::bridge::Board`]
//! exports it to JavaScript.

use frames::item::{ImageItem, Segment, TextItem};
use frames::{ChatMessage, DrawItem};
use web_sys::HtmlCanvasElement;

use crate::camera::{Camera, Point};
use crate::canvas2d::Canvas2dSurface;
use crate::doc::Mirror;
use crate::events::RelayEvent;
use crate::hit;
use crate::images::{self, ImageCache, Slot};
use crate::input::{Button, InputState, Key, Tool, UiState};
use crate::net::Outbound;
use crate::presence::{CursorThrottle, Presence, ScreenCursor};
use crate::render::{self, Surface, SurfaceError};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Work the host must do on the engine's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send `draw:append`.
    Append(DrawItem),
    /// Send `draw:replace` with the whole history.
    Replace(Vec<DrawItem>),
    /// Send `cursor:move` with this world position.
    Cursor(Point),
    /// Ask the user for text to place at this world position, then call
    /// [`EngineCore::commit_text`].
    PromptText(Point),
    /// Decode this image source, then call [`EngineCore::image_loaded`] or
    /// [`EngineCore::image_failed`].
    LoadImage(String),
    /// Peer cursors or their screen positions changed.
    PresenceChanged,
}

/// Core engine state. Everything that does not need a browser.
pub struct EngineCore<S: Surface> {
    pub surface: S,
    pub camera: Camera,
    pub mirror: Mirror,
    pub images: ImageCache<S::Image>,
    pub presence: Presence,
    pub chat: Vec<ChatMessage>,
    pub ui: UiState,
    pub input: InputState,
    /// This connection's peer id, from the session greeting.
    pub peer_id: Option<String>,
    /// Room of the last join snapshot.
    pub room_id: Option<String>,
    throttle: CursorThrottle,
    preview: Option<DrawItem>,
    space_held: bool,
}

impl<S: Surface> EngineCore<S> {
    #[must_use]
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            camera: Camera::default(),
            mirror: Mirror::new(),
            images: ImageCache::new(),
            presence: Presence::new(),
            chat: Vec::new(),
            ui: UiState::default(),
            input: InputState::Idle,
            peer_id: None,
            room_id: None,
            throttle: CursorThrottle::default(),
            preview: None,
            space_held: false,
        }
    }

    // =========================================================================
    // RELAY EVENTS
    // =========================================================================

    /// Apply one relay event to the mirror and repaint as needed.
    pub fn apply_event(&mut self, event: RelayEvent) -> Vec<Action> {
        let mut actions = Vec::new();
        match event {
            RelayEvent::Connected { peer_id } => self.peer_id = Some(peer_id),
            RelayEvent::Joined { room_id, history, chat } => {
                self.room_id = Some(room_id);
                self.chat = chat;
                self.input = InputState::Idle;
                self.preview = None;
                self.presence.clear();
                self.replace_mirror(history, &mut actions);
                actions.push(Action::PresenceChanged);
            }
            RelayEvent::Appended { item, .. } => {
                actions.extend(self.request_image(&item));
                let stroke = item.is_stroke();
                self.mirror.push(item);
                if stroke {
                    self.paint_latest();
                } else {
                    self.redraw();
                }
            }
            RelayEvent::Replaced { history, .. } | RelayEvent::Synced { history, .. } => {
                self.replace_mirror(history, &mut actions);
            }
            RelayEvent::Chat(message) => self.chat.push(message),
            RelayEvent::Cursor { peer_id, name, x, y } => {
                if self.peer_id.as_deref() != Some(peer_id.as_str()) {
                    self.presence.upsert(&peer_id, &name, Point::new(x, y));
                    actions.push(Action::PresenceChanged);
                }
            }
            RelayEvent::PeerLeft { peer_id } => {
                if self.presence.remove(&peer_id) {
                    actions.push(Action::PresenceChanged);
                }
            }
            RelayEvent::Ack { .. } => {}
            RelayEvent::Failed { syscall, code, message } => {
                log::warn!("relay rejected {syscall}: {code} {message}");
            }
        }
        actions
    }

    fn replace_mirror(&mut self, history: Vec<DrawItem>, actions: &mut Vec<Action>) {
        self.mirror.replace_all(history);
        for src in self.mirror.image_sources() {
            if self.images.request(src) {
                actions.push(Action::LoadImage(src.to_owned()));
            }
        }
        self.revalidate_drag();
        self.redraw();
    }

    /// A replace may renumber every index; drop a drag whose index no
    /// longer names a movable item.
    fn revalidate_drag(&mut self) {
        if let InputState::Dragging { index, .. } = self.input {
            if self.mirror.get(index).and_then(DrawItem::origin).is_none() {
                self.input = InputState::Idle;
            }
        }
    }

    fn request_image(&mut self, item: &DrawItem) -> Option<Action> {
        let src = item.image_src()?;
        self.images.request(src).then(|| Action::LoadImage(src.to_owned()))
    }

    // =========================================================================
    // IMAGES
    // =========================================================================

    /// A decode finished; images render in history order on the next replay.
    pub fn image_loaded(&mut self, src: &str, image: S::Image) {
        if self.images.resolve(src, image) {
            self.redraw();
        }
    }

    /// A decode failed. The item stays in the mirror and is never drawn.
    ///
    /// Only a pending decode can fail; reports for other sources are stale.
    pub fn image_failed(&mut self, src: &str) {
        if !matches!(self.images.slot(src), Some(Slot::Pending)) {
            log::debug!("ignoring decode failure for a source with no pending decode");
            return;
        }
        log::warn!("image decode failed; item will not render ({} bytes of src)", src.len());
        self.images.fail(src);
    }

    /// Place an image dropped at `screen`, centered on the drop point and
    /// scaled to fit the drop box.
    pub fn drop_image(&mut self, screen: Point, src: &str, natural_w: f64, natural_h: f64, image: S::Image) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen);
        let (width, height) = images::fit_to_drop_box(natural_w, natural_h);
        let item = DrawItem::Image(ImageItem {
            x: world.x - width / 2.0,
            y: world.y - height / 2.0,
            src: src.to_owned(),
            width,
            height,
        });
        if let Err(e) = item.validate() {
            log::warn!("dropped image rejected: {e}");
            return Vec::new();
        }
        self.images.resolve(src, image);
        self.commit(item)
    }

    // =========================================================================
    // TOOLBAR
    // =========================================================================

    pub fn set_tool(&mut self, tool: Tool) {
        self.ui.tool = tool;
        self.input = InputState::Idle;
        if self.preview.take().is_some() {
            self.redraw();
        }
    }

    pub fn set_color(&mut self, color: &str) {
        if !color.trim().is_empty() {
            color.clone_into(&mut self.ui.color);
        }
    }

    pub fn set_brush_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.ui.brush_size = size;
        }
    }

    /// Place host-provided text at `world`. Blank text is ignored.
    pub fn commit_text(&mut self, world: Point, text: &str) -> Vec<Action> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let item = DrawItem::Text(TextItem {
            x: world.x,
            y: world.y,
            text: text.to_owned(),
            color: self.ui.color.clone(),
            size: self.ui.brush_size,
        });
        self.commit(item)
    }

    // =========================================================================
    // POINTER INPUT
    // =========================================================================

    pub fn on_pointer_down(&mut self, screen: Point, button: Button) -> Vec<Action> {
        if button == Button::Middle || (button == Button::Primary && self.space_held) {
            self.input = InputState::Panning { last_screen: screen };
            return Vec::new();
        }
        if button != Button::Primary {
            return Vec::new();
        }

        let world = self.camera.screen_to_world(screen);
        match self.ui.tool {
            Tool::Select => {
                let grabbed = hit::hit_test(self.mirror.items(), world)
                    .and_then(|index| Some((index, self.mirror.get(index)?.origin()?)));
                if let Some((index, (ox, oy))) = grabbed {
                    self.input = InputState::Dragging { index, grab_dx: world.x - ox, grab_dy: world.y - oy };
                }
                Vec::new()
            }
            Tool::Text => vec![Action::PromptText(world)],
            tool if tool.is_freehand() => {
                self.input = InputState::Freehand { tool, last_world: world };
                Vec::new()
            }
            tool if tool.is_shape() => {
                self.input = InputState::Shaping { tool, start_world: world };
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// `now_ms` is wall-clock time, used only to throttle cursor events.
    pub fn on_pointer_move(&mut self, screen: Point, now_ms: f64) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen);
        let mut actions = Vec::new();
        if self.room_id.is_some() && self.throttle.allow(now_ms) {
            actions.push(Action::Cursor(world));
        }

        match self.input.clone() {
            InputState::Idle => {}
            InputState::Panning { last_screen } => {
                if self.camera.pan_by(screen.x - last_screen.x, screen.y - last_screen.y) {
                    self.redraw();
                    actions.push(Action::PresenceChanged);
                }
                self.input = InputState::Panning { last_screen: screen };
            }
            InputState::Freehand { tool, last_world } => {
                let item = self.segment(tool, last_world, world);
                self.mirror.push(item.clone());
                self.paint_latest();
                actions.push(Action::Append(item));
                self.input = InputState::Freehand { tool, last_world: world };
            }
            InputState::Shaping { tool, start_world } => {
                self.preview = Some(self.segment(tool, start_world, world));
                self.redraw();
            }
            InputState::Dragging { index, grab_dx, grab_dy } => {
                let moved = self
                    .mirror
                    .get(index)
                    .and_then(|item| item.moved_to(world.x - grab_dx, world.y - grab_dy));
                match moved {
                    Some(item) => {
                        self.mirror.set(index, item);
                        self.redraw();
                    }
                    None => self.input = InputState::Idle,
                }
            }
        }
        actions
    }

    pub fn on_pointer_up(&mut self, screen: Point, _button: Button) -> Vec<Action> {
        let world = self.camera.screen_to_world(screen);
        match std::mem::take(&mut self.input) {
            InputState::Shaping { tool, start_world } => {
                self.preview = None;
                let item = self.segment(tool, start_world, world);
                self.commit(item)
            }
            InputState::Dragging { .. } => vec![Action::Replace(self.mirror.items().to_vec())],
            InputState::Idle | InputState::Panning { .. } | InputState::Freehand { .. } => Vec::new(),
        }
    }

    /// Zoom one step around the pointer.
    pub fn on_wheel(&mut self, screen: Point, delta_y: f64) -> Vec<Action> {
        if !self.camera.zoom_by_wheel(screen, delta_y) {
            return Vec::new();
        }
        self.redraw();
        vec![Action::PresenceChanged]
    }

    pub fn on_key_down(&mut self, key: &Key) {
        if key.is_space() {
            self.space_held = true;
        }
    }

    pub fn on_key_up(&mut self, key: &Key) {
        if key.is_space() {
            self.space_held = false;
            if matches!(self.input, InputState::Panning { .. }) {
                self.input = InputState::Idle;
            }
        }
    }

    // =========================================================================
    // PAINTING
    // =========================================================================

    /// Full replay of the mirror (and any shape preview) under the camera.
    pub fn redraw(&mut self) {
        if let Err(e) = render::replay(&mut self.surface, &self.camera, self.mirror.items(), self.preview.as_ref(), &self.images) {
            log::warn!("full redraw failed: {e}");
        }
    }

    /// Paint only the newest item on top of the current bitmap.
    fn paint_latest(&mut self) {
        let Some(item) = self.mirror.items().last() else {
            return;
        };
        if let Err(e) = render::draw_item(&mut self.surface, item, &self.images) {
            log::warn!("incremental draw failed: {e}");
        }
    }

    /// Add a locally created non-stroke item and announce it.
    fn commit(&mut self, item: DrawItem) -> Vec<Action> {
        self.mirror.push(item.clone());
        self.redraw();
        vec![Action::Append(item)]
    }

    fn segment(&self, tool: Tool, from: Point, to: Point) -> DrawItem {
        let seg = Segment {
            start_x: from.x,
            start_y: from.y,
            x: to.x,
            y: to.y,
            color: self.ui.color.clone(),
            size: self.ui.brush_size,
        };
        match tool {
            Tool::Eraser => DrawItem::Eraser(seg),
            Tool::Rect => DrawItem::Rect(seg),
            Tool::Circle => DrawItem::Circle(seg),
            Tool::Pencil | Tool::Select | Tool::Text => DrawItem::Pencil(seg),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn history(&self) -> &[DrawItem] {
        self.mirror.items()
    }

    #[must_use]
    pub fn preview(&self) -> Option<&DrawItem> {
        self.preview.as_ref()
    }

    /// Peer cursors positioned for the overlay.
    #[must_use]
    pub fn cursors(&self) -> Vec<ScreenCursor> {
        self.presence.screen_positions(&self.camera)
    }
}

// =============================================================================
// BROWSER ENGINE
// =============================================================================

/// The full canvas engine. Wraps `EngineCore` and owns the browser canvas element.
pub struct Engine {
    canvas: HtmlCanvasElement,
    pub core: EngineCore<Canvas2dSurface>,
    outbound: Option<Outbound>,
}

impl Engine {
    /// Create a new engine bound to the given canvas element.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError::Unavailable`] if the canvas has no 2D context.
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, SurfaceError> {
        let surface = Canvas2dSurface::new(&canvas)?;
        Ok(Self { canvas, core: EngineCore::new(surface), outbound: None })
    }

    /// Resize the backing bitmap to the viewport and repaint.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.canvas.set_width((width_css * dpr).round().max(0.0) as u32);
        self.canvas.set_height((height_css * dpr).round().max(0.0) as u32);
        self.core.surface.set_viewport(width_css, height_css, dpr);
        self.core.redraw();
    }

    // --- Relay ---

    /// Start a session in `room_id`; returns the encoded `room:join` request.
    pub fn join(&mut self, room_id: &str, name: &str) -> Vec<u8> {
        let outbound = Outbound::new(room_id, name);
        let frame = outbound.join(now_ts());
        self.outbound = Some(outbound);
        frames::encode_frame(&frame)
    }

    /// Apply one binary frame from the relay.
    pub fn on_frame(&mut self, bytes: &[u8]) -> Vec<Action> {
        match RelayEvent::decode(bytes) {
            Ok(event) => self.core.apply_event(event),
            Err(e) => {
                log::warn!("dropping relay frame: {e}");
                Vec::new()
            }
        }
    }

    /// Encode the frame for `action`, if it goes to the relay.
    #[must_use]
    pub fn encode(&self, action: &Action) -> Option<Vec<u8>> {
        let frame = self.outbound.as_ref()?.for_action(action, now_ts())?;
        Some(frames::encode_frame(&frame))
    }

    #[must_use]
    pub fn undo(&self) -> Option<Vec<u8>> {
        self.outbound.as_ref().map(|o| frames::encode_frame(&o.undo(now_ts())))
    }

    #[must_use]
    pub fn clear(&self) -> Option<Vec<u8>> {
        self.outbound.as_ref().map(|o| frames::encode_frame(&o.clear(now_ts())))
    }

    #[must_use]
    pub fn chat(&self, text: &str) -> Option<Vec<u8>> {
        if text.trim().is_empty() {
            return None;
        }
        self.outbound.as_ref().map(|o| frames::encode_frame(&o.chat(text, now_ts())))
    }

    // --- Input ---

    pub fn on_pointer_down(&mut self, screen: Point, button: Button) -> Vec<Action> {
        self.core.on_pointer_down(screen, button)
    }

    pub fn on_pointer_move(&mut self, screen: Point) -> Vec<Action> {
        self.core.on_pointer_move(screen, js_sys::Date::now())
    }

    pub fn on_pointer_up(&mut self, screen: Point, button: Button) -> Vec<Action> {
        self.core.on_pointer_up(screen, button)
    }

    pub fn on_wheel(&mut self, screen: Point, delta_y: f64) -> Vec<Action> {
        self.core.on_wheel(screen, delta_y)
    }

    pub fn on_key_down(&mut self, key: &Key) {
        self.core.on_key_down(key);
    }

    pub fn on_key_up(&mut self, key: &Key) {
        self.core.on_key_up(key);
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.core.set_tool(tool);
    }

    pub fn commit_text(&mut self, world: Point, text: &str) -> Vec<Action> {
        self.core.commit_text(world, text)
    }

    pub fn drop_image(&mut self, screen: Point, image: web_sys::HtmlImageElement) -> Vec<Action> {
        let src = image.src();
        let (w, h) = (f64::from(image.natural_width()), f64::from(image.natural_height()));
        self.core.drop_image(screen, &src, w, h, image)
    }

    pub fn image_loaded(&mut self, image: web_sys::HtmlImageElement, src: &str) {
        self.core.image_loaded(src, image);
    }

    pub fn image_failed(&mut self, src: &str) {
        self.core.image_failed(src);
    }

    // --- Queries ---

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.core.camera
    }

    #[must_use]
    pub fn cursors(&self) -> Vec<ScreenCursor> {
        self.core.cursors()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn now_ts() -> i64 {
    js_sys::Date::now() as i64
}
