//! `wasm-bindgen` surface for the host page.
//!
//! DESIGN
//! ======
//! The host passes flat values: CSS-pixel coordinates, DOM button codes, key
//! names, and raw frame bytes. Calls that produce relay traffic queue the
//! encoded frames in an outbox the host drains with [`Board::take_outbound`]
//! and writes to the socket. Work only the host can do (prompting for text,
//! decoding an image, repositioning cursor labels) comes back from each call
//! as a JSON array of [`HostRequest`]s.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::json;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, HtmlImageElement};

use crate::camera::Point;
use crate::engine::{Action, Engine};
use crate::input::{Button, Key, Tool};

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;

/// Work handed back to the host page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostRequest {
    /// Ask for text, then call [`Board::commit_text`] with the same point.
    PromptText { x: f64, y: f64 },
    /// Decode `src`, then call [`Board::image_loaded`] or [`Board::image_failed`].
    LoadImage { src: String },
    /// Re-read [`Board::cursors`].
    PresenceChanged,
}

/// Split engine actions into encoded relay frames and host requests, keeping
/// the order within each.
pub fn route(
    actions: Vec<Action>,
    mut encode: impl FnMut(&Action) -> Option<Vec<u8>>,
) -> (Vec<Vec<u8>>, Vec<HostRequest>) {
    let mut frames = Vec::new();
    let mut requests = Vec::new();
    for action in actions {
        match action {
            Action::Append(_) | Action::Replace(_) | Action::Cursor(_) => {
                // `None` until `join`.
                if let Some(bytes) = encode(&action) {
                    frames.push(bytes);
                }
            }
            Action::PromptText(world) => requests.push(HostRequest::PromptText { x: world.x, y: world.y }),
            Action::LoadImage(src) => requests.push(HostRequest::LoadImage { src }),
            Action::PresenceChanged => requests.push(HostRequest::PresenceChanged),
        }
    }
    (frames, requests)
}

fn requests_json(requests: &[HostRequest]) -> String {
    serde_json::to_string(requests).unwrap_or_else(|e| {
        log::warn!("host requests not serializable: {e}");
        String::from("[]")
    })
}

/// A whiteboard bound to one canvas element.
#[wasm_bindgen]
pub struct Board {
    engine: Engine,
    outbox: VecDeque<Vec<u8>>,
}

#[wasm_bindgen]
impl Board {
    /// # Errors
    ///
    /// Fails when the canvas has no 2D context.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement) -> Result<Board, JsValue> {
        let engine = Engine::new(canvas).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self { engine, outbox: VecDeque::new() })
    }

    pub fn set_viewport(&mut self, width_css: f64, height_css: f64, dpr: f64) {
        self.engine.set_viewport(width_css, height_css, dpr);
    }

    /// Encoded `room:join` request for `room_id`.
    pub fn join(&mut self, room_id: &str, name: &str) -> Vec<u8> {
        self.outbox.clear();
        self.engine.join(room_id, name)
    }

    /// Apply one binary frame from the socket.
    pub fn on_frame(&mut self, bytes: &[u8]) -> String {
        let actions = self.engine.on_frame(bytes);
        self.dispatch(actions)
    }

    /// Next queued outbound frame, oldest first.
    pub fn take_outbound(&mut self) -> Option<Vec<u8>> {
        self.outbox.pop_front()
    }

    // --- Pointer and keyboard ---

    pub fn pointer_down(&mut self, x: f64, y: f64, button: i16) -> String {
        let Some(button) = Button::from_dom(button) else {
            return requests_json(&[]);
        };
        let actions = self.engine.on_pointer_down(Point::new(x, y), button);
        self.dispatch(actions)
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> String {
        let actions = self.engine.on_pointer_move(Point::new(x, y));
        self.dispatch(actions)
    }

    pub fn pointer_up(&mut self, x: f64, y: f64, button: i16) -> String {
        let Some(button) = Button::from_dom(button) else {
            return requests_json(&[]);
        };
        let actions = self.engine.on_pointer_up(Point::new(x, y), button);
        self.dispatch(actions)
    }

    pub fn wheel(&mut self, x: f64, y: f64, delta_y: f64) -> String {
        let actions = self.engine.on_wheel(Point::new(x, y), delta_y);
        self.dispatch(actions)
    }

    pub fn key_down(&mut self, key: String) {
        self.engine.on_key_down(&Key(key));
    }

    pub fn key_up(&mut self, key: String) {
        self.engine.on_key_up(&Key(key));
    }

    // --- Toolbar ---

    /// Returns `false` for an unknown tool name.
    pub fn set_tool(&mut self, name: &str) -> bool {
        match Tool::from_name(name) {
            Some(tool) => {
                self.engine.set_tool(tool);
                true
            }
            None => false,
        }
    }

    pub fn set_color(&mut self, color: &str) {
        self.engine.core.set_color(color);
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.engine.core.set_brush_size(size);
    }

    /// Place text at the world point a `prompt_text` request named.
    pub fn commit_text(&mut self, x: f64, y: f64, text: &str) -> String {
        let actions = self.engine.commit_text(Point::new(x, y), text);
        self.dispatch(actions)
    }

    pub fn undo(&self) -> Option<Vec<u8>> {
        self.engine.undo()
    }

    pub fn clear(&self) -> Option<Vec<u8>> {
        self.engine.clear()
    }

    pub fn chat(&self, text: &str) -> Option<Vec<u8>> {
        self.engine.chat(text)
    }

    // --- Images ---

    pub fn drop_image(&mut self, x: f64, y: f64, image: HtmlImageElement) -> String {
        let actions = self.engine.drop_image(Point::new(x, y), image);
        self.dispatch(actions)
    }

    pub fn image_loaded(&mut self, image: HtmlImageElement, src: &str) {
        self.engine.image_loaded(image, src);
    }

    pub fn image_failed(&mut self, src: &str) {
        self.engine.image_failed(src);
    }

    // --- Queries ---

    pub fn zoom(&self) -> f64 {
        self.engine.camera().zoom
    }

    /// Peer cursors in screen space as `[{peer_id, name, x, y}]`.
    pub fn cursors(&self) -> String {
        let cursors: Vec<_> = self
            .engine
            .cursors()
            .into_iter()
            .map(|c| json!({ "peer_id": c.peer_id, "name": c.name, "x": c.screen.x, "y": c.screen.y }))
            .collect();
        serde_json::Value::Array(cursors).to_string()
    }
}

impl Board {
    fn dispatch(&mut self, actions: Vec<Action>) -> String {
        let (frames, requests) = route(actions, |action| self.engine.encode(action));
        self.outbox.extend(frames);
        requests_json(&requests)
    }
}
