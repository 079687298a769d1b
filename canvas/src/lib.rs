//! Client render engine for the shared whiteboard.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It keeps a
//! local mirror of the room's draw history, maps between screen and world
//! coordinates, decides between incremental and full redraws, and turns
//! pointer input into strokes, shapes, and drag-moves. The host JavaScript
//! layer wires DOM events to a [`bridge::Board`] and writes the frames it
//! queues to the relay socket.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`bridge`] | `wasm-bindgen` exports for the host page |
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`doc`] | Local mirror of the room history |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`input`] | Tools, buttons, and the gesture state machine |
//! | [`hit`] | Hit-testing movable items |
//! | [`render`] | The [`render::Surface`] trait and history replay |
//! | [`canvas2d`] | `CanvasRenderingContext2d` surface for the browser |
//! | [`images`] | Decode cache for embedded images |
//! | [`presence`] | Cursor throttle and peer cursor map |
//! | [`events`] | Decoding inbound relay frames |
//! | [`net`] | Building outbound relay frames |
//! | [`consts`] | Shared numeric constants (zoom limits, throttle, glyph box) |

pub mod bridge;
pub mod camera;
pub mod canvas2d;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod events;
pub mod hit;
pub mod images;
pub mod input;
pub mod net;
pub mod presence;
pub mod render;

#[cfg(test)]
pub(crate) mod recording;
