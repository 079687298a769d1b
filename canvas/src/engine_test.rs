#![allow(clippy::float_cmp)]

use frames::item::{ImageItem, Segment, TextItem};
use frames::{ChatMessage, DrawItem};

use super::*;
use crate::recording::{Op, RecordingSurface};

// =============================================================
// Helpers
// =============================================================

type Core = EngineCore<RecordingSurface>;

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn stroke(x: f64) -> DrawItem {
    DrawItem::Pencil(Segment { start_x: 0.0, start_y: 0.0, x, y: 0.0, color: "#000".into(), size: 2.0 })
}

fn label(text: &str, x: f64, y: f64) -> DrawItem {
    DrawItem::Text(TextItem { x, y, text: text.into(), color: "#111".into(), size: 2.0 })
}

fn picture(src: &str) -> DrawItem {
    DrawItem::Image(ImageItem { x: 0.0, y: 0.0, src: src.into(), width: 20.0, height: 10.0 })
}

/// A core that has greeted as `me` and joined `studio` with `history`.
fn joined(history: Vec<DrawItem>) -> Core {
    let mut core = EngineCore::new(RecordingSurface::new());
    core.apply_event(RelayEvent::Connected { peer_id: "me".into() });
    core.apply_event(RelayEvent::Joined { room_id: "studio".into(), history, chat: Vec::new() });
    core.surface.take();
    core
}

fn without_cursor(actions: Vec<Action>) -> Vec<Action> {
    actions.into_iter().filter(|a| !matches!(a, Action::Cursor(_))).collect()
}

// =============================================================
// Relay events and redraw policy
// =============================================================

#[test]
fn join_snapshot_seeds_mirror_with_full_redraw() {
    let mut core = EngineCore::new(RecordingSurface::new());
    core.apply_event(RelayEvent::Joined {
        room_id: "studio".into(),
        history: vec![stroke(1.0), label("a", 0.0, 0.0)],
        chat: vec![ChatMessage { author: "bob".into(), text: "hi".into(), timestamp: 1 }],
    });

    assert_eq!(core.history(), &[stroke(1.0), label("a", 0.0, 0.0)]);
    assert_eq!(core.chat.len(), 1);
    assert_eq!(core.room_id.as_deref(), Some("studio"));
    assert_eq!(
        core.surface.take(),
        vec![Op::Reset(Camera::default()), Op::Segment { x: 1.0, y: 0.0, erase: false }, Op::Text("a".into())]
    );
}

#[test]
fn remote_stroke_is_painted_incrementally() {
    let mut core = joined(vec![label("a", 0.0, 0.0)]);

    core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: stroke(5.0) });

    assert_eq!(core.surface.take(), vec![Op::Segment { x: 5.0, y: 0.0, erase: false }]);
    assert_eq!(core.history().len(), 2);
}

#[test]
fn remote_non_stroke_triggers_full_redraw() {
    let mut core = joined(vec![stroke(1.0)]);

    core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: label("b", 3.0, 3.0) });

    let ops = core.surface.take();
    assert_eq!(ops[0], Op::Reset(Camera::default()));
    assert_eq!(ops.len(), 3);
}

#[test]
fn replace_and_sync_overwrite_mirror() {
    let mut core = joined(vec![stroke(1.0), stroke(2.0)]);

    core.apply_event(RelayEvent::Replaced { peer_id: "p2".into(), history: vec![label("x", 0.0, 0.0)] });
    assert_eq!(core.history(), &[label("x", 0.0, 0.0)]);
    assert_eq!(core.surface.resets(), 1);

    core.apply_event(RelayEvent::Synced { history: Vec::new(), reason: "clear".into() });
    assert!(core.history().is_empty());
    assert_eq!(core.surface.take().last(), Some(&Op::Reset(Camera::default())));
}

#[test]
fn mirror_follows_server_order() {
    let mut core = joined(Vec::new());
    let events = vec![
        RelayEvent::Appended { peer_id: "a".into(), item: stroke(1.0) },
        RelayEvent::Appended { peer_id: "b".into(), item: stroke(2.0) },
        RelayEvent::Synced { history: vec![stroke(1.0)], reason: "undo".into() },
        RelayEvent::Appended { peer_id: "a".into(), item: label("t", 0.0, 0.0) },
        RelayEvent::Replaced { peer_id: "b".into(), history: vec![label("t", 9.0, 9.0)] },
        RelayEvent::Appended { peer_id: "b".into(), item: stroke(3.0) },
    ];
    for event in events {
        core.apply_event(event);
    }
    assert_eq!(core.history(), &[label("t", 9.0, 9.0), stroke(3.0)]);
}

#[test]
fn local_item_overwritten_by_peer_replace_returns_with_next_sync() {
    let mut core = joined(vec![stroke(1.0)]);
    let local = core.commit_text(pt(5.0, 5.0), "mine");
    assert_eq!(core.history().len(), 2);

    // Peer's replace was ordered before our append at the relay.
    core.apply_event(RelayEvent::Replaced { peer_id: "p2".into(), history: vec![stroke(1.0)] });
    assert_eq!(core.history(), &[stroke(1.0)]);

    let Action::Append(item) = &local[0] else {
        panic!("expected append");
    };
    core.apply_event(RelayEvent::Synced { history: vec![stroke(1.0), item.clone()], reason: "undo".into() });
    assert_eq!(core.history(), &[stroke(1.0), item.clone()]);
}

#[test]
fn relay_errors_leave_state_alone() {
    let mut core = joined(vec![stroke(1.0)]);
    let actions = core.apply_event(RelayEvent::Failed {
        syscall: "draw:append".into(),
        code: "E_INVALID_PAYLOAD".into(),
        message: "size must be greater than zero".into(),
    });
    assert!(actions.is_empty());
    assert_eq!(core.history(), &[stroke(1.0)]);
    assert!(core.surface.ops.is_empty());
}

#[test]
fn chat_messages_accumulate() {
    let mut core = joined(Vec::new());
    core.apply_event(RelayEvent::Chat(ChatMessage { author: "bob".into(), text: "yo".into(), timestamp: 3 }));
    assert_eq!(core.chat[0].text, "yo");
}

#[test]
fn surface_failure_does_not_lose_items() {
    let mut core = joined(Vec::new());
    core.surface.fail = true;

    core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: label("a", 0.0, 0.0) });
    core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: stroke(1.0) });

    assert_eq!(core.history().len(), 2);
}

// =============================================================
// Images
// =============================================================

#[test]
fn image_waits_for_decode_then_renders_in_order() {
    let mut core = joined(vec![stroke(1.0)]);

    let actions = core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: picture("data:a") });
    assert_eq!(actions, vec![Action::LoadImage("data:a".into())]);
    assert_eq!(core.history().len(), 2);
    assert!(!core.surface.take().iter().any(|op| matches!(op, Op::Image(_))));

    core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: stroke(2.0) });
    core.surface.take();

    core.image_loaded("data:a", "decoded-a".into());
    assert_eq!(
        core.surface.take(),
        vec![
            Op::Reset(Camera::default()),
            Op::Segment { x: 1.0, y: 0.0, erase: false },
            Op::Image("decoded-a".into()),
            Op::Segment { x: 2.0, y: 0.0, erase: false },
        ]
    );
}

#[test]
fn image_decode_is_requested_once() {
    let mut core = joined(Vec::new());
    let first = core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: picture("data:a") });
    let second = core.apply_event(RelayEvent::Replaced {
        peer_id: "p2".into(),
        history: vec![picture("data:a"), picture("data:a")],
    });
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[test]
fn snapshot_requests_every_image() {
    let mut core = EngineCore::new(RecordingSurface::new());
    let actions = core.apply_event(RelayEvent::Joined {
        room_id: "studio".into(),
        history: vec![picture("data:a"), stroke(1.0), picture("data:b")],
        chat: Vec::new(),
    });
    assert!(actions.contains(&Action::LoadImage("data:a".into())));
    assert!(actions.contains(&Action::LoadImage("data:b".into())));
}

#[test]
fn failed_image_stays_in_mirror_unrendered() {
    let mut core = joined(vec![picture("data:bad")]);
    core.image_failed("data:bad");
    core.image_loaded("data:bad", "late".into());
    core.redraw();

    assert_eq!(core.history().len(), 1);
    assert!(!core.surface.take().iter().any(|op| matches!(op, Op::Image(_))));
}

#[test]
fn snapshot_requests_each_source_once_in_history_order() {
    let mut core = EngineCore::new(RecordingSurface::new());
    let actions = core.apply_event(RelayEvent::Joined {
        room_id: "studio".into(),
        history: vec![picture("data:b"), picture("data:a"), picture("data:b")],
        chat: Vec::new(),
    });
    let loads: Vec<_> = actions.into_iter().filter(|a| matches!(a, Action::LoadImage(_))).collect();
    assert_eq!(loads, vec![Action::LoadImage("data:b".into()), Action::LoadImage("data:a".into())]);
}

#[test]
fn decode_failure_without_pending_request_is_ignored() {
    let mut core = joined(Vec::new());
    core.image_failed("data:late");

    let actions = core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: picture("data:late") });
    assert_eq!(actions, vec![Action::LoadImage("data:late".into())]);

    core.image_loaded("data:late", "decoded".into());
    assert!(core.surface.take().contains(&Op::Image("decoded".into())));
}

#[test]
fn dropped_image_is_centered_and_scaled() {
    let mut core = joined(Vec::new());
    core.camera = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };

    let actions = core.drop_image(pt(400.0, 400.0), "data:big", 600.0, 300.0, "img".into());

    let expected = DrawItem::Image(ImageItem {
        x: 200.0 - 150.0,
        y: 200.0 - 75.0,
        src: "data:big".into(),
        width: 300.0,
        height: 150.0,
    });
    assert_eq!(actions, vec![Action::Append(expected.clone())]);
    assert_eq!(core.history(), &[expected]);
    assert!(core.surface.take().contains(&Op::Image("img".into())));
}

#[test]
fn zero_size_drop_is_rejected() {
    let mut core = joined(Vec::new());
    assert!(core.drop_image(pt(0.0, 0.0), "data:x", 0.0, 0.0, "img".into()).is_empty());
    assert!(core.history().is_empty());
}

// =============================================================
// Local drawing
// =============================================================

#[test]
fn pencil_emits_one_segment_per_move() {
    let mut core = joined(Vec::new());
    core.set_tool(Tool::Pencil);

    core.on_pointer_down(pt(0.0, 0.0), Button::Primary);
    let first = without_cursor(core.on_pointer_move(pt(10.0, 0.0), 0.0));
    let second = without_cursor(core.on_pointer_move(pt(20.0, 5.0), 1.0));
    let up = core.on_pointer_up(pt(20.0, 5.0), Button::Primary);

    let DrawItem::Pencil(seg) = &core.history()[1] else {
        panic!("expected pencil segment");
    };
    assert_eq!((seg.start_x, seg.start_y, seg.x, seg.y), (10.0, 0.0, 20.0, 5.0));
    assert_eq!(first.len(), 1);
    assert_eq!(second, vec![Action::Append(core.history()[1].clone())]);
    assert!(up.is_empty());
    assert_eq!(core.surface.resets(), 0);
    assert_eq!(core.surface.ops.len(), 2);
}

#[test]
fn eraser_segments_erase() {
    let mut core = joined(Vec::new());
    core.set_tool(Tool::Eraser);
    core.on_pointer_down(pt(0.0, 0.0), Button::Primary);
    core.on_pointer_move(pt(3.0, 4.0), 0.0);

    assert!(matches!(core.history()[0], DrawItem::Eraser(_)));
    assert_eq!(core.surface.take(), vec![Op::Segment { x: 3.0, y: 4.0, erase: true }]);
}

#[test]
fn shape_previews_with_full_redraw_and_commits_on_release() {
    let mut core = joined(vec![stroke(1.0)]);
    core.set_tool(Tool::Rect);
    core.set_color("#ff0000");

    core.on_pointer_down(pt(10.0, 10.0), Button::Primary);
    let moved = without_cursor(core.on_pointer_move(pt(30.0, 40.0), 0.0));
    assert!(moved.is_empty());
    assert!(core.preview().is_some());
    assert_eq!(core.history().len(), 1);
    assert_eq!(
        core.surface.take(),
        vec![Op::Reset(Camera::default()), Op::Segment { x: 1.0, y: 0.0, erase: false }, Op::Rect]
    );

    let up = core.on_pointer_up(pt(50.0, 60.0), Button::Primary);
    let committed = DrawItem::Rect(Segment {
        start_x: 10.0,
        start_y: 10.0,
        x: 50.0,
        y: 60.0,
        color: "#ff0000".into(),
        size: core.ui.brush_size,
    });
    assert_eq!(up, vec![Action::Append(committed.clone())]);
    assert_eq!(core.history()[1], committed);
    assert!(core.preview().is_none());
}

#[test]
fn remote_snapshot_mid_preview_keeps_preview_on_top() {
    let mut core = joined(Vec::new());
    core.set_tool(Tool::Circle);
    core.on_pointer_down(pt(0.0, 0.0), Button::Primary);
    core.on_pointer_move(pt(5.0, 5.0), 0.0);
    core.surface.take();

    core.apply_event(RelayEvent::Appended { peer_id: "p2".into(), item: label("t", 0.0, 0.0) });

    assert_eq!(core.surface.take().last(), Some(&Op::Circle));
}

#[test]
fn text_tool_asks_host_then_commits() {
    let mut core = joined(Vec::new());
    core.set_tool(Tool::Text);
    core.camera = Camera { pan_x: 10.0, pan_y: 0.0, zoom: 1.0 };

    let actions = core.on_pointer_down(pt(30.0, 40.0), Button::Primary);
    assert_eq!(actions, vec![Action::PromptText(pt(20.0, 40.0))]);

    assert!(core.commit_text(pt(20.0, 40.0), "   ").is_empty());
    let actions = core.commit_text(pt(20.0, 40.0), "hello");
    let DrawItem::Text(text) = &core.history()[0] else {
        panic!("expected text item");
    };
    assert_eq!((text.x, text.y, text.text.as_str()), (20.0, 40.0, "hello"));
    assert_eq!(actions.len(), 1);
}

#[test]
fn secondary_button_does_nothing() {
    let mut core = joined(Vec::new());
    core.set_tool(Tool::Pencil);
    assert!(core.on_pointer_down(pt(0.0, 0.0), Button::Secondary).is_empty());
    assert_eq!(core.input, InputState::Idle);
}

// =============================================================
// Drag-move
// =============================================================

#[test]
fn drag_moves_locally_and_commits_replace() {
    let mut core = joined(vec![stroke(1.0), label("hi", 10.0, 20.0)]);

    core.on_pointer_down(pt(12.0, 22.0), Button::Primary);
    assert_eq!(core.input, InputState::Dragging { index: 1, grab_dx: 2.0, grab_dy: 2.0 });

    let moved = without_cursor(core.on_pointer_move(pt(52.0, 62.0), 0.0));
    assert!(moved.is_empty(), "drag sends nothing while moving");
    assert_eq!(core.history()[1], label("hi", 50.0, 60.0));
    assert_eq!(core.surface.resets(), 1);

    let up = core.on_pointer_up(pt(52.0, 62.0), Button::Primary);
    assert_eq!(up, vec![Action::Replace(vec![stroke(1.0), label("hi", 50.0, 60.0)])]);
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn drag_respects_camera() {
    let mut core = joined(vec![label("hi", 10.0, 20.0)]);
    core.camera = Camera { pan_x: 100.0, pan_y: 100.0, zoom: 2.0 };

    // World (11, 21) is screen (122, 142).
    core.on_pointer_down(pt(122.0, 142.0), Button::Primary);
    core.on_pointer_move(pt(142.0, 142.0), 0.0);

    assert_eq!(core.history()[0], label("hi", 20.0, 20.0));
}

#[test]
fn select_on_empty_space_grabs_nothing() {
    let mut core = joined(vec![stroke(100.0)]);
    core.on_pointer_down(pt(50.0, 0.0), Button::Primary);
    assert_eq!(core.input, InputState::Idle);
    assert!(core.on_pointer_up(pt(50.0, 0.0), Button::Primary).is_empty());
}

#[test]
fn remote_replace_out_of_range_cancels_drag() {
    let mut core = joined(vec![label("a", 0.0, 0.0), label("b", 100.0, 0.0)]);
    core.on_pointer_down(pt(101.0, 1.0), Button::Primary);
    assert!(matches!(core.input, InputState::Dragging { index: 1, .. }));

    core.apply_event(RelayEvent::Synced { history: vec![label("a", 0.0, 0.0)], reason: "undo".into() });

    assert_eq!(core.input, InputState::Idle);
    assert!(core.on_pointer_up(pt(120.0, 1.0), Button::Primary).is_empty());
}

#[test]
fn concurrent_drags_converge_on_later_commit() {
    let history = vec![label("zero", 0.0, 0.0), label("one", 100.0, 0.0)];
    let mut a = joined(history.clone());
    let mut b = joined(history);

    a.on_pointer_down(pt(1.0, 1.0), Button::Primary);
    a.on_pointer_move(pt(11.0, 1.0), 0.0);
    b.on_pointer_down(pt(101.0, 1.0), Button::Primary);
    b.on_pointer_move(pt(101.0, 51.0), 0.0);

    let Some(Action::Replace(a_commit)) = a.on_pointer_up(pt(11.0, 1.0), Button::Primary).pop() else {
        panic!("a commits");
    };
    let Some(Action::Replace(b_commit)) = b.on_pointer_up(pt(101.0, 51.0), Button::Primary).pop() else {
        panic!("b commits");
    };
    assert_ne!(a_commit, b_commit);

    // The relay applies A then B; A hears B's replace last.
    a.apply_event(RelayEvent::Replaced { peer_id: "b".into(), history: b_commit.clone() });
    assert_eq!(a.history(), b_commit.as_slice());
    assert_eq!(a.history()[0], label("zero", 0.0, 0.0));
}

// =============================================================
// Camera
// =============================================================

#[test]
fn wheel_zooms_around_pointer_with_full_redraw() {
    let mut core = joined(vec![stroke(1.0)]);
    let anchor = pt(200.0, 100.0);
    let world_before = core.camera.screen_to_world(anchor);

    let actions = core.on_wheel(anchor, -100.0);

    assert_eq!(actions, vec![Action::PresenceChanged]);
    assert!((core.camera.zoom - 1.1).abs() < 1e-9);
    let world_after = core.camera.screen_to_world(anchor);
    assert!((world_after.x - world_before.x).abs() < 1e-9);
    assert!((world_after.y - world_before.y).abs() < 1e-9);
    assert!(matches!(core.surface.ops[0], Op::Reset(cam) if cam == core.camera));
}

#[test]
fn wheel_past_limit_skips_redraw() {
    let mut core = joined(Vec::new());
    core.camera.zoom = crate::consts::MAX_ZOOM;
    assert!(core.on_wheel(pt(0.0, 0.0), -1.0).is_empty());
    assert!(core.surface.ops.is_empty());
}

#[test]
fn space_drag_pans() {
    let mut core = joined(Vec::new());
    core.set_tool(Tool::Pencil);
    core.on_key_down(&Key(" ".into()));

    core.on_pointer_down(pt(10.0, 10.0), Button::Primary);
    let actions = without_cursor(core.on_pointer_move(pt(25.0, 5.0), 0.0));
    core.on_pointer_move(pt(30.0, 5.0), 1.0);

    assert_eq!(actions, vec![Action::PresenceChanged]);
    assert_eq!((core.camera.pan_x, core.camera.pan_y), (20.0, -5.0));
    assert!(core.history().is_empty(), "panning draws nothing");

    core.on_key_up(&Key(" ".into()));
    assert_eq!(core.input, InputState::Idle);
}

#[test]
fn middle_button_pans_with_any_tool() {
    let mut core = joined(Vec::new());
    core.set_tool(Tool::Rect);
    core.on_pointer_down(pt(0.0, 0.0), Button::Middle);
    core.on_pointer_move(pt(-40.0, 0.0), 0.0);
    assert_eq!(core.camera.pan_x, -40.0);
    assert_eq!(core.surface.resets(), 1);
}

// =============================================================
// Presence
// =============================================================

#[test]
fn cursor_events_are_throttled_and_need_a_room() {
    let mut lobby = EngineCore::new(RecordingSurface::new());
    assert!(lobby.on_pointer_move(pt(1.0, 1.0), 0.0).is_empty());

    let mut core = joined(Vec::new());
    core.camera = Camera { pan_x: 0.0, pan_y: 0.0, zoom: 2.0 };
    let sent: Vec<Action> = [0.0, 10.0, 40.0, 60.0, 100.0, 120.0]
        .into_iter()
        .flat_map(|t| core.on_pointer_move(pt(8.0, 4.0), t))
        .collect();
    assert_eq!(sent, vec![Action::Cursor(pt(4.0, 2.0)), Action::Cursor(pt(4.0, 2.0)), Action::Cursor(pt(4.0, 2.0))]);
}

#[test]
fn peer_cursors_upsert_and_leave() {
    let mut core = joined(Vec::new());

    let actions = core.apply_event(RelayEvent::Cursor { peer_id: "p2".into(), name: "bob".into(), x: 5.0, y: 5.0 });
    assert_eq!(actions, vec![Action::PresenceChanged]);
    core.apply_event(RelayEvent::Cursor { peer_id: "p2".into(), name: "bob".into(), x: 6.0, y: 7.0 });
    core.apply_event(RelayEvent::Cursor { peer_id: "me".into(), name: "me".into(), x: 0.0, y: 0.0 });
    assert_eq!(core.presence.len(), 1);

    core.camera = Camera { pan_x: 10.0, pan_y: 0.0, zoom: 2.0 };
    let cursors = core.cursors();
    assert_eq!(cursors[0].screen, pt(22.0, 14.0));

    assert_eq!(core.apply_event(RelayEvent::PeerLeft { peer_id: "p2".into() }), vec![Action::PresenceChanged]);
    assert!(core.apply_event(RelayEvent::PeerLeft { peer_id: "p2".into() }).is_empty());
    assert!(core.cursors().is_empty());
}

#[test]
fn rejoin_drops_stale_cursors() {
    let mut core = joined(Vec::new());
    core.apply_event(RelayEvent::Cursor { peer_id: "p2".into(), name: "bob".into(), x: 1.0, y: 1.0 });

    core.apply_event(RelayEvent::Joined { room_id: "other".into(), history: Vec::new(), chat: Vec::new() });

    assert!(core.presence.is_empty());
    assert_eq!(core.room_id.as_deref(), Some("other"));
}
