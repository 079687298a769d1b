use super::*;
use serde_json::json;

fn pencil() -> Value {
    json!({"tool": "pencil", "startX": 0, "startY": 0, "x": 10, "y": 5, "color": "#222", "size": 4})
}

#[test]
fn pencil_parses_camel_case_fields() {
    let item = DrawItem::from_value(&pencil()).expect("valid pencil");
    let DrawItem::Pencil(seg) = &item else {
        panic!("expected pencil, got {item:?}");
    };
    assert_eq!(seg.x, 10.0);
    assert_eq!(seg.start_y, 0.0);
    assert!(item.is_stroke());
}

#[test]
fn serializes_with_tool_tag() {
    let item = DrawItem::from_value(&pencil()).expect("valid pencil");
    let value = item.to_value();
    assert_eq!(value["tool"], "pencil");
    assert_eq!(value["startX"], 0.0);
}

#[test]
fn unknown_tool_is_malformed() {
    let err = DrawItem::from_value(&json!({"tool": "laser", "x": 1, "y": 1}))
        .expect_err("unknown tool");
    assert!(matches!(err, ItemError::Malformed(_)));
}

#[test]
fn missing_field_for_tool_is_malformed() {
    let err = DrawItem::from_value(&json!({"tool": "rect", "x": 1, "y": 1, "color": "red", "size": 1}))
        .expect_err("rect without start");
    assert!(matches!(err, ItemError::Malformed(_)));
}

#[test]
fn text_requires_non_empty_string() {
    let err = DrawItem::from_value(&json!({"tool": "text", "x": 1, "y": 1, "text": "  ", "color": "red", "size": 2}))
        .expect_err("blank text");
    assert!(matches!(err, ItemError::Empty("text")));
}

#[test]
fn zero_size_is_rejected() {
    let mut value = pencil();
    value["size"] = json!(0);
    let err = DrawItem::from_value(&value).expect_err("zero size");
    assert!(matches!(err, ItemError::NotPositive("size")));
}

#[test]
fn image_requires_positive_dimensions() {
    let err = DrawItem::from_value(&json!({"tool": "image", "x": 0, "y": 0, "src": "data:x", "width": 10, "height": -1}))
        .expect_err("negative height");
    assert!(matches!(err, ItemError::NotPositive("height")));
}

#[test]
fn history_error_names_offending_index() {
    let history = json!([pencil(), {"tool": "circle"}]);
    let err = DrawItem::parse_history(&history).expect_err("second item invalid");
    assert!(matches!(err, ItemError::AtIndex { index: 1, .. }));
}

#[test]
fn history_must_be_array() {
    let err = DrawItem::parse_history(&json!({"items": []})).expect_err("object");
    assert!(matches!(err, ItemError::NotAnArray));
}

#[test]
fn only_text_and_image_move() {
    let text = DrawItem::from_value(&json!({"tool": "text", "x": 1, "y": 2, "text": "hi", "color": "red", "size": 2}))
        .expect("text");
    let moved = text.moved_to(7.0, 8.0).expect("text moves");
    assert_eq!(moved.origin(), Some((7.0, 8.0)));
    assert_eq!(text.origin(), Some((1.0, 2.0)));

    let stroke = DrawItem::from_value(&pencil()).expect("pencil");
    assert!(stroke.moved_to(1.0, 1.0).is_none());
    assert!(stroke.origin().is_none());
}

#[test]
fn chat_request_is_stamped_when_timestamp_missing() {
    let msg = ChatMessage::from_request(&json!({"author": "ann", "text": "hi"}), 1234)
        .expect("valid chat");
    assert_eq!(msg.timestamp, 1234);
}

#[test]
fn chat_request_keeps_client_timestamp_even_as_float() {
    let msg = ChatMessage::from_request(
        &json!({"author": "ann", "text": "hi", "timestamp": 1_700_000_000_123.0}),
        1,
    )
    .expect("valid chat");
    assert_eq!(msg.timestamp, 1_700_000_000_123);
}

#[test]
fn chat_request_rejects_blank_author() {
    let err = ChatMessage::from_request(&json!({"author": "", "text": "hi"}), 1)
        .expect_err("blank author");
    assert!(matches!(err, ItemError::Empty("author")));
}

#[test]
fn stored_chat_message_deserializes_float_timestamp() {
    let msg: ChatMessage =
        serde_json::from_value(json!({"author": "a", "text": "b", "timestamp": 5.0}))
            .expect("stored chat");
    assert_eq!(msg.timestamp, 5);
}
