use frames::item::{ImageItem, Segment, TextItem};

use super::*;

fn stroke(x: f64) -> DrawItem {
    DrawItem::Pencil(Segment {
        start_x: 0.0,
        start_y: 0.0,
        x,
        y: 0.0,
        color: "#000".into(),
        size: 2.0,
    })
}

fn label(text: &str) -> DrawItem {
    DrawItem::Text(TextItem { x: 1.0, y: 2.0, text: text.into(), color: "#111".into(), size: 4.0 })
}

fn image(src: &str) -> DrawItem {
    DrawItem::Image(ImageItem { x: 0.0, y: 0.0, src: src.into(), width: 10.0, height: 10.0 })
}

#[test]
fn new_mirror_is_empty() {
    let mirror = Mirror::new();
    assert!(mirror.is_empty());
    assert_eq!(mirror.len(), 0);
}

#[test]
fn push_appends_in_order() {
    let mut mirror = Mirror::new();
    mirror.push(stroke(1.0));
    mirror.push(label("a"));
    assert_eq!(mirror.items(), &[stroke(1.0), label("a")]);
}

#[test]
fn replace_all_discards_previous_items() {
    let mut mirror = Mirror::new();
    mirror.push(stroke(1.0));
    mirror.replace_all(vec![label("b"), stroke(2.0)]);
    assert_eq!(mirror.items(), &[label("b"), stroke(2.0)]);

    mirror.replace_all(Vec::new());
    assert!(mirror.is_empty());
}

#[test]
fn set_replaces_one_index() {
    let mut mirror = Mirror::new();
    mirror.push(label("a"));
    mirror.push(label("b"));

    let moved = label("a").moved_to(50.0, 60.0).expect("text moves");
    assert!(mirror.set(0, moved.clone()));

    assert_eq!(mirror.get(0), Some(&moved));
    assert_eq!(mirror.get(1), Some(&label("b")));
}

#[test]
fn set_out_of_range_is_rejected() {
    let mut mirror = Mirror::new();
    mirror.push(label("a"));
    assert!(!mirror.set(1, label("z")));
    assert_eq!(mirror.items(), &[label("a")]);
}

#[test]
fn image_sources_are_deduplicated() {
    let mut mirror = Mirror::new();
    mirror.push(image("data:a"));
    mirror.push(stroke(1.0));
    mirror.push(image("data:b"));
    mirror.push(image("data:a"));
    assert_eq!(mirror.image_sources(), vec!["data:a", "data:b"]);
}
