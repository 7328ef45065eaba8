use super::*;
use crate::model::{ObjectPatch, ShapeKind, new_object};

fn stamped(x: f64) -> CanvasObject {
    let mut obj = new_object(ShapeKind::Rectangle, &ObjectPatch::position(x, 10.0), 0);
    obj.updated_at_ms = Some(5);
    obj.last_edited_by = Some("me".into());
    obj.last_edited_at_ms = Some(4);
    obj.order = 7;
    obj
}

#[test]
fn save_strips_sync_metadata() {
    let mut lib = ComponentLibrary::new();
    let obj = stamped(0.0);
    assert!(lib.save("card", [&obj]));

    let saved = &lib.get("card").unwrap().objects[0];
    assert!(saved.updated_at_ms.is_none());
    assert!(saved.last_edited_by.is_none());
    assert!(saved.last_edited_at_ms.is_none());
}

#[test]
fn save_rejects_empty_group_and_blank_name() {
    let mut lib = ComponentLibrary::new();
    assert!(!lib.save("empty", std::iter::empty()));
    assert!(!lib.save("   ", [&stamped(0.0)]));
    assert_eq!(lib.names().count(), 0);
}

#[test]
fn instantiate_mints_ids_and_offsets() {
    let mut lib = ComponentLibrary::new();
    let a = stamped(0.0);
    let b = stamped(50.0);
    lib.save("pair", [&a, &b]);

    let copies = lib.instantiate("pair", 3).unwrap();
    assert_eq!(copies.len(), 2);
    assert_ne!(copies[0].id, a.id);
    assert_ne!(copies[0].id, copies[1].id);
    assert!((copies[0].x - 20.0).abs() < f64::EPSILON);
    assert!((copies[1].y - 30.0).abs() < f64::EPSILON);
    assert_eq!((copies[0].order, copies[1].order), (3, 4));
}

#[test]
fn unknown_component_is_none() {
    let lib = ComponentLibrary::new();
    assert!(lib.instantiate("nope", 0).is_none());
}

#[test]
fn save_replaces_same_name() {
    let mut lib = ComponentLibrary::new();
    lib.save("card", [&stamped(0.0)]);
    lib.save("card", [&stamped(1.0), &stamped(2.0)]);
    assert_eq!(lib.get("card").unwrap().objects.len(), 2);
    assert_eq!(lib.names().collect::<Vec<_>>(), vec!["card"]);
}
