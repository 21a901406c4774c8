//! End-to-end form editing: add, update, remove, write and reopen.

mod common;

use common::{form_with_field, minimal_form, no_form};
use pdf_acroedit::{AddFieldOptions, Document, FieldFlags, FieldType, SaveOptions, UpdateOptions};

fn reopen(bytes: Vec<u8>) -> Document {
    Document::from_bytes(bytes).unwrap()
}

#[test]
fn test_add_write_reopen() {
    let mut doc = Document::from_bytes(minimal_form()).unwrap();
    let field = doc
        .add_field("TestField", AddFieldOptions::new().value("Hello World"))
        .unwrap();
    assert_eq!(field.name(), "TestField");

    let out = doc.write(&SaveOptions::incremental()).unwrap();
    let fields = reopen(out).list_fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name(), "TestField");
    assert_eq!(fields[0].value(), Some("Hello World"));
    assert_eq!(fields[0].type_name(), "/Tx");
    assert_eq!(fields[0].page(), Some(1));
    assert_eq!(fields[0].x(), Some(100.0));
    assert_eq!(fields[0].height(), Some(20.0));
}

#[test]
fn test_add_flattened() {
    let mut doc = Document::from_bytes(minimal_form()).unwrap();
    doc.add_field(
        "Choice",
        AddFieldOptions::new().field_type("choice").rect(10.0, 20.0, 30.0, 40.0).page(1),
    )
    .unwrap();
    let out = doc.write(&SaveOptions::flatten()).unwrap();
    assert!(!String::from_utf8_lossy(&out).contains("/Prev"));

    let fields = reopen(out).list_fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].field_type(), &FieldType::Choice);
    assert!(!fields[0].has_value());
    assert_eq!(fields[0].position.unwrap().to_rect(), [10.0, 20.0, 40.0, 60.0]);
}

#[test]
fn test_update_with_rename() {
    let mut doc = Document::from_bytes(form_with_field()).unwrap();
    assert!(doc.update_field("Old", "X", UpdateOptions::rename("New")));
    let reopened = reopen(doc.write(&SaveOptions::incremental()).unwrap());
    assert!(reopened.field("Old").is_none());
    assert_eq!(reopened.field("New").unwrap().value(), Some("X"));
}

#[test]
fn test_rename_to_self() {
    let mut doc = Document::from_bytes(form_with_field()).unwrap();
    assert!(doc.update_field("Old", "v", UpdateOptions::rename("Old")));
    let fields = reopen(doc.write(&SaveOptions::incremental()).unwrap()).list_fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name(), "Old");
    assert_eq!(fields[0].value(), Some("v"));
}

#[test]
fn test_update_missing_field() {
    let mut doc = Document::from_bytes(form_with_field()).unwrap();
    assert!(!doc.update_field("Nope", "X", UpdateOptions::default()));
    assert!(!doc.has_pending_changes());
}

#[test]
fn test_multiple_updates_last_wins() {
    let mut doc = Document::from_bytes(form_with_field()).unwrap();
    for value in ["one", "two", "three"] {
        assert!(doc.update_field("Old", value, UpdateOptions::default()));
    }
    let out = doc.write(&SaveOptions::incremental()).unwrap();
    // One object per touched reference, however often it was patched.
    let text = String::from_utf8_lossy(&out);
    assert_eq!(text.matches("5 0 obj").count(), 2);
    assert_eq!(reopen(out).field("Old").unwrap().value(), Some("three"));
}

#[test]
fn test_remove_is_not_repeatable() {
    let mut doc = Document::from_bytes(form_with_field()).unwrap();
    assert!(doc.remove_field("Old"));
    assert!(!doc.remove_field("Old"));
    let reopened = reopen(doc.write(&SaveOptions::incremental()).unwrap());
    assert!(reopened.list_fields().is_empty());
}

#[test]
fn test_remove_by_field_view() {
    let mut doc = Document::from_bytes(form_with_field()).unwrap();
    let field = doc.list_fields().remove(0);
    assert!(doc.remove_field(&field));
    assert!(!doc.remove_field(field));
}

#[test]
fn test_add_without_acroform() {
    let mut doc = Document::from_bytes(no_form()).unwrap();
    assert!(doc.add_field("X", AddFieldOptions::new()).is_none());
    assert!(!doc.has_pending_changes());
    assert!(doc.list_fields().is_empty());
}

#[test]
fn test_unicode_name_and_value() {
    let mut doc = Document::from_bytes(minimal_form()).unwrap();
    doc.add_field("Prénom", AddFieldOptions::new().value("Zoë (dev)")).unwrap();
    let field = reopen(doc.write(&SaveOptions::incremental()).unwrap())
        .field("Prénom")
        .unwrap();
    assert_eq!(field.value(), Some("Zoë (dev)"));
}

#[test]
fn test_flags_and_button() {
    let mut doc = Document::from_bytes(minimal_form()).unwrap();
    doc.add_field(
        "Agree",
        AddFieldOptions::new().field_type("button").flags(FieldFlags::NO_TOGGLE_TO_OFF),
    )
    .unwrap();
    assert!(doc.update_field("Agree", "Yes", UpdateOptions::default()));
    let field = reopen(doc.write(&SaveOptions::incremental()).unwrap())
        .field("Agree")
        .unwrap();
    assert!(field.is_button_field());
    assert_eq!(field.value(), Some("/Yes"));
}

#[test]
fn test_chained_writes_to_files() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.pdf");
    let second = dir.path().join("second.pdf");

    let mut doc = Document::from_bytes(minimal_form()).unwrap();
    doc.add_field("A", AddFieldOptions::new().value("1")).unwrap();
    doc.write_to(&first, &SaveOptions::incremental()).unwrap();
    doc.add_field("B", AddFieldOptions::new().value("2").position(100.0, 400.0))
        .unwrap();
    doc.write_to(&second, &SaveOptions::incremental()).unwrap();

    let first_bytes = std::fs::read(&first).unwrap();
    let second_bytes = std::fs::read(&second).unwrap();
    assert!(second_bytes.starts_with(&first_bytes));

    let doc = Document::open(&second).unwrap();
    let values: Vec<(String, Option<String>)> = doc
        .list_fields()
        .into_iter()
        .map(|f| (f.name, f.value))
        .collect();
    assert_eq!(
        values,
        vec![("A".to_string(), Some("1".to_string())), ("B".to_string(), Some("2".to_string()))]
    );
}

#[test]
fn test_list_fields_json() {
    let doc = Document::from_bytes(form_with_field()).unwrap();
    let json = serde_json::to_value(doc.list_fields()).unwrap();
    assert_eq!(json[0]["name"], "Old");
    assert_eq!(json[0]["type"], "/Tx");
    assert_eq!(json[0]["obj_ref"], "5 0 R");
    assert_eq!(json[0]["position"]["page"], 1);
}
