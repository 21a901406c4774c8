//! Add a field with one widget annotation.

use crate::dict_scan;
use crate::error::{Error, Result};
use crate::object::{Literal, ObjectRef};

use super::super::form_fields::{self, AddFieldOptions, Field, FieldPosition, FieldType};
use super::super::object_store::ObjectStore;
use super::super::resolver;
use super::super::signature_appearance::{self, SignatureAppearance};
use super::register_ref;

/// Default appearance string for new fields and widgets.
const DEFAULT_APPEARANCE: &str = "(/Helv 0 Tf 0 g)";

/// Body of the Helvetica font minted for `/DR`.
const HELVETICA_FONT: &str = "<<\n  /Type /Font\n  /Subtype /Type1\n  /BaseFont /Helvetica\n>>";

/// Add `name` and return the new field, or `None` when nothing could be
/// queued. The ledger is left as it was on failure.
pub(crate) fn add_field(
    store: &mut ObjectStore,
    appearance: &dyn SignatureAppearance,
    name: &str,
    options: &AddFieldOptions,
) -> Option<Field> {
    let checkpoint = store.checkpoint();
    match try_add(store, name, options) {
        Ok((field, image_value)) => {
            if let Some(image) = image_value {
                signature_appearance::attach_best_effort(
                    store,
                    appearance,
                    field.obj_ref,
                    image,
                    options.width,
                    options.height,
                );
            }
            log::info!("added field {:?} as {}", name, field.obj_ref);
            Some(field)
        },
        Err(e) => {
            log::warn!("cannot add field {:?}: {}", name, e);
            store.rollback(checkpoint);
            None
        },
    }
}

fn try_add<'o>(store: &mut ObjectStore, name: &str, options: &'o AddFieldOptions) -> Result<(Field, Option<&'o str>)> {
    let acroform_ref = store
        .acroform_ref()
        .ok_or_else(|| Error::MalformedStructure("catalog has no indirect /AcroForm".to_string()))?;

    let field_type = FieldType::normalize(&options.field_type);
    let value = options.value.as_str();
    let image_value = field_type == FieldType::Signature && form_fields::looks_like_image_data(value);
    let value_literal = (!value.is_empty() && !image_value).then(|| dict_scan::encode_pdf_string(value));

    let page_ref = resolver::find_page_by_number(store, options.page);
    if page_ref.is_none() {
        log::warn!("page {} not found, widget for {:?} is not placed on a page", options.page, name);
    }

    let field_ref = store.fresh_ref();
    let widget_ref = store.fresh_ref();
    let rect = [
        options.x,
        options.y,
        options.x + options.width,
        options.y + options.height,
    ];

    let field_body = field_dictionary(name, &field_type, value_literal.as_deref(), widget_ref, options);
    let widget_body = widget_annotation(field_ref, page_ref, &field_type, rect, value_literal.as_deref(), options);
    store.push_object(field_ref, field_body);
    store.push_object(widget_ref, widget_body);

    register_in_acroform(store, acroform_ref, field_ref)?;
    if let Some(page_ref) = page_ref {
        let page_body = store.get_object_body_with_patch(page_ref)?;
        let updated = register_ref(store, &page_body, "/Annots", widget_ref)?;
        store.apply_patch(page_ref, &updated, &page_body);
    }

    let position = FieldPosition::from_rect(rect, page_ref.map(|_| options.page));
    let mut field = Field::new(
        name,
        (!image_value).then(|| value.to_string()),
        field_type,
        field_ref,
    )
    .with_position(position);
    field.widget_refs = vec![widget_ref];
    Ok((field, image_value.then_some(value)))
}

fn field_dictionary(
    name: &str,
    field_type: &FieldType,
    value: Option<&str>,
    widget_ref: ObjectRef,
    options: &AddFieldOptions,
) -> String {
    let flags = options
        .metadata
        .iter()
        .find(|(key, _)| form_fields::pdf_key(key) == "/Ff")
        .map(|(_, v)| v.to_pdf())
        .unwrap_or_else(|| "0".to_string());

    let mut body = format!(
        "<<\n  /FT {}\n  /T {}\n  /Ff {}\n  /DA {}\n",
        field_type.as_pdf_name(),
        dict_scan::encode_text_string(name),
        flags,
        DEFAULT_APPEARANCE
    );
    if let Some(value) = value {
        body.push_str(&format!("  /V {}\n", value));
    }
    body.push_str(&format!("  /Kids [{}]\n>>", widget_ref));
    apply_metadata(body, options, &["/Ff"])
}

fn widget_annotation(
    field_ref: ObjectRef,
    page_ref: Option<ObjectRef>,
    field_type: &FieldType,
    rect: [f64; 4],
    value: Option<&str>,
    options: &AddFieldOptions,
) -> String {
    let mut body = format!("<<\n  /Type /Annot\n  /Subtype /Widget\n  /Parent {}\n", field_ref);
    if let Some(page_ref) = page_ref {
        body.push_str(&format!("  /P {}\n", page_ref));
    }
    let rect: Vec<String> = rect.iter().map(|n| dict_scan::format_number(*n)).collect();
    body.push_str(&format!(
        "  /FT {}\n  /Rect [{}]\n  /F 4\n  /DA {}\n",
        field_type.as_pdf_name(),
        rect.join(" "),
        DEFAULT_APPEARANCE
    ));
    if let Some(value) = value {
        body.push_str(&format!("  /V {}\n", value));
    }
    body.push_str(">>");
    apply_metadata(body, options, &["/F", "/V", "/Ff"])
}

/// Write each metadata entry not in `skip`: generated keys are replaced,
/// others are appended before `>>` in insertion order.
fn apply_metadata(mut body: String, options: &AddFieldOptions, skip: &[&str]) -> String {
    for (key, value) in &options.metadata {
        let key = form_fields::pdf_key(key);
        if skip.contains(&key.as_str()) {
            continue;
        }
        let literal = value.to_pdf();
        if dict_scan::has_key(&body, &key) {
            body = dict_scan::replace_key_value(&body, &key, &literal);
        } else if let Some(close) = body.rfind(">>") {
            body.insert_str(close, &format!("  {} {}\n", key, literal));
        }
    }
    body
}

/// Register `field_ref` in `/Fields`, force `/NeedAppearances` and make sure
/// `/DR /Font /Helv` exists.
fn register_in_acroform(store: &mut ObjectStore, acroform_ref: ObjectRef, field_ref: ObjectRef) -> Result<()> {
    let original = store.get_object_body_with_patch(acroform_ref)?;
    let body = register_ref(store, &original, "/Fields", field_ref)?;
    let body = dict_scan::upsert_key_value(&body, "/NeedAppearances", "true");
    let body = ensure_default_font(store, body)?;
    store.apply_patch(acroform_ref, &body, &original);
    Ok(())
}

fn mint_helvetica(store: &mut ObjectStore) -> ObjectRef {
    let font_ref = store.fresh_ref();
    store.push_object(font_ref, HELVETICA_FONT);
    log::debug!("minted Helvetica font {}", font_ref);
    font_ref
}

/// AcroForm body with `/DR /Font /Helv` present. Indirect `/DR` and `/Font`
/// dictionaries are patched in place.
fn ensure_default_font(store: &mut ObjectStore, acroform: String) -> Result<String> {
    let dr = match dict_scan::literal_after("/DR", &acroform) {
        None => None,
        Some(Literal::Dictionary(text)) => Some(DictSlot::Inline(text.to_string())),
        Some(Literal::Reference(r)) => match store.body(r) {
            Some(body) if body.trim_start().starts_with("<<") => Some(DictSlot::Indirect(r, body.to_string())),
            _ => {
                log::warn!("/DR {} does not resolve to a dictionary", r);
                Some(DictSlot::Replace)
            },
        },
        Some(other) => {
            log::warn!("/DR is a {}, replacing", other.type_name());
            Some(DictSlot::Replace)
        },
    };

    match dr {
        None => {
            let font = mint_helvetica(store);
            Ok(dict_scan::upsert_key_value(&acroform, "/DR", &fresh_resources(font)))
        },
        Some(DictSlot::Replace) => {
            let font = mint_helvetica(store);
            Ok(dict_scan::replace_key_value(&acroform, "/DR", &fresh_resources(font)))
        },
        Some(DictSlot::Inline(dr)) => {
            let updated = ensure_helv_in_resources(store, &dr)?;
            if updated == dr {
                return Ok(acroform);
            }
            Ok(dict_scan::replace_key_value(&acroform, "/DR", &updated))
        },
        Some(DictSlot::Indirect(dr_ref, dr)) => {
            let updated = ensure_helv_in_resources(store, &dr)?;
            store.apply_patch(dr_ref, &updated, &dr);
            Ok(acroform)
        },
    }
}

enum DictSlot {
    Inline(String),
    Indirect(ObjectRef, String),
    Replace,
}

fn fresh_resources(font: ObjectRef) -> String {
    format!("<< /Font << /Helv {} >> >>", font)
}

/// Resources dictionary with `/Font /Helv` present.
fn ensure_helv_in_resources(store: &mut ObjectStore, dr: &str) -> Result<String> {
    match dict_scan::literal_after("/Font", dr) {
        None => {
            let font = mint_helvetica(store);
            Ok(dict_scan::upsert_key_value(dr, "/Font", &format!("<< /Helv {} >>", font)))
        },
        Some(Literal::Dictionary(fonts)) => {
            if dict_scan::has_key(fonts, "/Helv") {
                return Ok(dr.to_string());
            }
            let font = mint_helvetica(store);
            let fonts = dict_scan::upsert_key_value(fonts, "/Helv", &font.to_string());
            Ok(dict_scan::replace_key_value(dr, "/Font", &fonts))
        },
        Some(Literal::Reference(fonts_ref)) => {
            let fonts = match store.body(fonts_ref) {
                Some(body) if body.trim_start().starts_with("<<") => body.to_string(),
                _ => {
                    log::warn!("/Font {} does not resolve to a dictionary", fonts_ref);
                    let font = mint_helvetica(store);
                    return Ok(dict_scan::replace_key_value(dr, "/Font", &format!("<< /Helv {} >>", font)));
                },
            };
            if !dict_scan::has_key(&fonts, "/Helv") {
                let font = mint_helvetica(store);
                let updated = dict_scan::upsert_key_value(&fonts, "/Helv", &font.to_string());
                store.apply_patch(fonts_ref, &updated, &fonts);
            }
            Ok(dr.to_string())
        },
        Some(other) => {
            log::warn!("/DR /Font is a {}, replacing", other.type_name());
            let font = mint_helvetica(store);
            Ok(dict_scan::replace_key_value(dr, "/Font", &format!("<< /Helv {} >>", font)))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::store_from;
    use super::*;
    use crate::editor::field_index;
    use crate::editor::form_fields::{FieldFlags, MetadataValue};
    use crate::editor::signature_appearance::ImageSignatureAppearance;

    const MINIMAL: [&str; 4] = [
        "<< /Type /Catalog /Pages 2 0 R /AcroForm 3 0 R >>",
        "<< /Type /Pages /Kids [4 0 R] /Count 1 >>",
        "<< /Fields [] /NeedAppearances false >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [] >>",
    ];

    fn r(id: u32) -> ObjectRef {
        ObjectRef::new(id, 0)
    }

    fn add(store: &mut ObjectStore, name: &str, options: AddFieldOptions) -> Option<Field> {
        add_field(store, &ImageSignatureAppearance, name, &options)
    }

    #[test]
    fn test_add_to_minimal_form() {
        let mut store = store_from(&MINIMAL);
        let field = add(&mut store, "TestField", AddFieldOptions::new().value("Hello World")).unwrap();
        assert_eq!(field.obj_ref, r(5));
        assert_eq!(field.widget_refs, vec![r(6)]);
        assert_eq!(field.page(), Some(1));

        let field_body = store.body(r(5)).unwrap();
        assert!(field_body.contains("/FT /Tx"));
        assert!(field_body.contains("/T (TestField)"));
        assert!(field_body.contains("/Ff 0"));
        assert!(field_body.contains("/V (Hello World)"));
        assert!(field_body.contains("/Kids [6 0 R]"));

        let widget = store.body(r(6)).unwrap();
        assert!(widget.contains("/Parent 5 0 R"));
        assert!(widget.contains("/P 4 0 R"));
        assert!(widget.contains("/Rect [100 500 200 520]"));
        assert!(widget.contains("/F 4"));

        let acroform = store.body(r(3)).unwrap();
        assert!(acroform.contains("/Fields [5 0 R]"));
        assert!(acroform.contains("/NeedAppearances true"));
        assert!(acroform.contains("/DR << /Font << /Helv 7 0 R >> >>"));
        assert!(store.body(r(7)).unwrap().contains("/BaseFont /Helvetica"));
        assert!(store.body(r(4)).unwrap().contains("/Annots [6 0 R]"));

        let listed = field_index::list_fields(&store);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], field);
    }

    #[test]
    fn test_empty_value_is_omitted() {
        let mut store = store_from(&MINIMAL);
        let field = add(&mut store, "Blank", AddFieldOptions::new()).unwrap();
        assert!(!field.has_value());
        assert!(!store.body(r(5)).unwrap().contains("/V"));
    }

    #[test]
    fn test_metadata_and_flags() {
        let mut store = store_from(&MINIMAL);
        let options = AddFieldOptions::new()
            .field_type("button")
            .flags(FieldFlags::PUSHBUTTON)
            .metadata("TU", "Press me")
            .metadata("F", 6i64)
            .metadata("MK", MetadataValue::Raw("<< /BG [1] >>".into()));
        add(&mut store, "Go", options).unwrap();

        let field_body = store.body(r(5)).unwrap();
        assert!(field_body.contains("/FT /Btn"));
        assert!(field_body.contains("/Ff 65536"));
        assert!(field_body.contains("/TU (Press me)"));
        assert!(field_body.contains("/F 6"));

        let widget = store.body(r(6)).unwrap();
        assert!(widget.contains("/F 4"));
        assert!(!widget.contains("/F 6"));
        assert!(!widget.contains("/Ff"));
        assert!(widget.contains("/MK << /BG [1] >>"));
    }

    #[test]
    fn test_missing_acroform_queues_nothing() {
        let mut store = store_from(&["<< /Type /Catalog /Pages 2 0 R >>", "<< /Type /Pages /Kids [] >>"]);
        assert!(add(&mut store, "X", AddFieldOptions::new()).is_none());
        assert!(!store.has_patches());
    }

    #[test]
    fn test_missing_page_degrades() {
        let mut store = store_from(&MINIMAL);
        let field = add(&mut store, "Far", AddFieldOptions::new().page(9)).unwrap();
        assert_eq!(field.page(), None);
        assert!(!store.body(r(6)).unwrap().contains("/P "));
        assert!(!store.body(r(4)).unwrap().contains("6 0 R"));
    }

    #[test]
    fn test_unresolved_annots_rolls_back() {
        let mut store = store_from(&[
            MINIMAL[0],
            MINIMAL[1],
            MINIMAL[2],
            "<< /Type /Page /Parent 2 0 R /Annots 40 0 R >>",
        ]);
        assert!(add(&mut store, "X", AddFieldOptions::new()).is_none());
        assert!(!store.has_patches());
        // Numbers handed out before the failure stay used.
        assert!(store.next_fresh_object_number() > 6);
    }

    #[test]
    fn test_existing_helv_not_minted_again() {
        let mut store = store_from(&[
            MINIMAL[0],
            MINIMAL[1],
            "<< /Fields [] /DR 5 0 R >>",
            MINIMAL[3],
            "<< /Font 6 0 R >>",
            "<< /Helv 7 0 R >>",
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
        ]);
        let field = add(&mut store, "A", AddFieldOptions::new()).unwrap();
        assert_eq!(field.obj_ref, r(8));
        assert!(store.body(r(10)).is_none());
        assert!(!store.ledger().iter().any(|p| p.obj_ref == r(5) || p.obj_ref == r(6)));
    }

    #[test]
    fn test_indirect_font_dictionary_patched() {
        let mut store = store_from(&[
            MINIMAL[0],
            MINIMAL[1],
            "<< /Fields [] /DR << /Font 5 0 R >> >>",
            MINIMAL[3],
            "<< /ZaDb 9 0 R >>",
        ]);
        add(&mut store, "A", AddFieldOptions::new()).unwrap();
        // Field 6, widget 7, font 8.
        assert_eq!(store.body(r(5)), Some("<< /ZaDb 9 0 R /Helv 8 0 R >>"));
        assert!(store.body(r(3)).unwrap().contains("/DR << /Font 5 0 R >>"));
    }

    #[test]
    fn test_dr_without_font() {
        let mut store = store_from(&[
            MINIMAL[0],
            MINIMAL[1],
            "<< /Fields [] /DR << /ProcSet [/PDF] >> >>",
            MINIMAL[3],
        ]);
        add(&mut store, "A", AddFieldOptions::new()).unwrap();
        assert!(store
            .body(r(3))
            .unwrap()
            .contains("/DR << /ProcSet [/PDF] /Font << /Helv 7 0 R >> >>"));
    }

    #[test]
    fn test_dr_null_is_replaced() {
        let mut store = store_from(&[MINIMAL[0], MINIMAL[1], "<< /Fields [] /DR null /DA (/Helv 0 Tf 0 g) >>", MINIMAL[3]]);
        add(&mut store, "A", AddFieldOptions::new()).unwrap();
        let acroform = store.body(r(3)).unwrap();
        assert!(acroform.contains("/DR << /Font << /Helv 7 0 R >> >>"));
        assert!(acroform.contains("/Fields [5 0 R]"));
        assert!(acroform.contains("/DA (/Helv 0 Tf 0 g)"));
        assert!(!acroform.contains("null"));
        assert_eq!(store.body(r(7)), Some(HELVETICA_FONT));
    }

    #[test]
    fn test_dr_reference_to_non_dictionary() {
        let mut store = store_from(&[MINIMAL[0], MINIMAL[1], "<< /Fields [] /DR 5 0 R >>", MINIMAL[3], "(not a dictionary)"]);
        add(&mut store, "A", AddFieldOptions::new()).unwrap();
        // Field 6, widget 7, font 8.
        let acroform = store.body(r(3)).unwrap();
        assert!(acroform.contains("/DR << /Font << /Helv 8 0 R >> >>"));
        assert!(acroform.contains("/Fields [6 0 R]"));
        assert_eq!(store.body(r(8)), Some(HELVETICA_FONT));
        assert!(!store.ledger().iter().any(|p| p.obj_ref == r(5)));
    }

    #[test]
    fn test_font_entry_not_a_dictionary() {
        let mut store = store_from(&[
            MINIMAL[0],
            MINIMAL[1],
            "<< /Fields [] /DR << /Font 42 /ProcSet [/PDF] >> >>",
            MINIMAL[3],
        ]);
        add(&mut store, "A", AddFieldOptions::new()).unwrap();
        assert!(store
            .body(r(3))
            .unwrap()
            .contains("/DR << /Font << /Helv 7 0 R >> /ProcSet [/PDF] >>"));
        assert_eq!(store.body(r(7)), Some(HELVETICA_FONT));
    }

    #[test]
    fn test_font_reference_unresolved() {
        let mut store = store_from(&[MINIMAL[0], MINIMAL[1], "<< /Fields [] /DR << /Font 99 0 R >> >>", MINIMAL[3]]);
        add(&mut store, "A", AddFieldOptions::new()).unwrap();
        let acroform = store.body(r(3)).unwrap();
        assert!(acroform.contains("/DR << /Font << /Helv 7 0 R >> >>"));
        assert!(!acroform.contains("99 0 R"));
        assert_eq!(store.body(r(7)), Some(HELVETICA_FONT));
    }

    #[test]
    fn test_metadata_key_with_space() {
        let mut store = store_from(&MINIMAL);
        add(&mut store, "A", AddFieldOptions::new().metadata("my key", MetadataValue::Integer(3))).unwrap();
        let field = store.body(r(5)).unwrap();
        assert!(field.contains("/my#20key 3"));
        assert_eq!(dict_scan::value_token_after("/my#20key", field), Some("3"));
    }

    #[test]
    fn test_indirect_fields_array() {
        let mut store = store_from(&[MINIMAL[0], MINIMAL[1], "<< /Fields 5 0 R >>", MINIMAL[3], "[]"]);
        add(&mut store, "A", AddFieldOptions::new()).unwrap();
        assert_eq!(store.body(r(5)), Some("[6 0 R]"));
        assert!(store.body(r(3)).unwrap().contains("/Fields 5 0 R"));
    }

    #[test]
    fn test_signature_image_value_not_written() {
        let mut store = store_from(&MINIMAL);
        let options = AddFieldOptions::new()
            .field_type("signature")
            .value("data:image/png;base64,not-really-an-image");
        let field = add(&mut store, "Sig", options).unwrap();
        assert!(field.is_signature_field());
        assert!(!field.has_value());
        assert!(!store.body(r(5)).unwrap().contains("/V"));
        // The broken image is dropped without touching the field.
        assert!(!store.body(r(6)).unwrap().contains("/AP"));
        assert_eq!(field_index::list_fields(&store).len(), 1);
    }
}
