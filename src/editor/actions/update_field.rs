//! Set a field's value and optionally rename it.

use crate::dict_scan;
use crate::error::{Error, Result};

use super::super::field_index;
use super::super::form_fields::{self, Field, UpdateOptions};
use super::super::object_store::ObjectStore;
use super::super::signature_appearance::{self, SignatureAppearance};
use super::need_appearances;

/// Size used for a signature appearance when the field has no widget rect.
const DEFAULT_SIGNATURE_SIZE: (f64, f64) = (100.0, 20.0);

/// `true` when the field was found and its patches were queued.
pub(crate) fn update_field(
    store: &mut ObjectStore,
    appearance: &dyn SignatureAppearance,
    name: &str,
    new_value: &str,
    options: &UpdateOptions,
) -> bool {
    let Some(field) = field_index::find_field(store, name) else {
        log::warn!("field {:?} not found", name);
        return false;
    };

    let checkpoint = store.checkpoint();
    match try_update(store, &field, new_value, options) {
        Ok(image) => {
            if image {
                let (width, height) = field
                    .position
                    .map(|p| (p.width, p.height))
                    .unwrap_or(DEFAULT_SIGNATURE_SIZE);
                signature_appearance::attach_best_effort(store, appearance, field.obj_ref, new_value, width, height);
            }
            log::info!("updated field {:?}", name);
            true
        },
        Err(e) => {
            log::warn!("cannot update field {:?}: {}", name, e);
            store.rollback(checkpoint);
            false
        },
    }
}

/// Queue the patches; `Ok(true)` when the value is image data for a
/// signature appearance instead of `/V`.
fn try_update(store: &mut ObjectStore, field: &Field, new_value: &str, options: &UpdateOptions) -> Result<bool> {
    let is_image = field.is_signature_field() && form_fields::looks_like_image_data(new_value);
    let is_button = field.is_button_field();
    let value_literal = if is_button {
        button_state(new_value)
    } else {
        dict_scan::encode_pdf_string(new_value)
    };

    let partial = match options.new_name.as_deref().filter(|n| !n.is_empty()) {
        Some(new_name) => Some(partial_name(&field_index::parent_name(store, field.obj_ref), new_name)?),
        None => None,
    };

    let original = store.get_object_body_with_patch(field.obj_ref)?;
    let mut body = original.clone();
    if !is_image {
        body = dict_scan::upsert_key_value(&body, "/V", &value_literal);
        if is_button && field.widget_refs.contains(&field.obj_ref) {
            body = dict_scan::upsert_key_value(&body, "/AS", &value_literal);
        }
    }
    if let Some(partial) = partial {
        body = dict_scan::upsert_key_value(&body, "/T", &dict_scan::encode_text_string(partial));
    }
    store.apply_patch(field.obj_ref, &body, &original);

    if !is_image {
        for widget in field.widget_refs.iter().filter(|w| **w != field.obj_ref) {
            let original = store.get_object_body_with_patch(*widget)?;
            let mut body = original.clone();
            if dict_scan::has_key(&body, "/V") {
                body = dict_scan::replace_key_value(&body, "/V", &value_literal);
            }
            if is_button {
                body = dict_scan::upsert_key_value(&body, "/AS", &value_literal);
            }
            store.apply_patch(*widget, &body, &original);
        }
    }

    need_appearances(store)?;
    Ok(is_image)
}

/// Button values are names: `Yes` becomes `/Yes`, an empty value `/Off`.
fn button_state(value: &str) -> String {
    let name = dict_scan::encode_name(value);
    if name == "/" {
        "/Off".to_string()
    } else {
        name
    }
}

/// The `/T` value for `new_name`, a fully qualified name.
///
/// A top-level field takes `new_name` whole, dots included. A child field
/// must stay under `parent` (its ancestors' qualified name); only the part
/// after `parent.` is stored.
fn partial_name<'a>(parent: &str, new_name: &'a str) -> Result<&'a str> {
    if parent.is_empty() {
        return Ok(new_name);
    }
    new_name
        .strip_prefix(parent)
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| {
            Error::MalformedStructure(format!("{:?} is not under parent field {:?}", new_name, parent))
        })
}
