//! Field-level actions.
//!
//! Each action reads through the [`ObjectStore`], computes new bodies with
//! [`dict_scan`] and queues patches. A failed action rolls the ledger back
//! to where it started, so callers see either the whole edit or none of it.
//!
//! `/Fields`, `/Kids` and `/Annots` share one mutation policy:
//!
//! | Value found            | Effect                                          |
//! |------------------------|-------------------------------------------------|
//! | key absent / not array | key set to a one-element inline array            |
//! | inline array           | reference spliced before `]`                     |
//! | indirect array         | the array object is patched, owner unchanged     |
//! | unresolved reference   | [`Error::UnresolvedArray`], nothing queued       |

mod add_field;
mod remove_field;
mod update_field;

pub(crate) use add_field::add_field;
pub(crate) use remove_field::remove_field;
pub(crate) use update_field::update_field;

use crate::dict_scan;
use crate::error::{Error, Result};
use crate::object::ObjectRef;

use super::object_store::ObjectStore;
use super::resolver::{array_value, ArrayValue};

/// Append `new_ref` to the array under `key` of `owner_body`.
///
/// Returns the owner's new body. For an indirect array the array object is
/// patched here and the owner comes back unchanged.
pub(crate) fn register_ref(
    store: &mut ObjectStore,
    owner_body: &str,
    key: &str,
    new_ref: ObjectRef,
) -> Result<String> {
    match array_value(store, owner_body, key) {
        ArrayValue::Absent => Ok(dict_scan::upsert_key_value(owner_body, key, &format!("[{}]", new_ref))),
        ArrayValue::Other(found) => {
            log::warn!("{} holds {:?}, replacing with a new array", key, found);
            Ok(dict_scan::upsert_key_value(owner_body, key, &format!("[{}]", new_ref)))
        },
        ArrayValue::Inline(_) => {
            let updated = dict_scan::add_ref_to_inline_array(owner_body, key, new_ref);
            if updated == owner_body {
                return Err(Error::MalformedStructure(format!("cannot append to inline {}", key)));
            }
            Ok(updated)
        },
        ArrayValue::Indirect { array_ref, body } => {
            let updated = dict_scan::add_ref_to_array(&body, new_ref);
            if updated == body {
                return Err(Error::MalformedStructure(format!("cannot append to {} array {}", key, array_ref)));
            }
            store.apply_patch(array_ref, &updated, &body);
            Ok(owner_body.to_string())
        },
        ArrayValue::Unresolved(array_ref) => {
            log::warn!("{} array {} does not resolve", key, array_ref);
            Err(Error::UnresolvedArray {
                key: key.to_string(),
                array_ref,
            })
        },
    }
}

/// Remove `target` from the array under `key` of `owner_body`.
///
/// `Ok(None)` when the array does not hold `target`; otherwise the owner's
/// new body, unchanged when the array is indirect (and patched here).
pub(crate) fn unregister_ref(
    store: &mut ObjectStore,
    owner_body: &str,
    key: &str,
    target: ObjectRef,
) -> Result<Option<String>> {
    match array_value(store, owner_body, key) {
        ArrayValue::Absent | ArrayValue::Other(_) => Ok(None),
        ArrayValue::Inline(text) => {
            if !dict_scan::array_refs(&text).contains(&target) {
                return Ok(None);
            }
            Ok(Some(dict_scan::remove_ref_from_inline_array(owner_body, key, target)))
        },
        ArrayValue::Indirect { array_ref, body } => {
            if !dict_scan::array_refs(&body).contains(&target) {
                return Ok(None);
            }
            let updated = dict_scan::remove_ref_from_array(&body, target);
            store.apply_patch(array_ref, &updated, &body);
            Ok(Some(owner_body.to_string()))
        },
        ArrayValue::Unresolved(array_ref) => Err(Error::UnresolvedArray {
            key: key.to_string(),
            array_ref,
        }),
    }
}

/// Set `/NeedAppearances true` on the indirect AcroForm, if there is one.
pub(crate) fn need_appearances(store: &mut ObjectStore) -> Result<()> {
    let Some(acroform_ref) = store.acroform_ref() else {
        return Ok(());
    };
    let body = store.get_object_body_with_patch(acroform_ref)?;
    let updated = dict_scan::upsert_key_value(&body, "/NeedAppearances", "true");
    store.apply_patch(acroform_ref, &updated, &body);
    Ok(())
}
