//! Detach a field from the form and its widgets from their pages.
//!
//! Objects are not erased; they are only dropped from every array that
//! referenced them.

use crate::dict_scan;
use crate::error::{Error, Result};
use crate::object::ObjectRef;

use super::super::field_index;
use super::super::form_fields::{Field, FieldSelector};
use super::super::object_store::ObjectStore;
use super::super::resolver;
use super::unregister_ref;

/// `true` when the field was registered and has been detached.
pub(crate) fn remove_field(store: &mut ObjectStore, selector: FieldSelector) -> bool {
    let field = match selector {
        FieldSelector::Name(name) => field_index::find_field(store, &name),
        FieldSelector::Field(field) => {
            if !field.is_valid_ref() {
                log::warn!("field {:?} has no backing object", field.name);
                return false;
            }
            // Refresh the view so widgets added since it was taken are seen.
            field_index::list_fields(store)
                .into_iter()
                .find(|f| f.obj_ref == field.obj_ref)
        },
    };
    let Some(field) = field else {
        log::warn!("field to remove is not registered");
        return false;
    };

    let checkpoint = store.checkpoint();
    match try_remove(store, &field) {
        Ok(true) => {
            log::info!("removed field {:?} ({})", field.name, field.obj_ref);
            true
        },
        Ok(false) => {
            log::warn!("field {:?} is not held by its container", field.name);
            store.rollback(checkpoint);
            false
        },
        Err(e) => {
            log::warn!("cannot remove field {:?}: {}", field.name, e);
            store.rollback(checkpoint);
            false
        },
    }
}

fn try_remove(store: &mut ObjectStore, field: &Field) -> Result<bool> {
    if !detach_from_container(store, field.obj_ref)? {
        return Ok(false);
    }
    for widget in &field.widget_refs {
        detach_widget(store, *widget)?;
    }
    Ok(true)
}

/// Remove the field from its parent's `/Kids`, or from AcroForm `/Fields`
/// for a top-level field.
fn detach_from_container(store: &mut ObjectStore, field_ref: ObjectRef) -> Result<bool> {
    let (owner_ref, key) = match field_index::parent_field(store, field_ref) {
        Some(parent) => (parent, "/Kids"),
        None => {
            let acroform = store
                .acroform_ref()
                .ok_or_else(|| Error::MalformedStructure("catalog has no indirect /AcroForm".to_string()))?;
            (acroform, "/Fields")
        },
    };

    let owner_body = store.get_object_body_with_patch(owner_ref)?;
    match unregister_ref(store, &owner_body, key, field_ref)? {
        Some(updated) => {
            store.apply_patch(owner_ref, &updated, &owner_body);
            Ok(true)
        },
        None => Ok(false),
    }
}

/// Remove `widget` from every page `/Annots` that lists it.
///
/// An unresolved `/Annots` is only an error on the widget's own `/P` page;
/// other pages cannot be checked and are skipped.
fn detach_widget(store: &mut ObjectStore, widget: ObjectRef) -> Result<()> {
    let own_page = store.body(widget).and_then(|b| dict_scan::ref_after("/P", b));
    let mut found = false;
    for page in resolver::page_refs(store) {
        let page_body = store.get_object_body_with_patch(page)?;
        match unregister_ref(store, &page_body, "/Annots", widget) {
            Ok(Some(updated)) => {
                store.apply_patch(page, &updated, &page_body);
                found = true;
            },
            Ok(None) => {},
            Err(Error::UnresolvedArray { array_ref, .. }) if own_page != Some(page) => {
                log::warn!("page {} /Annots {} does not resolve, skipping", page, array_ref);
            },
            Err(e) => return Err(e),
        }
    }
    if !found {
        log::debug!("widget {} is not on any page", widget);
    }
    Ok(())
}
