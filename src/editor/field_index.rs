//! Field enumeration: walks AcroForm `/Fields` and rebuilds [`Field`] views.

use std::collections::{HashMap, HashSet};

use crate::dict_scan;
use crate::object::{Literal, ObjectRef};

use super::form_fields::{Field, FieldPosition, FieldType};
use super::object_store::ObjectStore;
use super::resolver::{self, array_value};

/// Limit on `/Kids` nesting.
const MAX_FIELD_DEPTH: usize = 32;

/// Where widgets live, gathered once from every page's `/Annots`.
#[derive(Debug, Default)]
struct WidgetIndex {
    /// Page number of each page reference
    page_numbers: HashMap<ObjectRef, usize>,
    /// Page number of each widget found in some `/Annots`
    widget_pages: HashMap<ObjectRef, usize>,
    /// Widgets by their `/Parent`
    by_parent: HashMap<ObjectRef, Vec<ObjectRef>>,
}

impl WidgetIndex {
    fn build(store: &ObjectStore) -> Self {
        let mut index = WidgetIndex::default();
        for (i, page) in resolver::page_refs(store).into_iter().enumerate() {
            let number = i + 1;
            index.page_numbers.insert(page, number);
            let Some(page_body) = store.body(page) else {
                continue;
            };
            for annot in array_value(store, page_body, "/Annots").refs() {
                let Some(annot_body) = store.body(annot) else {
                    continue;
                };
                if dict_scan::name_after("/Subtype", annot_body) != Some("/Widget") {
                    continue;
                }
                index.widget_pages.entry(annot).or_insert(number);
                if let Some(parent) = dict_scan::ref_after("/Parent", annot_body) {
                    index.by_parent.entry(parent).or_default().push(annot);
                }
            }
        }
        index
    }

    fn page_of_widget(&self, widget: ObjectRef, widget_body: &str) -> Option<usize> {
        dict_scan::ref_after("/P", widget_body)
            .and_then(|p| self.page_numbers.get(&p).copied())
            .or_else(|| self.widget_pages.get(&widget).copied())
    }
}

/// Every terminal field reachable from the AcroForm, in `/Fields` order.
pub fn list_fields(store: &ObjectStore) -> Vec<Field> {
    let Some(acroform) = resolver::acroform_body(store) else {
        log::debug!("document has no AcroForm");
        return Vec::new();
    };
    let roots = array_value(store, &acroform, "/Fields").refs();
    if roots.is_empty() {
        return Vec::new();
    }

    let index = WidgetIndex::build(store);
    let mut walker = Walker {
        store,
        index: &index,
        visited: HashSet::new(),
        fields: Vec::new(),
    };
    for root in roots {
        walker.visit(root, "", None, 0);
    }
    walker.fields
}

/// The first field whose fully qualified name is `name`.
pub fn find_field(store: &ObjectStore, name: &str) -> Option<Field> {
    list_fields(store).into_iter().find(|f| f.name == name)
}

/// Widget annotations of the field dictionary `field_ref`.
pub(crate) fn widgets_of(store: &ObjectStore, field_ref: ObjectRef) -> Vec<ObjectRef> {
    let Some(body) = store.body(field_ref) else {
        return Vec::new();
    };
    let index = WidgetIndex::build(store);
    let kids: Vec<ObjectRef> = array_value(store, body, "/Kids")
        .refs()
        .into_iter()
        .filter(|kid| store.body(*kid).is_some_and(|b| !dict_scan::has_key(b, "/T")))
        .collect();
    collect_widgets(store, &index, field_ref, body, kids)
}

fn collect_widgets(
    store: &ObjectStore,
    index: &WidgetIndex,
    field_ref: ObjectRef,
    body: &str,
    widget_kids: Vec<ObjectRef>,
) -> Vec<ObjectRef> {
    let mut widgets = Vec::new();
    if dict_scan::name_after("/Subtype", body) == Some("/Widget") {
        widgets.push(field_ref);
    }
    widgets.extend(widget_kids);
    if let Some(linked) = index.by_parent.get(&field_ref) {
        widgets.extend(linked.iter().copied());
    }
    let mut seen = HashSet::new();
    widgets.retain(|w| seen.insert(*w) && store.body(*w).is_some());
    widgets
}

struct Walker<'a> {
    store: &'a ObjectStore,
    index: &'a WidgetIndex,
    visited: HashSet<ObjectRef>,
    fields: Vec<Field>,
}

impl Walker<'_> {
    fn visit(&mut self, field_ref: ObjectRef, parent_name: &str, inherited: Option<&str>, depth: usize) {
        if depth > MAX_FIELD_DEPTH {
            log::warn!("field tree deeper than {} at {}", MAX_FIELD_DEPTH, field_ref);
            return;
        }
        if !self.visited.insert(field_ref) {
            log::warn!("field {} reached twice, skipping", field_ref);
            return;
        }
        let store = self.store;
        let Some(body) = store.body(field_ref) else {
            log::debug!("field {} missing", field_ref);
            return;
        };

        let partial = dict_scan::value_token_after("/T", body).and_then(dict_scan::decode_pdf_string);
        let full_name = match (parent_name, partial.as_deref()) {
            ("", Some(p)) => p.to_string(),
            (parent, Some(p)) => format!("{}.{}", parent, p),
            (parent, None) => parent.to_string(),
        };
        let field_type = dict_scan::name_after("/FT", body).or(inherited);

        let (field_kids, widget_kids): (Vec<ObjectRef>, Vec<ObjectRef>) = array_value(store, body, "/Kids")
            .refs()
            .into_iter()
            .partition(|kid| store.body(*kid).is_some_and(|b| dict_scan::has_key(b, "/T")));

        if !field_kids.is_empty() {
            for kid in field_kids {
                self.visit(kid, &full_name, field_type, depth + 1);
            }
            return;
        }

        if full_name.is_empty() {
            log::debug!("field {} has no name", field_ref);
            return;
        }
        let Some(field_type) = field_type else {
            log::debug!("field {} ({}) has no /FT", field_ref, full_name);
            return;
        };

        let widgets = collect_widgets(store, self.index, field_ref, body, widget_kids);

        let position = widgets.iter().find_map(|w| {
            let widget_body = store.body(*w)?;
            let rect = dict_scan::value_token_after("/Rect", widget_body)
                .and_then(|t| store.resolve_value(t))
                .and_then(|t| dict_scan::array_numbers(&t))
                .filter(|n| n.len() == 4)?;
            let page = self.index.page_of_widget(*w, widget_body);
            Some(FieldPosition::from_rect([rect[0], rect[1], rect[2], rect[3]], page))
        });

        self.fields.push(Field {
            name: full_name,
            value: decode_value(store, body),
            field_type: FieldType::from_pdf_name(field_type),
            obj_ref: field_ref,
            position,
            widget_refs: widgets,
        });
    }
}

/// The `/Parent` of `field_ref` when that parent lists it in `/Kids`.
pub(crate) fn parent_field(store: &ObjectStore, field_ref: ObjectRef) -> Option<ObjectRef> {
    let body = store.body(field_ref)?;
    dict_scan::ref_after("/Parent", body).filter(|parent| {
        store
            .body(*parent)
            .is_some_and(|b| array_value(store, b, "/Kids").refs().contains(&field_ref))
    })
}

/// Qualified name of the field that holds `field_ref`, built from the
/// decoded `/T` of each ancestor. Empty for a top-level field.
pub(crate) fn parent_name(store: &ObjectStore, field_ref: ObjectRef) -> String {
    let mut parts = Vec::new();
    let mut seen = HashSet::new();
    let mut current = field_ref;
    while let Some(parent) = parent_field(store, current) {
        if !seen.insert(parent) || seen.len() > MAX_FIELD_DEPTH {
            log::warn!("/Parent chain of {} loops", field_ref);
            break;
        }
        if let Some(partial) = store
            .body(parent)
            .and_then(|b| dict_scan::value_token_after("/T", b))
            .and_then(dict_scan::decode_pdf_string)
        {
            parts.push(partial);
        }
        current = parent;
    }
    parts.reverse();
    parts.join(".")
}

/// Decoded `/V`: strings as text, names with their slash, anything else raw.
pub(crate) fn decode_value(store: &ObjectStore, body: &str) -> Option<String> {
    match dict_scan::literal_after("/V", body)? {
        Literal::StringLit(text) => dict_scan::decode_pdf_string(text),
        Literal::Reference(r) => {
            let target = store.body(r)?;
            Some(dict_scan::decode_pdf_string(target).unwrap_or_else(|| target.trim().to_string()))
        },
        other => Some(other.to_string()),
    }
}
