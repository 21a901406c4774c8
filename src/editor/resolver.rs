//! Page tree and AcroForm lookups over the current object view.
//!
//! Pages are numbered from 1 in document order: a depth-first, left to right
//! walk of `/Kids` starting at the catalog's `/Pages`.

use std::collections::HashSet;

use crate::dict_scan;
use crate::object::{Literal, ObjectRef};

use super::object_store::ObjectStore;

/// Upper bound on page tree nodes visited, guarding against malformed trees.
const MAX_PAGE_TREE_NODES: usize = 1_000_000;

/// Shape of an array-valued dictionary entry such as `/Fields` or `/Annots`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValue {
    /// Key not present
    Absent,
    /// Inline `[...]` literal
    Inline(String),
    /// Reference to an array object, with the object's current body
    Indirect {
        /// The array object
        array_ref: ObjectRef,
        /// Its current body
        body: String,
    },
    /// Reference whose target is missing or not an array
    Unresolved(ObjectRef),
    /// Present but neither an array nor a reference (`null`, a number, ...)
    Other(String),
}

impl ArrayValue {
    /// References held by the array, in order.
    pub fn refs(&self) -> Vec<ObjectRef> {
        match self {
            ArrayValue::Inline(text) => dict_scan::array_refs(text),
            ArrayValue::Indirect { body, .. } => dict_scan::array_refs(body),
            _ => Vec::new(),
        }
    }
}

/// Classify the value of `key` in `dict_body`.
///
/// A reference that does not resolve is retried once by object number, in
/// case only the generation is off.
pub fn array_value(store: &ObjectStore, dict_body: &str, key: &str) -> ArrayValue {
    match dict_scan::literal_after(key, dict_body) {
        None => ArrayValue::Absent,
        Some(Literal::Array(text)) => ArrayValue::Inline(text.to_string()),
        Some(Literal::Reference(r)) => {
            if let Some(body) = store.body(r).filter(|b| b.trim_start().starts_with('[')) {
                return ArrayValue::Indirect {
                    array_ref: r,
                    body: body.to_string(),
                };
            }
            match store.body_by_number(r.id) {
                Some((found, body)) if body.trim_start().starts_with('[') => {
                    log::debug!("{} resolved as {}", r, found);
                    ArrayValue::Indirect {
                        array_ref: found,
                        body: body.to_string(),
                    }
                },
                _ => ArrayValue::Unresolved(r),
            }
        },
        Some(other) => ArrayValue::Other(other.to_string()),
    }
}

/// Body of the AcroForm dictionary, indirect or inline in the catalog.
pub fn acroform_body(store: &ObjectStore) -> Option<String> {
    let catalog = store.body(store.catalog_ref())?;
    match dict_scan::literal_after("/AcroForm", catalog)? {
        Literal::Reference(r) => store.body(r).map(str::to_string),
        Literal::Dictionary(text) => Some(text.to_string()),
        other => {
            log::warn!("catalog /AcroForm is a {}", other.type_name());
            None
        },
    }
}

/// Every leaf page reference in document order.
pub fn page_refs(store: &ObjectStore) -> Vec<ObjectRef> {
    let mut pages = Vec::new();
    walk_pages(store, |page| {
        pages.push(page);
        true
    });
    pages
}

/// Reference of the 1-based page `page_number`.
pub fn find_page_by_number(store: &ObjectStore, page_number: usize) -> Option<ObjectRef> {
    if page_number == 0 {
        return None;
    }
    let mut seen = 0;
    let mut found = None;
    walk_pages(store, |page| {
        seen += 1;
        if seen == page_number {
            found = Some(page);
            return false;
        }
        true
    });
    found
}

/// 1-based number of the page `page_ref`.
pub fn page_number_of(store: &ObjectStore, page_ref: ObjectRef) -> Option<usize> {
    page_refs(store)
        .iter()
        .position(|p| *p == page_ref)
        .map(|i| i + 1)
}

/// Depth-first walk over leaf pages; `visit` returns `false` to stop.
fn walk_pages(store: &ObjectStore, mut visit: impl FnMut(ObjectRef) -> bool) {
    let Some(catalog) = store.body(store.catalog_ref()) else {
        log::warn!("catalog {} missing", store.catalog_ref());
        return;
    };
    let Some(root) = dict_scan::ref_after("/Pages", catalog) else {
        log::warn!("catalog has no /Pages reference");
        return;
    };

    let mut stack = vec![root];
    let mut visited = HashSet::new();
    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            log::warn!("page tree cycle at {}", node);
            continue;
        }
        if visited.len() > MAX_PAGE_TREE_NODES {
            log::warn!("page tree too large, stopping");
            return;
        }
        let Some(body) = store.body(node) else {
            log::debug!("page tree node {} missing", node);
            continue;
        };

        let is_leaf = match dict_scan::name_after("/Type", body) {
            Some("/Page") => true,
            Some("/Pages") => false,
            _ => !dict_scan::has_key(body, "/Kids"),
        };
        if is_leaf {
            if !visit(node) {
                return;
            }
            continue;
        }

        let kids = array_value(store, body, "/Kids").refs();
        stack.extend(kids.into_iter().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PdfSource;

    fn store_from(objects: &[&str]) -> ObjectStore {
        let mut text = String::from("%PDF-1.4\n");
        for (i, body) in objects.iter().enumerate() {
            text.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
        }
        text.push_str(&format!("trailer\n<< /Size {} /Root 1 0 R >>\n%%EOF\n", objects.len() + 1));
        ObjectStore::new(PdfSource::from_bytes(text.into_bytes()).unwrap())
    }

    fn r(id: u32) -> ObjectRef {
        ObjectRef::new(id, 0)
    }

    #[test]
    fn test_nested_page_tree_order() {
        let store = store_from(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 6 0 R] /Count 3 >>",
            "<< /Type /Pages /Kids [4 0 R 5 0 R] /Count 2 >>",
            "<< /Type /Page /Parent 3 0 R >>",
            "<< /Type /Page /Parent 3 0 R >>",
            "<< /Type /Page /Parent 2 0 R >>",
        ]);
        assert_eq!(page_refs(&store), vec![r(4), r(5), r(6)]);
        assert_eq!(find_page_by_number(&store, 3), Some(r(6)));
        assert_eq!(find_page_by_number(&store, 0), None);
        assert_eq!(find_page_by_number(&store, 4), None);
        assert_eq!(page_number_of(&store, r(5)), Some(2));
    }

    #[test]
    fn test_page_tree_cycle_terminates() {
        let store = store_from(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [2 0 R 3 0 R] >>",
            "<< /Type /Page >>",
        ]);
        assert_eq!(page_refs(&store), vec![r(3)]);
    }

    #[test]
    fn test_indirect_kids() {
        let store = store_from(&[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids 3 0 R >>",
            "[4 0 R]",
            "<< /Type /Page >>",
        ]);
        assert_eq!(page_refs(&store), vec![r(4)]);
    }

    #[test]
    fn test_array_value_shapes() {
        let store = store_from(&["<< /Type /Catalog >>", "[5 0 R]", "<< /Not /Array >>"]);
        assert_eq!(array_value(&store, "<< /A [1 0 R] >>", "/A"), ArrayValue::Inline("[1 0 R]".into()));
        assert_eq!(array_value(&store, "<< >>", "/A"), ArrayValue::Absent);
        assert_eq!(
            array_value(&store, "<< /A 2 0 R >>", "/A"),
            ArrayValue::Indirect {
                array_ref: r(2),
                body: "[5 0 R]".into()
            }
        );
        assert_eq!(array_value(&store, "<< /A 3 0 R >>", "/A"), ArrayValue::Unresolved(r(3)));
        assert_eq!(array_value(&store, "<< /A 9 0 R >>", "/A"), ArrayValue::Unresolved(r(9)));
        assert_eq!(array_value(&store, "<< /A null >>", "/A"), ArrayValue::Other("null".into()));
        // Wrong generation, right number.
        assert_eq!(array_value(&store, "<< /A 2 1 R >>", "/A").refs(), vec![r(5)]);
    }

    #[test]
    fn test_acroform_inline_and_indirect() {
        let inline = store_from(&["<< /Type /Catalog /AcroForm << /Fields [] >> >>"]);
        assert_eq!(acroform_body(&inline).as_deref(), Some("<< /Fields [] >>"));
        assert_eq!(inline.acroform_ref(), None);

        let indirect = store_from(&["<< /Type /Catalog /AcroForm 2 0 R >>", "<< /Fields [3 0 R] >>"]);
        assert_eq!(acroform_body(&indirect).as_deref(), Some("<< /Fields [3 0 R] >>"));
        assert_eq!(indirect.acroform_ref(), Some(r(2)));
    }
}
