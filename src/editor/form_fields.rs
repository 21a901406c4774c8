//! Form field types: the field view, field types, flags and action options.
//!
//! A [`Field`] is not stored anywhere; it is rebuilt from a field
//! dictionary and its widget annotations every time fields are listed.

use std::fmt;

use bitflags::bitflags;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::Serialize;

use crate::dict_scan;
use crate::object::ObjectRef;

/// Field type from the `/FT` key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Text field (`/Tx`)
    #[default]
    Text,
    /// Button field (`/Btn`): checkbox, radio button or push button
    Button,
    /// Choice field (`/Ch`): list box or combo box
    Choice,
    /// Signature field (`/Sig`)
    Signature,
    /// Any other name, kept with its leading slash
    Other(String),
}

impl FieldType {
    /// Normalize a user supplied type.
    ///
    /// `text`, `button`, `choice` and `signature` are accepted in any case,
    /// as are the PDF names `/Tx`, `/Btn`, `/Ch` and `/Sig`. Anything else is
    /// passed through as a name.
    ///
    /// ```
    /// use pdf_acroedit::FieldType;
    ///
    /// assert_eq!(FieldType::normalize("Text"), FieldType::Text);
    /// assert_eq!(FieldType::normalize("/Btn"), FieldType::Button);
    /// assert_eq!(FieldType::normalize("/Foo").as_pdf_name(), "/Foo");
    /// ```
    pub fn normalize(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "text" | "/tx" => FieldType::Text,
            "button" | "/btn" => FieldType::Button,
            "choice" | "/ch" => FieldType::Choice,
            "signature" | "/sig" => FieldType::Signature,
            "" => FieldType::Text,
            _ => FieldType::Other(dict_scan::encode_name(trimmed)),
        }
    }

    /// Map a `/FT` name as found in a document.
    pub fn from_pdf_name(name: &str) -> Self {
        match name {
            "/Tx" => FieldType::Text,
            "/Btn" => FieldType::Button,
            "/Ch" => FieldType::Choice,
            "/Sig" => FieldType::Signature,
            other => FieldType::Other(other.to_string()),
        }
    }

    /// The `/FT` name, with its leading slash.
    pub fn as_pdf_name(&self) -> &str {
        match self {
            FieldType::Text => "/Tx",
            FieldType::Button => "/Btn",
            FieldType::Choice => "/Ch",
            FieldType::Signature => "/Sig",
            FieldType::Other(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pdf_name())
    }
}

impl Serialize for FieldType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_pdf_name())
    }
}

bitflags! {
    /// Field flags (`/Ff`), ISO 32000-1 Tables 221, 226, 228 and 230.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldFlags: u32 {
        /// Bit 1: user cannot change the value
        const READ_ONLY = 1 << 0;
        /// Bit 2: must have a value before submit
        const REQUIRED = 1 << 1;
        /// Bit 3: not exported by submit-form actions
        const NO_EXPORT = 1 << 2;
        /// Bit 13 (Tx): multiple lines
        const MULTILINE = 1 << 12;
        /// Bit 14 (Tx): password entry
        const PASSWORD = 1 << 13;
        /// Bit 15 (Btn): one radio button must stay on
        const NO_TOGGLE_TO_OFF = 1 << 14;
        /// Bit 16 (Btn): radio button
        const RADIO = 1 << 15;
        /// Bit 17 (Btn): push button
        const PUSHBUTTON = 1 << 16;
        /// Bit 18 (Ch): combo box
        const COMBO = 1 << 17;
        /// Bit 19 (Ch): editable combo box
        const EDIT = 1 << 18;
        /// Bit 22 (Ch): multiple selection
        const MULTI_SELECT = 1 << 21;
        /// Bit 25 (Tx): comb field
        const COMB = 1 << 24;
    }
}

impl Default for FieldFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Widget placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldPosition {
    /// Lower-left x
    pub x: f64,
    /// Lower-left y
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// 1-based page number, when known
    pub page: Option<usize>,
}

impl FieldPosition {
    /// Position from a `/Rect` array `[x1 y1 x2 y2]`, corners in any order.
    pub fn from_rect(rect: [f64; 4], page: Option<usize>) -> Self {
        let [x1, y1, x2, y2] = rect;
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
            page,
        }
    }

    /// The `[x y x+width y+height]` rectangle.
    pub fn to_rect(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }
}

/// A form field as seen through the current object view.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    /// Fully qualified name (`parent.child` for nested fields)
    pub name: String,
    /// Decoded `/V`
    pub value: Option<String>,
    /// `/FT`, inherited from ancestors when absent
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Field dictionary
    #[serde(serialize_with = "serialize_ref")]
    pub obj_ref: ObjectRef,
    /// Placement from the first widget
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<FieldPosition>,
    /// Widget annotations
    #[serde(skip)]
    pub widget_refs: Vec<ObjectRef>,
}

fn serialize_ref<S: serde::Serializer>(r: &ObjectRef, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(r)
}

impl Field {
    /// Field with no position and no widgets.
    pub fn new(
        name: impl Into<String>,
        value: Option<String>,
        field_type: FieldType,
        obj_ref: ObjectRef,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            field_type,
            obj_ref,
            position: None,
            widget_refs: Vec::new(),
        }
    }

    /// Attach a position.
    pub fn with_position(mut self, position: FieldPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Fully qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value, if `/V` is present.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Field type.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// `/FT` name such as `/Tx`.
    pub fn type_name(&self) -> &str {
        self.field_type.as_pdf_name()
    }

    /// `/Tx`
    pub fn is_text_field(&self) -> bool {
        self.field_type == FieldType::Text
    }

    /// `/Btn`
    pub fn is_button_field(&self) -> bool {
        self.field_type == FieldType::Button
    }

    /// `/Ch`
    pub fn is_choice_field(&self) -> bool {
        self.field_type == FieldType::Choice
    }

    /// `/Sig`
    pub fn is_signature_field(&self) -> bool {
        self.field_type == FieldType::Signature
    }

    /// `false` for an absent or empty value.
    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// `true` when a widget rectangle was found.
    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Lower-left x of the first widget.
    pub fn x(&self) -> Option<f64> {
        self.position.map(|p| p.x)
    }

    /// Lower-left y of the first widget.
    pub fn y(&self) -> Option<f64> {
        self.position.map(|p| p.y)
    }

    /// Widget width.
    pub fn width(&self) -> Option<f64> {
        self.position.map(|p| p.width)
    }

    /// Widget height.
    pub fn height(&self) -> Option<f64> {
        self.position.map(|p| p.height)
    }

    /// 1-based page holding the first widget.
    pub fn page(&self) -> Option<usize> {
        self.position.and_then(|p| p.page)
    }

    /// Object number of the field dictionary.
    pub fn object_number(&self) -> u32 {
        self.obj_ref.id
    }

    /// Generation of the field dictionary.
    pub fn generation(&self) -> u16 {
        self.obj_ref.gen
    }

    /// `false` for placeholder views that are not backed by an object.
    pub fn is_valid_ref(&self) -> bool {
        self.obj_ref.is_valid()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.field_type == other.field_type
            && self.obj_ref == other.obj_ref
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field(name={:?}, value={:?}, type={}, ref={}, ",
            self.name,
            self.value.as_deref().unwrap_or(""),
            self.field_type,
            self.obj_ref
        )?;
        match &self.position {
            Some(p) => {
                write!(
                    f,
                    "x={} y={} width={} height={}",
                    dict_scan::format_number(p.x),
                    dict_scan::format_number(p.y),
                    dict_scan::format_number(p.width),
                    dict_scan::format_number(p.height)
                )?;
                match p.page {
                    Some(page) => write!(f, " page={})", page),
                    None => write!(f, " page=(unknown))"),
                }
            },
            None => write!(f, "position=(unknown))"),
        }
    }
}

/// Which field [`Document::remove_field`](super::Document::remove_field) targets.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSelector {
    /// Fully qualified field name
    Name(String),
    /// A previously listed field
    Field(Field),
}

impl From<&str> for FieldSelector {
    fn from(name: &str) -> Self {
        FieldSelector::Name(name.to_string())
    }
}

impl From<String> for FieldSelector {
    fn from(name: String) -> Self {
        FieldSelector::Name(name)
    }
}

impl From<&Field> for FieldSelector {
    fn from(field: &Field) -> Self {
        FieldSelector::Field(field.clone())
    }
}

impl From<Field> for FieldSelector {
    fn from(field: Field) -> Self {
        FieldSelector::Field(field)
    }
}

/// A metadata entry value written into new field and widget dictionaries.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    /// Integer
    Integer(i64),
    /// Real number
    Real(f64),
    /// Boolean
    Boolean(bool),
    /// Text. Strings that already look like a PDF string, hex string, name or
    /// dictionary are written verbatim.
    Text(String),
    /// Array of values
    Array(Vec<MetadataValue>),
    /// Dictionary of values
    Dictionary(IndexMap<String, MetadataValue>),
    /// Literal PDF text, never encoded
    Raw(String),
}

impl MetadataValue {
    /// PDF text of this value.
    pub fn to_pdf(&self) -> String {
        match self {
            MetadataValue::Integer(n) => n.to_string(),
            MetadataValue::Real(n) => dict_scan::format_number(*n),
            MetadataValue::Boolean(b) => b.to_string(),
            MetadataValue::Text(text) => dict_scan::encode_pdf_string(text),
            MetadataValue::Array(items) => {
                let items: Vec<String> = items.iter().map(MetadataValue::to_pdf).collect();
                format!("[{}]", items.join(" "))
            },
            MetadataValue::Dictionary(entries) => {
                let mut out = String::from("<<\n");
                for (key, value) in entries {
                    out.push_str(&format!("  {} {}\n", pdf_key(key), value.to_pdf()));
                }
                out.push_str(">>");
                out
            },
            MetadataValue::Raw(text) => text.clone(),
        }
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Integer(n)
    }
}

impl From<i32> for MetadataValue {
    fn from(n: i32) -> Self {
        MetadataValue::Integer(n.into())
    }
}

impl From<u32> for MetadataValue {
    fn from(n: u32) -> Self {
        MetadataValue::Integer(n.into())
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        MetadataValue::Real(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Boolean(b)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Text(s)
    }
}

impl From<FieldFlags> for MetadataValue {
    fn from(flags: FieldFlags) -> Self {
        MetadataValue::Integer(flags.bits().into())
    }
}

impl<T: Into<MetadataValue>> From<Vec<T>> for MetadataValue {
    fn from(items: Vec<T>) -> Self {
        MetadataValue::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Dictionary key as an escaped name; a leading slash is optional.
pub(crate) fn pdf_key(key: &str) -> String {
    dict_scan::encode_name(key)
}

/// Options for [`Document::add_field`](super::Document::add_field).
///
/// ```
/// use pdf_acroedit::{AddFieldOptions, FieldFlags};
///
/// let options = AddFieldOptions::new()
///     .rect(50.0, 600.0, 150.0, 25.0)
///     .field_type("text")
///     .value("Hello")
///     .flags(FieldFlags::REQUIRED)
///     .metadata("TU", "Your name");
/// assert_eq!(options.page, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AddFieldOptions {
    /// Lower-left x (default 100)
    pub x: f64,
    /// Lower-left y (default 500)
    pub y: f64,
    /// Width (default 100)
    pub width: f64,
    /// Height (default 20)
    pub height: f64,
    /// 1-based page number (default 1)
    pub page: usize,
    /// Field type, normalized with [`FieldType::normalize`] (default `/Tx`)
    pub field_type: String,
    /// Initial value (default empty)
    pub value: String,
    /// Extra entries for the field and widget dictionaries, in order
    pub metadata: IndexMap<String, MetadataValue>,
}

impl Default for AddFieldOptions {
    fn default() -> Self {
        Self {
            x: 100.0,
            y: 500.0,
            width: 100.0,
            height: 20.0,
            page: 1,
            field_type: "/Tx".to_string(),
            value: String::new(),
            metadata: IndexMap::new(),
        }
    }
}

impl AddFieldOptions {
    /// Defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower-left corner.
    pub fn position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Width and height.
    pub fn size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Position and size at once.
    pub fn rect(self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.position(x, y).size(width, height)
    }

    /// Target page, 1-based.
    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Field type such as `text` or `/Btn`.
    pub fn field_type(mut self, field_type: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self
    }

    /// Initial value.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    /// Add a metadata entry; the key may be given with or without `/`.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set `/Ff`.
    pub fn flags(self, flags: FieldFlags) -> Self {
        self.metadata("Ff", flags)
    }
}

/// Options for [`Document::update_field`](super::Document::update_field).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Rename the field. The name is fully qualified; a child field keeps
    /// its parent, so the name must start with the parent's name and a dot.
    pub new_name: Option<String>,
}

impl UpdateOptions {
    /// Rename to `new_name` while updating.
    pub fn rename(new_name: impl Into<String>) -> Self {
        Self {
            new_name: Some(new_name.into()),
        }
    }
}

lazy_static! {
    static ref RE_BASE64: regex::Regex = regex::Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("valid regex");
}

/// Heuristic for signature values that carry an image instead of text: a
/// `data:image/` URI, or more than 50 characters of base64 alphabet.
pub fn looks_like_image_data(value: &str) -> bool {
    value.starts_with("data:image/") || (value.len() > 50 && RE_BASE64.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_field_type() {
        assert_eq!(FieldType::normalize("text"), FieldType::Text);
        assert_eq!(FieldType::normalize("TEXT"), FieldType::Text);
        assert_eq!(FieldType::normalize("/Tx"), FieldType::Text);
        assert_eq!(FieldType::normalize("button"), FieldType::Button);
        assert_eq!(FieldType::normalize("/btn"), FieldType::Button);
        assert_eq!(FieldType::normalize("Choice"), FieldType::Choice);
        assert_eq!(FieldType::normalize("signature"), FieldType::Signature);
        assert_eq!(FieldType::normalize("/Sig"), FieldType::Signature);
        assert_eq!(FieldType::normalize("/Custom"), FieldType::Other("/Custom".into()));
        assert_eq!(FieldType::normalize("custom").as_pdf_name(), "/custom");
    }

    #[test]
    fn test_type_predicates() {
        let text = Field::new("Text", Some("Value".into()), FieldType::Text, ObjectRef::new(1, 0));
        assert!(text.is_text_field());
        assert!(!text.is_button_field());
        assert!(!text.is_choice_field());

        let sig = Field::new("Sig", None, FieldType::Signature, ObjectRef::new(1, 0));
        assert!(sig.is_signature_field());
        assert!(!sig.is_text_field());
        assert_eq!(sig.type_name(), "/Sig");
    }

    #[test]
    fn test_has_value() {
        let r = ObjectRef::new(1, 0);
        assert!(Field::new("F", Some("V".into()), FieldType::Text, r).has_value());
        assert!(!Field::new("F", Some(String::new()), FieldType::Text, r).has_value());
        assert!(!Field::new("F", None, FieldType::Text, r).has_value());
    }

    #[test]
    fn test_position_accessors() {
        let field = Field::new("F", None, FieldType::Text, ObjectRef::new(42, 3)).with_position(
            FieldPosition::from_rect([100.0, 200.0, 150.0, 220.0], Some(1)),
        );
        assert!(field.has_position());
        assert_eq!(field.x(), Some(100.0));
        assert_eq!(field.y(), Some(200.0));
        assert_eq!(field.width(), Some(50.0));
        assert_eq!(field.height(), Some(20.0));
        assert_eq!(field.page(), Some(1));
        assert_eq!(field.object_number(), 42);
        assert_eq!(field.generation(), 3);
    }

    #[test]
    fn test_from_rect_normalizes_corners() {
        let pos = FieldPosition::from_rect([150.0, 220.0, 100.0, 200.0], None);
        assert_eq!(pos.to_rect(), [100.0, 200.0, 150.0, 220.0]);
    }

    #[test]
    fn test_valid_ref() {
        assert!(Field::new("F", None, FieldType::Text, ObjectRef::new(1, 0)).is_valid_ref());
        assert!(!Field::new("F", None, FieldType::Text, ObjectRef::UNASSIGNED).is_valid_ref());
    }

    #[test]
    fn test_equality() {
        let r = ObjectRef::new(1, 0);
        let a = Field::new("Field", Some("Value".into()), FieldType::Text, r);
        let b = Field::new("Field", Some("Value".into()), FieldType::Text, r)
            .with_position(FieldPosition::from_rect([0.0, 0.0, 1.0, 1.0], None));
        let c = Field::new("Other", Some("Value".into()), FieldType::Text, r);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        let field = Field::new("TestField", Some("Test Value".into()), FieldType::Text, ObjectRef::new(1, 0))
            .with_position(FieldPosition::from_rect([100.0, 200.0, 150.0, 220.0], Some(1)));
        let text = field.to_string();
        assert!(text.contains("TestField"));
        assert!(text.contains("Test Value"));
        assert!(text.contains("/Tx"));
        assert!(text.contains("x=100"));
        assert!(text.contains("y=200"));
        assert!(text.contains("page=1"));

        let bare = Field::new("Field", Some("Value".into()), FieldType::Text, ObjectRef::new(1, 0));
        assert!(bare.to_string().contains("position=(unknown)"));
    }

    #[test]
    fn test_serialize() {
        let field = Field::new("F", Some("V".into()), FieldType::Button, ObjectRef::new(5, 0));
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["name"], "F");
        assert_eq!(json["type"], "/Btn");
        assert_eq!(json["obj_ref"], "5 0 R");
        assert!(json.get("position").is_none());
    }

    #[test]
    fn test_metadata_to_pdf() {
        assert_eq!(MetadataValue::from(4i64).to_pdf(), "4");
        assert_eq!(MetadataValue::from(1.5).to_pdf(), "1.5");
        assert_eq!(MetadataValue::from("tip").to_pdf(), "(tip)");
        assert_eq!(MetadataValue::from("/Name").to_pdf(), "/Name");
        assert_eq!(MetadataValue::from(vec![1i64, 2]).to_pdf(), "[1 2]");
        let mut dict = IndexMap::new();
        dict.insert("W".to_string(), MetadataValue::Integer(1));
        dict.insert("/S".to_string(), MetadataValue::Raw("/D".into()));
        assert_eq!(MetadataValue::Dictionary(dict).to_pdf(), "<<\n  /W 1\n  /S /D\n>>");
    }

    #[test]
    fn test_metadata_keys_are_escaped_names() {
        assert_eq!(pdf_key("TU"), "/TU");
        assert_eq!(pdf_key("/TU"), "/TU");
        assert_eq!(pdf_key("my key"), "/my#20key");
        let mut entries = IndexMap::new();
        entries.insert("a(b)".to_string(), MetadataValue::Integer(1));
        assert_eq!(MetadataValue::Dictionary(entries).to_pdf(), "<<\n  /a#28b#29 1\n>>");
    }

    #[test]
    fn test_options_defaults() {
        let options = AddFieldOptions::default();
        assert_eq!((options.x, options.y, options.width, options.height), (100.0, 500.0, 100.0, 20.0));
        assert_eq!(options.page, 1);
        assert_eq!(options.field_type, "/Tx");
        assert!(options.value.is_empty());

        let flagged = AddFieldOptions::new().flags(FieldFlags::REQUIRED | FieldFlags::READ_ONLY);
        assert_eq!(flagged.metadata.get("Ff"), Some(&MetadataValue::Integer(3)));
    }

    #[test]
    fn test_looks_like_image_data() {
        assert!(looks_like_image_data("data:image/png;base64,iVBORw0KGgo="));
        assert!(looks_like_image_data(&"A".repeat(51)));
        assert!(!looks_like_image_data(&"A".repeat(50)));
        assert!(!looks_like_image_data("John Smith"));
        assert!(!looks_like_image_data(&format!("{} {}", "A".repeat(40), "B".repeat(40))));
    }
}
