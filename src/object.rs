//! Object references and literal classification.
//!
//! Object bodies are kept as text. [`Literal`] is the typed view of a single
//! value token inside such a body, produced on demand by
//! [`crate::dict_scan::literal_after`].

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Reference used by field views that have no backing object.
    pub const UNASSIGNED: ObjectRef = ObjectRef { id: 0, gen: 0 };

    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }

    /// A reference is valid when its object number is positive.
    pub fn is_valid(&self) -> bool {
        self.id > 0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl FromStr for ObjectRef {
    type Err = Error;

    /// Parse `"N G R"` (extra whitespace allowed).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::ParseError {
            offset: 0,
            reason: format!("not an indirect reference: {:?}", s),
        };
        let mut parts = s.split_ascii_whitespace();
        let id = parts.next().and_then(|p| p.parse::<u32>().ok()).ok_or_else(bad)?;
        let gen = parts.next().and_then(|p| p.parse::<u16>().ok()).ok_or_else(bad)?;
        match (parts.next(), parts.next()) {
            (Some("R"), None) => Ok(ObjectRef::new(id, gen)),
            _ => Err(bad()),
        }
    }
}

/// Typed view of one value token inside an object body.
///
/// Each variant borrows the exact source text of the token, delimiters
/// included, so it can be spliced back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal<'a> {
    /// `N G R`
    Reference(ObjectRef),
    /// `<< ... >>`
    Dictionary(&'a str),
    /// `[ ... ]`
    Array(&'a str),
    /// `/Name`
    Name(&'a str),
    /// Integer or real
    Number(&'a str),
    /// `( ... )` or `< ... >`
    StringLit(&'a str),
    /// `true` / `false`
    Boolean(bool),
    /// Anything else (`null`, bare keywords)
    Raw(&'a str),
}

impl<'a> Literal<'a> {
    /// Get the type name of this literal.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Reference(_) => "Reference",
            Literal::Dictionary(_) => "Dictionary",
            Literal::Array(_) => "Array",
            Literal::Name(_) => "Name",
            Literal::Number(_) => "Number",
            Literal::StringLit(_) => "String",
            Literal::Boolean(_) => "Boolean",
            Literal::Raw(_) => "Raw",
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Literal::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to dictionary text.
    pub fn as_dict(&self) -> Option<&'a str> {
        match self {
            Literal::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Try to cast to array text.
    pub fn as_array(&self) -> Option<&'a str> {
        match self {
            Literal::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Try to cast to a name, returned with its leading slash.
    pub fn as_name(&self) -> Option<&'a str> {
        match self {
            Literal::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Try to cast to a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Try to cast to an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Literal::Number(n) => n.parse().ok(),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Reference(r) => write!(f, "{}", r),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Dictionary(s)
            | Literal::Array(s)
            | Literal::Name(s)
            | Literal::Number(s)
            | Literal::StringLit(s)
            | Literal::Raw(s) => f.write_str(s),
        }
    }
}
