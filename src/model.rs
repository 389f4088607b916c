use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::schema::TonSchemaCollection;

const FLOAT_EMPTY_EPSILON: f64 = 1e-10;

/// The four single-character type hint prefixes that may decorate a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    /// `$` - the value is intended as a string.
    String,
    /// `%` - the value is intended as a number.
    Number,
    /// `&` - the value is intended as a boolean.
    Boolean,
    /// `^` - the value is intended as a date.
    Date,
}

impl TypeHint {
    pub fn prefix(&self) -> char {
        match self {
            TypeHint::String => '$',
            TypeHint::Number => '%',
            TypeHint::Boolean => '&',
            TypeHint::Date => '^',
        }
    }
}

/// The payload of a [`TonValue`].
#[derive(Debug, Clone, PartialEq)]
pub enum TonValueKind {
    Null,
    Undefined,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Guid(Uuid),
    /// An ISO 8601 date or datetime, kept in its textual form.
    Date(String),
    Enum(String),
    EnumSet(Vec<String>),
    Array(Vec<TonValue>),
    Object(TonObject),
}

/// A parsed TON value: the kind plus any syntactic decoration (type hint,
/// inline type annotation) it carried in the source.
#[derive(Debug, Clone)]
pub struct TonValue {
    pub kind: TonValueKind,
    pub hint: Option<TypeHint>,
    /// The declared type from `name:type = value` member syntax.
    pub annotation: Option<String>,
}

/// Equality is by kind only; hints and annotations are presentation detail.
impl PartialEq for TonValue {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl TonValue {
    pub fn new(kind: TonValueKind) -> Self {
        Self {
            kind,
            hint: None,
            annotation: None,
        }
    }

    pub fn with_hint(kind: TonValueKind, hint: TypeHint) -> Self {
        Self {
            kind,
            hint: Some(hint),
            annotation: None,
        }
    }

    pub fn null() -> Self {
        Self::new(TonValueKind::Null)
    }

    pub fn undefined() -> Self {
        Self::new(TonValueKind::Undefined)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::new(TonValueKind::String(s.into()))
    }

    pub fn integer(i: i64) -> Self {
        Self::new(TonValueKind::Integer(i))
    }

    pub fn float(f: f64) -> Self {
        Self::new(TonValueKind::Float(f))
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(TonValueKind::Boolean(b))
    }

    pub fn array(values: Vec<TonValue>) -> Self {
        Self::new(TonValueKind::Array(values))
    }

    pub fn object(obj: TonObject) -> Self {
        Self::new(TonValueKind::Object(obj))
    }

    /// The kind's name as used in validation messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            TonValueKind::Null => "null",
            TonValueKind::Undefined => "undefined",
            TonValueKind::String(_) => "string",
            TonValueKind::Integer(_) => "int",
            TonValueKind::Float(_) => "float",
            TonValueKind::Boolean(_) => "boolean",
            TonValueKind::Guid(_) => "guid",
            TonValueKind::Date(_) => "date",
            TonValueKind::Enum(_) => "enum",
            TonValueKind::EnumSet(_) => "enumSet",
            TonValueKind::Array(_) => "array",
            TonValueKind::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, TonValueKind::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self.kind, TonValueKind::Undefined)
    }

    // === Total coercions ===
    //
    // These never fail; values with no sensible conversion map to a neutral
    // result (0, false, the nil GUID, the epoch).

    pub fn to_i64(&self) -> i64 {
        match &self.kind {
            TonValueKind::Integer(i) => *i,
            TonValueKind::Float(f) => *f as i64,
            TonValueKind::Boolean(b) => {
                if *b {
                    1
                } else {
                    0
                }
            }
            TonValueKind::String(s) => parse_number_string(s).map(|f| f as i64).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match &self.kind {
            TonValueKind::Integer(i) => *i as f64,
            TonValueKind::Float(f) => *f,
            TonValueKind::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            TonValueKind::String(s) => parse_number_string(s).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn to_bool(&self) -> bool {
        match &self.kind {
            TonValueKind::Boolean(b) => *b,
            TonValueKind::Integer(i) => *i != 0,
            TonValueKind::Float(f) => *f != 0.0,
            TonValueKind::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    pub fn to_text(&self) -> String {
        match &self.kind {
            TonValueKind::String(s) => s.clone(),
            TonValueKind::Integer(i) => i.to_string(),
            TonValueKind::Float(f) => f.to_string(),
            TonValueKind::Boolean(b) => b.to_string(),
            TonValueKind::Guid(g) => g.to_string(),
            TonValueKind::Date(d) => d.clone(),
            TonValueKind::Enum(e) => e.clone(),
            TonValueKind::EnumSet(values) => values.join("|"),
            TonValueKind::Null => "null".to_string(),
            TonValueKind::Undefined => "undefined".to_string(),
            TonValueKind::Array(_) => "[array]".to_string(),
            TonValueKind::Object(_) => "[object]".to_string(),
        }
    }

    pub fn to_guid(&self) -> Uuid {
        match &self.kind {
            TonValueKind::Guid(g) => *g,
            TonValueKind::String(s) => {
                let trimmed = s
                    .strip_prefix('{')
                    .and_then(|t| t.strip_suffix('}'))
                    .unwrap_or(s);
                Uuid::parse_str(trimmed).unwrap_or(Uuid::nil())
            }
            _ => Uuid::nil(),
        }
    }

    pub fn to_date(&self) -> DateTime<Utc> {
        let text = match &self.kind {
            TonValueKind::Date(d) => d.as_str(),
            TonValueKind::String(s) => s.as_str(),
            _ => return DateTime::UNIX_EPOCH,
        };
        parse_date_string(text).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Emptiness as used by the `nonEmpty` and `defaultWhenEmpty` validation
    /// rules: blank strings, zero numbers, the nil GUID and empty collections
    /// all count as empty. `null` and `undefined` are empty too.
    pub fn is_empty(&self) -> bool {
        match &self.kind {
            TonValueKind::Null | TonValueKind::Undefined => true,
            TonValueKind::String(s) => s.trim().is_empty(),
            TonValueKind::Integer(i) => *i == 0,
            TonValueKind::Float(f) => f.abs() < FLOAT_EMPTY_EPSILON,
            TonValueKind::Boolean(_) => false,
            TonValueKind::Guid(g) => g.is_nil(),
            TonValueKind::Date(d) => d.trim().is_empty(),
            TonValueKind::Enum(e) => e.is_empty(),
            TonValueKind::EnumSet(values) => values.is_empty(),
            TonValueKind::Array(values) => values.is_empty(),
            TonValueKind::Object(obj) => obj.is_empty(),
        }
    }

    pub fn as_object(&self) -> Option<&TonObject> {
        match &self.kind {
            TonValueKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut TonObject> {
        match &mut self.kind {
            TonValueKind::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[TonValue]> {
        match &self.kind {
            TonValueKind::Array(values) => Some(values),
            _ => None,
        }
    }
}

/// Parses decimal, `0x` hex and `0b` binary numeric strings, with an
/// optional leading sign in any of the three forms.
fn parse_number_string(s: &str) -> Option<f64> {
    let s = s.trim();
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };
    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|i| sign * i as f64);
    }
    if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).ok().map(|i| sign * i as f64);
    }
    body.parse::<f64>().ok().map(|f| sign * f)
}

/// Accepts full RFC 3339 datetimes and bare `YYYY-MM-DD` dates (taken as
/// midnight UTC).
pub(crate) fn parse_date_string(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// An object: an ordered property map plus optional class metadata and
/// positional child objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TonObject {
    pub class_name: Option<String>,
    pub instance_id: Option<u64>,
    pub properties: IndexMap<String, TonValue>,
    /// Positional (unnamed) child objects, kept in document order after the
    /// named properties.
    pub children: Vec<TonObject>,
}

impl TonObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            ..Self::default()
        }
    }

    /// Canonical property key: the `@` alias prefix is not part of the name.
    fn canonical(name: &str) -> &str {
        name.strip_prefix('@').unwrap_or(name)
    }

    /// Sets a property. Re-setting an existing name overwrites in place and
    /// keeps the original insertion slot.
    pub fn set(&mut self, name: &str, value: TonValue) {
        self.properties
            .insert(Self::canonical(name).to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&TonValue> {
        self.properties.get(Self::canonical(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TonValue> {
        self.properties.get_mut(Self::canonical(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.properties.contains_key(Self::canonical(name))
    }

    /// Removes a property, preserving the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<TonValue> {
        self.properties.shift_remove(Self::canonical(name))
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.properties.keys()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &TonValue)> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.children.is_empty()
    }

    pub fn add_child(&mut self, child: TonObject) {
        self.children.push(child);
    }

    /// Resolves a `/`-separated path of property names and array indices,
    /// e.g. `server/ports/0` or `users/2/name`.
    pub fn get_path(&self, path: &str) -> Option<&TonValue> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = match &current.kind {
                TonValueKind::Object(obj) => obj.get(segment)?,
                TonValueKind::Array(values) => {
                    let index: usize = segment.parse().ok()?;
                    values.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }
}

/// The `#@` header directive of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TonHeader {
    pub attributes: IndexMap<String, String>,
}

impl TonHeader {
    pub fn ton_version(&self) -> Option<&str> {
        self.attributes.get("tonVersion").map(String::as_str)
    }

    pub fn schema_file(&self) -> Option<&str> {
        self.attributes.get("schemaFile").map(String::as_str)
    }
}

/// A fully parsed document: the root value, the optional header, and any
/// schemas declared inline with `#!` directives.
#[derive(Debug, Clone)]
pub struct TonDocument {
    pub root: TonValue,
    pub header: Option<TonHeader>,
    pub schemas: TonSchemaCollection,
}

impl TonDocument {
    pub fn new(root: TonValue) -> Self {
        Self {
            root,
            header: None,
            schemas: TonSchemaCollection::new(),
        }
    }

    pub fn as_object(&self) -> Option<&TonObject> {
        self.root.as_object()
    }

    pub fn as_object_mut(&mut self) -> Option<&mut TonObject> {
        self.root.as_object_mut()
    }

    pub fn as_array(&self) -> Option<&[TonValue]> {
        self.root.as_array()
    }

    /// Resolves a path against the document root.
    pub fn get_path(&self, path: &str) -> Option<&TonValue> {
        match &self.root.kind {
            TonValueKind::Object(obj) => obj.get_path(path),
            TonValueKind::Array(values) => {
                let mut segments = path.split('/').filter(|s| !s.is_empty());
                let index: usize = segments.next()?.parse().ok()?;
                let mut current = values.get(index)?;
                for segment in segments {
                    current = match &current.kind {
                        TonValueKind::Object(obj) => obj.get(segment)?,
                        TonValueKind::Array(inner) => {
                            let i: usize = segment.parse().ok()?;
                            inner.get(i)?
                        }
                        _ => return None,
                    };
                }
                Some(current)
            }
            _ => None,
        }
    }
}
