use chrono::{DateTime, Utc};
use log::debug;
use regex::Regex;

use crate::model::{parse_date_string, TonDocument, TonObject, TonValue, TonValueKind};
use crate::schema::{
    TonEnumDefinition, TonPropertySchema, TonSchemaCollection, TonSchemaDefinition,
    ValidationRuleType,
};

/// One rule violation, located by the document path it occurred at.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

/// The outcome of a validation pass. Validation never fails early: every
/// property and every rule is checked and all violations are accumulated.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validates documents against a [`TonSchemaCollection`]. Every object with
/// a class name that resolves in the collection is checked, wherever it
/// appears in the tree.
#[derive(Debug, Default)]
pub struct TonValidator;

impl TonValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        document: &TonDocument,
        schemas: &TonSchemaCollection,
    ) -> ValidationResult {
        let mut errors = Vec::new();
        self.walk(&document.root, "", schemas, &mut errors);
        debug!("validation finished with {} error(s)", errors.len());
        ValidationResult::from_errors(errors)
    }

    fn walk(
        &self,
        value: &TonValue,
        path: &str,
        schemas: &TonSchemaCollection,
        errors: &mut Vec<ValidationError>,
    ) {
        match &value.kind {
            TonValueKind::Object(obj) => self.walk_object(obj, path, schemas, errors),
            TonValueKind::Array(values) => {
                for (i, element) in values.iter().enumerate() {
                    self.walk(element, &format!("{path}[{i}]"), schemas, errors);
                }
            }
            _ => {}
        }
    }

    fn walk_object(
        &self,
        obj: &TonObject,
        path: &str,
        schemas: &TonSchemaCollection,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(definition) = obj
            .class_name
            .as_deref()
            .and_then(|name| schemas.schema(name))
        {
            self.check_object(obj, definition, path, schemas, errors);
        }
        for (name, value) in obj.entries() {
            self.walk(value, &format!("{path}/{name}"), schemas, errors);
        }
        for (i, child) in obj.children.iter().enumerate() {
            self.walk_object(child, &format!("{path}/[{i}]"), schemas, errors);
        }
    }

    fn check_object(
        &self,
        obj: &TonObject,
        definition: &TonSchemaDefinition,
        base_path: &str,
        schemas: &TonSchemaCollection,
        errors: &mut Vec<ValidationError>,
    ) {
        for schema in definition.properties.values() {
            let full_path = format!("{base_path}/{}", schema.path);
            let value = obj.get_path(&schema.path);

            // Presence gates run before everything else; a declared default
            // stands in for a missing value.
            let Some(value) = value.filter(|v| !v.is_undefined()) else {
                if schema.is_required() && !schema.has_rule(ValidationRuleType::Default) {
                    errors.push(ValidationError {
                        path: full_path.clone(),
                        message: format!("Property '{full_path}' is required"),
                    });
                }
                continue;
            };

            if value.is_null() {
                if !schema.allows_null() && !schema.has_rule(ValidationRuleType::DefaultWhenNull) {
                    errors.push(ValidationError {
                        path: full_path.clone(),
                        message: format!("Property '{full_path}' must not be null"),
                    });
                }
                continue;
            }

            // A declared empty-value fallback replaces the value wholesale.
            if value.is_empty() && schema.has_rule(ValidationRuleType::DefaultWhenEmpty) {
                continue;
            }

            self.check_declared_type(value, schema, &full_path, errors);
            self.check_enum_membership(value, schema, &full_path, schemas, errors);

            for rule in &schema.validations {
                self.apply_rule(value, rule.rule_type, &rule.parameters, &full_path, errors);
            }
        }
    }

    // === Declared type ===

    fn check_declared_type(
        &self,
        value: &TonValue,
        schema: &TonPropertySchema,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if schema.has_rule(ValidationRuleType::DefaultWhenInvalid) {
            return;
        }
        let base = schema.base_type();
        if !type_matches(base, value) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!(
                    "Type mismatch: expected {base}, got {}",
                    value.kind_name()
                ),
            });
            return;
        }
        if let (Some(elem), TonValueKind::Array(values)) = (schema.element_type(), &value.kind) {
            for (i, element) in values.iter().enumerate() {
                if !type_matches(elem, element) {
                    errors.push(ValidationError {
                        path: format!("{path}[{i}]"),
                        message: format!(
                            "Type mismatch: expected {elem}, got {}",
                            element.kind_name()
                        ),
                    });
                }
            }
        }
    }

    // === Enum membership ===

    fn check_enum_membership(
        &self,
        value: &TonValue,
        schema: &TonPropertySchema,
        path: &str,
        schemas: &TonSchemaCollection,
        errors: &mut Vec<ValidationError>,
    ) {
        let Some(def) = schema.enum_name().and_then(|n| schemas.enum_definition(n)) else {
            return;
        };
        let strict_index = schema.has_rule(ValidationRuleType::StrictIndex);

        match &value.kind {
            TonValueKind::Enum(symbol) => {
                self.check_enum_symbol(symbol, def, path, errors);
            }
            TonValueKind::EnumSet(symbols) => {
                if !def.is_enum_set {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("Enum {} does not allow multiple values", def.name),
                    });
                }
                for symbol in symbols {
                    self.check_enum_symbol(symbol, def, path, errors);
                }
            }
            TonValueKind::Integer(index) => {
                if strict_index {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("Property '{path}' must use enum name, not index"),
                    });
                } else if *index < 0 || def.value_at(*index as usize).is_none() {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("Index {index} is out of range for enum {}", def.name),
                    });
                }
            }
            _ => {}
        }
    }

    fn check_enum_symbol(
        &self,
        symbol: &str,
        def: &TonEnumDefinition,
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        if !def.is_valid_value(symbol) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("'{symbol}' is not a valid value for enum {}", def.name),
            });
        }
    }

    // === Individual rules ===

    fn apply_rule(
        &self,
        value: &TonValue,
        rule: ValidationRuleType,
        params: &[TonValue],
        path: &str,
        errors: &mut Vec<ValidationError>,
    ) {
        use ValidationRuleType as R;

        let mut fail = |message: String| {
            errors.push(ValidationError {
                path: path.to_string(),
                message,
            })
        };

        match rule {
            // Presence and defaults are handled before the rule loop; index
            // policy is consumed by the enum membership check.
            R::Required
            | R::NotNull
            | R::Default
            | R::DefaultWhenNull
            | R::DefaultWhenEmpty
            | R::DefaultWhenInvalid
            | R::AllowIndex
            | R::StrictIndex
            | R::Signed
            | R::AllowDuplicates => {}

            R::MinLength => {
                if let TonValueKind::String(s) = &value.kind {
                    let n = param_i64(params, 0);
                    if (s.chars().count() as i64) < n {
                        fail(format!(
                            "Property '{path}' must be at least {n} characters long"
                        ));
                    }
                }
            }
            R::MaxLength => {
                if let TonValueKind::String(s) = &value.kind {
                    let n = param_i64(params, 0);
                    if (s.chars().count() as i64) > n {
                        fail(format!(
                            "Property '{path}' must be at most {n} characters long"
                        ));
                    }
                }
            }
            R::Length => {
                if let TonValueKind::String(s) = &value.kind {
                    let n = param_i64(params, 0);
                    if s.chars().count() as i64 != n {
                        fail(format!(
                            "Property '{path}' must be exactly {n} characters long"
                        ));
                    }
                }
            }
            R::Pattern => {
                if let TonValueKind::String(s) = &value.kind {
                    let pattern = params.first().map(|p| p.to_text()).unwrap_or_default();
                    match Regex::new(&pattern) {
                        Ok(re) => {
                            if !re.is_match(s) {
                                fail(format!(
                                    "Property '{path}' does not match pattern '{pattern}'"
                                ));
                            }
                        }
                        Err(_) => fail(format!("Invalid pattern '{pattern}'")),
                    }
                }
            }
            R::Format => {
                if let TonValueKind::String(s) = &value.kind {
                    let format = params.first().map(|p| p.to_text()).unwrap_or_default();
                    match check_format(&format, s) {
                        Some(true) => {}
                        Some(false) => {
                            fail(format!("Property '{path}' must be a valid {format}"))
                        }
                        None => fail(format!("Unknown format '{format}'")),
                    }
                }
            }
            R::Enum => {
                let text = value.to_text();
                let allowed = params
                    .iter()
                    .any(|p| p.to_text().eq_ignore_ascii_case(&text));
                if !allowed {
                    let names: Vec<String> = params.iter().map(|p| p.to_text()).collect();
                    fail(format!(
                        "Property '{path}' must be one of [{}]",
                        names.join(", ")
                    ));
                }
            }

            R::Min => {
                if let Some(v) = numeric(value) {
                    let n = param_f64(params, 0);
                    if v < n {
                        fail(format!("Property '{path}' must be at least {n}"));
                    }
                }
            }
            R::Max => {
                if let Some(v) = numeric(value) {
                    let n = param_f64(params, 0);
                    if v > n {
                        fail(format!("Property '{path}' must be at most {n}"));
                    }
                }
            }
            R::Range => {
                if let Some(v) = numeric(value) {
                    let low = param_f64(params, 0);
                    let high = param_f64(params, 1);
                    if v < low || v > high {
                        fail(format!(
                            "Property '{path}' must be between {low} and {high}"
                        ));
                    }
                }
            }
            R::Positive => {
                if numeric(value).is_some_and(|v| v <= 0.0) {
                    fail(format!("Property '{path}' must be positive"));
                }
            }
            R::Negative => {
                if numeric(value).is_some_and(|v| v >= 0.0) {
                    fail(format!("Property '{path}' must be negative"));
                }
            }
            R::NonNegative => {
                if numeric(value).is_some_and(|v| v < 0.0) {
                    fail(format!("Property '{path}' must not be negative"));
                }
            }
            R::NonPositive => {
                if numeric(value).is_some_and(|v| v > 0.0) {
                    fail(format!("Property '{path}' must not be positive"));
                }
            }
            R::MultipleOf => {
                if let Some(v) = numeric(value) {
                    let n = param_f64(params, 0);
                    if n != 0.0 {
                        let remainder = (v % n).abs();
                        if remainder > 1e-9 && (n.abs() - remainder) > 1e-9 {
                            fail(format!("Property '{path}' must be a multiple of {n}"));
                        }
                    }
                }
            }
            R::Bits => {
                if let TonValueKind::Integer(i) = &value.kind {
                    let bits = param_i64(params, 0).clamp(1, 64) as u32;
                    let min = -(1i128 << (bits - 1));
                    let max = (1i128 << (bits - 1)) - 1;
                    if (*i as i128) < min || (*i as i128) > max {
                        fail(format!("Property '{path}' must fit in {bits} bits"));
                    }
                }
            }
            R::Unsigned => {
                if let TonValueKind::Integer(i) = &value.kind {
                    if *i < 0 {
                        fail(format!("Property '{path}' must be non-negative"));
                    }
                }
            }

            R::GuidFormat => {
                if value.to_guid().is_nil() && !matches!(value.kind, TonValueKind::Guid(g) if g.is_nil())
                {
                    fail(format!("Property '{path}' must be a valid GUID"));
                }
            }
            R::Version => {
                let expected = param_i64(params, 0) as usize;
                if value.to_guid().get_version_num() != expected {
                    fail(format!("Property '{path}' must be a version {expected} GUID"));
                }
            }

            R::After => {
                if let Some((v, limit)) = date_pair(value, params) {
                    if v <= limit {
                        let text = params.first().map(|p| p.to_text()).unwrap_or_default();
                        fail(format!("Property '{path}' must be after {text}"));
                    }
                }
            }
            R::Before => {
                if let Some((v, limit)) = date_pair(value, params) {
                    if v >= limit {
                        let text = params.first().map(|p| p.to_text()).unwrap_or_default();
                        fail(format!("Property '{path}' must be before {text}"));
                    }
                }
            }
            R::Between => {
                let low = params.first().and_then(|p| parse_date_string(&p.to_text()));
                let high = params.get(1).and_then(|p| parse_date_string(&p.to_text()));
                if let (Some(low), Some(high)) = (low, high) {
                    let v = value.to_date();
                    if v < low || v > high {
                        fail(format!(
                            "Property '{path}' must be between {} and {}",
                            params[0].to_text(),
                            params[1].to_text()
                        ));
                    }
                }
            }
            R::Future => {
                if value.to_date() <= Utc::now() {
                    fail(format!("Property '{path}' must be in the future"));
                }
            }
            R::Past => {
                if value.to_date() >= Utc::now() {
                    fail(format!("Property '{path}' must be in the past"));
                }
            }

            R::MinCount => {
                if let Some(len) = collection_len(value) {
                    let n = param_i64(params, 0);
                    if (len as i64) < n {
                        fail(format!(
                            "Property '{path}' must have at least {n} elements"
                        ));
                    }
                }
            }
            R::MaxCount => {
                if let Some(len) = collection_len(value) {
                    let n = param_i64(params, 0);
                    if (len as i64) > n {
                        fail(format!("Property '{path}' must have at most {n} elements"));
                    }
                }
            }
            R::Count => {
                if let Some(len) = collection_len(value) {
                    let n = param_i64(params, 0);
                    if len as i64 != n {
                        fail(format!(
                            "Property '{path}' must have exactly {n} elements"
                        ));
                    }
                }
            }
            R::NonEmpty => {
                if value.is_empty() {
                    fail(format!("Property '{path}' must not be empty"));
                }
            }
            R::Unique => {
                let duplicate = match &value.kind {
                    TonValueKind::Array(values) => {
                        let mut found = false;
                        for i in 0..values.len() {
                            for j in (i + 1)..values.len() {
                                if values[i] == values[j] {
                                    found = true;
                                }
                            }
                        }
                        found
                    }
                    // Enum set symbols compare the way enum membership does.
                    TonValueKind::EnumSet(symbols) => (0..symbols.len()).any(|i| {
                        symbols[i + 1..]
                            .iter()
                            .any(|s| s.eq_ignore_ascii_case(&symbols[i]))
                    }),
                    _ => false,
                };
                if duplicate {
                    fail(format!("Property '{path}' must contain unique elements"));
                }
            }
            R::Sorted => {
                let unsorted = match &value.kind {
                    TonValueKind::Array(values) => !is_sorted(values),
                    TonValueKind::EnumSet(symbols) => {
                        !symbols.windows(2).all(|pair| pair[0] <= pair[1])
                    }
                    _ => false,
                };
                if unsorted {
                    fail(format!("Property '{path}' must be sorted"));
                }
            }
        }
    }
}

// === Helpers ===

fn param_i64(params: &[TonValue], index: usize) -> i64 {
    params.get(index).map(|p| p.to_i64()).unwrap_or(0)
}

fn param_f64(params: &[TonValue], index: usize) -> f64 {
    params.get(index).map(|p| p.to_f64()).unwrap_or(0.0)
}

fn numeric(value: &TonValue) -> Option<f64> {
    match &value.kind {
        TonValueKind::Integer(i) => Some(*i as f64),
        TonValueKind::Float(f) => Some(*f),
        _ => None,
    }
}

fn collection_len(value: &TonValue) -> Option<usize> {
    match &value.kind {
        TonValueKind::Array(values) => Some(values.len()),
        TonValueKind::EnumSet(symbols) => Some(symbols.len()),
        _ => None,
    }
}

fn date_pair(value: &TonValue, params: &[TonValue]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let limit = parse_date_string(&params.first()?.to_text())?;
    Some((value.to_date(), limit))
}

fn type_matches(tag: &str, value: &TonValue) -> bool {
    match tag {
        "string" => matches!(value.kind, TonValueKind::String(_)),
        "int" | "integer" => matches!(value.kind, TonValueKind::Integer(_)),
        // An integer is an acceptable float.
        "float" => matches!(
            value.kind,
            TonValueKind::Float(_) | TonValueKind::Integer(_)
        ),
        "number" => matches!(
            value.kind,
            TonValueKind::Float(_) | TonValueKind::Integer(_)
        ),
        "bool" | "boolean" => matches!(value.kind, TonValueKind::Boolean(_)),
        "guid" => match &value.kind {
            TonValueKind::Guid(_) => true,
            TonValueKind::String(_) => !value.to_guid().is_nil(),
            _ => false,
        },
        "date" => match &value.kind {
            TonValueKind::Date(_) => true,
            TonValueKind::String(s) => parse_date_string(s).is_some(),
            _ => false,
        },
        // A numeric index may stand in for an enum symbol.
        "enum" => matches!(
            value.kind,
            TonValueKind::Enum(_) | TonValueKind::Integer(_)
        ),
        "enumSet" => matches!(
            value.kind,
            TonValueKind::EnumSet(_) | TonValueKind::Enum(_)
        ),
        "array" => matches!(value.kind, TonValueKind::Array(_)),
        "object" => matches!(value.kind, TonValueKind::Object(_)),
        // Unknown tags are not a reason to reject a document.
        _ => true,
    }
}

/// Non-decreasing order: numeric pairs compare numerically, textual pairs
/// lexicographically, and any incomparable pair makes the array unsorted.
fn is_sorted(values: &[TonValue]) -> bool {
    values.windows(2).all(|pair| {
        let (a, b) = (&pair[0], &pair[1]);
        match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x <= y,
            (None, None) => match (textual(a), textual(b)) {
                (Some(x), Some(y)) => x <= y,
                _ => false,
            },
            _ => false,
        }
    })
}

fn textual(value: &TonValue) -> Option<&str> {
    match &value.kind {
        TonValueKind::String(s) | TonValueKind::Enum(s) | TonValueKind::Date(s) => Some(s),
        _ => None,
    }
}

/// `Some(result)` for known formats, `None` for unknown ones.
fn check_format(format: &str, s: &str) -> Option<bool> {
    match format {
        "email" => Some(s.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        })),
        "url" => Some(s.starts_with("http://") || s.starts_with("https://")),
        "ipv4" => {
            let parts: Vec<&str> = s.split('.').collect();
            Some(parts.len() == 4 && parts.iter().all(|p| p.parse::<u8>().is_ok()))
        }
        "date" => Some(parse_date_string(s).is_some()),
        _ => None,
    }
}
