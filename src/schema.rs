use indexmap::IndexMap;

use crate::model::TonValue;

/// Every validation rule the schema language knows. Rule names in `#!`
/// schema directives are camelCase, e.g. `minLength(3)` or `nonEmpty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRuleType {
    // Presence
    Required,
    NotNull,
    Default,
    DefaultWhenNull,
    DefaultWhenEmpty,
    DefaultWhenInvalid,

    // Strings
    MinLength,
    MaxLength,
    Length,
    Pattern,
    Format,

    // Enums
    Enum,

    // Numbers
    Min,
    Max,
    Range,
    Positive,
    Negative,
    NonNegative,
    NonPositive,
    MultipleOf,
    Bits,
    Unsigned,
    Signed,

    // GUIDs
    GuidFormat,
    Version,

    // Dates
    After,
    Before,
    Between,
    Future,
    Past,

    // Enum index handling
    AllowIndex,
    StrictIndex,

    // Collections
    MinCount,
    MaxCount,
    Count,
    NonEmpty,
    Unique,
    Sorted,
    AllowDuplicates,
}

impl ValidationRuleType {
    /// The rule's name as written in schema directives.
    pub fn name(&self) -> &'static str {
        match self {
            ValidationRuleType::Required => "required",
            ValidationRuleType::NotNull => "notNull",
            ValidationRuleType::Default => "default",
            ValidationRuleType::DefaultWhenNull => "defaultWhenNull",
            ValidationRuleType::DefaultWhenEmpty => "defaultWhenEmpty",
            ValidationRuleType::DefaultWhenInvalid => "defaultWhenInvalid",
            ValidationRuleType::MinLength => "minLength",
            ValidationRuleType::MaxLength => "maxLength",
            ValidationRuleType::Length => "length",
            ValidationRuleType::Pattern => "pattern",
            ValidationRuleType::Format => "format",
            ValidationRuleType::Enum => "enum",
            ValidationRuleType::Min => "min",
            ValidationRuleType::Max => "max",
            ValidationRuleType::Range => "range",
            ValidationRuleType::Positive => "positive",
            ValidationRuleType::Negative => "negative",
            ValidationRuleType::NonNegative => "nonNegative",
            ValidationRuleType::NonPositive => "nonPositive",
            ValidationRuleType::MultipleOf => "multipleOf",
            ValidationRuleType::Bits => "bits",
            ValidationRuleType::Unsigned => "unsigned",
            ValidationRuleType::Signed => "signed",
            ValidationRuleType::GuidFormat => "guidFormat",
            ValidationRuleType::Version => "version",
            ValidationRuleType::After => "after",
            ValidationRuleType::Before => "before",
            ValidationRuleType::Between => "between",
            ValidationRuleType::Future => "future",
            ValidationRuleType::Past => "past",
            ValidationRuleType::AllowIndex => "allowIndex",
            ValidationRuleType::StrictIndex => "strictIndex",
            ValidationRuleType::MinCount => "minCount",
            ValidationRuleType::MaxCount => "maxCount",
            ValidationRuleType::Count => "count",
            ValidationRuleType::NonEmpty => "nonEmpty",
            ValidationRuleType::Unique => "unique",
            ValidationRuleType::Sorted => "sorted",
            ValidationRuleType::AllowDuplicates => "allowDuplicates",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "required" => ValidationRuleType::Required,
            "notNull" => ValidationRuleType::NotNull,
            "default" => ValidationRuleType::Default,
            "defaultWhenNull" => ValidationRuleType::DefaultWhenNull,
            "defaultWhenEmpty" => ValidationRuleType::DefaultWhenEmpty,
            "defaultWhenInvalid" => ValidationRuleType::DefaultWhenInvalid,
            "minLength" => ValidationRuleType::MinLength,
            "maxLength" => ValidationRuleType::MaxLength,
            "length" => ValidationRuleType::Length,
            "pattern" => ValidationRuleType::Pattern,
            "format" => ValidationRuleType::Format,
            "enum" => ValidationRuleType::Enum,
            "min" => ValidationRuleType::Min,
            "max" => ValidationRuleType::Max,
            "range" => ValidationRuleType::Range,
            "positive" => ValidationRuleType::Positive,
            "negative" => ValidationRuleType::Negative,
            "nonNegative" => ValidationRuleType::NonNegative,
            "nonPositive" => ValidationRuleType::NonPositive,
            "multipleOf" => ValidationRuleType::MultipleOf,
            "bits" => ValidationRuleType::Bits,
            "unsigned" => ValidationRuleType::Unsigned,
            "signed" => ValidationRuleType::Signed,
            "guidFormat" => ValidationRuleType::GuidFormat,
            "version" => ValidationRuleType::Version,
            "after" => ValidationRuleType::After,
            "before" => ValidationRuleType::Before,
            "between" => ValidationRuleType::Between,
            "future" => ValidationRuleType::Future,
            "past" => ValidationRuleType::Past,
            "allowIndex" => ValidationRuleType::AllowIndex,
            "strictIndex" => ValidationRuleType::StrictIndex,
            "minCount" => ValidationRuleType::MinCount,
            "maxCount" => ValidationRuleType::MaxCount,
            "count" => ValidationRuleType::Count,
            "nonEmpty" => ValidationRuleType::NonEmpty,
            "unique" => ValidationRuleType::Unique,
            "sorted" => ValidationRuleType::Sorted,
            "allowDuplicates" => ValidationRuleType::AllowDuplicates,
            _ => return None,
        })
    }
}

/// One rule attached to a property, with its literal arguments as written
/// in the schema, e.g. `range(1, 100)` carries two integer parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TonValidationRule {
    pub rule_type: ValidationRuleType,
    pub parameters: Vec<TonValue>,
}

impl TonValidationRule {
    pub fn new(rule_type: ValidationRuleType) -> Self {
        Self {
            rule_type,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(rule_type: ValidationRuleType, parameters: Vec<TonValue>) -> Self {
        Self {
            rule_type,
            parameters,
        }
    }

    pub fn parameter(&self, index: usize) -> Option<&TonValue> {
        self.parameters.get(index)
    }
}

/// The schema for one property path within a class.
#[derive(Debug, Clone, PartialEq)]
pub struct TonPropertySchema {
    /// A `/`-separated path relative to the object being validated.
    pub path: String,
    /// Declared type tag, e.g. `string`, `int`, `array:int`, `enum:Status`.
    pub property_type: String,
    pub validations: Vec<TonValidationRule>,
}

impl TonPropertySchema {
    pub fn new(path: impl Into<String>, property_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            property_type: property_type.into(),
            validations: Vec::new(),
        }
    }

    pub fn add_validation(&mut self, rule: TonValidationRule) {
        self.validations.push(rule);
    }

    pub fn has_rule(&self, rule_type: ValidationRuleType) -> bool {
        self.validations.iter().any(|r| r.rule_type == rule_type)
    }

    pub fn rule(&self, rule_type: ValidationRuleType) -> Option<&TonValidationRule> {
        self.validations.iter().find(|r| r.rule_type == rule_type)
    }

    pub fn is_required(&self) -> bool {
        self.has_rule(ValidationRuleType::Required)
    }

    pub fn allows_null(&self) -> bool {
        !self.has_rule(ValidationRuleType::NotNull)
    }

    /// The base type before any `:` qualifier: `array:int` -> `array`.
    pub fn base_type(&self) -> &str {
        self.property_type
            .split_once(':')
            .map(|(base, _)| base)
            .unwrap_or(&self.property_type)
    }

    /// The element type of an `array:<elem>` tag, if present.
    pub fn element_type(&self) -> Option<&str> {
        self.property_type
            .split_once(':')
            .filter(|(base, _)| *base == "array")
            .map(|(_, elem)| elem)
    }

    /// The qualifier of an `enum:<Name>` tag, if present.
    pub fn enum_name(&self) -> Option<&str> {
        self.property_type
            .split_once(':')
            .filter(|(base, _)| *base == "enum" || *base == "enumSet")
            .map(|(_, name)| name)
    }
}

/// All property schemas declared for one class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TonSchemaDefinition {
    pub class_name: String,
    pub properties: IndexMap<String, TonPropertySchema>,
}

impl TonSchemaDefinition {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            properties: IndexMap::new(),
        }
    }

    pub fn add_property(&mut self, schema: TonPropertySchema) {
        self.properties.insert(schema.path.clone(), schema);
    }

    pub fn property(&self, path: &str) -> Option<&TonPropertySchema> {
        self.properties.get(path)
    }
}

/// A named enum (or enum set) declaration: `enum(Status) [active, inactive]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TonEnumDefinition {
    pub name: String,
    pub values: Vec<String>,
    /// True for `enumSet(...)`: multiple simultaneous values are allowed.
    pub is_enum_set: bool,
}

impl TonEnumDefinition {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
            is_enum_set: false,
        }
    }

    pub fn new_set(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
            is_enum_set: true,
        }
    }

    /// Membership test, case-insensitive.
    pub fn is_valid_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v.eq_ignore_ascii_case(value))
    }

    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.eq_ignore_ascii_case(value))
    }
}

/// Schemas and enum definitions collected from a document's `#!` directives
/// (or assembled programmatically). Lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct TonSchemaCollection {
    schemas: IndexMap<String, TonSchemaDefinition>,
    enums: IndexMap<String, TonEnumDefinition>,
}

impl TonSchemaCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_schema(&mut self, schema: TonSchemaDefinition) {
        self.schemas
            .insert(schema.class_name.to_ascii_lowercase(), schema);
    }

    pub fn add_enum(&mut self, definition: TonEnumDefinition) {
        self.enums
            .insert(definition.name.to_ascii_lowercase(), definition);
    }

    pub fn schema(&self, class_name: &str) -> Option<&TonSchemaDefinition> {
        self.schemas.get(&class_name.to_ascii_lowercase())
    }

    pub fn enum_definition(&self, name: &str) -> Option<&TonEnumDefinition> {
        self.enums.get(&name.to_ascii_lowercase())
    }

    pub fn schemas(&self) -> impl Iterator<Item = &TonSchemaDefinition> {
        self.schemas.values()
    }

    pub fn enums(&self) -> impl Iterator<Item = &TonEnumDefinition> {
        self.enums.values()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.enums.is_empty()
    }
}
