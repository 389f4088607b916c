use log::debug;

use crate::model::{TonDocument, TonObject, TonValue, TonValueKind, TypeHint};
use crate::schema::{TonSchemaCollection, TonValidationRule};

/// The two built-in output styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TonFormatStyle {
    Compact,
    Pretty,
}

/// Fine-grained control over serialization. Start from [`compact()`] or
/// [`pretty()`] and override individual fields.
///
/// Integers always serialize in decimal; hex and binary literals are
/// normalized at parse time, so there is no radix or hex-casing control
/// here.
///
/// [`compact()`]: TonSerializeOptions::compact
/// [`pretty()`]: TonSerializeOptions::pretty
#[derive(Debug, Clone)]
pub struct TonSerializeOptions {
    pub format_style: TonFormatStyle,
    /// Indentation emitted per nesting level (pretty style only).
    pub indent: String,
    /// Emit the `#@ tonVersion = ...` header line.
    pub include_header: bool,
    pub ton_version: String,
    /// Emit the document's embedded schemas as `#!` lines.
    pub include_schema: bool,
    /// Emit `$`/`%`/`&`/`^` prefixes derived from each value's kind.
    pub include_type_hints: bool,
    /// Sort members alphabetically instead of keeping document order.
    pub sort_properties: bool,
    pub quote_char: char,
    pub omit_null_values: bool,
    pub omit_undefined_values: bool,
    pub omit_empty_collections: bool,
    /// Emit strings spanning at least `multi_line_string_threshold` lines in
    /// the triple-quote form at the current indentation.
    pub use_multi_line_strings: bool,
    pub multi_line_string_threshold: usize,
    pub lowercase_guids: bool,
    /// Replace numeric enum indices with symbol names where an embedded
    /// schema identifies the enum.
    pub prefer_enum_names: bool,
}

impl TonSerializeOptions {
    /// Single line, single quotes, no header, no hints, sparse members.
    pub fn compact() -> Self {
        Self {
            format_style: TonFormatStyle::Compact,
            indent: String::new(),
            include_header: false,
            ton_version: "1".to_string(),
            include_schema: false,
            include_type_hints: false,
            sort_properties: false,
            quote_char: '\'',
            omit_null_values: true,
            omit_undefined_values: true,
            omit_empty_collections: true,
            use_multi_line_strings: false,
            multi_line_string_threshold: 2,
            lowercase_guids: true,
            prefer_enum_names: true,
        }
    }

    /// Header, 4-space indent, sorted members, type hints, double quotes.
    pub fn pretty() -> Self {
        Self {
            format_style: TonFormatStyle::Pretty,
            indent: "    ".to_string(),
            include_header: true,
            ton_version: "1".to_string(),
            include_schema: true,
            include_type_hints: true,
            sort_properties: true,
            quote_char: '"',
            omit_null_values: false,
            omit_undefined_values: true,
            omit_empty_collections: false,
            use_multi_line_strings: true,
            multi_line_string_threshold: 2,
            lowercase_guids: true,
            prefer_enum_names: true,
        }
    }
}

impl Default for TonSerializeOptions {
    fn default() -> Self {
        Self::pretty()
    }
}

/// Regenerates TON text from a document. Pure and total: any well-formed
/// document serializes without error.
pub struct TonSerializer {
    options: TonSerializeOptions,
}

impl Default for TonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl TonSerializer {
    pub fn new() -> Self {
        Self {
            options: TonSerializeOptions::default(),
        }
    }

    pub fn with_options(options: TonSerializeOptions) -> Self {
        Self { options }
    }

    pub fn serialize(&self, document: &TonDocument) -> String {
        debug!("serializing document ({:?})", self.options.format_style);
        let mut out = String::new();

        if self.options.include_header {
            self.emit_header(document, &mut out);
        }
        if self.options.include_schema && !document.schemas.is_empty() {
            self.emit_schemas(&document.schemas, &mut out);
        }
        if !out.is_empty() {
            out.push('\n');
        }

        self.emit_value(&document.root, &document.schemas, None, 0, &mut out);
        out
    }

    // === Directives ===

    fn emit_header(&self, document: &TonDocument, out: &mut String) {
        out.push_str("#@ ");
        match &document.header {
            Some(header) if !header.attributes.is_empty() => {
                let pairs: Vec<String> = header
                    .attributes
                    .iter()
                    .map(|(k, v)| format!("{k} = {}", self.quoted(v)))
                    .collect();
                out.push_str(&pairs.join(", "));
            }
            _ => {
                out.push_str(&format!(
                    "tonVersion = {}",
                    self.quoted(&self.options.ton_version)
                ));
            }
        }
        out.push('\n');
    }

    fn emit_schemas(&self, schemas: &TonSchemaCollection, out: &mut String) {
        for def in schemas.enums() {
            let keyword = if def.is_enum_set { "enumSet" } else { "enum" };
            out.push_str(&format!(
                "#! {keyword}({}) [{}]\n",
                def.name,
                def.values.join(", ")
            ));
        }
        for schema in schemas.schemas() {
            let members: Vec<String> = schema
                .properties
                .values()
                .map(|prop| {
                    let path = if is_bare_name(&prop.path) {
                        prop.path.clone()
                    } else {
                        self.quoted(&prop.path)
                    };
                    let mut member = format!("{path} = {}", prop.property_type);
                    if !prop.validations.is_empty() {
                        let rules: Vec<String> = prop
                            .validations
                            .iter()
                            .map(|r| self.format_rule(r))
                            .collect();
                        member.push_str(&format!("({})", rules.join(", ")));
                    }
                    member
                })
                .collect();
            out.push_str(&format!(
                "#! {{ ({}) {} }}\n",
                schema.class_name,
                members.join(", ")
            ));
        }
    }

    fn format_rule(&self, rule: &TonValidationRule) -> String {
        if rule.parameters.is_empty() {
            return rule.rule_type.name().to_string();
        }
        let args: Vec<String> = rule
            .parameters
            .iter()
            .map(|p| match &p.kind {
                TonValueKind::String(s) => self.quoted(s),
                other => TonValue::new(other.clone()).to_text(),
            })
            .collect();
        format!("{}({})", rule.rule_type.name(), args.join(", "))
    }

    // === Values ===

    fn emit_value(
        &self,
        value: &TonValue,
        schemas: &TonSchemaCollection,
        enum_name: Option<&str>,
        level: usize,
        out: &mut String,
    ) {
        // An integer standing in for an enum symbol is emitted as the
        // symbol, so it must not pick up a number hint.
        let enum_symbol = match &value.kind {
            TonValueKind::Integer(i) => self.enum_symbol_for_index(*i, enum_name, schemas),
            _ => None,
        };

        if self.options.include_type_hints && enum_symbol.is_none() {
            if let Some(prefix) = self.hint_prefix(value) {
                out.push(prefix);
            }
        }

        match &value.kind {
            TonValueKind::Null => out.push_str("null"),
            TonValueKind::Undefined => out.push_str("undefined"),
            TonValueKind::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            TonValueKind::Integer(i) => {
                if let Some(symbol) = enum_symbol {
                    out.push_str(&format!("|{symbol}|"));
                } else {
                    out.push_str(&i.to_string());
                }
            }
            TonValueKind::Float(f) => out.push_str(&format_float(*f)),
            TonValueKind::String(s) => self.emit_string(s, level, out),
            TonValueKind::Date(d) => {
                out.push(self.options.quote_char);
                out.push_str(d);
                out.push(self.options.quote_char);
            }
            TonValueKind::Guid(g) => {
                let text = g.to_string();
                if self.options.lowercase_guids {
                    out.push_str(&text);
                } else {
                    out.push_str(&text.to_uppercase());
                }
            }
            TonValueKind::Enum(e) => out.push_str(&format!("|{e}|")),
            TonValueKind::EnumSet(values) => {
                if values.is_empty() {
                    out.push_str("||");
                } else {
                    out.push_str(&format!("|{}|", values.join("|")));
                }
            }
            TonValueKind::Array(values) => {
                // Arrays are always inline, regardless of style.
                out.push('[');
                for (i, element) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.emit_value(element, schemas, enum_name, level, out);
                }
                out.push(']');
            }
            TonValueKind::Object(obj) => self.emit_object(obj, schemas, level, out),
        }
    }

    fn hint_prefix(&self, value: &TonValue) -> Option<char> {
        match &value.kind {
            TonValueKind::String(_) => Some(TypeHint::String.prefix()),
            TonValueKind::Integer(_) | TonValueKind::Float(_) => Some(TypeHint::Number.prefix()),
            TonValueKind::Boolean(_) => Some(TypeHint::Boolean.prefix()),
            TonValueKind::Date(_) => Some(TypeHint::Date.prefix()),
            _ => None,
        }
    }

    fn emit_object(
        &self,
        obj: &TonObject,
        schemas: &TonSchemaCollection,
        level: usize,
        out: &mut String,
    ) {
        let pretty = self.options.format_style == TonFormatStyle::Pretty;

        if let Some(class_name) = &obj.class_name {
            match obj.instance_id {
                Some(id) => out.push_str(&format!("({class_name}#{id})")),
                None => out.push_str(&format!("({class_name})")),
            }
            if pretty {
                out.push(' ');
            }
        }

        let class_schema = obj
            .class_name
            .as_deref()
            .and_then(|name| schemas.schema(name));

        let mut entries: Vec<(&String, &TonValue)> =
            obj.entries().filter(|(_, v)| !self.omitted(v)).collect();
        if self.options.sort_properties {
            entries.sort_by(|a, b| a.0.cmp(b.0));
        }

        if entries.is_empty() && obj.children.is_empty() {
            out.push_str("{}");
            return;
        }

        let mut members: Vec<String> = Vec::with_capacity(entries.len() + obj.children.len());
        for (name, value) in entries {
            let mut member = String::new();
            member.push_str(&self.property_name(name));
            if let Some(annotation) = &value.annotation {
                member.push(':');
                member.push_str(annotation);
            }
            member.push_str(" = ");
            let enum_name = class_schema
                .and_then(|s| s.property(name))
                .and_then(|p| p.enum_name());
            self.emit_value(value, schemas, enum_name, level + 1, &mut member);
            members.push(member);
        }
        for child in &obj.children {
            let mut member = String::new();
            self.emit_object(child, schemas, level + 1, &mut member);
            members.push(member);
        }

        if pretty {
            let inner = self.options.indent.repeat(level + 1);
            let closing = self.options.indent.repeat(level);
            out.push_str("{\n");
            out.push_str(&inner);
            out.push_str(&members.join(&format!(",\n{inner}")));
            out.push('\n');
            out.push_str(&closing);
            out.push('}');
        } else {
            out.push('{');
            out.push_str(&members.join(", "));
            out.push('}');
        }
    }

    fn omitted(&self, value: &TonValue) -> bool {
        match &value.kind {
            TonValueKind::Null => self.options.omit_null_values,
            TonValueKind::Undefined => self.options.omit_undefined_values,
            TonValueKind::Array(values) => self.options.omit_empty_collections && values.is_empty(),
            TonValueKind::Object(obj) => self.options.omit_empty_collections && obj.is_empty(),
            _ => false,
        }
    }

    /// Bare where the name would lex back as a single identifier or number,
    /// quoted otherwise.
    fn property_name(&self, name: &str) -> String {
        if is_bare_name(name) || name.parse::<f64>().is_ok() {
            name.to_string()
        } else {
            self.quoted(name)
        }
    }

    fn emit_string(&self, s: &str, level: usize, out: &mut String) {
        if self.options.use_multi_line_strings
            && s.lines().count() >= self.options.multi_line_string_threshold
            && survives_dedent(s)
        {
            // Content lines are pushed one level deeper; the lexer's dedent
            // strips the shared indentation back out on reparse.
            let inner = self.options.indent.repeat(level + 1);
            let closing = self.options.indent.repeat(level);
            out.push_str("\"\"\"\n");
            for line in s.split('\n') {
                if !line.is_empty() {
                    out.push_str(&inner);
                    out.push_str(line);
                }
                out.push('\n');
            }
            out.push_str(&closing);
            out.push_str("\"\"\"");
            return;
        }

        let quote = self.options.quote_char;
        out.push(quote);
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                '\u{0008}' => out.push_str("\\b"),
                '\u{000C}' => out.push_str("\\f"),
                c if c == quote => {
                    out.push('\\');
                    out.push(c);
                }
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                c => out.push(c),
            }
        }
        out.push(quote);
    }

    fn quoted(&self, s: &str) -> String {
        let mut out = String::new();
        let quote = self.options.quote_char;
        out.push(quote);
        for c in s.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                c if c == quote => {
                    out.push('\\');
                    out.push(c);
                }
                c => out.push(c),
            }
        }
        out.push(quote);
        out
    }

    fn enum_symbol_for_index(
        &self,
        index: i64,
        enum_name: Option<&str>,
        schemas: &TonSchemaCollection,
    ) -> Option<String> {
        if !self.options.prefer_enum_names || index < 0 {
            return None;
        }
        let def = schemas.enum_definition(enum_name?)?;
        def.value_at(index as usize).map(str::to_string)
    }
}

/// Keeps the float/integer distinction across a round trip: whole floats
/// carry a `.0`, non-finite values have no literal form and become null.
fn format_float(f: f64) -> String {
    if !f.is_finite() {
        "null".to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// Whether the triple-quote form reproduces `s` exactly on reparse. Dedent
/// drops blank edge lines, strips the common leading whitespace, and stops
/// at the first `"""`, so such strings stay in the escaped single-line form.
fn survives_dedent(s: &str) -> bool {
    if s.contains("\"\"\"") {
        return false;
    }
    let lines: Vec<&str> = s.split('\n').collect();
    let edges_kept = lines.first().is_some_and(|l| !l.trim().is_empty())
        && lines.last().is_some_and(|l| !l.trim().is_empty());
    let flush_left = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .any(|l| !l.starts_with([' ', '\t']));
    edges_kept && flush_left
}

fn is_bare_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '@') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    // Keywords would lex as literals, not names.
    !matches!(name, "true" | "false" | "null" | "undefined")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::TonParser;

    fn compact(input: &str) -> String {
        let doc = TonParser::new().parse(input).unwrap();
        TonSerializer::with_options(TonSerializeOptions::compact()).serialize(&doc)
    }

    fn pretty(input: &str) -> String {
        let doc = TonParser::new().parse(input).unwrap();
        TonSerializer::with_options(TonSerializeOptions::pretty()).serialize(&doc)
    }

    #[test]
    fn test_compact_object() {
        assert_eq!(
            compact("{ name = \"Ada\", age = 36 }"),
            "{name = 'Ada', age = 36}"
        );
    }

    #[test]
    fn test_compact_omits_null_undefined_and_empty() {
        assert_eq!(
            compact("{ a = null, b = undefined, c = [], d = {}, e = 1 }"),
            "{e = 1}"
        );
    }

    #[test]
    fn test_pretty_sorts_and_hints() {
        assert_eq!(
            pretty("{ name = 'Ada', age = 36 }"),
            "#@ tonVersion = \"1\"\n\n{\n    age = %36,\n    name = $\"Ada\"\n}"
        );
    }

    #[test]
    fn test_pretty_keeps_null() {
        let out = pretty("{ a = null }");
        assert!(out.contains("a = null"));
    }

    #[test]
    fn test_class_header_forms() {
        assert_eq!(compact("Person { a = 1 }"), "(Person){a = 1}");
        assert_eq!(compact("Person(7) { a = 1 }"), "(Person#7){a = 1}");
    }

    #[test]
    fn test_arrays_always_inline() {
        let out = pretty("{ xs = [1, 2, 3] }");
        assert!(out.contains("xs = [%1, %2, %3]"));
    }

    #[test]
    fn test_guid_bare_and_lowercased() {
        assert_eq!(
            compact("{ id = 550E8400-E29B-41D4-A716-446655440000 }"),
            "{id = 550e8400-e29b-41d4-a716-446655440000}"
        );
    }

    #[test]
    fn test_enums() {
        assert_eq!(compact("{ a = |on|, b = |r|w|, c = || }"), "{a = |on|, b = |r|w|, c = ||}");
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(compact("{ a = 1.0, b = 2.5 }"), "{a = 1.0, b = 2.5}");
    }

    #[test]
    fn test_string_escaping_uses_quote_char() {
        assert_eq!(compact("{ a = \"it's\" }"), "{a = 'it\\'s'}");
        assert_eq!(
            pretty("{ a = 'tab\\there' }"),
            "#@ tonVersion = \"1\"\n\n{\n    a = $\"tab\\there\"\n}"
        );
    }

    #[test]
    fn test_multiline_string_emission() {
        let doc = TonParser::new().parse("{ text = 'one\\ntwo' }").unwrap();
        let out = TonSerializer::with_options(TonSerializeOptions::pretty()).serialize(&doc);
        assert!(out.contains("text = $\"\"\"\n        one\n        two\n    \"\"\""));
    }

    #[test]
    fn test_blank_edge_lines_stay_escaped() {
        // Dedent drops blank first/last lines, so these must not use the
        // triple-quote form.
        for content in ["\nfirst\nlast", "first\nlast\n", "first\n   "] {
            let mut doc = TonParser::new().parse("{}").unwrap();
            doc.as_object_mut()
                .unwrap()
                .set("text", TonValue::string(content));
            let out = TonSerializer::with_options(TonSerializeOptions::pretty()).serialize(&doc);
            let back = TonParser::new().parse(&out).unwrap();
            assert_eq!(back.get_path("text").unwrap().to_text(), content);
        }
    }

    #[test]
    fn test_triple_quote_in_content_stays_escaped() {
        let doc = TonParser::new()
            .parse("{ text = 'a\\n\"\"\"\\nb' }")
            .unwrap();
        let out = TonSerializer::with_options(TonSerializeOptions::pretty()).serialize(&doc);
        let back = TonParser::new().parse(&out).unwrap();
        assert_eq!(back.get_path("text").unwrap().to_text(), "a\n\"\"\"\nb");
    }

    #[test]
    fn test_uniformly_indented_lines_stay_escaped() {
        let doc = TonParser::new().parse("{ text = '  a\\n  b' }").unwrap();
        let out = TonSerializer::with_options(TonSerializeOptions::pretty()).serialize(&doc);
        let back = TonParser::new().parse(&out).unwrap();
        assert_eq!(back.get_path("text").unwrap().to_text(), "  a\n  b");
    }

    #[test]
    fn test_date_with_hint() {
        let out = pretty("{ t = ^'2024-06-15T12:00:00Z' }");
        assert!(out.contains("t = ^\"2024-06-15T12:00:00Z\""));
    }

    #[test]
    fn test_positional_children_follow_members() {
        assert_eq!(
            compact("{ a = 1, { b = 2 } }"),
            "{a = 1, {b = 2}}"
        );
    }

    #[test]
    fn test_quoted_property_names() {
        assert_eq!(compact("{ 'with space' = 1, 42 = 2 }"), "{'with space' = 1, 42 = 2}");
    }

    #[test]
    fn test_annotation_round_trip() {
        assert_eq!(compact("{ age:int = 30 }"), "{age:int = 30}");
    }

    #[test]
    fn test_schema_emission() {
        let input = "#! enum(Status) [active, inactive]\n#! { (Person) name = string(required) }\n{ name = 'Ada' }";
        let doc = TonParser::new().parse(input).unwrap();
        let out = TonSerializer::with_options(TonSerializeOptions::pretty()).serialize(&doc);
        assert!(out.contains("#! enum(Status) [active, inactive]"));
        assert!(out.contains("#! { (Person) name = string(required) }"));
    }

    #[test]
    fn test_prefer_enum_names() {
        let input = "#! enum(Status) [active, inactive]\n#! { (Person) status = enum:Status }\n(Person) { status = 1 }";
        let doc = TonParser::new().parse(input).unwrap();
        let out = TonSerializer::with_options(TonSerializeOptions::compact()).serialize(&doc);
        assert_eq!(out, "(Person){status = |inactive|}");
    }

    #[test]
    fn test_compact_idempotence() {
        let options = TonSerializeOptions::compact();
        let doc = TonParser::new()
            .parse("{ b = [1, 2.5, 'x'], a = Person { c = |on| }, n = null }")
            .unwrap();
        let first = TonSerializer::with_options(options.clone()).serialize(&doc);
        let reparsed = TonParser::new().parse(&first).unwrap();
        let second = TonSerializer::with_options(options).serialize(&reparsed);
        assert_eq!(first, second);
    }
}
