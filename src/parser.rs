use indexmap::IndexMap;
use log::debug;
use miette::NamedSource;
use uuid::Uuid;

use crate::error::{ParseError, TonError};
use crate::lexer::{Lexer, Token, TokenType};
use crate::model::{
    parse_date_string, TonDocument, TonHeader, TonObject, TonValue, TonValueKind, TypeHint,
};
use crate::schema::{
    TonEnumDefinition, TonPropertySchema, TonSchemaCollection, TonSchemaDefinition,
    TonValidationRule, ValidationRuleType,
};

/// Options controlling how strictly a document is parsed.
#[derive(Debug, Clone)]
pub struct TonParseOptions {
    /// Accept a `,` before a closing `}` or `]`.
    pub allow_trailing_comma: bool,
    /// Accept `//` and `/* */` comments.
    pub allow_comments: bool,
    /// Maximum object/array nesting depth before parsing aborts.
    pub max_nesting_depth: usize,
    /// Make a repeated property name in the same object a parse error
    /// instead of letting the last occurrence win.
    pub strict_duplicate_keys: bool,
}

impl Default for TonParseOptions {
    fn default() -> Self {
        Self {
            allow_trailing_comma: false,
            allow_comments: true,
            max_nesting_depth: 64,
            strict_duplicate_keys: false,
        }
    }
}

/// Recursive-descent parser for TON documents.
///
/// `#@` header lines and `#!` schema lines are extracted before the body is
/// lexed; their contents are parsed separately and the lines are blanked in
/// place so every token keeps its original position.
pub struct TonParser {
    options: TonParseOptions,
}

impl Default for TonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TonParser {
    pub fn new() -> Self {
        Self {
            options: TonParseOptions::default(),
        }
    }

    pub fn with_options(options: TonParseOptions) -> Self {
        Self { options }
    }

    pub fn parse(&self, input: &str) -> Result<TonDocument, TonError> {
        self.parse_named(input, "source.ton")
    }

    pub fn parse_named(&self, input: &str, name: &str) -> Result<TonDocument, TonError> {
        let directives = extract_directives(input);

        let header = if directives.header_ranges.is_empty() {
            None
        } else {
            Some(parse_header(input, name, &directives.header_ranges)?)
        };

        let schemas = if directives.schema_ranges.is_empty() {
            TonSchemaCollection::new()
        } else {
            parse_schema_directives(input, name, &directives.schema_ranges)?
        };

        let mut lexer = Lexer::with_name(&directives.body, name);
        lexer.set_allow_comments(self.options.allow_comments);
        let tokens = lexer.tokenize()?;

        debug!("parsing document '{}' ({} tokens)", name, tokens.len());

        let mut cursor = Cursor {
            tokens,
            position: 0,
            body: &directives.body,
            name,
            options: &self.options,
            depth: 0,
        };
        let root = cursor.parse_value()?;

        if !cursor.check(&TokenType::Eof) {
            let token = cursor.current_token()?.clone();
            return Err(TonError::Parse(ParseError::TrailingContent {
                src: cursor.named_source(),
                span: (token.pos_start, token.pos_end - token.pos_start).into(),
                line: token.line,
                column: token.column,
            }));
        }

        Ok(TonDocument {
            root,
            header,
            schemas,
        })
    }
}

// === Directive extraction ===

struct ExtractedDirectives {
    /// The input with every directive line replaced by spaces, so byte
    /// offsets and line numbers in the body are unchanged.
    body: String,
    /// Byte ranges of `#@` line contents (marker excluded).
    header_ranges: Vec<(usize, usize)>,
    /// Byte ranges of `#!` line contents (marker excluded).
    schema_ranges: Vec<(usize, usize)>,
}

fn extract_directives(input: &str) -> ExtractedDirectives {
    let mut body = input.as_bytes().to_vec();
    let mut header_ranges = Vec::new();
    let mut schema_ranges = Vec::new();

    // Directive markers only count at the start of a line in plain body
    // text, so the scan mirrors the lexer's string and comment forms: a
    // `#@`/`#!` inside a triple-quoted string or a comment is content.
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut i = 0;
    let mut at_line_start = true;

    let char_at = |j: usize, chars: &[(usize, char)]| chars.get(j).map(|&(_, c)| c);

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            '\n' => {
                at_line_start = true;
                i += 1;
            }
            c if c.is_whitespace() => {
                i += 1;
            }
            '#' if at_line_start && matches!(char_at(i + 1, &chars), Some('@') | Some('!')) => {
                let is_header = char_at(i + 1, &chars) == Some('@');
                let mut j = i + 2;
                while j < chars.len() && chars[j].1 != '\n' {
                    j += 1;
                }
                let line_end = chars.get(j).map(|&(o, _)| o).unwrap_or(input.len());
                let content_start = offset + 2;
                let mut content_end = line_end;
                if content_end > content_start && input.as_bytes()[content_end - 1] == b'\r' {
                    content_end -= 1;
                }
                if is_header {
                    header_ranges.push((content_start, content_end));
                } else {
                    schema_ranges.push((content_start, content_end));
                }
                for byte in &mut body[offset..content_end] {
                    *byte = b' ';
                }
                i = j;
            }
            '/' if char_at(i + 1, &chars) == Some('/') => {
                at_line_start = false;
                let mut j = i + 2;
                while j < chars.len() && chars[j].1 != '\n' {
                    j += 1;
                }
                i = j;
            }
            '/' if char_at(i + 1, &chars) == Some('*') => {
                at_line_start = false;
                let mut j = i + 2;
                while j < chars.len() {
                    if chars[j].1 == '*' && char_at(j + 1, &chars) == Some('/') {
                        j += 2;
                        break;
                    }
                    j += 1;
                }
                i = j;
            }
            '"' if char_at(i + 1, &chars) == Some('"') && char_at(i + 2, &chars) == Some('"') => {
                at_line_start = false;
                let mut j = i + 3;
                while j < chars.len() {
                    if chars[j].1 == '"'
                        && char_at(j + 1, &chars) == Some('"')
                        && char_at(j + 2, &chars) == Some('"')
                    {
                        j += 3;
                        break;
                    }
                    j += 1;
                }
                i = j;
            }
            quote @ ('"' | '\'' | '`') => {
                at_line_start = false;
                let mut j = i + 1;
                while j < chars.len() {
                    match chars[j].1 {
                        '\\' => j += 2,
                        // Leave the newline for line-start tracking; the
                        // lexer reports the unterminated string itself.
                        c if c == quote || c == '\n' => break,
                        _ => j += 1,
                    }
                }
                if char_at(j, &chars) == Some(quote) {
                    j += 1;
                }
                i = j;
            }
            _ => {
                at_line_start = false;
                i += 1;
            }
        }
    }

    ExtractedDirectives {
        // Directive lines were replaced byte-for-byte with ASCII spaces.
        body: String::from_utf8(body).unwrap_or_else(|_| input.to_string()),
        header_ranges,
        schema_ranges,
    }
}

// === Header directives ===

/// Parses the contents of `#@` lines: comma-separated `key = value` pairs.
fn parse_header(
    source: &str,
    name: &str,
    ranges: &[(usize, usize)],
) -> Result<TonHeader, TonError> {
    let mut attributes = IndexMap::new();

    for &(start, end) in ranges {
        let tokens = Lexer::fragment(source, name, start, end).tokenize()?;
        let mut i = 0;
        loop {
            match &tokens[i].ttype {
                TokenType::Eof => break,
                TokenType::Comma => {
                    i += 1;
                }
                TokenType::Identifier(key) | TokenType::ClassName(key) => {
                    let key = key.strip_prefix('@').unwrap_or(key).to_string();
                    i += 1;
                    if !matches!(tokens[i].ttype, TokenType::Equals) {
                        return Err(header_error(source, name, &tokens[i], "expected '='"));
                    }
                    i += 1;
                    let value = match &tokens[i].ttype {
                        TokenType::String(s) => s.clone(),
                        TokenType::Integer(n) => n.to_string(),
                        TokenType::Float(f) => f.to_string(),
                        TokenType::Boolean(b) => b.to_string(),
                        TokenType::Identifier(s) | TokenType::ClassName(s) => s.clone(),
                        _ => {
                            return Err(header_error(
                                source,
                                name,
                                &tokens[i],
                                "expected a literal value",
                            ))
                        }
                    };
                    i += 1;
                    attributes.insert(key, value);
                }
                _ => {
                    return Err(header_error(
                        source,
                        name,
                        &tokens[i],
                        "expected an attribute name",
                    ))
                }
            }
        }
    }

    Ok(TonHeader { attributes })
}

fn header_error(source: &str, name: &str, token: &Token, message: &str) -> TonError {
    TonError::Parse(ParseError::InvalidHeader {
        src: NamedSource::new(name, source.to_string()),
        span: (token.pos_start, (token.pos_end - token.pos_start).max(1)).into(),
        message: message.to_string(),
        line: token.line,
        column: token.column,
    })
}

// === Schema directives ===

/// Parses the accumulated `#!` lines as the schema DSL:
///
/// ```text
/// directive  = enum_decl | enum_set_decl | class_schema ;
/// enum_decl  = "enum" "(" name ")" "[" name { "," name } "]" ;
/// class_schema = "{" "(" ClassName ")" member { "," member } "}" ;
/// member     = path "=" type [ "(" rule { "," rule } ")" ] ;
/// rule       = ruleName [ "(" literal { "," literal } ")" ] ;
/// ```
fn parse_schema_directives(
    source: &str,
    name: &str,
    ranges: &[(usize, usize)],
) -> Result<TonSchemaCollection, TonError> {
    // Directive lines form one logical stream; intermediate EOFs are
    // dropped so a declaration may span several `#!` lines.
    let mut tokens: Vec<Token> = Vec::new();
    let mut last_eof = None;
    for &(start, end) in ranges {
        for token in Lexer::fragment(source, name, start, end).tokenize()? {
            if matches!(token.ttype, TokenType::Eof) {
                last_eof = Some(token);
            } else {
                tokens.push(token);
            }
        }
    }
    if let Some(eof) = last_eof {
        tokens.push(eof);
    }

    let mut parser = SchemaDirectiveParser {
        tokens,
        position: 0,
        source,
        name,
    };
    parser.parse()
}

struct SchemaDirectiveParser<'a> {
    tokens: Vec<Token>,
    position: usize,
    source: &'a str,
    name: &'a str,
}

impl<'a> SchemaDirectiveParser<'a> {
    fn parse(&mut self) -> Result<TonSchemaCollection, TonError> {
        let mut collection = TonSchemaCollection::new();
        loop {
            match &self.current().ttype {
                TokenType::Eof => return Ok(collection),
                TokenType::Identifier(word) if word == "enum" => {
                    let (name, values) = self.parse_enum_decl()?;
                    collection.add_enum(TonEnumDefinition::new(name, values));
                }
                TokenType::Identifier(word) if word == "enumSet" => {
                    let (name, values) = self.parse_enum_decl()?;
                    collection.add_enum(TonEnumDefinition::new_set(name, values));
                }
                TokenType::LBrace => {
                    collection.add_schema(self.parse_class_schema()?);
                }
                TokenType::Comma => {
                    self.position += 1;
                }
                _ => return Err(self.error("expected 'enum', 'enumSet' or a '{' schema block")),
            }
        }
    }

    fn parse_enum_decl(&mut self) -> Result<(String, Vec<String>), TonError> {
        self.position += 1; // enum / enumSet
        self.expect_lparen()?;
        let name = self.expect_name("an enum name")?;
        self.expect_rparen()?;

        if !matches!(self.current().ttype, TokenType::LBracket) {
            return Err(self.error("expected '['"));
        }
        self.position += 1;

        let mut values = Vec::new();
        loop {
            match &self.current().ttype {
                TokenType::RBracket => {
                    self.position += 1;
                    return Ok((name, values));
                }
                TokenType::Comma => {
                    self.position += 1;
                }
                TokenType::Identifier(v) | TokenType::ClassName(v) => {
                    values.push(v.clone());
                    self.position += 1;
                }
                TokenType::String(v) => {
                    values.push(v.clone());
                    self.position += 1;
                }
                _ => return Err(self.error("expected an enum value or ']'")),
            }
        }
    }

    fn parse_class_schema(&mut self) -> Result<TonSchemaDefinition, TonError> {
        self.position += 1; // {
        self.expect_lparen()?;
        let class_name = self.expect_name("a class name")?;
        self.expect_rparen()?;

        let mut definition = TonSchemaDefinition::new(class_name);
        loop {
            match &self.current().ttype {
                TokenType::RBrace => {
                    self.position += 1;
                    return Ok(definition);
                }
                TokenType::Comma => {
                    self.position += 1;
                }
                TokenType::Eof => return Err(self.error("expected '}'")),
                _ => definition.add_property(self.parse_property_schema()?),
            }
        }
    }

    fn parse_property_schema(&mut self) -> Result<TonPropertySchema, TonError> {
        // Nested paths are written as quoted strings; bare identifiers
        // address top-level properties.
        let path = match &self.current().ttype {
            TokenType::Identifier(p) | TokenType::ClassName(p) | TokenType::String(p) => p.clone(),
            _ => return Err(self.error("expected a property path")),
        };
        self.position += 1;

        if !matches!(self.current().ttype, TokenType::Equals) {
            return Err(self.error("expected '='"));
        }
        self.position += 1;

        let mut property_type = self.expect_name("a type name")?;
        if matches!(self.current().ttype, TokenType::Colon) {
            self.position += 1;
            let qualifier = self.expect_name("a type qualifier")?;
            property_type = format!("{property_type}:{qualifier}");
        }

        let mut schema = TonPropertySchema::new(path, property_type);
        if matches!(self.current().ttype, TokenType::LParen) {
            self.position += 1;
            loop {
                match &self.current().ttype {
                    TokenType::RParen => {
                        self.position += 1;
                        break;
                    }
                    TokenType::Comma => {
                        self.position += 1;
                    }
                    _ => schema.add_validation(self.parse_rule()?),
                }
            }
        }
        Ok(schema)
    }

    fn parse_rule(&mut self) -> Result<TonValidationRule, TonError> {
        let rule_name = match &self.current().ttype {
            TokenType::Identifier(n) => n.clone(),
            _ => return Err(self.error("expected a validation rule name")),
        };
        let Some(rule_type) = ValidationRuleType::from_name(&rule_name) else {
            return Err(self.error(&format!("unknown validation rule '{rule_name}'")));
        };
        self.position += 1;

        let mut parameters = Vec::new();
        if matches!(self.current().ttype, TokenType::LParen) {
            self.position += 1;
            loop {
                match &self.current().ttype {
                    TokenType::RParen => {
                        self.position += 1;
                        break;
                    }
                    TokenType::Comma => {
                        self.position += 1;
                    }
                    TokenType::String(s) => {
                        parameters.push(TonValue::string(s.clone()));
                        self.position += 1;
                    }
                    TokenType::Integer(i) => {
                        parameters.push(TonValue::integer(*i));
                        self.position += 1;
                    }
                    TokenType::Float(f) => {
                        parameters.push(TonValue::float(*f));
                        self.position += 1;
                    }
                    TokenType::Boolean(b) => {
                        parameters.push(TonValue::boolean(*b));
                        self.position += 1;
                    }
                    TokenType::Null => {
                        parameters.push(TonValue::null());
                        self.position += 1;
                    }
                    TokenType::Guid(g) => {
                        parameters.push(TonValue::new(TonValueKind::Guid(
                            Uuid::parse_str(g).unwrap_or(Uuid::nil()),
                        )));
                        self.position += 1;
                    }
                    TokenType::Identifier(s) | TokenType::ClassName(s) => {
                        parameters.push(TonValue::string(s.clone()));
                        self.position += 1;
                    }
                    _ => return Err(self.error("expected a rule argument or ')'")),
                }
            }
        }
        Ok(TonValidationRule::with_parameters(rule_type, parameters))
    }

    fn current(&self) -> &Token {
        // The token stream always ends with EOF.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn expect_lparen(&mut self) -> Result<(), TonError> {
        if matches!(self.current().ttype, TokenType::LParen) {
            self.position += 1;
            Ok(())
        } else {
            Err(self.error("expected '('"))
        }
    }

    fn expect_rparen(&mut self) -> Result<(), TonError> {
        if matches!(self.current().ttype, TokenType::RParen) {
            self.position += 1;
            Ok(())
        } else {
            Err(self.error("expected ')'"))
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<String, TonError> {
        match &self.current().ttype {
            TokenType::Identifier(n) | TokenType::ClassName(n) => {
                let n = n.clone();
                self.position += 1;
                Ok(n)
            }
            _ => Err(self.error(&format!("expected {what}"))),
        }
    }

    fn error(&self, message: &str) -> TonError {
        let token = self.current();
        TonError::Parse(ParseError::InvalidSchema {
            src: NamedSource::new(self.name, self.source.to_string()),
            span: (token.pos_start, (token.pos_end - token.pos_start).max(1)).into(),
            message: message.to_string(),
            line: token.line,
            column: token.column,
        })
    }
}

// === Body parsing ===

struct Cursor<'a> {
    tokens: Vec<Token>,
    position: usize,
    body: &'a str,
    name: &'a str,
    options: &'a TonParseOptions,
    depth: usize,
}

impl<'a> Cursor<'a> {
    /// value = literal | hinted_literal | array | object | typed_object ;
    fn parse_value(&mut self) -> Result<TonValue, TonError> {
        let token = self.current_token()?.clone();
        match &token.ttype {
            TokenType::StringHint => self.parse_hinted_value(TypeHint::String),
            TokenType::NumberHint => self.parse_hinted_value(TypeHint::Number),
            TokenType::BooleanHint => self.parse_hinted_value(TypeHint::Boolean),
            TokenType::DateHint => self.parse_hinted_value(TypeHint::Date),
            TokenType::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(TonValue::string(s))
            }
            TokenType::Integer(i) => {
                let i = *i;
                self.advance();
                Ok(TonValue::integer(i))
            }
            TokenType::Float(f) => {
                let f = *f;
                self.advance();
                Ok(TonValue::float(f))
            }
            TokenType::Boolean(b) => {
                let b = *b;
                self.advance();
                Ok(TonValue::boolean(b))
            }
            TokenType::Null => {
                self.advance();
                Ok(TonValue::null())
            }
            TokenType::Undefined => {
                self.advance();
                Ok(TonValue::undefined())
            }
            TokenType::Guid(g) => {
                let guid = Uuid::parse_str(g).unwrap_or(Uuid::nil());
                self.advance();
                Ok(TonValue::new(TonValueKind::Guid(guid)))
            }
            TokenType::Enum(e) => {
                let e = e.clone();
                self.advance();
                Ok(TonValue::new(TonValueKind::Enum(e)))
            }
            TokenType::EnumSet(values) => {
                let values = values.clone();
                self.advance();
                Ok(TonValue::new(TonValueKind::EnumSet(values)))
            }
            TokenType::LBracket => self.parse_array(),
            TokenType::LBrace => {
                self.advance();
                Ok(TonValue::object(self.parse_object(None, None)?))
            }
            TokenType::ClassName(_) => Ok(TonValue::object(self.parse_typed_object()?)),
            TokenType::LParen => Ok(TonValue::object(self.parse_paren_object()?)),
            _ => Err(self.err_unexpected("a value")),
        }
    }

    /// A hint prefix decorates the literal that follows it. A date hint on a
    /// string that parses as an ISO 8601 instant upgrades it to a date.
    fn parse_hinted_value(&mut self, hint: TypeHint) -> Result<TonValue, TonError> {
        self.advance();
        let mut value = self.parse_value()?;
        if hint == TypeHint::Date {
            if let TonValueKind::String(s) = &value.kind {
                if parse_date_string(s).is_some() {
                    value.kind = TonValueKind::Date(s.clone());
                }
            }
        }
        value.hint = Some(hint);
        Ok(value)
    }

    /// array = "[" [ value { "," value } [ "," ] ] "]" ;
    fn parse_array(&mut self) -> Result<TonValue, TonError> {
        self.enter_nested()?;
        self.advance(); // [
        let mut values = Vec::new();
        loop {
            if self.check(&TokenType::RBracket) {
                self.advance();
                self.depth -= 1;
                return Ok(TonValue::array(values));
            }
            values.push(self.parse_value()?);
            if self.match_token(&TokenType::Comma) {
                if self.check(&TokenType::RBracket) && !self.options.allow_trailing_comma {
                    return Err(self.err_unexpected("a value after ','"));
                }
            } else if !self.check(&TokenType::RBracket) {
                return Err(self.err_unexpected("',' or ']'"));
            }
        }
    }

    /// typed_object = ClassName [ "(" instance_id ")" ] object ;
    fn parse_typed_object(&mut self) -> Result<TonObject, TonError> {
        let class_name = match &self.current_token()?.ttype {
            TokenType::ClassName(n) => n.clone(),
            _ => return Err(self.err_unexpected("a class name")),
        };
        self.advance();

        let instance_id = if self.match_token(&TokenType::LParen) {
            let id = self.parse_instance_id()?;
            self.expect(&TokenType::RParen)?;
            Some(id)
        } else {
            None
        };

        self.expect(&TokenType::LBrace)?;
        self.parse_object(Some(class_name), instance_id)
    }

    /// paren_object = "(" ClassName [ "#" instance_id ] ")" object ;
    fn parse_paren_object(&mut self) -> Result<TonObject, TonError> {
        self.advance(); // (
        let class_name = match &self.current_token()?.ttype {
            TokenType::ClassName(n) | TokenType::Identifier(n) => n.clone(),
            _ => return Err(self.err_unexpected("a class name")),
        };
        self.advance();

        let instance_id = if self.match_token(&TokenType::Hash) {
            Some(self.parse_instance_id()?)
        } else {
            None
        };

        self.expect(&TokenType::RParen)?;
        self.expect(&TokenType::LBrace)?;
        self.parse_object(Some(class_name), instance_id)
    }

    fn parse_instance_id(&mut self) -> Result<u64, TonError> {
        match &self.current_token()?.ttype {
            TokenType::Integer(i) if *i >= 0 => {
                let id = *i as u64;
                self.advance();
                Ok(id)
            }
            _ => Err(self.err_unexpected("a non-negative instance id")),
        }
    }

    /// object = "{" [ member { "," member } [ "," ] ] "}" ;
    /// member = name [ ":" type ] ( "=" | ":" ) value | child_object ;
    ///
    /// The opening brace has already been consumed.
    fn parse_object(
        &mut self,
        class_name: Option<String>,
        instance_id: Option<u64>,
    ) -> Result<TonObject, TonError> {
        self.enter_nested()?;
        let mut object = TonObject {
            class_name,
            instance_id,
            properties: IndexMap::new(),
            children: Vec::new(),
        };

        loop {
            if self.check(&TokenType::RBrace) {
                self.advance();
                self.depth -= 1;
                return Ok(object);
            }
            self.parse_member(&mut object)?;
            if self.match_token(&TokenType::Comma) {
                if self.check(&TokenType::RBrace) && !self.options.allow_trailing_comma {
                    return Err(self.err_unexpected("a member after ','"));
                }
            } else if !self.check(&TokenType::RBrace) {
                return Err(self.err_unexpected("',' or '}'"));
            }
        }
    }

    fn parse_member(&mut self, object: &mut TonObject) -> Result<(), TonError> {
        let token = self.current_token()?.clone();
        match &token.ttype {
            // Positional children: an unnamed object in member position.
            TokenType::LBrace => {
                self.advance();
                let child = self.parse_object(None, None)?;
                object.add_child(child);
                return Ok(());
            }
            TokenType::LParen => {
                let child = self.parse_paren_object()?;
                object.add_child(child);
                return Ok(());
            }
            // A class-name token is a positional typed child unless a
            // separator follows, in which case it names a property.
            TokenType::ClassName(_)
                if !self.peek_is(&TokenType::Equals) && !self.peek_is(&TokenType::Colon) =>
            {
                let child = self.parse_typed_object()?;
                object.add_child(child);
                return Ok(());
            }
            _ => {}
        }

        let (name, name_token) = self.parse_member_name()?;

        let mut annotation = None;
        if self.match_token(&TokenType::Colon) {
            // `name:type = value` declares an inline type annotation;
            // otherwise the colon is the historical member separator and
            // the value starts here.
            annotation = self.try_parse_annotation();
            if annotation.is_some() {
                self.expect(&TokenType::Equals)?;
            }
        } else {
            self.expect(&TokenType::Equals)?;
        }

        let mut value = self.parse_value()?;
        value.annotation = annotation;

        let canonical = name.strip_prefix('@').unwrap_or(&name);
        if self.options.strict_duplicate_keys && object.has(canonical) {
            return Err(TonError::Parse(ParseError::DuplicateProperty {
                src: self.named_source(),
                span: (
                    name_token.pos_start,
                    name_token.pos_end - name_token.pos_start,
                )
                    .into(),
                name: canonical.to_string(),
                line: name_token.line,
                column: name_token.column,
            }));
        }
        object.set(&name, value);
        Ok(())
    }

    fn parse_member_name(&mut self) -> Result<(String, Token), TonError> {
        let token = self.current_token()?.clone();
        let name = match &token.ttype {
            TokenType::Identifier(n) | TokenType::ClassName(n) | TokenType::String(n) => n.clone(),
            // Numeric property names keep their literal source text.
            TokenType::Integer(_) | TokenType::Float(_) => {
                self.body[token.pos_start..token.pos_end].to_string()
            }
            _ => return Err(self.err_unexpected("a property name")),
        };
        self.advance();
        Ok((name, token))
    }

    /// After a `:`, an identifier immediately followed by `=` is an
    /// annotation; anything else begins the value.
    fn try_parse_annotation(&mut self) -> Option<String> {
        let annotation = match &self.current_token().ok()?.ttype {
            TokenType::Identifier(t) | TokenType::ClassName(t) => t.clone(),
            _ => return None,
        };
        if self.peek_is(&TokenType::Equals) {
            self.advance();
            Some(annotation)
        } else {
            None
        }
    }

    fn enter_nested(&mut self) -> Result<(), TonError> {
        self.depth += 1;
        if self.depth > self.options.max_nesting_depth {
            let token = self.current_token()?.clone();
            return Err(TonError::Parse(ParseError::MaxDepthExceeded {
                src: self.named_source(),
                span: (token.pos_start, (token.pos_end - token.pos_start).max(1)).into(),
                limit: self.options.max_nesting_depth,
                line: token.line,
                column: token.column,
            }));
        }
        Ok(())
    }

    // === Token helpers ===

    fn current_token(&self) -> Result<&Token, TonError> {
        self.tokens.get(self.position).ok_or_else(|| {
            let (line, column) = self
                .tokens
                .last()
                .map(|t| (t.line, t.column))
                .unwrap_or((1, 1));
            TonError::Parse(ParseError::UnexpectedEof {
                src: self.named_source(),
                span: self.eof_span(),
                line,
                column,
            })
        })
    }

    /// A span pointing at the last byte of the body, or an empty span for
    /// empty input.
    fn eof_span(&self) -> miette::SourceSpan {
        let len = self.body.len();
        (len.saturating_sub(1), usize::from(len > 0)).into()
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    /// Consumes the current token if it has the same discriminant as
    /// `expected`, otherwise fails with an "expected X" error.
    fn expect(&mut self, expected: &TokenType) -> Result<Token, TonError> {
        let token = self.current_token()?.clone();
        if std::mem::discriminant(&token.ttype) == std::mem::discriminant(expected) {
            self.advance();
            Ok(token)
        } else {
            Err(self.err_unexpected(expected.describe()))
        }
    }

    fn check(&self, expected: &TokenType) -> bool {
        self.tokens
            .get(self.position)
            .is_some_and(|t| std::mem::discriminant(&t.ttype) == std::mem::discriminant(expected))
    }

    fn match_token(&mut self, expected: &TokenType) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn peek_is(&self, expected: &TokenType) -> bool {
        self.tokens
            .get(self.position + 1)
            .is_some_and(|t| std::mem::discriminant(&t.ttype) == std::mem::discriminant(expected))
    }

    fn err_unexpected(&self, expected: &str) -> TonError {
        match self.current_token() {
            Err(e) => e,
            Ok(token) => {
                if matches!(token.ttype, TokenType::Eof) {
                    TonError::Parse(ParseError::UnexpectedEof {
                        src: self.named_source(),
                        span: self.eof_span(),
                        line: token.line,
                        column: token.column,
                    })
                } else {
                    TonError::Parse(ParseError::UnexpectedToken {
                        src: self.named_source(),
                        span: (token.pos_start, (token.pos_end - token.pos_start).max(1)).into(),
                        expected: expected.to_string(),
                        line: token.line,
                        column: token.column,
                    })
                }
            }
        }
    }

    fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name, self.body.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> TonDocument {
        TonParser::new().parse(input).expect("parse should succeed")
    }

    fn parse_err(input: &str) -> TonError {
        TonParser::new()
            .parse(input)
            .expect_err("parse should fail")
    }

    fn root_object(doc: &TonDocument) -> &TonObject {
        doc.as_object().expect("root should be an object")
    }

    #[test]
    fn test_empty_object() {
        let doc = parse("{}");
        assert_eq!(root_object(&doc).len(), 0);
    }

    #[test]
    fn test_both_member_separators() {
        let doc = parse("{ a = 1, b : 2 }");
        let obj = root_object(&doc);
        assert_eq!(obj.get("a").unwrap().to_i64(), 1);
        assert_eq!(obj.get("b").unwrap().to_i64(), 2);
    }

    #[test]
    fn test_annotation() {
        let doc = parse("{ age:int = 30 }");
        let value = root_object(&doc).get("age").unwrap();
        assert_eq!(value.to_i64(), 30);
        assert_eq!(value.annotation.as_deref(), Some("int"));
    }

    #[test]
    fn test_quoted_and_numeric_property_names() {
        let doc = parse("{ 'with space' = 1, 42 = 2, 3.5 = 3 }");
        let obj = root_object(&doc);
        assert_eq!(obj.get("with space").unwrap().to_i64(), 1);
        assert_eq!(obj.get("42").unwrap().to_i64(), 2);
        assert_eq!(obj.get("3.5").unwrap().to_i64(), 3);
    }

    #[test]
    fn test_at_prefixed_name_is_alias() {
        let doc = parse("{ @name = 'alice' }");
        let obj = root_object(&doc);
        assert_eq!(obj.get("name").unwrap().to_text(), "alice");
    }

    #[test]
    fn test_all_scalar_kinds() {
        let doc = parse(
            "{ s = 'x', i = 1, f = 1.5, t = true, n = null, u = undefined, \
             g = 550e8400-e29b-41d4-a716-446655440000, e = |on|, es = |a|b| }",
        );
        let obj = root_object(&doc);
        assert!(matches!(obj.get("s").unwrap().kind, TonValueKind::String(_)));
        assert!(matches!(obj.get("i").unwrap().kind, TonValueKind::Integer(1)));
        assert!(matches!(obj.get("f").unwrap().kind, TonValueKind::Float(_)));
        assert!(matches!(
            obj.get("t").unwrap().kind,
            TonValueKind::Boolean(true)
        ));
        assert!(obj.get("n").unwrap().is_null());
        assert!(obj.get("u").unwrap().is_undefined());
        assert!(matches!(obj.get("g").unwrap().kind, TonValueKind::Guid(_)));
        assert!(matches!(obj.get("e").unwrap().kind, TonValueKind::Enum(_)));
        assert!(matches!(
            obj.get("es").unwrap().kind,
            TonValueKind::EnumSet(_)
        ));
    }

    #[test]
    fn test_hints_are_recorded() {
        let doc = parse("{ a = $'text', b = %42, c = &true }");
        let obj = root_object(&doc);
        assert_eq!(obj.get("a").unwrap().hint, Some(TypeHint::String));
        assert_eq!(obj.get("b").unwrap().hint, Some(TypeHint::Number));
        assert_eq!(obj.get("c").unwrap().hint, Some(TypeHint::Boolean));
    }

    #[test]
    fn test_date_hint_makes_a_date() {
        let doc = parse("{ born = ^'2024-06-15T12:00:00Z' }");
        let value = root_object(&doc).get("born").unwrap();
        assert!(matches!(value.kind, TonValueKind::Date(_)));
        assert_eq!(value.hint, Some(TypeHint::Date));
    }

    #[test]
    fn test_date_hint_on_non_date_stays_string() {
        let doc = parse("{ note = ^'not a date' }");
        let value = root_object(&doc).get("note").unwrap();
        assert!(matches!(value.kind, TonValueKind::String(_)));
        assert_eq!(value.hint, Some(TypeHint::Date));
    }

    #[test]
    fn test_typed_object_forms() {
        for input in [
            "Person { name = 'a' }",
            "(Person) { name = 'a' }",
        ] {
            let doc = parse(input);
            let obj = root_object(&doc);
            assert_eq!(obj.class_name.as_deref(), Some("Person"));
            assert_eq!(obj.instance_id, None);
        }

        for input in [
            "Person(7) { name = 'a' }",
            "(Person#7) { name = 'a' }",
        ] {
            let doc = parse(input);
            let obj = root_object(&doc);
            assert_eq!(obj.class_name.as_deref(), Some("Person"));
            assert_eq!(obj.instance_id, Some(7));
        }
    }

    #[test]
    fn test_positional_children() {
        let doc = parse("{ name = 'root', { a = 1 }, Person { b = 2 }, (Item#3) { c = 3 } }");
        let obj = root_object(&doc);
        assert_eq!(obj.len(), 1);
        assert_eq!(obj.children.len(), 3);
        assert_eq!(obj.children[0].get("a").unwrap().to_i64(), 1);
        assert_eq!(obj.children[1].class_name.as_deref(), Some("Person"));
        assert_eq!(obj.children[2].instance_id, Some(3));
    }

    #[test]
    fn test_nested_typed_property_value() {
        let doc = parse("{ owner = Person { name = 'a' } }");
        let owner = root_object(&doc).get("owner").unwrap().as_object().unwrap();
        assert_eq!(owner.class_name.as_deref(), Some("Person"));
    }

    #[test]
    fn test_arrays() {
        let doc = parse("{ xs = [1, 'two', [true, null]] }");
        let xs = root_object(&doc).get("xs").unwrap().as_array().unwrap();
        assert_eq!(xs.len(), 3);
        assert_eq!(xs[2].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_trailing_comma_rejected_by_default() {
        assert!(matches!(
            parse_err("{ a = 1, }"),
            TonError::Parse(ParseError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_err("{ xs = [1, 2,] }"),
            TonError::Parse(ParseError::UnexpectedToken { .. })
        ));
    }

    #[test]
    fn test_trailing_comma_accepted_when_enabled() {
        let parser = TonParser::with_options(TonParseOptions {
            allow_trailing_comma: true,
            ..TonParseOptions::default()
        });
        let doc = parser.parse("{ a = 1, xs = [1, 2,], }").unwrap();
        assert_eq!(doc.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let doc = parse("{ a = 1, b = 2, a = 3 }");
        let obj = root_object(&doc);
        assert_eq!(obj.get("a").unwrap().to_i64(), 3);
        let keys: Vec<_> = obj.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_keys_strict() {
        let parser = TonParser::with_options(TonParseOptions {
            strict_duplicate_keys: true,
            ..TonParseOptions::default()
        });
        let err = parser.parse("{ a = 1, @a = 2 }").unwrap_err();
        assert!(matches!(
            err,
            TonError::Parse(ParseError::DuplicateProperty { ref name, .. }) if name == "a"
        ));
    }

    #[test]
    fn test_max_depth() {
        let parser = TonParser::with_options(TonParseOptions {
            max_nesting_depth: 3,
            ..TonParseOptions::default()
        });
        assert!(parser.parse("{ a = { b = [1] } }").is_ok());
        let err = parser.parse("{ a = { b = [[1]] } }").unwrap_err();
        assert!(matches!(
            err,
            TonError::Parse(ParseError::MaxDepthExceeded { limit: 3, .. })
        ));
    }

    #[test]
    fn test_trailing_content() {
        let err = parse_err("{ a = 1 } 42");
        assert!(matches!(
            err,
            TonError::Parse(ParseError::TrailingContent { .. })
        ));
    }

    #[test]
    fn test_unexpected_eof() {
        let err = parse_err("{ a = ");
        assert!(matches!(
            err,
            TonError::Parse(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_comments_policy() {
        assert_eq!(root_object(&parse("{ a = 1 // note\n}")).len(), 1);
        let parser = TonParser::with_options(TonParseOptions {
            allow_comments: false,
            ..TonParseOptions::default()
        });
        assert!(parser.parse("{ a = 1 // note\n}").is_err());
    }

    #[test]
    fn test_header_directive() {
        let doc = parse("#@ tonVersion = '1', @schemaFile = 'person.ton'\n{ a = 1 }");
        let header = doc.header.as_ref().unwrap();
        assert_eq!(header.ton_version(), Some("1"));
        assert_eq!(header.schema_file(), Some("person.ton"));
        assert_eq!(root_object(&doc).get("a").unwrap().to_i64(), 1);
    }

    #[test]
    fn test_embedded_enum_schema() {
        let doc = parse("#! enum(Status) [active, inactive]\n{ status = |active| }");
        let def = doc.schemas.enum_definition("Status").unwrap();
        assert_eq!(def.values, vec!["active", "inactive"]);
        assert!(!def.is_enum_set);
    }

    #[test]
    fn test_embedded_class_schema() {
        let input = "\
#! { (Person) name = string(required, minLength(2)), age = int(min(0), max(150)),
#!   'address/city' = string(required), tags = array:string(maxCount(10)) }
{ name = 'Ada', age = 36 }";
        let doc = parse(input);
        let schema = doc.schemas.schema("Person").unwrap();
        let name = schema.property("name").unwrap();
        assert!(name.is_required());
        assert_eq!(
            name.rule(ValidationRuleType::MinLength).unwrap().parameters,
            vec![TonValue::integer(2)]
        );
        assert_eq!(schema.property("address/city").unwrap().property_type, "string");
        assert_eq!(schema.property("tags").unwrap().element_type(), Some("string"));
    }

    #[test]
    fn test_unknown_rule_is_schema_error() {
        let err = parse_err("#! { (P) a = int(wibble) }\n{ a = 1 }");
        assert!(matches!(
            err,
            TonError::Parse(ParseError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_directive_lines_do_not_shift_positions() {
        let err = parse_err("#@ tonVersion = '1'\n{ a = ? }");
        assert_eq!(err.line(), 2);
        assert_eq!(err.column(), 7);
    }

    #[test]
    fn test_directive_markers_inside_strings_are_text() {
        let doc = parse("{ text = \"\"\"\nkeep this\n#! not a schema\n\"\"\" }");
        assert_eq!(
            doc.get_path("text").unwrap().to_text(),
            "keep this\n#! not a schema"
        );
        assert!(doc.schemas.is_empty());
        assert!(doc.header.is_none());
    }

    #[test]
    fn test_directive_markers_inside_comments_are_ignored() {
        let doc = parse("/*\n#! { (P) a = int }\n#@ tonVersion = '9'\n*/\n{ a = 1 }");
        assert!(doc.schemas.is_empty());
        assert!(doc.header.is_none());
        assert_eq!(doc.get_path("a").unwrap().to_i64(), 1);
    }

    #[test]
    fn test_root_array() {
        let doc = parse("[1, 2, 3]");
        assert_eq!(doc.as_array().unwrap().len(), 3);
        assert_eq!(doc.get_path("1").unwrap().to_i64(), 2);
    }

    #[test]
    fn test_root_scalar() {
        let doc = parse("42");
        assert_eq!(doc.root.to_i64(), 42);
    }
}
