use crate::error::{LexError, TonError};
use crate::utils::get_line_and_column;
use miette::NamedSource;

/// Represents the different kinds of tokens that the lexer can produce.
/// Each token is a meaningful unit of the TON language syntax.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    /// Represents the end of the input.
    Eof,

    // == Literals ==
    /// A string literal in any of the four quote forms, already unescaped
    /// (and dedented, for the triple-quoted form).
    String(String),
    /// An integer literal, including hex (`0x`) and binary (`0b`) forms.
    Integer(i64),
    /// A floating point literal (decimal point or exponent present).
    Float(f64),
    /// `true` or `false`.
    Boolean(bool),
    /// The `null` keyword.
    Null,
    /// The `undefined` keyword, distinct from `null`.
    Undefined,
    /// A GUID literal in the 8-4-4-4-12 form, stored canonically lowercased.
    Guid(String),
    /// A single pipe-delimited enum value: `|active|`.
    Enum(String),
    /// A multi-valued enum set: `|read|write|execute|`. `||` is the empty set.
    EnumSet(Vec<String>),

    // == Identifiers ==
    /// An identifier, used for property names and type names. May begin with
    /// `@` (the property-name alias prefix).
    Identifier(String),
    /// An identifier whose first letter is capitalized, usable as a class
    /// name in typed-object syntax.
    ClassName(String),

    // == Punctuation ==
    /// Left Brace: `{`
    LBrace,
    /// Right Brace: `}`
    RBrace,
    /// Left Bracket: `[`
    LBracket,
    /// Right Bracket: `]`
    RBracket,
    /// Left Parenthesis: `(`
    LParen,
    /// Right Parenthesis: `)`
    RParen,
    /// Colon: `:` (type annotations, historical member separator)
    Colon,
    /// Comma: `,`
    Comma,
    /// Equals: `=` (member separator)
    Equals,
    /// Hash: `#` (instance ids in `(Class#N)` headers)
    Hash,

    // == Type hint prefixes ==
    /// `$` - string hint
    StringHint,
    /// `%` - number hint
    NumberHint,
    /// `&` - boolean hint
    BooleanHint,
    /// `^` - date hint
    DateHint,
}

impl TokenType {
    /// Short human-readable description used in "expected X, found Y" errors.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenType::Eof => "end of file",
            TokenType::String(_) => "a string",
            TokenType::Integer(_) => "an integer",
            TokenType::Float(_) => "a float",
            TokenType::Boolean(_) => "a boolean",
            TokenType::Null => "'null'",
            TokenType::Undefined => "'undefined'",
            TokenType::Guid(_) => "a GUID",
            TokenType::Enum(_) => "an enum value",
            TokenType::EnumSet(_) => "an enum set",
            TokenType::Identifier(_) => "an identifier",
            TokenType::ClassName(_) => "a class name",
            TokenType::LBrace => "'{'",
            TokenType::RBrace => "'}'",
            TokenType::LBracket => "'['",
            TokenType::RBracket => "']'",
            TokenType::LParen => "'('",
            TokenType::RParen => "')'",
            TokenType::Colon => "':'",
            TokenType::Comma => "','",
            TokenType::Equals => "'='",
            TokenType::Hash => "'#'",
            TokenType::StringHint => "'$'",
            TokenType::NumberHint => "'%'",
            TokenType::BooleanHint => "'&'",
            TokenType::DateHint => "'^'",
        }
    }
}

/// A token with its type, byte span and 1-based source position.
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    pub pos_start: usize,
    pub pos_end: usize,
    pub line: usize,
    pub column: usize,
}

/// Saved cursor state for speculative scans (the GUID lookahead). Restoring
/// a checkpoint must leave the lexer exactly where it was.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    position: usize,
    offset: usize,
    line: usize,
    column: usize,
}

pub struct Lexer<'a> {
    /// Full original source, used for error reporting.
    report_source: &'a str,
    name: String,
    chars: Vec<char>,
    /// Index into `chars`.
    position: usize,
    /// Byte offset into `report_source` of the current character.
    offset: usize,
    line: usize,
    column: usize,
    allow_comments: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_name(input, "source.ton")
    }

    pub fn with_name(input: &'a str, name: &str) -> Self {
        Self {
            report_source: input,
            name: name.to_string(),
            chars: input.chars().collect(),
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            allow_comments: true,
        }
    }

    /// Lexes a byte range of `source` (used for `#@`/`#!` directive
    /// fragments) while reporting positions relative to the full document.
    pub fn fragment(source: &'a str, name: &str, start: usize, end: usize) -> Self {
        let (line, column) = get_line_and_column(source, start);
        Self {
            report_source: source,
            name: name.to_string(),
            chars: source[start..end].chars().collect(),
            position: 0,
            offset: start,
            line,
            column,
            allow_comments: true,
        }
    }

    pub fn set_allow_comments(&mut self, allow: bool) {
        self.allow_comments = allow;
    }

    /// Tokenizes the input, failing on the first unrecoverable issue.
    /// Whitespace and comments never produce tokens.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, TonError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            if self.is_at_end() {
                tokens.push(Token {
                    ttype: TokenType::Eof,
                    pos_start: self.offset,
                    pos_end: self.offset,
                    line: self.line,
                    column: self.column,
                });
                return Ok(tokens);
            }
            tokens.push(self.next_token()?);
        }
    }

    fn next_token(&mut self) -> Result<Token, TonError> {
        let start = self.checkpoint();
        let ch = self.peek().unwrap_or('\0');

        let ttype = match ch {
            '{' => self.consume_as(TokenType::LBrace),
            '}' => self.consume_as(TokenType::RBrace),
            '[' => self.consume_as(TokenType::LBracket),
            ']' => self.consume_as(TokenType::RBracket),
            '(' => self.consume_as(TokenType::LParen),
            ')' => self.consume_as(TokenType::RParen),
            ':' => self.consume_as(TokenType::Colon),
            ',' => self.consume_as(TokenType::Comma),
            '=' => self.consume_as(TokenType::Equals),
            '#' => self.consume_as(TokenType::Hash),
            '$' => self.consume_as(TokenType::StringHint),
            '%' => self.consume_as(TokenType::NumberHint),
            '&' => self.consume_as(TokenType::BooleanHint),
            '^' => self.consume_as(TokenType::DateHint),
            '|' => self.scan_enum(&start)?,
            '"' => {
                if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
                    self.scan_triple_quoted_string(&start)?
                } else {
                    self.scan_string('"', &start)?
                }
            }
            '\'' => self.scan_string('\'', &start)?,
            '`' => self.scan_string('`', &start)?,
            c if is_hex_digit(c) || c.is_ascii_digit() || c == '-' || is_ident_start(c) => {
                // The GUID lookahead runs before number/identifier scanning
                // and must not consume input on failure.
                if is_hex_digit(c) {
                    if let Some(guid) = self.try_scan_guid() {
                        return Ok(self.finish(TokenType::Guid(guid), &start));
                    }
                }
                if c.is_ascii_digit()
                    || (c == '-' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()))
                {
                    self.scan_number(&start)?
                } else if is_ident_start(c) {
                    self.scan_identifier_or_keyword()
                } else {
                    return Err(self.err_unexpected_char(c, &start));
                }
            }
            c => return Err(self.err_unexpected_char(c, &start)),
        };

        Ok(self.finish(ttype, &start))
    }

    // === Scanners ===

    fn scan_string(&mut self, quote: char, start: &Checkpoint) -> Result<TokenType, TonError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err_unterminated_string(start)),
                // All three single-line forms terminate only on their own
                // delimiter; an embedded newline is an error.
                Some('\n') => return Err(self.err_unterminated_string(start)),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(TokenType::String(value));
                }
                Some('\\') => {
                    self.advance();
                    self.scan_escape_sequence(&mut value, start)?;
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_escape_sequence(&mut self, out: &mut String, start: &Checkpoint) -> Result<(), TonError> {
        let Some(c) = self.peek() else {
            return Err(self.err_unterminated_string(start));
        };
        self.advance();
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '`' => out.push('`'),
            'u' => {
                // \uXXXX; anything malformed falls back to a literal 'u',
                // matching the pass-through rule for unknown escapes.
                let mut code = 0u32;
                let mut ok = true;
                for i in 0..4 {
                    match self.peek_at(i).and_then(|d| d.to_digit(16)) {
                        Some(d) => code = code * 16 + d,
                        None => {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    for _ in 0..4 {
                        self.advance();
                    }
                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                } else {
                    out.push('u');
                }
            }
            // Unknown escapes pass the escaped character through literally.
            other => out.push(other),
        }
        Ok(())
    }

    fn scan_triple_quoted_string(&mut self, start: &Checkpoint) -> Result<TokenType, TonError> {
        self.advance();
        self.advance();
        self.advance();
        let mut value = String::new();
        loop {
            if self.peek() == Some('"')
                && self.peek_at(1) == Some('"')
                && self.peek_at(2) == Some('"')
            {
                self.advance();
                self.advance();
                self.advance();
                return Ok(TokenType::String(process_multiline_string(&value)));
            }
            match self.peek() {
                None => return Err(self.err_unterminated_string(start)),
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self, start: &Checkpoint) -> Result<TokenType, TonError> {
        let negative = if self.peek() == Some('-') {
            self.advance();
            true
        } else {
            false
        };

        if self.peek() == Some('0') {
            match self.peek_at(1) {
                Some('x') | Some('X') => return self.scan_radix_number(16, negative, start),
                Some('b') | Some('B') => return self.scan_radix_number(2, negative, start),
                _ => {}
            }
        }

        let mut text = String::new();
        if negative {
            text.push('-');
        }
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push('e');
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.advance();
            }
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if is_float {
            match text.parse::<f64>() {
                Ok(f) => Ok(TokenType::Float(f)),
                Err(_) => Err(self.err_invalid_number(text, start)),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok(TokenType::Integer(i)),
                // Out-of-range decimal integers degrade to float.
                Err(_) => match text.parse::<f64>() {
                    Ok(f) => Ok(TokenType::Float(f)),
                    Err(_) => Err(self.err_invalid_number(text, start)),
                },
            }
        }
    }

    fn scan_radix_number(
        &mut self,
        radix: u32,
        negative: bool,
        start: &Checkpoint,
    ) -> Result<TokenType, TonError> {
        self.advance(); // 0
        self.advance(); // x or b
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_digit(radix) {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            let prefix = if radix == 16 { "0x" } else { "0b" };
            return Err(self.err_invalid_number(prefix.to_string(), start));
        }
        match i64::from_str_radix(&digits, radix) {
            Ok(magnitude) => Ok(TokenType::Integer(if negative {
                -magnitude
            } else {
                magnitude
            })),
            Err(_) => Err(self.err_invalid_number(digits, start)),
        }
    }

    fn scan_enum(&mut self, start: &Checkpoint) -> Result<TokenType, TonError> {
        self.advance(); // opening |

        // `||` is the empty enum set.
        if self.peek() == Some('|') {
            self.advance();
            return Ok(TokenType::EnumSet(Vec::new()));
        }

        let mut values: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut closed = false;

        while let Some(c) = self.peek() {
            if c == '|' {
                if !current.is_empty() {
                    values.push(std::mem::take(&mut current));
                }
                self.advance();
                // A closing pipe is one not followed by another symbol.
                if !self.peek().is_some_and(|n| n.is_ascii_alphabetic() || n == '_') {
                    closed = true;
                    break;
                }
            } else if c.is_ascii_alphanumeric() || c == '_' {
                current.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // Running out of input (or hitting a non-symbol character) before a
        // closing pipe leaves the literal unterminated.
        if !closed || values.is_empty() {
            return Err(TonError::Lex(LexError::InvalidEnum {
                src: self.named_source(),
                span: (start.offset, self.offset - start.offset).into(),
                line: start.line,
                column: start.column,
            }));
        }

        match values.len() {
            1 => Ok(TokenType::Enum(values.remove(0))),
            _ => Ok(TokenType::EnumSet(values)),
        }
    }

    /// Speculatively scans the fixed 8-4-4-4-12 hex pattern. On any mismatch
    /// the cursor is restored to the exact pre-scan position.
    fn try_scan_guid(&mut self) -> Option<String> {
        const PARTS: [usize; 5] = [8, 4, 4, 4, 12];
        let checkpoint = self.checkpoint();
        let mut guid = String::with_capacity(36);

        for (i, part_len) in PARTS.iter().enumerate() {
            if i > 0 {
                if self.peek() != Some('-') {
                    self.rewind(checkpoint);
                    return None;
                }
                guid.push('-');
                self.advance();
            }
            for _ in 0..*part_len {
                match self.peek() {
                    Some(c) if is_hex_digit(c) => {
                        guid.push(c.to_ascii_lowercase());
                        self.advance();
                    }
                    _ => {
                        self.rewind(checkpoint);
                        return None;
                    }
                }
            }
        }
        Some(guid)
    }

    fn scan_identifier_or_keyword(&mut self) -> TokenType {
        let mut ident = String::new();
        if self.peek() == Some('@') {
            ident.push('@');
            self.advance();
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "true" => TokenType::Boolean(true),
            "false" => TokenType::Boolean(false),
            "null" => TokenType::Null,
            "undefined" => TokenType::Undefined,
            _ => {
                if ident.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                    TokenType::ClassName(ident)
                } else {
                    TokenType::Identifier(ident)
                }
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), TonError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    let start = self.checkpoint();
                    if !self.allow_comments {
                        return Err(self.err_comments_disabled(&start));
                    }
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.checkpoint();
                    if !self.allow_comments {
                        return Err(self.err_comments_disabled(&start));
                    }
                    self.advance();
                    self.advance();
                    loop {
                        if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.peek().is_none() {
                            return Err(TonError::Lex(LexError::UnterminatedBlockComment {
                                src: self.named_source(),
                                span: (start.offset, 2).into(),
                                line: start.line,
                                column: start.column,
                            }));
                        }
                        self.advance();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // === Cursor helpers ===

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.position,
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        self.position = checkpoint.position;
        self.offset = checkpoint.offset;
        self.line = checkpoint.line;
        self.column = checkpoint.column;
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.position).copied()?;
        self.position += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, lookahead: usize) -> Option<char> {
        self.chars.get(self.position + lookahead).copied()
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.chars.len()
    }

    fn consume_as(&mut self, ttype: TokenType) -> TokenType {
        self.advance();
        ttype
    }

    fn finish(&self, ttype: TokenType, start: &Checkpoint) -> Token {
        Token {
            ttype,
            pos_start: start.offset,
            pos_end: self.offset,
            line: start.line,
            column: start.column,
        }
    }

    // === Error constructors ===

    fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.report_source.to_string())
    }

    fn err_unterminated_string(&self, start: &Checkpoint) -> TonError {
        TonError::Lex(LexError::UnterminatedString {
            src: self.named_source(),
            span: (start.offset, self.offset.saturating_sub(start.offset).max(1)).into(),
            line: start.line,
            column: start.column,
        })
    }

    fn err_unexpected_char(&self, found: char, start: &Checkpoint) -> TonError {
        TonError::Lex(LexError::UnexpectedCharacter {
            src: self.named_source(),
            span: (start.offset, found.len_utf8()).into(),
            found,
            line: start.line,
            column: start.column,
        })
    }

    fn err_invalid_number(&self, text: String, start: &Checkpoint) -> TonError {
        TonError::Lex(LexError::InvalidNumber {
            src: self.named_source(),
            span: (start.offset, self.offset.saturating_sub(start.offset).max(1)).into(),
            text,
            line: start.line,
            column: start.column,
        })
    }

    fn err_comments_disabled(&self, start: &Checkpoint) -> TonError {
        TonError::Lex(LexError::CommentsDisabled {
            src: self.named_source(),
            span: (start.offset, 2).into(),
            line: start.line,
            column: start.column,
        })
    }
}

fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '@'
}

/// Dedents a triple-quoted string: drops leading/trailing all-whitespace
/// lines, then strips the minimum leading whitespace common to the
/// remaining non-blank lines.
fn process_multiline_string(value: &str) -> String {
    let mut lines: Vec<&str> = value.split('\n').collect();

    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return String::new();
    }

    let min_indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| {
            if l.chars().count() > min_indent {
                l.chars().skip(min_indent).collect::<String>()
            } else {
                String::new()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
