use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Top-level error type for the TON pipeline.
///
/// Lexing and parsing failures abort the current call and carry the 1-based
/// line/column of the offending position. Validation problems are *not*
/// errors in this sense; they are accumulated in a
/// [`ValidationResult`](crate::validator::ValidationResult).
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum TonError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
}

impl TonError {
    /// 1-based line of the offending position.
    pub fn line(&self) -> usize {
        match self {
            TonError::Lex(e) => e.position().0,
            TonError::Parse(e) => e.position().0,
        }
    }

    /// 1-based column of the offending position.
    pub fn column(&self) -> usize {
        match self {
            TonError::Lex(e) => e.position().1,
            TonError::Parse(e) => e.position().1,
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum LexError {
    #[error("Unterminated string")]
    #[diagnostic(
        code(lexer::unterminated_string),
        help("String literals must be closed on the same line; use \"\"\"...\"\"\" for multi-line text.")
    )]
    UnterminatedString {
        #[source_code]
        src: NamedSource<String>,
        #[label("String starts here and never ends")]
        span: SourceSpan,
        line: usize,
        column: usize,
    },

    #[error("Unterminated block comment")]
    #[diagnostic(code(lexer::unterminated_block_comment))]
    UnterminatedBlockComment {
        #[source_code]
        src: NamedSource<String>,
        #[label("Comment starts here and never ends")]
        span: SourceSpan,
        line: usize,
        column: usize,
    },

    #[error("Unexpected character '{found}'")]
    #[diagnostic(code(lexer::unexpected_character))]
    UnexpectedCharacter {
        #[source_code]
        src: NamedSource<String>,
        #[label("This character is not valid here")]
        span: SourceSpan,
        found: char,
        line: usize,
        column: usize,
    },

    #[error("Invalid enum value")]
    #[diagnostic(
        code(lexer::invalid_enum),
        help("Enum values are written |name| or |a|b|c| for sets.")
    )]
    InvalidEnum {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected at least one enum symbol")]
        span: SourceSpan,
        line: usize,
        column: usize,
    },

    #[error("Invalid number literal '{text}'")]
    #[diagnostic(code(lexer::invalid_number))]
    InvalidNumber {
        #[source_code]
        src: NamedSource<String>,
        #[label("Could not be parsed as a number")]
        span: SourceSpan,
        text: String,
        line: usize,
        column: usize,
    },

    #[error("Comments are not allowed")]
    #[diagnostic(code(lexer::comments_disabled))]
    CommentsDisabled {
        #[source_code]
        src: NamedSource<String>,
        #[label("Comment found here")]
        span: SourceSpan,
        line: usize,
        column: usize,
    },
}

impl LexError {
    pub fn position(&self) -> (usize, usize) {
        match self {
            LexError::UnterminatedString { line, column, .. }
            | LexError::UnterminatedBlockComment { line, column, .. }
            | LexError::UnexpectedCharacter { line, column, .. }
            | LexError::InvalidEnum { line, column, .. }
            | LexError::InvalidNumber { line, column, .. }
            | LexError::CommentsDisabled { line, column, .. } => (*line, *column),
        }
    }
}

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum ParseError {
    #[error("Unexpected token")]
    #[diagnostic(
        code(parser::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
        line: usize,
        column: usize,
    },

    #[error("Unexpected end of file")]
    #[diagnostic(
        code(parser::unexpected_eof),
        help("The document ended unexpectedly. The parser expected more tokens.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("Document ended unexpectedly here")]
        span: SourceSpan,
        line: usize,
        column: usize,
    },

    #[error("Unexpected content after parsing")]
    #[diagnostic(code(parser::trailing_content))]
    TrailingContent {
        #[source_code]
        src: NamedSource<String>,
        #[label("A complete value was already parsed before this")]
        span: SourceSpan,
        line: usize,
        column: usize,
    },

    #[error("Maximum nesting depth exceeded (limit {limit})")]
    #[diagnostic(
        code(parser::max_depth_exceeded),
        help("Raise `max_nesting_depth` in TonParseOptions if this document is legitimately this deep.")
    )]
    MaxDepthExceeded {
        #[source_code]
        src: NamedSource<String>,
        #[label("Nesting exceeds the configured limit here")]
        span: SourceSpan,
        limit: usize,
        line: usize,
        column: usize,
    },

    #[error("Duplicate property '{name}'")]
    #[diagnostic(
        code(parser::duplicate_property),
        help("Disable `strict_duplicate_keys` to let the last occurrence win instead.")
    )]
    DuplicateProperty {
        #[source_code]
        src: NamedSource<String>,
        #[label("This property was already declared in the same object")]
        span: SourceSpan,
        name: String,
        line: usize,
        column: usize,
    },

    #[error("Invalid header directive: {message}")]
    #[diagnostic(code(parser::invalid_header))]
    InvalidHeader {
        #[source_code]
        src: NamedSource<String>,
        #[label("In this header directive")]
        span: SourceSpan,
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Invalid schema directive: {message}")]
    #[diagnostic(code(parser::invalid_schema))]
    InvalidSchema {
        #[source_code]
        src: NamedSource<String>,
        #[label("In this schema directive")]
        span: SourceSpan,
        message: String,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn position(&self) -> (usize, usize) {
        match self {
            ParseError::UnexpectedToken { line, column, .. }
            | ParseError::UnexpectedEof { line, column, .. }
            | ParseError::TrailingContent { line, column, .. }
            | ParseError::MaxDepthExceeded { line, column, .. }
            | ParseError::DuplicateProperty { line, column, .. }
            | ParseError::InvalidHeader { line, column, .. }
            | ParseError::InvalidSchema { line, column, .. } => (*line, *column),
        }
    }
}
