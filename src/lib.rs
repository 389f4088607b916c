//! TON: a human-writable, JSON-superset structured-data notation.
//!
//! The pipeline is text → [`Lexer`] → tokens → [`TonParser`] →
//! [`TonDocument`] → ([`TonSerializer`] → text | [`TonValidator`] →
//! [`ValidationResult`]). Everything is synchronous and pure: string in,
//! string or result out.
//!
//! ```
//! use ton_core::{parse, serialize_with_options, TonSerializeOptions};
//!
//! let doc = parse("{ name = 'Ada', age = 36 }").unwrap();
//! assert_eq!(doc.get_path("age").unwrap().to_i64(), 36);
//!
//! let compact = serialize_with_options(&doc, TonSerializeOptions::compact());
//! assert_eq!(compact, "{name = 'Ada', age = 36}");
//! ```

pub mod api;
pub mod error;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod schema;
pub mod serializer;
pub mod utils;
pub mod validator;
mod serialization;

pub use api::{
    parse, parse_with_options, serialize, serialize_with_options, validate, validate_embedded,
};
pub use error::{LexError, ParseError, TonError};
pub use lexer::{Lexer, Token, TokenType};
pub use model::{TonDocument, TonHeader, TonObject, TonValue, TonValueKind, TypeHint};
pub use parser::{TonParseOptions, TonParser};
pub use schema::{
    TonEnumDefinition, TonPropertySchema, TonSchemaCollection, TonSchemaDefinition,
    TonValidationRule, ValidationRuleType,
};
pub use serialization::Value;
pub use serializer::{TonFormatStyle, TonSerializeOptions, TonSerializer};
pub use validator::{TonValidator, ValidationError, ValidationResult};
