use log::debug;

use crate::error::TonError;
use crate::model::TonDocument;
use crate::parser::{TonParseOptions, TonParser};
use crate::schema::TonSchemaCollection;
use crate::serializer::{TonSerializeOptions, TonSerializer};
use crate::validator::{TonValidator, ValidationResult};

/// Parses TON text with default options.
///
/// # Errors
/// Returns a [`TonError`] describing the first lexical or syntactic problem.
pub fn parse(source: &str) -> Result<TonDocument, TonError> {
    TonParser::new().parse(source)
}

/// Parses TON text with explicit [`TonParseOptions`].
///
/// # Errors
/// Returns a [`TonError`] describing the first lexical or syntactic problem.
pub fn parse_with_options(
    source: &str,
    options: TonParseOptions,
) -> Result<TonDocument, TonError> {
    TonParser::with_options(options).parse(source)
}

/// Serializes a document in the default (pretty) style.
#[must_use]
pub fn serialize(document: &TonDocument) -> String {
    TonSerializer::new().serialize(document)
}

/// Serializes a document with explicit [`TonSerializeOptions`].
#[must_use]
pub fn serialize_with_options(document: &TonDocument, options: TonSerializeOptions) -> String {
    TonSerializer::with_options(options).serialize(document)
}

/// Validates a document against an external schema collection.
#[must_use]
pub fn validate(document: &TonDocument, schemas: &TonSchemaCollection) -> ValidationResult {
    TonValidator::new().validate(document, schemas)
}

/// Validates a document against the schemas embedded in its own `#!`
/// directives.
#[must_use]
pub fn validate_embedded(document: &TonDocument) -> ValidationResult {
    debug!(
        "validating against {} embedded schema(s)",
        document.schemas.schemas().count()
    );
    TonValidator::new().validate(document, &document.schemas)
}
