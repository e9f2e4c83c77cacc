pub mod document_parser;
pub mod document_serializer;
pub mod log_parser;

pub use document_parser::{DocumentError, document_from_value, parse_document};
pub use document_serializer::serialize_document;
pub use log_parser::{LogEntry, ParsedDetails, parse_embedded_log};
