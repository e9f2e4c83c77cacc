use crate::model::document::Document;

/// Serialize a document back to pretty-printed JSON.
/// Tag order is master first, then the remaining tags in document order.
pub fn serialize_document(doc: &Document) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(doc)
}
