use serde::Serialize;

const OPEN_PREFIX: &str = "<info added on ";

/// One timestamped block extracted from a details field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub date: String,
    pub content: String,
}

/// Details text split into its prose and its embedded log blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDetails {
    pub main_text: String,
    pub logs: Vec<LogEntry>,
}

/// Extract `<info added on T>BODY</info added on T>` blocks from details text.
///
/// Scans left to right. An open marker only forms a block when the exact
/// close marker carrying the same timestamp follows it; unmatched markers
/// stay in the main text. Each consumed block is removed from the main text
/// and scanning resumes after it. The remaining text is trimmed.
pub fn parse_embedded_log(details: &str) -> ParsedDetails {
    let mut logs = Vec::new();
    let mut main_text = String::with_capacity(details.len());
    let mut copied_to = 0;
    let mut search_from = 0;

    while let Some(rel) = details[search_from..].find(OPEN_PREFIX) {
        let open_start = search_from + rel;
        match match_block(details, open_start + OPEN_PREFIX.len()) {
            Some((entry, block_end)) => {
                main_text.push_str(&details[copied_to..open_start]);
                logs.push(entry);
                copied_to = block_end;
                search_from = block_end;
            }
            // '<' is one byte, so this stays on a char boundary
            None => search_from = open_start + 1,
        }
    }
    main_text.push_str(&details[copied_to..]);

    ParsedDetails {
        main_text: main_text.trim().to_string(),
        logs,
    }
}

/// Try to read a timestamp at `stamp_start` and find its matching close marker.
/// Returns the entry and the byte offset just past the close marker.
fn match_block(text: &str, stamp_start: usize) -> Option<(LogEntry, usize)> {
    let rest = &text[stamp_start..];
    let stamp_len = rest.find('>')?;
    let stamp = &rest[..stamp_len];
    if stamp.contains(['\n', '\r']) {
        return None;
    }

    let body_start = stamp_start + stamp_len + 1;
    let close = format!("</info added on {}>", stamp);
    let body_len = text[body_start..].find(&close)?;
    let body = &text[body_start..body_start + body_len];

    Some((
        LogEntry {
            date: stamp.to_string(),
            content: body.trim().to_string(),
        },
        body_start + body_len + close.len(),
    ))
}
