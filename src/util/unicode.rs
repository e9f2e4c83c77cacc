use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ELLIPSIS: char = '\u{2026}';

/// Width of `s` in terminal cells
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Shorten `s` to at most `max_cells` cells, ending in `…` when cut.
/// Never splits a grapheme cluster.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 0 {
        return String::new();
    }

    let budget = max_cells - 1;
    let mut used = 0;
    let mut out = String::new();
    for g in s.graphemes(true) {
        let w = UnicodeWidthStr::width(g);
        if used + w > budget {
            break;
        }
        used += w;
        out.push_str(g);
    }
    out.push(ELLIPSIS);
    out
}

/// Truncate or right-pad `s` so it occupies exactly `cells` cells.
/// A wide character that would straddle the edge is replaced by padding.
pub fn fit_to_width(s: &str, cells: usize) -> String {
    let mut out = truncate_to_width(s, cells);
    let width = display_width(&out);
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(width)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths() {
        assert_eq!(display_width("hello"), 5);
        assert_eq!(display_width("你好"), 4);
        assert_eq!(display_width("cafe\u{0301}"), 4);
        assert_eq!(display_width(""), 0);
    }

    #[test]
    fn truncate_leaves_short_strings() {
        assert_eq!(truncate_to_width("hi", 10), "hi");
        assert_eq!(truncate_to_width("hello", 5), "hello");
    }

    #[test]
    fn truncate_cuts_with_ellipsis() {
        assert_eq!(truncate_to_width("hello world", 8), "hello w\u{2026}");
        assert_eq!(truncate_to_width("hello", 1), "\u{2026}");
        assert_eq!(truncate_to_width("hello", 0), "");
    }

    #[test]
    fn truncate_respects_wide_chars() {
        assert_eq!(truncate_to_width("你好世界", 5), "你好\u{2026}");
        let cut = truncate_to_width("你好世界", 4);
        assert_eq!(cut, "你\u{2026}");
        assert!(display_width(&cut) <= 4);
    }

    #[test]
    fn fit_pads_and_cuts() {
        assert_eq!(fit_to_width("ab", 4), "ab  ");
        assert_eq!(fit_to_width("abcdef", 4), "abc\u{2026}");
        assert_eq!(fit_to_width("你好世界", 4), "你\u{2026} ");
    }
}
