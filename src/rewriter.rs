//! Span-based text edits for applying fixes.
//!
//! Project files are never re-serialised. A fix is a replacement of one byte
//! span captured while the file was parsed, so everything outside the span
//! stays exactly as written. Edits are sorted by position and applied in
//! reverse order to preserve offset validity.

use serde::Serialize;
use std::ops::Range;

/// A single replacement of `span` (byte offsets into the original file).
///
/// `expected` is the text the span held when the file was read; a fix is only
/// applied while the file still contains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub span: Range<usize>,
    pub expected: String,
    pub replacement: String,
}

/// Outcome of checking an edit against the current file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditCheck {
    /// The span still holds `expected`.
    Applicable,
    /// The span already holds `replacement`.
    AlreadyApplied,
    /// The file changed since it was parsed.
    Stale,
}

impl TextEdit {
    pub fn new(span: Range<usize>, expected: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            span,
            expected: expected.into(),
            replacement: replacement.into(),
        }
    }

    pub fn check(&self, content: &str) -> EditCheck {
        let current = content.get(self.span.clone());
        if current == Some(self.expected.as_str()) {
            return EditCheck::Applicable;
        }
        // A removal leaves nothing behind to recognise.
        let applied_end = self.span.start + self.replacement.len();
        if !self.replacement.is_empty()
            && content.get(self.span.start..applied_end) == Some(self.replacement.as_str())
        {
            return EditCheck::AlreadyApplied;
        }
        EditCheck::Stale
    }

    /// True if the two spans share at least one byte, or both insert at the same offset.
    pub fn overlaps(&self, other: &TextEdit) -> bool {
        if self.span.is_empty() || other.span.is_empty() {
            return self.span.start == other.span.start;
        }
        self.span.start < other.span.end && other.span.start < self.span.end
    }
}

/// Applies edits to source content, returning the modified string.
///
/// Sorts edits by start offset (descending) and applies each in turn so
/// earlier replacements don't invalidate later offsets. Edits whose span is
/// out of range are ignored; callers validate with [`TextEdit::check`] first.
pub fn apply_edits(content: &str, edits: &[TextEdit]) -> String {
    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    ordered.sort_by(|a, b| b.span.start.cmp(&a.span.start));

    let mut result = content.to_string();
    for edit in ordered {
        if result.get(edit.span.clone()).is_some() {
            result.replace_range(edit.span.clone(), &edit.replacement);
        }
    }

    result
}

/// Widens `span` to cover its whole line when nothing but whitespace shares it.
///
/// Used when deleting an element, so the removal does not leave an empty
/// indented line behind.
pub fn line_span(source: &str, span: Range<usize>) -> Range<usize> {
    let bytes = source.as_bytes();

    let mut start = span.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    let starts_line = start == 0 || bytes[start - 1] == b'\n';

    let mut end = span.end;
    while end < bytes.len() && matches!(bytes[end], b' ' | b'\t') {
        end += 1;
    }
    let line_end = if source[end..].starts_with("\r\n") {
        Some(end + 2)
    } else if source[end..].starts_with('\n') {
        Some(end + 1)
    } else if end == bytes.len() {
        Some(end)
    } else {
        None
    };

    match (starts_line, line_end) {
        (true, Some(end)) => start..end,
        _ => span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit_for(content: &str, needle: &str, replacement: &str) -> TextEdit {
        let start = content.find(needle).unwrap();
        TextEdit::new(start..start + needle.len(), needle, replacement)
    }

    #[test]
    fn replaces_single_span() {
        let content = "<Project>{AAAA}</Project>";
        let edits = vec![edit_for(content, "{AAAA}", "{BBBB}")];
        assert_eq!(apply_edits(content, &edits), "<Project>{BBBB}</Project>");
    }

    #[test]
    fn replaces_multiple_spans_same_line() {
        let content = "<A>one</A><B>two</B>";
        let edits = vec![
            edit_for(content, "one", "first"),
            edit_for(content, "two", "2"),
        ];
        assert_eq!(apply_edits(content, &edits), "<A>first</A><B>2</B>");
    }

    #[test]
    fn preserves_surrounding_content() {
        let content = "<!-- {OLD} -->\n<Project>{OLD}</Project>\n";
        let start = content.rfind("{OLD}").unwrap();
        let edits = vec![TextEdit::new(start..start + 5, "{OLD}", "{NEW}")];
        assert_eq!(
            apply_edits(content, &edits),
            "<!-- {OLD} -->\n<Project>{NEW}</Project>\n"
        );
    }

    #[test]
    fn empty_edits_return_original() {
        let content = "<Project />";
        assert_eq!(apply_edits(content, &[]), content);
    }

    #[test]
    fn check_detects_stale_and_applied_spans() {
        let content = "<Project>{AAAA}</Project>";
        let edit = edit_for(content, "{AAAA}", "{BBBB}");
        assert_eq!(edit.check(content), EditCheck::Applicable);

        let fixed = apply_edits(content, std::slice::from_ref(&edit));
        assert_eq!(edit.check(&fixed), EditCheck::AlreadyApplied);

        assert_eq!(edit.check("<Project>{CCCC}</Project>"), EditCheck::Stale);
        assert_eq!(edit.check("<P/>"), EditCheck::Stale);
    }

    #[test]
    fn overlapping_spans() {
        let a = TextEdit::new(0..5, "", "");
        let b = TextEdit::new(4..8, "", "");
        let c = TextEdit::new(5..8, "", "");
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn line_span_covers_standalone_element() {
        let source = "<ItemGroup>\n    <ClCompile Include=\"a.cpp\" />\n</ItemGroup>";
        let start = source.find("<ClCompile").unwrap();
        let end = source.find("/>").unwrap() + 2;
        let widened = line_span(source, start..end);
        let mut removed = source.to_string();
        removed.replace_range(widened, "");
        assert_eq!(removed, "<ItemGroup>\n</ItemGroup>");
    }

    #[test]
    fn line_span_keeps_shared_line_untouched() {
        let source = "<ItemGroup><ClCompile Include=\"a.cpp\" /></ItemGroup>";
        let start = source.find("<ClCompile").unwrap();
        let end = source.find("/>").unwrap() + 2;
        assert_eq!(line_span(source, start..end), start..end);
    }

    #[test]
    fn line_span_handles_crlf() {
        let source = "<ItemGroup>\r\n  <None Include=\"x\" />\r\n</ItemGroup>";
        let start = source.find("<None").unwrap();
        let end = source.find("/>").unwrap() + 2;
        let widened = line_span(source, start..end);
        assert_eq!(&source[widened], "  <None Include=\"x\" />\r\n");
    }
}
