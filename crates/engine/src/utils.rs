//! Small helpers shared across the engine: source positions, dotted names
//! and path normalization.

use crate::error::SourceLocation;

/// Computes the 1-based (line, column) of a byte offset inside `content`.
pub fn source_location(content: &str, pos: usize) -> SourceLocation {
    let upto = &content.as_bytes()[..pos.min(content.len())];
    let line = upto.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = match upto.iter().rposition(|&b| b == b'\n') {
        Some(last_newline) => upto.len() - last_newline,
        None => upto.len() + 1,
    };
    SourceLocation { line, column }
}

/// Splits a dotted name into its non-empty parts.
pub fn split_dotted(name: &str) -> Vec<String> {
    name.split('.')
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Converts a dotted name (`a.b.c`) to its JSON-pointer form (`/a/b/c`).
pub fn dotted_to_pointer(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    for part in name.split('.') {
        result.push('/');
        result.push_str(part);
    }
    result
}

/// Normalizes directory separators in a filename to the host convention.
/// Templates may spell paths with backslashes regardless of platform.
pub fn normalize_separators(path: &str) -> String {
    if std::path::MAIN_SEPARATOR == '/' {
        path.replace('\\', "/")
    } else {
        path.replace('/', "\\")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_on_first_line() {
        let loc = source_location("hello world", 6);
        assert_eq!(loc, SourceLocation { line: 1, column: 7 });
    }

    #[test]
    fn location_after_newlines() {
        let content = "a\nbb\nccc";
        assert_eq!(
            source_location(content, 5),
            SourceLocation { line: 3, column: 1 }
        );
        assert_eq!(
            source_location(content, 7),
            SourceLocation { line: 3, column: 3 }
        );
    }

    #[test]
    fn location_clamps_past_end() {
        let loc = source_location("ab", 100);
        assert_eq!(loc, SourceLocation { line: 1, column: 3 });
    }

    #[test]
    fn dotted_pointer_form() {
        assert_eq!(dotted_to_pointer("a.b.c"), "/a/b/c");
        assert_eq!(dotted_to_pointer("tables"), "/tables");
    }

    #[test]
    fn split_skips_empty_parts() {
        assert_eq!(split_dotted("a..b"), vec!["a", "b"]);
        assert!(split_dotted("").is_empty());
    }
}
