//! Browser UI module preparation
//!
//! An extension's optional `index.js` is shared between the host runtime and
//! the browser. Imports of host-only modules (`node:*`) cannot load in a
//! browser, so the leading import block is rewritten with those imports
//! commented out before serving.

/// Prefix marking a commented-out import
pub const EXCLUDED_MARK: &str = "// excluded: ";

/// Comment out `node:` imports in the leading import block
pub fn strip_host_imports(source: &str) -> String {
    exclude_imports(source, |specifier| specifier.starts_with("node:"))
}

/// Comment out the leading static imports whose module specifier matches.
///
/// Only the head of the file is scanned: whitespace, comments and `import`
/// statements are walked over, and the scan ends at the first other token.
/// Each line of an excluded statement up to its closing quote gets
/// [`EXCLUDED_MARK`] prepended. Specifiers are matched by quotes only, string
/// names inside import clauses are not supported.
pub fn exclude_imports(source: &str, exclude: impl Fn(&str) -> bool) -> String {
    let mut out = String::with_capacity(source.len());
    let mut pos = 0;

    while pos < source.len() {
        let rest = &source[pos..];

        if rest.starts_with("//") {
            let end = rest.find('\n').map_or(rest.len(), |i| i + 1);
            out.push_str(&rest[..end]);
            pos += end;
        } else if rest.starts_with("/*") {
            let end = rest.find("*/").map_or(rest.len(), |i| i + 2);
            out.push_str(&rest[..end]);
            pos += end;
        } else if rest.starts_with(|c: char| c.is_whitespace()) {
            let width = rest.chars().next().map_or(1, char::len_utf8);
            out.push_str(&rest[..width]);
            pos += width;
        } else if is_import_statement(rest) {
            let Some((specifier, end)) = import_specifier(rest) else {
                break;
            };
            let statement = &rest[..end];
            if exclude(specifier) {
                out.push_str(EXCLUDED_MARK);
                out.push_str(&statement.replace('\n', &format!("\n{}", EXCLUDED_MARK)));
            } else {
                out.push_str(statement);
            }
            // The rest of the line (usually `;`) stays with the statement
            let line_end = rest[end..].find('\n').map_or(rest.len(), |i| end + i + 1);
            out.push_str(&rest[end..line_end]);
            pos += line_end;
        } else {
            break;
        }
    }

    out.push_str(&source[pos..]);
    out
}

/// `import` keyword starting a static import (not `import(` or `import.meta`)
fn is_import_statement(rest: &str) -> bool {
    rest.strip_prefix("import").is_some_and(|after| {
        after.starts_with(|c: char| c.is_whitespace() || c == '{' || c == '*' || c == '"' || c == '\'')
    })
}

/// Module specifier of the import at the start of `rest`, and the byte offset just past its closing quote
fn import_specifier(rest: &str) -> Option<(&str, usize)> {
    let open = rest.find(['"', '\''])?;
    let quote = rest[open..].chars().next()?;
    let start = open + 1;
    let close = rest[start..].find(quote)? + start;
    Some((&rest[start..close], close + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_node_imports_only() {
        let source = "import fs from \"node:fs\";\nimport { h } from './ui.js';\nconsole.log(h);\n";
        let expected = "// excluded: import fs from \"node:fs\";\nimport { h } from './ui.js';\nconsole.log(h);\n";
        assert_eq!(strip_host_imports(source), expected);
    }

    #[test]
    fn test_multiline_import() {
        let source = "import {\n  readFile,\n  writeFile,\n} from \"node:fs/promises\";\nexport default 1;\n";
        let expected = "// excluded: import {\n// excluded:   readFile,\n// excluded:   writeFile,\n// excluded: } from \"node:fs/promises\";\nexport default 1;\n";
        assert_eq!(strip_host_imports(source), expected);
    }

    #[test]
    fn test_comments_and_side_effect_imports() {
        let source = "// header\n/* block\n comment */\nimport 'node:process';\nimport * as path from \"node:path\";\n";
        let expected = "// header\n/* block\n comment */\n// excluded: import 'node:process';\n// excluded: import * as path from \"node:path\";\n";
        assert_eq!(strip_host_imports(source), expected);
    }

    #[test]
    fn test_scan_stops_at_first_statement() {
        let source = "const x = 1;\nimport fs from \"node:fs\";\n";
        assert_eq!(strip_host_imports(source), source);
    }

    #[test]
    fn test_dynamic_import_is_left_alone() {
        let source = "import(\"node:fs\").then(() => {});\n";
        assert_eq!(strip_host_imports(source), source);
    }

    #[test]
    fn test_custom_predicate() {
        let source = "import a from \"a\";\nimport b from \"b\";\n";
        assert_eq!(
            exclude_imports(source, |s| s == "b"),
            "import a from \"a\";\n// excluded: import b from \"b\";\n"
        );
    }
}
