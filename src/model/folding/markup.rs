//! Tag-matching scanner for XML, HTML and SVG
//!
//! This is not a parser: tags must fit on one line, attribute values that
//! contain `>` confuse it, and malformed markup yields an incomplete forest.

use super::{FoldKind, FoldableRange};
use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)([A-Za-z_][A-Za-z0-9_:.\-]*)(?:\s[^>]*?)?\s*(/?)>")
        .expect("static tag regex is valid")
});

/// HTML elements that never have a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

struct OpenTag {
    name: String,
    line: usize,
}

#[derive(Default)]
struct Scanner {
    stack: Vec<OpenTag>,
    in_comment: bool,
    ranges: Vec<FoldableRange>,
}

impl Scanner {
    fn scan_line(&mut self, line_no: usize, line: &str) {
        let mut rest = line;
        loop {
            if self.in_comment {
                match rest.find("-->") {
                    Some(end) => {
                        self.in_comment = false;
                        rest = &rest[end + 3..];
                    }
                    None => return,
                }
            }
            match rest.find("<!--") {
                Some(start) => {
                    self.scan_tags(line_no, &rest[..start]);
                    self.in_comment = true;
                    rest = &rest[start + 4..];
                }
                None => {
                    self.scan_tags(line_no, rest);
                    return;
                }
            }
        }
    }

    fn scan_tags(&mut self, line_no: usize, text: &str) {
        for caps in TAG_RE.captures_iter(text) {
            let closing = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
            let Some(name) = caps.get(2).map(|m| m.as_str()) else {
                continue;
            };

            if closing {
                self.close(name, line_no);
            } else if !self_closing && !is_void(name) {
                self.stack.push(OpenTag {
                    name: name.to_string(),
                    line: line_no,
                });
            }
        }
    }

    fn close(&mut self, name: &str, line_no: usize) {
        let Some(pos) = self.stack.iter().rposition(|t| t.name == name) else {
            // Close without a matching open
            return;
        };
        // Opens above the match were never closed; drop them
        self.stack.truncate(pos + 1);
        let Some(open) = self.stack.pop() else {
            return;
        };
        if line_no > open.line {
            let level = self.stack.len();
            self.ranges.push(FoldableRange::new(
                FoldKind::Element { tag: open.name },
                open.line,
                line_no,
                level,
            ));
        }
    }
}

/// Scan `lines` and return every multi-line element
pub(super) fn parse(lines: &[&str]) -> Vec<FoldableRange> {
    let mut scanner = Scanner::default();
    for (line_no, line) in lines.iter().enumerate() {
        scanner.scan_line(line_no, line);
    }
    scanner.ranges
}
