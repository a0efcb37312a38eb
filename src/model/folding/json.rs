//! Bracket-stack scanner for JSON and JSON Lines

use super::{FoldKind, FoldableRange};

/// Keys longer than this are cut in the summary text
const MAX_KEY_CHARS: usize = 64;

struct Frame {
    open: char,
    line: usize,
    key: Option<String>,
    commas: usize,
    has_items: bool,
}

impl Frame {
    fn items(&self) -> usize {
        if self.has_items {
            self.commas + 1
        } else {
            0
        }
    }
}

#[derive(Default)]
struct Scanner {
    stack: Vec<Frame>,
    in_string: bool,
    escaped: bool,
    string_buf: String,
    /// Most recently closed string literal at the current position
    last_string: Option<String>,
    /// Key waiting for the value that follows `:`
    pending_key: Option<String>,
    ranges: Vec<FoldableRange>,
}

impl Scanner {
    fn mark_item(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.has_items = true;
        }
    }

    fn open(&mut self, open: char, line: usize) {
        self.mark_item();
        let key = self.pending_key.take().filter(|_| open == '{');
        self.last_string = None;
        self.stack.push(Frame {
            open,
            line,
            key,
            commas: 0,
            has_items: false,
        });
    }

    fn close(&mut self, close: char, line: usize) {
        self.pending_key = None;
        self.last_string = None;

        let expected = if close == '}' { '{' } else { '[' };
        let matches = self.stack.last().is_some_and(|f| f.open == expected);
        if !matches {
            // Stray close: ignore it and keep the stack for the rest of the scan
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if line > frame.line {
            let kind = if frame.open == '{' {
                FoldKind::Object { key: frame.key }
            } else {
                FoldKind::Array {
                    items: frame.items(),
                }
            };
            let level = self.stack.len();
            self.ranges
                .push(FoldableRange::new(kind, frame.line, line, level));
        }
    }

    fn scan_line(&mut self, line_no: usize, line: &str) {
        for ch in line.chars() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                    self.push_string_char(ch);
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == '"' {
                    self.in_string = false;
                    self.last_string = Some(std::mem::take(&mut self.string_buf));
                } else {
                    self.push_string_char(ch);
                }
                continue;
            }

            match ch {
                '"' => {
                    self.mark_item();
                    self.in_string = true;
                    self.string_buf.clear();
                }
                ':' => self.pending_key = self.last_string.take(),
                '{' | '[' => self.open(ch, line_no),
                '}' | ']' => self.close(ch, line_no),
                ',' => {
                    if let Some(top) = self.stack.last_mut() {
                        top.commas += 1;
                    }
                    self.pending_key = None;
                    self.last_string = None;
                }
                c if c.is_whitespace() => {}
                _ => self.mark_item(),
            }
        }

        // JSON strings never span lines; an unterminated one is malformed
        if self.in_string {
            self.in_string = false;
            self.escaped = false;
            self.string_buf.clear();
        }
    }

    fn push_string_char(&mut self, ch: char) {
        if self.string_buf.chars().count() < MAX_KEY_CHARS {
            self.string_buf.push(ch);
        }
    }
}

/// Scan `lines` and return every multi-line object/array
pub(super) fn parse(lines: &[&str]) -> Vec<FoldableRange> {
    let mut scanner = Scanner::default();
    for (line_no, line) in lines.iter().enumerate() {
        scanner.scan_line(line_no, line);
    }
    if !scanner.stack.is_empty() {
        tracing::trace!(
            "JSON folding: {} unclosed brackets at end of input",
            scanner.stack.len()
        );
    }
    scanner.ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(ranges: &[FoldableRange]) -> Vec<(usize, usize)> {
        let mut v: Vec<(usize, usize)> = ranges.iter().map(|r| (r.start_line, r.end_line)).collect();
        v.sort();
        v
    }

    #[test]
    fn test_single_line_objects_are_not_foldable() {
        let ranges = parse(&["{\"a\": {\"b\": 1}}", "[1, 2, 3]"]);
        assert!(ranges.is_empty());
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let lines = [
            "{",
            "  \"text\": \"not a { bracket ] here\",",
            "  \"escaped\": \"quote \\\" then {\",",
            "  \"n\": 1",
            "}",
        ];
        let ranges = parse(&lines);
        assert_eq!(spans(&ranges), vec![(0, 4)]);
    }

    #[test]
    fn test_array_item_count_and_key() {
        let lines = [
            "{",
            "  \"list\": [",
            "    1,",
            "    {\"x\": 2},",
            "    \"three\"",
            "  ]",
            "}",
        ];
        let ranges = parse(&lines);
        let array = ranges
            .iter()
            .find(|r| r.start_line == 1)
            .expect("array range");
        assert_eq!(array.kind, FoldKind::Array { items: 3 });
        assert_eq!(array.summary, "[3 items]");
        assert_eq!(array.nesting_level, 1);
    }

    #[test]
    fn test_empty_multiline_array() {
        let ranges = parse(&["[", "]"]);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].kind, FoldKind::Array { items: 0 });
    }

    #[test]
    fn test_object_key_summary() {
        let ranges = parse(&["{", "  \"config\": {", "    \"a\": 1", "  }", "}"]);
        let inner = ranges.iter().find(|r| r.start_line == 1).unwrap();
        assert_eq!(inner.summary, "\"config\": {...}");
        let outer = ranges.iter().find(|r| r.start_line == 0).unwrap();
        assert_eq!(outer.summary, "{...}");
    }

    #[test]
    fn test_mismatched_close_is_skipped() {
        let lines = ["{", "  \"a\": 1 ]", "}"];
        let ranges = parse(&lines);
        assert_eq!(spans(&ranges), vec![(0, 2)]);
    }

    #[test]
    fn test_unclosed_input_yields_only_closed_ranges() {
        let lines = ["{", "  \"a\": [", "    1", "  ]"];
        let ranges = parse(&lines);
        assert_eq!(spans(&ranges), vec![(1, 3)]);
    }

    #[test]
    fn test_unterminated_string_recovers_at_line_end() {
        let lines = ["[", "  \"broken", "  {", "  }", "]"];
        let ranges = parse(&lines);
        assert_eq!(spans(&ranges), vec![(0, 4), (2, 3)]);
    }

    #[test]
    fn test_jsonl_records() {
        let lines = ["{\"id\": 1}", "{\"id\": 2,", " \"tags\": []}", "{\"id\": 3}"];
        let ranges = parse(&lines);
        assert_eq!(spans(&ranges), vec![(1, 2)]);
    }
}
