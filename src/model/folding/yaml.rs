//! Indentation-based block detection for YAML

use super::{FoldKind, FoldableRange};

struct OpenBlock {
    indent: usize,
    line: usize,
    key: String,
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Key of a line that opens a block: `key:`, `- key:`, or `key: |` / `key: >`
fn block_key(content: &str) -> Option<&str> {
    let content = content.strip_prefix("- ").unwrap_or(content).trim_end();

    let key = if let Some(key) = content.strip_suffix(':') {
        key
    } else {
        // Block scalars: `key: |`, `key: >-`, `key: |+`
        let (key, indicator) = content.rsplit_once(": ")?;
        let indicator = indicator.trim();
        let is_block_scalar = matches!(indicator, "|" | ">" | "|-" | ">-" | "|+" | ">+");
        if !is_block_scalar {
            return None;
        }
        key
    };

    let key = key.trim();
    if key.is_empty() || key.starts_with('#') {
        return None;
    }
    // `a: b:` is a scalar value that happens to end in a colon
    if key.contains(": ") && !(key.starts_with('"') || key.starts_with('\'')) {
        return None;
    }
    Some(key)
}

fn close(block: OpenBlock, end: usize, depth: usize, ranges: &mut Vec<FoldableRange>) {
    if end > block.line {
        ranges.push(FoldableRange::new(
            FoldKind::Block { key: block.key },
            block.line,
            end,
            depth,
        ));
    }
}

/// Scan `lines` and return every multi-line block
pub(super) fn parse(lines: &[&str]) -> Vec<FoldableRange> {
    let mut stack: Vec<OpenBlock> = Vec::new();
    let mut ranges = Vec::new();
    let mut last_content_line = 0;

    for (line_no, line) in lines.iter().enumerate() {
        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }
        let indent = indentation(line);

        while stack.last().is_some_and(|b| b.indent >= indent) {
            if let Some(block) = stack.pop() {
                let depth = stack.len();
                close(block, last_content_line, depth, &mut ranges);
            }
        }

        if let Some(key) = block_key(content) {
            stack.push(OpenBlock {
                indent,
                line: line_no,
                key: key.trim_matches(|c| c == '"' || c == '\'').to_string(),
            });
        }
        last_content_line = line_no;
    }

    while let Some(block) = stack.pop() {
        let depth = stack.len();
        close(block, last_content_line, depth, &mut ranges);
    }

    ranges
}
