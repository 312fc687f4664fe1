// src/comments.rs

use crate::model::Comment;
use regex::Regex;
use std::sync::OnceLock;

// Constant patterns: compiling them cannot fail at runtime.
fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(//|#)([^\n]*)").expect("valid line comment regex"))
}

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*(.*?)\*/").expect("valid block comment regex"))
}

/// Extracts `#`, `//` and `/* */` comments from IaC source, ordered by line.
///
/// A line marker directly preceded by `:` is treated as part of a URL and
/// skipped; scanning resumes one character later.
pub fn extract(text: &str) -> Vec<Comment> {
    let mut comments = Vec::new();

    let line_re = line_comment_re();
    let mut at = 0;
    while let Some(m) = line_re.find_at(text, at) {
        if text[..m.start()].ends_with(':') {
            at = m.start() + 1;
            continue;
        }
        comments.push(Comment::new(m.as_str(), line_of(text, m.start())));
        at = m.end();
    }

    for caps in block_comment_re().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rendered = format!("/*{}*/", inner.as_str().trim()).replace('\n', " ");
        comments.push(Comment::new(rendered, line_of(text, whole.start())));
    }

    comments.sort_by_key(|c| c.line);
    comments
}

/// Collapses runs of comments on consecutive lines into one comment joined by
/// newlines, reported at the first line of the run. Input must be line-sorted.
pub fn merge_adjacent(comments: Vec<Comment>) -> Vec<Comment> {
    let mut merged: Vec<Comment> = Vec::with_capacity(comments.len());
    let mut last_line = 0;
    for comment in comments {
        let line = comment.line;
        match merged.last_mut() {
            Some(current) if line == last_line + 1 => {
                current.text.push('\n');
                current.text.push_str(&comment.text);
            }
            _ => merged.push(comment),
        }
        last_line = line;
    }
    merged
}

/// Number of lines as counted by the tracker: newlines + 1, zero when empty
pub fn count_lines(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        text.matches('\n').count() + 1
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn is_line_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with("//")
}

/// The comment block around `line`: consecutive comment lines (blank lines
/// included) and `/* */` spans, joined with spaces. Falls back to the raw
/// source line, or an empty string when `line` is out of range.
pub fn comment_context(content: &str, line: usize) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut blocks: Vec<(String, usize, usize)> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 0;

    let mut i = 0;
    while i < lines.len() {
        let raw = lines[i];
        let trimmed = raw.trim();
        let opens_line_comment = if current.is_empty() {
            raw.contains("//") || raw.contains('#')
        } else {
            is_line_comment(trimmed)
        };
        let opens_block_comment = if current.is_empty() {
            raw.contains("/*")
        } else {
            trimmed.starts_with("/*")
        };

        if opens_line_comment {
            if current.is_empty() {
                start = i + 1;
            } else {
                current.push("\n");
            }
            current.push(trimmed);
            i += 1;
        } else if opens_block_comment {
            if current.is_empty() {
                start = i + 1;
            }
            while i < lines.len() {
                if !current.is_empty() {
                    current.push("\n");
                }
                current.push(lines[i].trim());
                let closed = lines[i].contains("*/");
                i += 1;
                if closed {
                    break;
                }
            }
        } else if trimmed.is_empty() {
            if !current.is_empty() {
                current.push("");
            }
            i += 1;
        } else {
            if !current.is_empty() {
                blocks.push((current.join(" "), start, i));
                current.clear();
            }
            i += 1;
        }
    }
    if !current.is_empty() {
        blocks.push((current.join(" "), start, i));
    }

    if let Some((text, _, _)) = blocks
        .into_iter()
        .find(|(_, first, last)| *first <= line && line <= *last)
    {
        return text;
    }
    match line {
        0 => String::new(),
        n => lines.get(n - 1).map(|l| l.to_string()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_patterns_compile() {
        assert!(line_comment_re().is_match("# x"));
        assert!(block_comment_re().is_match("/* x */"));
    }

    const MAIN_TF: &str = "# TODO fix this\nresource \"aws_s3_bucket\" \"b\" {\n  bucket = \"x\" // FIXME name\n  url = \"https://example.com\"\n}\n/* multi\n   line */\n";

    #[test]
    fn extracts_line_and_block_comments_in_line_order() {
        assert_eq!(
            extract(MAIN_TF),
            vec![
                Comment::new("# TODO fix this", 1),
                Comment::new("// FIXME name", 3),
                Comment::new("/*multi    line*/", 6),
            ]
        );
    }

    #[test]
    fn skips_url_schemes_but_keeps_later_markers() {
        let comments = extract("source = \"git::https://host/repo#ref\"\n");
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "#ref\"");
        assert_eq!(comments[0].line, 1);
    }

    #[test]
    fn empty_source_has_no_comments() {
        assert!(extract("").is_empty());
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("a\nb"), 2);
        assert_eq!(count_lines("a\nb\n"), 3);
    }

    #[test]
    fn merges_only_adjacent_lines() {
        let merged = merge_adjacent(vec![
            Comment::new("# a", 1),
            Comment::new("# b", 2),
            Comment::new("# c", 3),
            Comment::new("# d", 7),
        ]);
        assert_eq!(
            merged,
            vec![Comment::new("# a\n# b\n# c", 1), Comment::new("# d", 7)]
        );
    }

    #[test]
    fn context_spans_the_comment_block() {
        let src = "# first\n# second\nresource \"x\" \"y\" {}\n";
        assert_eq!(comment_context(src, 2), "# first \n # second");
        assert_eq!(comment_context(src, 3), "resource \"x\" \"y\" {}");
        assert_eq!(comment_context(src, 0), "");
        assert_eq!(comment_context(src, 99), "");
    }

    #[test]
    fn context_covers_multiline_block_comment() {
        let src = "locals {}\n/* TODO\n   later */\nvariable \"v\" {}\n";
        assert_eq!(comment_context(src, 2), "/* TODO \n later */");
    }
}
