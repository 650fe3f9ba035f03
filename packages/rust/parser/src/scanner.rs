//! Token scanner for the lyrics source file.
//!
//! The source is a TypeScript data file made of attribute blocks:
//! - `id: "L12", lyrics: \`...multi-line text...\``
//! - optionally separated by `// line` or `/* block */` comments

use regex::Regex;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// Matches one `id`/`lyrics` block. The fenced text may span lines.
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)id\s*:\s*["'](L\d+)["']\s*,\s*lyrics\s*:\s*`([^`]*)`"#)
        .expect("block regex")
});

/// Matches a block or a comment, whichever starts first.
///
/// A block's fence is consumed whole, so comment markers inside lyrics are
/// never seen as comments.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)id\s*:\s*["'](?P<id>L\d+)["']\s*,\s*lyrics\s*:\s*`(?P<text>[^`]*)`|/\*(?P<block>.*?)\*/|//(?P<line>[^\n]*)"#,
    )
    .expect("token regex")
});

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// A piece of the source relevant to extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    /// An `id`/`lyrics` block.
    Block { id: &'a str, text: &'a str },
    /// The inner text of a comment, markers removed.
    Comment(&'a str),
}

/// All `id`/`lyrics` blocks in source order, comments ignored.
pub(crate) fn scan_blocks(content: &str) -> Vec<Token<'_>> {
    BLOCK_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str();
            let text = caps.get(2)?.as_str();
            Some(Token::Block { id, text })
        })
        .collect()
}

/// Blocks and comments interleaved in source order.
pub(crate) fn scan_tokens(content: &str) -> Vec<Token<'_>> {
    TOKEN_RE
        .captures_iter(content)
        .filter_map(|caps| {
            if let (Some(id), Some(text)) = (caps.name("id"), caps.name("text")) {
                return Some(Token::Block {
                    id: id.as_str(),
                    text: text.as_str(),
                });
            }
            caps.name("block")
                .or_else(|| caps.name("line"))
                .map(|m| Token::Comment(m.as_str()))
        })
        .collect()
}

/// Candidate names carried by a comment.
///
/// The whole comment comes first, then each of its lines, with decoration
/// (`*`, `-`, `=`, `#`, `:`) stripped from both ends.
pub(crate) fn comment_candidates(comment: &str) -> Vec<&str> {
    fn clean(s: &str) -> &str {
        s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '-' | '=' | '#' | ':'))
    }

    let mut candidates = Vec::new();
    let whole = clean(comment);
    if !whole.is_empty() {
        candidates.push(whole);
    }
    if comment.contains('\n') {
        candidates.extend(comment.lines().map(clean).filter(|l| !l.is_empty()));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_with_embedded_newlines() {
        let src = "{ id: \"L7\", lyrics: `line one\nline two\n` },";
        let tokens = scan_blocks(src);
        assert_eq!(
            tokens,
            vec![Token::Block {
                id: "L7",
                text: "line one\nline two\n"
            }]
        );
    }

    #[test]
    fn single_quotes_and_loose_spacing() {
        let src = "id :'L12' ,\n  lyrics:\n`x`";
        let tokens = scan_blocks(src);
        assert_eq!(tokens, vec![Token::Block { id: "L12", text: "x" }]);
    }

    #[test]
    fn non_l_ids_are_ignored() {
        let src = r#"id: "S1", lyrics: `nope` id: "L2", lyrics: `yes`"#;
        let tokens = scan_blocks(src);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0], Token::Block { id: "L2", text: "yes" });
    }

    #[test]
    fn tokens_interleave_comments_and_blocks() {
        let src = "// Poet A\nid: \"L1\", lyrics: `a // not a comment`\n/* Poet B */\nid: \"L2\", lyrics: `b`";
        let tokens = scan_tokens(src);
        assert_eq!(
            tokens,
            vec![
                Token::Comment(" Poet A"),
                Token::Block {
                    id: "L1",
                    text: "a // not a comment"
                },
                Token::Comment(" Poet B "),
                Token::Block { id: "L2", text: "b" },
            ]
        );
    }

    #[test]
    fn comment_candidates_strip_decoration() {
        assert_eq!(comment_candidates(" ==== Poet A ==== "), vec!["Poet A"]);
        assert_eq!(
            comment_candidates("*\n * Section\n * Poet B\n "),
            vec!["Section\n * Poet B", "Section", "Poet B"]
        );
        assert!(comment_candidates(" --- ").is_empty());
    }
}
