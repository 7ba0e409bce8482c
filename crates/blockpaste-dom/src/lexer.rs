//! # Lexer - Tokenizing HTML Source
//!
//! This module provides the first stage of parsing: breaking HTML text into
//! tokens using the [Logos] lexer generator.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ## The Lossless Guarantee
//!
//! Every byte in the input appears in exactly one token. Nothing is skipped,
//! which lets the tree builder recover raw text (`<script>`, `<style>`) by
//! concatenating token texts:
//!
//! ```
//! use blockpaste_dom::lexer::lex;
//!
//! let input = "<p class=\"a\">Hello <b>world</b></p><!-- note -->";
//! let tokens = lex(input);
//!
//! let reconstructed: String = tokens.iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```
//!
//! ## Token Design
//!
//! Tags are lexed as a single token each, from `<` to the closing `>`. The
//! tag name is matched by the regex; the remainder (attributes) is consumed
//! by a callback that understands quoted values, so `<a title="a > b">` is
//! one token. Attribute *parsing* happens later in the tree builder.
//!
//! Anything that cannot start markup becomes `Text`. A stray `<` is its own
//! token and is treated as text by the tree builder.

use logos::{Lexer, Logos};

/// Token kinds produced by the Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<!-- ... -->`
    #[token("<!--", comment_tail)]
    Comment,

    /// `<!DOCTYPE ...>` and other `<!...>` declarations
    #[token("<!", until_gt)]
    Declaration,

    /// `<?...>`, kept as a bogus comment
    #[token("<?", until_gt)]
    ProcessingInstruction,

    /// `</name ...>`
    #[regex(r"</[a-zA-Z][a-zA-Z0-9:-]*", tag_tail)]
    EndTag,

    /// `</` not followed by a tag name, e.g. `<//funky>`
    #[token("</", until_gt)]
    BogusComment,

    /// `<name attr="value" ...>`
    #[regex(r"<[a-zA-Z][a-zA-Z0-9:-]*", tag_tail)]
    StartTag,

    /// A `<` that does not start markup
    #[token("<")]
    Lt,

    /// Character data
    #[regex(r"[^<]+")]
    Text,
}

/// Consumes up to and including the closing `-->`, or to end of input.
fn comment_tail(lex: &mut Lexer<'_, TokenKind>) -> bool {
    let rest = lex.remainder();
    match rest.find("-->") {
        Some(idx) => lex.bump(idx + 3),
        None => lex.bump(rest.len()),
    }
    true
}

/// Consumes up to and including the next `>`, or to end of input.
fn until_gt(lex: &mut Lexer<'_, TokenKind>) -> bool {
    let rest = lex.remainder();
    match rest.find('>') {
        Some(idx) => lex.bump(idx + 1),
        None => lex.bump(rest.len()),
    }
    true
}

/// Consumes the attribute part of a tag, honouring quoted values.
fn tag_tail(lex: &mut Lexer<'_, TokenKind>) -> bool {
    let rest = lex.remainder();
    let mut quote: Option<u8> = None;

    for (i, b) in rest.bytes().enumerate() {
        match (quote, b) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(b),
            (None, b'>') => {
                lex.bump(i + 1);
                return true;
            }
            (None, _) => {}
        }
    }

    // Unterminated tag at end of input: take the rest
    lex.bump(rest.len());
    true
}

/// A lexed token with its kind and text slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Lex the input into a sequence of tokens.
///
/// Guarantees that all bytes from the input appear in the output tokens.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    lex_with_spans(input).into_iter().map(|(t, _)| t).collect()
}

/// Lex and return tokens along with their byte spans.
pub fn lex_with_spans(input: &str) -> Vec<(Token<'_>, std::ops::Range<usize>)> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        // Logos error means unrecognized input - treat as text
        let kind = result.unwrap_or(TokenKind::Text);
        tokens.push((Token { kind, text }, span));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(kind: TokenKind, text: &str) -> Token<'_> {
        Token { kind, text }
    }

    #[test]
    fn lex_empty_input() {
        assert_eq!(lex(""), vec![]);
    }

    #[test]
    fn lex_plain_text() {
        assert_eq!(lex("hello"), vec![token(TokenKind::Text, "hello")]);
    }

    #[test]
    fn lex_element() {
        assert_eq!(
            lex("<p>Hi</p>"),
            vec![
                token(TokenKind::StartTag, "<p>"),
                token(TokenKind::Text, "Hi"),
                token(TokenKind::EndTag, "</p>"),
            ]
        );
    }

    #[test]
    fn lex_quoted_gt_stays_in_tag() {
        assert_eq!(
            lex(r#"<a title="a > b">x</a>"#),
            vec![
                token(TokenKind::StartTag, r#"<a title="a > b">"#),
                token(TokenKind::Text, "x"),
                token(TokenKind::EndTag, "</a>"),
            ]
        );
    }

    #[test]
    fn lex_comment() {
        assert_eq!(
            lex("<!-- a > b -->x"),
            vec![
                token(TokenKind::Comment, "<!-- a > b -->"),
                token(TokenKind::Text, "x"),
            ]
        );
    }

    #[test]
    fn lex_bogus_comment() {
        assert_eq!(
            lex("<//funky>"),
            vec![token(TokenKind::BogusComment, "<//funky>")]
        );
    }

    #[test]
    fn lex_doctype() {
        assert_eq!(
            lex("<!DOCTYPE html><p>"),
            vec![
                token(TokenKind::Declaration, "<!DOCTYPE html>"),
                token(TokenKind::StartTag, "<p>"),
            ]
        );
    }

    #[test]
    fn lex_stray_lt() {
        assert_eq!(
            lex("1 < 2"),
            vec![
                token(TokenKind::Text, "1 "),
                token(TokenKind::Lt, "<"),
                token(TokenKind::Text, " 2"),
            ]
        );
    }

    #[test]
    fn lex_unterminated_comment_takes_rest() {
        assert_eq!(
            lex("<!-- open"),
            vec![token(TokenKind::Comment, "<!-- open")]
        );
    }

    #[test]
    fn all_bytes_preserved() {
        let input = "<ul><li>One<li>Two</ul><img src='x.png' alt=\"<y>\"/>\u{1F352} tail";
        let tokens = lex(input);
        let reconstructed: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(input, reconstructed);
    }

    #[test]
    fn spans_are_correct() {
        let input = "<em>hello</em> world";
        for (token, span) in &lex_with_spans(input) {
            assert_eq!(token.text, &input[span.clone()]);
        }
    }
}
