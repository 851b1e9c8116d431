//! Tokenizer for annotated class declarations.
//!
//! The lexer is a lazy iterator over [`Token`]s borrowing the source text.
//! It is cheap to clone, and [`Lexer::reset`] restarts it from the top.
//!
//! Character classes are decided by the explicit byte predicates in this
//! module, never by locale-aware routines. Comments and preprocessor lines
//! are reported as [`TokenKind::Whitespace`] so that positions stay exact
//! while the parser can ignore them.

use crate::error::LexError;

/// Literal classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Float,
    String,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Literal(LiteralKind),
    Punctuation,
    /// Whitespace, comments and preprocessor lines.
    Whitespace,
}

/// A classified slice of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the first character.
    pub offset: usize,
    /// 1-based line of the first character.
    pub line: u32,
}

impl Token<'_> {
    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == word
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == punct
    }
}

pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

pub fn is_ident_start(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

pub fn is_ident_continue(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

pub fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

pub fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

/// Multi-character punctuators, longest first. `>>` is deliberately absent so
/// nested template argument lists close one bracket at a time.
const PUNCTUATORS: &[&str] = &[
    "...", "<<=", "::", "->", "&&", "||", "==", "!=", "<=", ">=", "<<", "++", "--", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "##",
];

/// String literal prefixes that may precede `"` or `'`.
const LITERAL_PREFIXES: &[&str] = &["L", "u", "U", "u8"];

/// Lazy tokenizer over one source text.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    /// No significant token seen yet on the current line.
    line_start: bool,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            line_start: true,
            done: false,
        }
    }

    /// Restart from the beginning of the source.
    pub fn reset(&mut self) {
        *self = Self::new(self.src);
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + ahead).copied()
    }

    fn bump_to(&mut self, end: usize) {
        let consumed = &self.src.as_bytes()[self.pos..end];
        self.line += consumed.iter().filter(|&&b| b == b'\n').count() as u32;
        self.pos = end;
    }

    fn rest(&self) -> &'a [u8] {
        &self.src.as_bytes()[self.pos..]
    }

    fn lex_whitespace(&self) -> usize {
        let n = self.rest().iter().take_while(|&&b| is_whitespace(b)).count();
        self.pos + n
    }

    fn lex_line_comment(&self) -> usize {
        let rest = self.rest();
        self.pos + rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len())
    }

    fn lex_block_comment(&self) -> Result<usize, LexError> {
        let body = &self.src[self.pos + 2..];
        body.find("*/")
            .map(|end| self.pos + 2 + end + 2)
            .ok_or(LexError::UnterminatedComment { offset: self.pos })
    }

    /// A directive runs to the end of the line, honoring `\` continuations.
    fn lex_directive(&self) -> usize {
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if bytes.get(i + 1) == Some(&b'\n') => i += 2,
                b'\\' if bytes.get(i + 1) == Some(&b'\r') && bytes.get(i + 2) == Some(&b'\n') => {
                    i += 3
                }
                b'\n' => break,
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    match self.src[i + 2..].find("*/") {
                        Some(end) => i += 2 + end + 2,
                        None => return bytes.len(),
                    }
                }
                _ => i += 1,
            }
        }
        i
    }

    fn lex_quoted(&self, start: usize, quote: u8) -> Result<usize, LexError> {
        let bytes = self.src.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'\n' => break,
                b if b == quote => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err(if quote == b'"' {
            LexError::UnterminatedString { offset: self.pos }
        } else {
            LexError::UnterminatedChar { offset: self.pos }
        })
    }

    /// `R"delim( ... )delim"`, `quote` is the index of the opening `"`.
    fn lex_raw_string(&self, quote: usize) -> Result<usize, LexError> {
        let rest = &self.src[quote + 1..];
        let open = rest
            .find('(')
            .filter(|&p| p <= 16)
            .ok_or(LexError::InvalidRawString { offset: self.pos })?;
        let delimiter = &rest[..open];
        if delimiter
            .bytes()
            .any(|b| is_whitespace(b) || matches!(b, b'\\' | b')'))
        {
            return Err(LexError::InvalidRawString { offset: self.pos });
        }
        let terminator = format!("){delimiter}\"");
        rest[open..]
            .find(&terminator)
            .map(|end| quote + 1 + open + end + terminator.len())
            .ok_or(LexError::UnterminatedString { offset: self.pos })
    }

    fn lex_number(&self) -> (usize, LiteralKind) {
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        let hex = bytes.get(i) == Some(&b'0') && matches!(bytes.get(i + 1), Some(b'x' | b'X'));
        let mut float = false;
        if hex {
            i += 2;
        }
        while i < bytes.len() {
            let b = bytes[i];
            let exponent = if hex {
                matches!(b, b'p' | b'P')
            } else {
                matches!(b, b'e' | b'E')
            };
            if exponent {
                float = true;
                i += 1;
                if matches!(bytes.get(i), Some(b'+' | b'-')) {
                    i += 1;
                }
            } else if b == b'.' {
                float = true;
                i += 1;
            } else if is_ident_continue(b) || (b == b'\'' && bytes.get(i + 1).is_some_and(|&n| is_hex_digit(n))) {
                i += 1;
            } else {
                break;
            }
        }
        let kind = if float {
            LiteralKind::Float
        } else {
            LiteralKind::Integer
        };
        (i, kind)
    }

    fn lex_punctuation(&self) -> usize {
        let rest = &self.src[self.pos..];
        for punct in PUNCTUATORS {
            if rest.starts_with(punct) {
                return self.pos + punct.len();
            }
        }
        // A single character, which may be multi-byte.
        self.pos + rest.chars().next().map_or(1, char::len_utf8)
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, LexError> {
        let Some(b) = self.peek(0) else {
            return Ok(None);
        };
        let start = self.pos;
        let line = self.line;

        let (end, kind) = if is_whitespace(b) {
            (self.lex_whitespace(), TokenKind::Whitespace)
        } else if b == b'/' && self.peek(1) == Some(b'/') {
            (self.lex_line_comment(), TokenKind::Whitespace)
        } else if b == b'/' && self.peek(1) == Some(b'*') {
            (self.lex_block_comment()?, TokenKind::Whitespace)
        } else if b == b'#' && self.line_start {
            (self.lex_directive(), TokenKind::Whitespace)
        } else if is_ident_start(b) {
            let len = self.rest().iter().take_while(|&&c| is_ident_continue(c)).count();
            let word = &self.src[start..start + len];
            let next = self.peek(len);
            let raw_prefix = word.strip_suffix('R').filter(|p| p.is_empty() || LITERAL_PREFIXES.contains(p));
            if raw_prefix.is_some() && next == Some(b'"') {
                (self.lex_raw_string(start + len)?, TokenKind::Literal(LiteralKind::String))
            } else if LITERAL_PREFIXES.contains(&word) && next == Some(b'"') {
                (self.lex_quoted(start + len, b'"')?, TokenKind::Literal(LiteralKind::String))
            } else if LITERAL_PREFIXES.contains(&word) && next == Some(b'\'') {
                (self.lex_quoted(start + len, b'\'')?, TokenKind::Literal(LiteralKind::Char))
            } else {
                (start + len, TokenKind::Identifier)
            }
        } else if is_digit(b) || (b == b'.' && self.peek(1).is_some_and(is_digit)) {
            let (end, literal) = self.lex_number();
            (end, TokenKind::Literal(literal))
        } else if b == b'"' {
            (self.lex_quoted(start, b'"')?, TokenKind::Literal(LiteralKind::String))
        } else if b == b'\'' {
            (self.lex_quoted(start, b'\'')?, TokenKind::Literal(LiteralKind::Char))
        } else {
            (self.lex_punctuation(), TokenKind::Punctuation)
        };

        let end = end.min(self.src.len());
        self.bump_to(end);
        let text = &self.src[start..end];
        match kind {
            TokenKind::Whitespace => {
                if text.contains('\n') {
                    self.line_start = true;
                }
            }
            _ => self.line_start = false,
        }

        Ok(Some(Token {
            kind,
            text,
            offset: start,
            line,
        }))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Collect the significant tokens (everything but whitespace) of `src`.
pub fn significant_tokens(src: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(src)
        .filter(|t| !matches!(t, Ok(Token { kind: TokenKind::Whitespace, .. })))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<(TokenKind, &str)> {
        significant_tokens(src)
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn test_predicates() {
        assert!(is_whitespace(b'\t'));
        assert!(!is_whitespace(b'a'));
        assert!(is_ident_start(b'_'));
        assert!(!is_ident_start(b'1'));
        assert!(is_ident_continue(b'1'));
        assert!(is_hex_digit(b'F'));
        assert!(!is_hex_digit(b'g'));
        assert!(is_digit(b'7'));
    }

    #[test]
    fn test_basic_classification() {
        let tokens = kinds("void setValue(const Foo &v, int n = 0x1F);");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Identifier, "void"),
                (TokenKind::Identifier, "setValue"),
                (TokenKind::Punctuation, "("),
                (TokenKind::Identifier, "const"),
                (TokenKind::Identifier, "Foo"),
                (TokenKind::Punctuation, "&"),
                (TokenKind::Identifier, "v"),
                (TokenKind::Punctuation, ","),
                (TokenKind::Identifier, "int"),
                (TokenKind::Identifier, "n"),
                (TokenKind::Punctuation, "="),
                (TokenKind::Literal(LiteralKind::Integer), "0x1F"),
                (TokenKind::Punctuation, ")"),
                (TokenKind::Punctuation, ";"),
            ]
        );
    }

    #[test]
    fn test_comments_and_directives_are_whitespace() {
        let src = "#include <x.h>\n// line\nint /* block */ a;\n#define M(x) \\\n  x\n";
        assert_eq!(
            kinds(src),
            vec![
                (TokenKind::Identifier, "int"),
                (TokenKind::Identifier, "a"),
                (TokenKind::Punctuation, ";"),
            ]
        );
    }

    #[test]
    fn test_hash_inside_line_is_punctuation() {
        assert_eq!(kinds("a # b")[1], (TokenKind::Punctuation, "#"));
    }

    #[test]
    fn test_literals() {
        let tokens = kinds(r#"1.5e-3 42u 'c' L"wide" "s\"q" R"x(raw)")x""#);
        let literal_kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            literal_kinds,
            vec![
                TokenKind::Literal(LiteralKind::Float),
                TokenKind::Literal(LiteralKind::Integer),
                TokenKind::Literal(LiteralKind::Char),
                TokenKind::Literal(LiteralKind::String),
                TokenKind::Literal(LiteralKind::String),
                TokenKind::Literal(LiteralKind::String),
            ]
        );
        assert_eq!(tokens[5].1, r#"R"x(raw)")x""#);
    }

    #[test]
    fn test_template_brackets_stay_separate() {
        let tokens = kinds("QList<QList<int>>");
        assert_eq!(tokens.iter().filter(|(_, t)| *t == ">").count(), 2);
    }

    #[test]
    fn test_lines_are_tracked() {
        let tokens = significant_tokens("a\n\n  b\n/* x\n y */ c").unwrap();
        let lines: Vec<_> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 3, 5]);
        assert_eq!(tokens[1].offset, 5);
    }

    #[test]
    fn test_unterminated_literals() {
        assert_eq!(
            significant_tokens("int a = \"abc\n;").unwrap_err(),
            LexError::UnterminatedString { offset: 8 }
        );
        assert_eq!(
            significant_tokens("x 'a").unwrap_err(),
            LexError::UnterminatedChar { offset: 2 }
        );
        assert_eq!(
            significant_tokens("a /* b").unwrap_err(),
            LexError::UnterminatedComment { offset: 2 }
        );
    }

    #[test]
    fn test_lexer_is_restartable() {
        let mut lexer = Lexer::new("a b");
        let first: Vec<_> = lexer.by_ref().collect();
        assert!(lexer.next().is_none());
        lexer.reset();
        let second: Vec<_> = lexer.collect();
        assert_eq!(first, second);
    }
}
