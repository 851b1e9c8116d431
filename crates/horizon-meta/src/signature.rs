//! Signature normalization shared by the compiler and the runtime.
//!
//! Signatures are compared by *type equivalence*, not by spelling. Before two
//! signatures are compared, each parameter type is normalized:
//!
//! - whitespace is collapsed,
//! - references (`&`, `&&`) are stripped together with the `const` that
//!   qualifies the referenced value, so `const Foo&`, `Foo const &` and `Foo`
//!   all normalize to `Foo`,
//! - top-level `const` on by-value parameters is dropped (`const int` is `int`),
//! - pointers keep their `*` and any `const` on the pointee,
//! - multi-word builtin spellings collapse to one word (`unsigned int` is `uint`).
//!
//! The canonical text of a signature is `name(T1,T2)`. [`signature_hash`]
//! hashes that text with 64-bit FNV-1a so the value is identical across runs,
//! platforms and compiler versions.
//!
//! # Example
//!
//! ```
//! use horizon_meta::signature::{normalize_type, Signature};
//!
//! assert_eq!(normalize_type("const QString &"), "QString");
//! assert_eq!(normalize_type("unsigned int"), "uint");
//!
//! let sig = Signature::parse("valueChanged(const Foo& foo, int)").unwrap();
//! assert_eq!(sig.canonical(), "valueChanged(Foo,int)");
//! ```

use std::fmt;

use thiserror::Error;

/// Words that make up builtin type spellings and are never parameter names.
const BUILTIN_TYPE_WORDS: &[&str] = &[
    "void", "bool", "char", "short", "int", "long", "float", "double", "signed", "unsigned",
    "wchar_t", "char16_t", "char32_t", "auto",
];

/// Qualifier words that never form a type on their own.
const QUALIFIER_WORDS: &[&str] = &["const", "volatile", "struct", "class", "enum", "typename"];

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Error returned when a signature string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The signature has no `(`.
    #[error("signature `{0}` has no parameter list")]
    MissingParameterList(String),
    /// Parentheses or angle brackets are unbalanced.
    #[error("signature `{0}` has unbalanced brackets")]
    Unbalanced(String),
    /// The method name is empty or not an identifier.
    #[error("signature `{0}` has an invalid method name")]
    InvalidName(String),
}

/// A parsed, normalized method signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    parameters: Vec<String>,
}

impl Signature {
    /// Build a signature from a name and already declared parameter types.
    ///
    /// The parameter types are normalized.
    pub fn new<I, S>(name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: name.into(),
            parameters: parameters
                .into_iter()
                .map(|p| normalize_type(p.as_ref()))
                .collect(),
        }
    }

    /// Parse a textual signature such as `setValue(const Foo& value, int)`.
    ///
    /// Parameter names and default values are dropped. A trailing `const`
    /// after the parameter list is accepted and ignored.
    pub fn parse(text: &str) -> Result<Self, SignatureError> {
        let open = text
            .find('(')
            .ok_or_else(|| SignatureError::MissingParameterList(text.to_string()))?;
        let close = text
            .rfind(')')
            .filter(|&close| close > open)
            .ok_or_else(|| SignatureError::Unbalanced(text.to_string()))?;

        let name = text[..open].trim();
        if !is_identifier(name) {
            return Err(SignatureError::InvalidName(text.to_string()));
        }

        let trailing = text[close + 1..].trim();
        if !(trailing.is_empty() || trailing == "const") {
            return Err(SignatureError::Unbalanced(text.to_string()));
        }

        let params = split_top_level(&text[open + 1..close], ',')
            .ok_or_else(|| SignatureError::Unbalanced(text.to_string()))?;

        let mut parameters = Vec::with_capacity(params.len());
        for param in params {
            let param = param.trim();
            if param.is_empty() || param == "void" {
                continue;
            }
            let without_default = match split_top_level(param, '=') {
                Some(parts) => parts.into_iter().next().unwrap_or_default(),
                None => return Err(SignatureError::Unbalanced(text.to_string())),
            };
            let (ty, _name) = split_parameter(without_default);
            parameters.push(normalize_type(&ty));
        }

        Ok(Self {
            name: name.to_string(),
            parameters,
        })
    }

    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized parameter types.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Canonical text, `name(T1,T2)`.
    pub fn canonical(&self) -> String {
        format!("{}({})", self.name, self.parameters.join(","))
    }

    /// Stable hash of the canonical text.
    pub fn hash(&self) -> u64 {
        signature_hash(&self.canonical())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.join(","))
    }
}

/// Normalize a signature string, returning its canonical text.
pub fn normalize_signature(text: &str) -> Result<String, SignatureError> {
    Signature::parse(text).map(|sig| sig.canonical())
}

/// 64-bit FNV-1a hash of a canonical signature.
pub const fn signature_hash(canonical: &str) -> u64 {
    let bytes = canonical.as_bytes();
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Whether a slot taking `slot` parameters can receive a signal carrying
/// `signal` parameters.
///
/// Both lists must have the same length and type-equivalent entries,
/// position by position. No implicit conversions are considered.
pub fn parameters_compatible(signal: &[String], slot: &[String]) -> bool {
    signal == slot
}

/// Normalize a declared type for signature matching.
pub fn normalize_type(declared: &str) -> String {
    let mut tokens = type_tokens(declared);

    // References: strip the reference and the const of the referenced value.
    while matches!(tokens.last().map(String::as_str), Some("&" | "&&")) {
        tokens.pop();
    }

    // Top-level trailing const (`Foo const`, `char* const`).
    while matches!(tokens.last().map(String::as_str), Some("const" | "volatile")) {
        tokens.pop();
    }

    // Leading const only qualifies the top level when there is no pointer.
    let has_top_level_pointer = top_level_contains(&tokens, "*");
    if !has_top_level_pointer {
        tokens.retain_top_level(|t| t != "const" && t != "volatile");
    }

    collapse_builtin_words(&mut tokens);
    render_tokens(&tokens)
}

/// Split a parameter declaration into its type text and optional name.
///
/// `const Foo &foo` yields `("const Foo &", Some("foo"))`; `unsigned int`
/// yields `("unsigned int", None)`.
pub fn split_parameter(param: &str) -> (String, Option<String>) {
    let tokens = type_tokens(param);
    let Some(last) = tokens.last() else {
        return (String::new(), None);
    };

    let is_name = is_identifier(last)
        && !BUILTIN_TYPE_WORDS.contains(&last.as_str())
        && !QUALIFIER_WORDS.contains(&last.as_str())
        && tokens[..tokens.len() - 1].iter().any(|t| {
            matches!(t.as_str(), "*" | "&" | "&&" | ">")
                || (is_identifier(t) && !QUALIFIER_WORDS.contains(&t.as_str()))
        });

    if is_name {
        let ty = render_tokens(&tokens[..tokens.len() - 1]);
        (ty, Some(last.clone()))
    } else {
        (render_tokens(&tokens), None)
    }
}

/// Whether `text` is a plain C identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Split on `separator` at nesting depth zero. Returns `None` if brackets
/// are unbalanced.
fn split_top_level(text: &str, separator: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '<' | '[' | '{' => depth += 1,
            ')' | '>' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            c if c == separator && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&text[start..]);
    Some(parts)
}

/// Break a type into words (identifiers, including `::` qualified names) and
/// single symbols. `&&` is kept as one token.
fn type_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c == '_' || c.is_ascii_alphanumeric() || c == ':' {
            let mut word = String::from(c);
            while let Some(&next) = chars.peek() {
                if next == '_' || next.is_ascii_alphanumeric() || next == ':' {
                    word.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(word);
        } else if c == '&' && chars.peek() == Some(&'&') {
            chars.next();
            tokens.push("&&".to_string());
        } else {
            tokens.push(c.to_string());
        }
    }
    tokens
}

fn top_level_contains(tokens: &[String], needle: &str) -> bool {
    let mut depth = 0;
    for token in tokens {
        match token.as_str() {
            "<" | "(" | "[" => depth += 1,
            ">" | ")" | "]" => depth -= 1,
            t if depth == 0 && t == needle => return true,
            _ => {}
        }
    }
    false
}

trait RetainTopLevel {
    fn retain_top_level<F: Fn(&str) -> bool>(&mut self, keep: F);
}

impl RetainTopLevel for Vec<String> {
    fn retain_top_level<F: Fn(&str) -> bool>(&mut self, keep: F) {
        let mut depth = 0;
        let mut out = Vec::with_capacity(self.len());
        for token in self.drain(..) {
            match token.as_str() {
                "<" | "(" | "[" => depth += 1,
                ">" | ")" | "]" => depth -= 1,
                _ => {}
            }
            if depth != 0 || keep(&token) {
                out.push(token);
            }
        }
        *self = out;
    }
}

/// Collapse the leading run of builtin words into a single canonical word.
fn collapse_builtin_words(tokens: &mut Vec<String>) {
    let start = tokens
        .iter()
        .position(|t| t != "const" && t != "volatile")
        .unwrap_or(tokens.len());
    let end = tokens[start..]
        .iter()
        .position(|t| !BUILTIN_TYPE_WORDS.contains(&t.as_str()))
        .map_or(tokens.len(), |p| start + p);
    if end - start < 1 {
        return;
    }

    let words: Vec<&str> = tokens[start..end].iter().map(String::as_str).collect();
    let canonical = match words.as_slice() {
        ["unsigned"] | ["unsigned", "int"] => "uint",
        ["unsigned", "short"] | ["unsigned", "short", "int"] => "ushort",
        ["unsigned", "char"] => "uchar",
        ["unsigned", "long"] | ["unsigned", "long", "int"] => "ulong",
        ["unsigned", "long", "long"] | ["unsigned", "long", "long", "int"] => "uint64",
        ["long", "long"] | ["long", "long", "int"] | ["signed", "long", "long"] => "int64",
        ["signed"] | ["signed", "int"] => "int",
        ["short", "int"] | ["signed", "short"] => "short",
        ["long", "int"] | ["signed", "long"] => "long",
        _ => return,
    };
    tokens.splice(start..end, std::iter::once(canonical.to_string()));
}

fn render_tokens(tokens: &[String]) -> String {
    let mut out = String::new();
    let mut previous_was_word = false;
    for token in tokens {
        let is_word = token
            .chars()
            .next()
            .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric() || c == ':');
        if is_word && previous_was_word {
            out.push(' ');
        }
        out.push_str(token);
        previous_was_word = is_word;
    }
    out
}
