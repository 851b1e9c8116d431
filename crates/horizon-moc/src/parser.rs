//! Declaration parser.
//!
//! Consumes the significant tokens of one source file and produces a
//! [`ClassDecl`] for every class body carrying `H_OBJECT`. Only the
//! constructs needed for reflection are understood: namespaces, class heads
//! with base lists, access and signal/slot sections, member function
//! declarations, `enum` bodies and the `H_*` markers. Everything else is
//! skipped by bracket matching.
//!
//! The first malformed declaration ends parsing of the file with a
//! [`CompileError`].

use std::path::{Path, PathBuf};

use horizon_meta::signature::{normalize_type, split_parameter};
use horizon_meta::table::{Access, MethodKind};

use crate::error::{CompileError, CompileResult};
use crate::lexer::{LiteralKind, Token, TokenKind, significant_tokens};

/// Declaration specifiers that never belong to a return type.
const SPECIFIERS: &[&str] = &[
    "virtual", "static", "inline", "explicit", "constexpr", "consteval", "extern", "mutable",
];

const PROPERTY_KEYWORDS: &[&str] = &[
    "READ", "WRITE", "MEMBER", "RESET", "NOTIFY", "DESIGNABLE", "STORED", "CONSTANT", "FINAL",
];

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Type as written.
    pub ty: String,
    pub name: Option<String>,
    /// Default argument as written.
    pub default: Option<String>,
}

/// A reflected member function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: String,
    pub params: Vec<Parameter>,
    pub kind: MethodKind,
    pub access: Access,
    pub is_const: bool,
    pub line: u32,
}

impl FunctionDecl {
    /// Number of trailing parameters carrying a default argument.
    pub fn defaulted_count(&self) -> usize {
        self.params
            .iter()
            .rev()
            .take_while(|p| p.default.is_some())
            .count()
    }
}

/// An `H_PROPERTY` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: String,
    pub read: Option<String>,
    pub write: Option<String>,
    pub member: Option<String>,
    pub reset: Option<String>,
    pub notify: Option<String>,
    pub designable: bool,
    pub stored: bool,
    pub constant: bool,
    pub is_final: bool,
    pub line: u32,
}

/// A named `enum` declared in a class body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: String,
    pub is_scoped: bool,
    pub keys: Vec<(String, i64)>,
    pub line: u32,
}

/// An `H_ENUM` or `H_FLAG` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEnum {
    pub name: String,
    pub is_flag: bool,
    pub line: u32,
}

/// An annotated class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDecl {
    /// Fully qualified name, `ns::Outer::Klass`.
    pub name: String,
    /// Enclosing namespaces and classes, empty at global scope.
    pub scope: String,
    /// Base classes as written, in declaration order.
    pub bases: Vec<String>,
    pub line: u32,
    pub methods: Vec<FunctionDecl>,
    pub properties: Vec<PropertyDecl>,
    pub enums: Vec<EnumDecl>,
    pub registered_enums: Vec<RegisteredEnum>,
    pub class_info: Vec<(String, String)>,
}

/// Parse every annotated class declared in `source`.
pub fn parse_source(file: &Path, source: &str) -> CompileResult<Vec<ClassDecl>> {
    let tokens =
        significant_tokens(source).map_err(|err| CompileError::from_lex(file, source, &err))?;
    let mut parser = Parser {
        file: file.to_path_buf(),
        tokens,
        pos: 0,
        classes: Vec::new(),
    };
    parser.parse_file()?;
    Ok(parser.classes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Plain,
    Signals,
    Slots,
}

struct Parser<'a> {
    file: PathBuf,
    tokens: Vec<Token<'a>>,
    pos: usize,
    classes: Vec<ClassDecl>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_ident(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(word))
    }

    fn at_punct(&self, punct: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(punct))
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.at_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn last_line(&self) -> u32 {
        self.peek()
            .or_else(|| self.tokens.last().copied())
            .map_or(1, |t| t.line)
    }

    fn error(&self, line: u32, message: impl Into<String>) -> CompileError {
        CompileError::new(&self.file, line, message)
    }

    fn expect_punct(&mut self, punct: &str) -> CompileResult<Token<'a>> {
        match self.peek() {
            Some(t) if t.is_punct(punct) => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(self.error(t.line, format!("expected `{punct}`, found `{}`", t.text))),
            None => Err(self.error(
                self.last_line(),
                format!("expected `{punct}`, found end of file"),
            )),
        }
    }

    /// Skip a bracketed group. The current token must be the opener.
    fn skip_group(&mut self) -> CompileResult<()> {
        let Some(open) = self.bump() else {
            return Ok(());
        };
        let close = match open.text {
            "(" => ")",
            "[" => "]",
            "{" => "}",
            _ => return Ok(()),
        };
        let mut depth = 1;
        while let Some(t) = self.bump() {
            if t.kind != TokenKind::Punctuation {
                continue;
            }
            if t.text == open.text {
                depth += 1;
            } else if t.text == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(self.error(open.line, format!("unbalanced `{}`", open.text)))
    }

    /// Consume a bracketed group and return the tokens inside it.
    fn take_group(&mut self) -> CompileResult<Vec<Token<'a>>> {
        let start = self.pos + 1;
        self.skip_group()?;
        Ok(self.tokens[start..self.pos - 1].to_vec())
    }

    /// Skip a template argument list. The current token must be `<`.
    fn skip_angles(&mut self) -> CompileResult<()> {
        let mut depth = 0;
        while let Some(t) = self.peek() {
            match t.text {
                "<" if t.kind == TokenKind::Punctuation => depth += 1,
                ">" if t.kind == TokenKind::Punctuation => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                "(" | "[" | "{" if t.kind == TokenKind::Punctuation => {
                    self.skip_group()?;
                    continue;
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(self.error(self.last_line(), "unterminated template parameter list"))
    }

    /// Skip to the end of the current statement. Stops before a `}` closing
    /// the enclosing scope.
    fn skip_statement(&mut self) -> CompileResult<()> {
        while let Some(t) = self.peek() {
            if t.kind == TokenKind::Punctuation {
                match t.text {
                    ";" => {
                        self.pos += 1;
                        return Ok(());
                    }
                    "}" => return Ok(()),
                    "(" | "[" | "{" => {
                        self.skip_group()?;
                        continue;
                    }
                    _ => {}
                }
            }
            self.pos += 1;
        }
        Ok(())
    }

    fn parse_file(&mut self) -> CompileResult<()> {
        let mut scopes: Vec<Option<String>> = Vec::new();
        while let Some(t) = self.peek() {
            let prefix = join_scope(&scopes);
            match (t.kind, t.text) {
                (TokenKind::Identifier, "namespace") => {
                    self.pos += 1;
                    let mut name = String::new();
                    while let Some(n) = self.peek() {
                        if n.kind == TokenKind::Identifier || n.is_punct("::") {
                            if n.text != "inline" {
                                name.push_str(n.text);
                            }
                            self.pos += 1;
                        } else {
                            break;
                        }
                    }
                    if self.eat_punct("{") {
                        scopes.push(Some(name));
                    } else {
                        self.skip_statement()?;
                    }
                }
                (TokenKind::Identifier, "template") => {
                    self.pos += 1;
                    if self.at_punct("<") {
                        self.skip_angles()?;
                    }
                    if self.at_ident("class") || self.at_ident("struct") {
                        self.parse_class(&prefix, true)?;
                    }
                }
                (TokenKind::Identifier, "class" | "struct") => self.parse_class(&prefix, false)?,
                (TokenKind::Identifier, "enum") => {
                    self.pos += 1;
                    self.skip_statement()?;
                }
                (TokenKind::Punctuation, "{") => {
                    self.pos += 1;
                    scopes.push(None);
                }
                (TokenKind::Punctuation, "}") => {
                    self.pos += 1;
                    scopes.pop();
                }
                _ => self.pos += 1,
            }
        }
        Ok(())
    }

    /// Parse a class head and, when it starts a definition, its body.
    /// Leaves the position after the body, or at the first token that shows
    /// the head is not a definition.
    fn parse_class(&mut self, scope: &str, is_template: bool) -> CompileResult<()> {
        let Some(keyword) = self.bump() else {
            return Ok(());
        };
        let is_struct = keyword.text == "struct";
        let mut name = String::new();
        let mut line = keyword.line;
        let mut after_scope = false;

        loop {
            let Some(t) = self.peek() else {
                return Ok(());
            };
            match t.kind {
                TokenKind::Identifier if t.text == "final" => {}
                TokenKind::Identifier => {
                    if after_scope {
                        name.push_str(t.text);
                    } else {
                        name = t.text.to_string();
                    }
                    line = t.line;
                    after_scope = false;
                }
                TokenKind::Punctuation if t.text == "::" => {
                    name.push_str("::");
                    after_scope = true;
                }
                TokenKind::Punctuation if t.text == "(" || t.text == "[" => {
                    self.skip_group()?;
                    continue;
                }
                TokenKind::Punctuation if t.text == ":" || t.text == "{" => break,
                _ => return Ok(()),
            }
            self.pos += 1;
        }

        let mut bases = Vec::new();
        if self.eat_punct(":") {
            let mut current: Vec<Token<'a>> = Vec::new();
            let mut angle = 0;
            loop {
                let Some(t) = self.peek() else {
                    return Err(self.error(line, format!("unterminated base list of `{name}`")));
                };
                if t.kind == TokenKind::Punctuation {
                    match t.text {
                        "{" | ";" if angle == 0 => break,
                        "," if angle == 0 => {
                            bases.push(render_base(&current));
                            current.clear();
                            self.pos += 1;
                            continue;
                        }
                        "<" => angle += 1,
                        ">" => angle -= 1,
                        "(" => {
                            self.skip_group()?;
                            continue;
                        }
                        _ => {}
                    }
                }
                current.push(t);
                self.pos += 1;
            }
            bases.push(render_base(&current));
            bases.retain(|b| !b.is_empty());
        }

        if !self.at_punct("{") {
            return Ok(());
        }
        if name.is_empty() {
            return self.skip_group();
        }
        self.parse_class_body(scope, name, bases, line, is_struct, is_template)
    }

    fn parse_class_body(
        &mut self,
        scope: &str,
        name: String,
        bases: Vec<String>,
        line: u32,
        is_struct: bool,
        is_template: bool,
    ) -> CompileResult<()> {
        self.expect_punct("{")?;
        let qualified = if scope.is_empty() {
            name
        } else {
            format!("{scope}::{name}")
        };
        let insert_at = self.classes.len();
        let mut decl = ClassDecl {
            name: qualified,
            scope: scope.to_string(),
            bases,
            line,
            ..ClassDecl::default()
        };
        let mut annotated = false;
        let mut access = if is_struct {
            Access::Public
        } else {
            Access::Private
        };
        let mut section = Section::Plain;
        let mut marker: Option<MethodKind> = None;

        loop {
            let Some(t) = self.peek() else {
                return Err(self.error(line, format!("unterminated body of class `{}`", decl.name)));
            };
            if t.kind == TokenKind::Punctuation {
                match t.text {
                    "}" => {
                        self.pos += 1;
                        break;
                    }
                    ";" => {
                        self.pos += 1;
                        continue;
                    }
                    "{" | "[" => {
                        self.skip_group()?;
                        continue;
                    }
                    _ => {}
                }
            }

            match (t.kind, t.text) {
                (TokenKind::Identifier, "public" | "protected" | "private") => {
                    self.pos += 1;
                    section = if self.at_ident("slots") || self.at_ident("H_SLOTS") {
                        self.pos += 1;
                        Section::Slots
                    } else {
                        Section::Plain
                    };
                    self.expect_punct(":")?;
                    access = match t.text {
                        "public" => Access::Public,
                        "protected" => Access::Protected,
                        _ => Access::Private,
                    };
                }
                (TokenKind::Identifier, "signals" | "H_SIGNALS") => {
                    self.pos += 1;
                    self.expect_punct(":")?;
                    section = Section::Signals;
                    access = Access::Public;
                }
                (TokenKind::Identifier, "slots" | "H_SLOTS") => {
                    self.pos += 1;
                    self.expect_punct(":")?;
                    section = Section::Slots;
                }
                (TokenKind::Identifier, "H_OBJECT") => {
                    self.pos += 1;
                    self.eat_punct(";");
                    annotated = true;
                }
                (TokenKind::Identifier, "H_PROPERTY") => {
                    self.pos += 1;
                    let inner = self.take_marker_arguments("H_PROPERTY", t.line)?;
                    let property = self.parse_property(t.line, &inner)?;
                    decl.properties.push(property);
                }
                (TokenKind::Identifier, "H_ENUM" | "H_FLAG") => {
                    self.pos += 1;
                    let inner = self.take_marker_arguments(t.text, t.line)?;
                    match inner.as_slice() {
                        [n] if n.kind == TokenKind::Identifier => {
                            decl.registered_enums.push(RegisteredEnum {
                                name: n.text.to_string(),
                                is_flag: t.text == "H_FLAG",
                                line: t.line,
                            });
                        }
                        _ => {
                            return Err(self.error(t.line, format!("{} expects an enum name", t.text)));
                        }
                    }
                }
                (TokenKind::Identifier, "H_CLASSINFO") => {
                    self.pos += 1;
                    let inner = self.take_marker_arguments("H_CLASSINFO", t.line)?;
                    match inner.as_slice() {
                        [key, comma, value]
                            if is_string(key) && comma.is_punct(",") && is_string(value) =>
                        {
                            decl.class_info
                                .push((unquote(key.text), unquote(value.text)));
                        }
                        _ => {
                            return Err(self.error(
                                t.line,
                                "H_CLASSINFO expects two string literals",
                            ));
                        }
                    }
                }
                (TokenKind::Identifier, "H_INVOKABLE") => {
                    self.pos += 1;
                    marker = Some(MethodKind::Method);
                }
                (TokenKind::Identifier, "H_SIGNAL") => {
                    self.pos += 1;
                    marker = Some(MethodKind::Signal);
                }
                (TokenKind::Identifier, "H_SLOT") => {
                    self.pos += 1;
                    marker = Some(MethodKind::Slot);
                }
                (TokenKind::Identifier, "enum") => {
                    if let Some(entry) = self.parse_enum(&decl.enums)? {
                        decl.enums.push(entry);
                    }
                }
                (TokenKind::Identifier, "class" | "struct") => {
                    let nested_scope = decl.name.clone();
                    self.parse_class(&nested_scope, false)?;
                    self.skip_statement()?;
                    marker = None;
                }
                (TokenKind::Identifier, "template") => {
                    self.pos += 1;
                    if self.at_punct("<") {
                        self.skip_angles()?;
                    }
                    if self.at_ident("class") || self.at_ident("struct") {
                        let nested_scope = decl.name.clone();
                        self.parse_class(&nested_scope, true)?;
                        self.skip_statement()?;
                    } else {
                        self.parse_member(&mut decl, None, access)?;
                    }
                    marker = None;
                }
                (
                    TokenKind::Identifier,
                    "union" | "friend" | "using" | "typedef" | "static_assert",
                ) => {
                    self.skip_statement()?;
                    marker = None;
                }
                _ => {
                    let kind = marker.take().or(match section {
                        Section::Signals => Some(MethodKind::Signal),
                        Section::Slots => Some(MethodKind::Slot),
                        Section::Plain => None,
                    });
                    self.parse_member(&mut decl, kind, access)?;
                }
            }
        }

        if !annotated {
            return Ok(());
        }
        if is_template {
            return Err(self.error(
                line,
                format!("template class `{}` cannot be annotated with H_OBJECT", decl.name),
            ));
        }
        self.classes.insert(insert_at, decl);
        Ok(())
    }

    fn take_marker_arguments(&mut self, marker: &str, line: u32) -> CompileResult<Vec<Token<'a>>> {
        if !self.at_punct("(") {
            return Err(self.error(line, format!("{marker} expects an argument list")));
        }
        self.take_group()
    }

    /// Consume one member declaration, recording it when `kind` is set and it
    /// declares a function.
    fn parse_member(
        &mut self,
        decl: &mut ClassDecl,
        kind: Option<MethodKind>,
        access: Access,
    ) -> CompileResult<()> {
        let mut tokens: Vec<Token<'a>> = Vec::new();
        let mut in_init_list = false;
        while let Some(t) = self.peek() {
            if t.kind == TokenKind::Punctuation {
                match t.text {
                    ";" => {
                        self.pos += 1;
                        break;
                    }
                    "}" => break,
                    "{" => {
                        let member_init = in_init_list
                            && tokens.last().is_some_and(|p| {
                                p.kind == TokenKind::Identifier || p.is_punct(">")
                            });
                        self.skip_group()?;
                        if member_init {
                            continue;
                        }
                        self.eat_punct(";");
                        break;
                    }
                    "(" | "[" => {
                        let start = self.pos;
                        self.skip_group()?;
                        tokens.extend_from_slice(&self.tokens[start..self.pos]);
                        continue;
                    }
                    ":" if tokens.last().is_some_and(|p| p.is_punct(")")) => in_init_list = true,
                    _ => {}
                }
            }
            tokens.push(t);
            self.pos += 1;
        }

        let Some(kind) = kind else {
            return Ok(());
        };
        if let Some(function) = self.parse_function(&tokens, kind, access)? {
            decl.methods.push(function);
        }
        Ok(())
    }

    fn parse_function(
        &self,
        tokens: &[Token<'a>],
        kind: MethodKind,
        access: Access,
    ) -> CompileResult<Option<FunctionDecl>> {
        if tokens.iter().any(|t| t.is_ident("operator")) {
            return Ok(None);
        }

        let mut angle = 0;
        let mut open = None;
        for (i, t) in tokens.iter().enumerate() {
            if t.kind != TokenKind::Punctuation {
                continue;
            }
            match t.text {
                "<" => angle += 1,
                ">" => angle -= 1,
                "(" if angle == 0 => {
                    open = Some(i);
                    break;
                }
                "=" | ":" if angle == 0 => break,
                _ => {}
            }
        }
        let Some(open) = open.filter(|&i| i > 0) else {
            return Ok(None);
        };
        let name = tokens[open - 1];
        if name.kind != TokenKind::Identifier {
            return Ok(None);
        }
        if tokens[..open - 1].last().is_some_and(|t| t.is_punct("~")) {
            return Ok(None);
        }
        let close = matching_paren(tokens, open)
            .ok_or_else(|| self.error(name.line, format!("unbalanced parameter list of `{}`", name.text)))?;

        let prefix = strip_attributes(&tokens[..open - 1]);
        let prefix: Vec<Token<'a>> = prefix
            .into_iter()
            .filter(|t| !(t.kind == TokenKind::Identifier && SPECIFIERS.contains(&t.text)))
            .collect();
        let return_type = render(&prefix);
        if return_type.is_empty() {
            // Constructors are not reflected.
            return Ok(None);
        }

        let params = self.parse_parameters(&tokens[open + 1..close], name.line)?;
        let is_const = tokens[close + 1..]
            .first()
            .is_some_and(|t| t.is_ident("const"));

        if kind == MethodKind::Signal && normalize_type(&return_type) != "void" {
            return Err(self.error(
                name.line,
                format!("signal `{}` must return void, not `{return_type}`", name.text),
            ));
        }

        Ok(Some(FunctionDecl {
            name: name.text.to_string(),
            return_type,
            params,
            kind,
            access,
            is_const,
            line: name.line,
        }))
    }

    fn parse_parameters(&self, tokens: &[Token<'a>], line: u32) -> CompileResult<Vec<Parameter>> {
        let chunks = split_commas(tokens);
        if chunks.len() == 1 && (chunks[0].is_empty() || render(chunks[0]) == "void") {
            return Ok(Vec::new());
        }

        let mut params = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.iter().any(|t| t.is_punct("...")) {
                return Err(self.error(line, "variadic parameter lists cannot be reflected"));
            }
            let (declaration, default) = match chunk.iter().position(|t| t.is_punct("=")) {
                Some(eq) => (&chunk[..eq], Some(render(&chunk[eq + 1..]))),
                None => (chunk, None),
            };
            let (ty, name) = split_parameter(&render(declaration));
            if ty.is_empty() {
                return Err(self.error(line, "malformed parameter declaration"));
            }
            params.push(Parameter { ty, name, default });
        }
        Ok(params)
    }

    fn parse_property(&self, line: u32, inner: &[Token<'a>]) -> CompileResult<PropertyDecl> {
        let head_len = inner
            .iter()
            .enumerate()
            .position(|(i, t)| {
                i >= 2 && t.kind == TokenKind::Identifier && PROPERTY_KEYWORDS.contains(&t.text)
            })
            .unwrap_or_else(|| {
                // No known keyword: the head ends at the first unknown
                // upper-case attribute, if any, so it can be reported.
                inner
                    .iter()
                    .enumerate()
                    .position(|(i, t)| i >= 2 && is_attribute_word(t))
                    .unwrap_or(inner.len())
            });
        let head = &inner[..head_len];
        let Some((name, ty)) = head
            .split_last()
            .filter(|(n, ty)| n.kind == TokenKind::Identifier && !ty.is_empty())
        else {
            return Err(self.error(line, "H_PROPERTY needs a type and a name"));
        };

        let mut property = PropertyDecl {
            name: name.text.to_string(),
            ty: render(ty),
            read: None,
            write: None,
            member: None,
            reset: None,
            notify: None,
            designable: true,
            stored: true,
            constant: false,
            is_final: false,
            line,
        };

        let mut rest = &inner[head_len..];
        while let Some((keyword, tail)) = rest.split_first() {
            match keyword.text {
                "CONSTANT" => property.constant = true,
                "FINAL" => property.is_final = true,
                "READ" | "WRITE" | "MEMBER" | "RESET" | "NOTIFY" | "DESIGNABLE" | "STORED" => {
                    let Some((value, tail)) = tail
                        .split_first()
                        .filter(|(v, _)| v.kind == TokenKind::Identifier)
                    else {
                        return Err(self.error(
                            line,
                            format!(
                                "attribute `{}` of property `{}` needs a value",
                                keyword.text, property.name
                            ),
                        ));
                    };
                    let text = Some(value.text.to_string());
                    match keyword.text {
                        "READ" => property.read = text,
                        "WRITE" => property.write = text,
                        "MEMBER" => property.member = text,
                        "RESET" => property.reset = text,
                        "NOTIFY" => property.notify = text,
                        "DESIGNABLE" => property.designable = self.bool_attribute(line, value)?,
                        _ => property.stored = self.bool_attribute(line, value)?,
                    }
                    rest = tail;
                    continue;
                }
                other => {
                    return Err(self.error(
                        line,
                        format!("unknown attribute `{other}` in property `{}`", property.name),
                    ));
                }
            }
            rest = tail;
        }

        if property.read.is_none() && property.member.is_none() {
            return Err(self.error(
                line,
                format!("property `{}` has neither READ nor MEMBER", property.name),
            ));
        }
        if property.constant && (property.write.is_some() || property.notify.is_some()) {
            return Err(self.error(
                line,
                format!("CONSTANT property `{}` cannot have WRITE or NOTIFY", property.name),
            ));
        }
        Ok(property)
    }

    fn bool_attribute(&self, line: u32, value: &Token<'a>) -> CompileResult<bool> {
        match value.text {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.error(line, format!("expected `true` or `false`, found `{other}`"))),
        }
    }

    /// Parse an `enum` declaration. Returns `None` for anonymous enums and
    /// opaque declarations.
    fn parse_enum(&mut self, earlier: &[EnumDecl]) -> CompileResult<Option<EnumDecl>> {
        let line = self.bump().map_or(self.last_line(), |t| t.line);
        let is_scoped = self.at_ident("class") || self.at_ident("struct");
        if is_scoped {
            self.pos += 1;
        }
        let name = match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                self.pos += 1;
                t.text.to_string()
            }
            _ => String::new(),
        };
        if self.eat_punct(":") {
            while let Some(t) = self.peek() {
                if t.is_punct("{") || t.is_punct(";") || t.is_punct("}") {
                    break;
                }
                self.pos += 1;
            }
        }
        if !self.at_punct("{") {
            self.skip_statement()?;
            return Ok(None);
        }

        let body = self.take_group()?;
        self.skip_statement()?;

        let mut keys: Vec<(String, i64)> = Vec::new();
        let mut next_value = 0i64;
        for entry in split_commas(&body) {
            let Some((key, rest)) = entry.split_first() else {
                continue;
            };
            if key.kind != TokenKind::Identifier {
                return Err(self.error(key.line, format!("malformed enumerator in `{name}`")));
            }
            let value = match rest.split_first() {
                None => next_value,
                Some((eq, expr)) if eq.is_punct("=") => {
                    let known = earlier.iter().flat_map(|e| e.keys.iter()).chain(keys.iter());
                    let lookup: Vec<&(String, i64)> = known.collect();
                    evaluate(expr, &lookup).ok_or_else(|| {
                        self.error(
                            key.line,
                            format!("cannot evaluate value of enumerator `{}`", key.text),
                        )
                    })?
                }
                Some(_) => {
                    return Err(self.error(key.line, format!("malformed enumerator `{}`", key.text)));
                }
            };
            keys.push((key.text.to_string(), value));
            next_value = value.wrapping_add(1);
        }

        if name.is_empty() {
            return Ok(None);
        }
        Ok(Some(EnumDecl {
            name,
            is_scoped,
            keys,
            line,
        }))
    }
}

fn join_scope(scopes: &[Option<String>]) -> String {
    scopes
        .iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("::")
}

fn is_string(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Literal(LiteralKind::String)
}

/// Upper-case words such as `SCRIPTABLE` that look like property attributes.
fn is_attribute_word(token: &Token<'_>) -> bool {
    token.kind == TokenKind::Identifier
        && token.text.len() > 1
        && token.text.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
}

/// Text of a plain string literal without its prefix and quotes.
fn unquote(text: &str) -> String {
    let start = text.find('"').map_or(0, |i| i + 1);
    let end = text.rfind('"').filter(|&end| end >= start).unwrap_or(text.len());
    text[start..end].replace("\\\"", "\"").replace("\\\\", "\\")
}

/// Join tokens back into source text, with a space only between words.
fn render(tokens: &[Token<'_>]) -> String {
    let mut out = String::new();
    let mut previous: Option<&Token<'_>> = None;
    for token in tokens {
        if previous.is_some_and(is_word) && is_word(token) {
            out.push(' ');
        }
        out.push_str(token.text);
        previous = Some(token);
    }
    out
}

fn is_word(token: &Token<'_>) -> bool {
    matches!(token.kind, TokenKind::Identifier | TokenKind::Literal(_))
}

fn render_base(tokens: &[Token<'_>]) -> String {
    let kept: Vec<Token<'_>> = tokens
        .iter()
        .copied()
        .filter(|t| {
            !(t.kind == TokenKind::Identifier
                && matches!(t.text, "public" | "protected" | "private" | "virtual"))
        })
        .collect();
    render(&kept)
}

/// Drop `[[...]]` attribute groups.
fn strip_attributes<'a>(tokens: &[Token<'a>]) -> Vec<Token<'a>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut depth = 0;
    for token in tokens {
        if token.is_punct("[") {
            depth += 1;
        } else if token.is_punct("]") {
            depth -= 1;
        } else if depth == 0 {
            out.push(*token);
        }
    }
    out
}

fn matching_paren(tokens: &[Token<'_>], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, t) in tokens.iter().enumerate().skip(open) {
        if t.is_punct("(") {
            depth += 1;
        } else if t.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split on commas outside any brackets, template arguments included.
fn split_commas<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<&'t [Token<'a>]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, t) in tokens.iter().enumerate() {
        if t.kind != TokenKind::Punctuation {
            continue;
        }
        match t.text {
            "(" | "[" | "{" | "<" => depth += 1,
            ")" | "]" | "}" | ">" => depth -= 1,
            "," if depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Evaluate an enumerator value expression.
///
/// Supports integer literals, previously declared enumerators, parentheses,
/// unary `- + ~ !` and the binary operators `* / % + - << >> & ^ |` with C
/// precedence.
fn evaluate(tokens: &[Token<'_>], known: &[&(String, i64)]) -> Option<i64> {
    let mut eval = Evaluator {
        tokens,
        pos: 0,
        known,
    };
    let value = eval.binary(0)?;
    (eval.pos == tokens.len()).then_some(value)
}

struct Evaluator<'t, 'a, 'k> {
    tokens: &'t [Token<'a>],
    pos: usize,
    known: &'k [&'k (String, i64)],
}

/// Binary operators by precedence level, loosest first.
const BINARY_LEVELS: &[&[&str]] = &[&["|"], &["^"], &["&"], &["<<", ">>"], &["+", "-"], &["*", "/", "%"]];

impl<'a> Evaluator<'_, 'a, '_> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    /// Current binary operator, joining `>` `>` into a right shift.
    fn operator(&self) -> Option<(&'static str, usize)> {
        let t = self.peek()?;
        if t.kind != TokenKind::Punctuation {
            return None;
        }
        if t.text == ">" {
            let next = self.tokens.get(self.pos + 1)?;
            return (next.is_punct(">") && next.offset == t.offset + 1).then_some((">>", 2));
        }
        BINARY_LEVELS
            .iter()
            .flat_map(|level| level.iter())
            .find(|op| **op == t.text)
            .map(|op| (*op, 1))
    }

    fn binary(&mut self, level: usize) -> Option<i64> {
        let Some(ops) = BINARY_LEVELS.get(level) else {
            return self.unary();
        };
        let mut lhs = self.binary(level + 1)?;
        while let Some((op, width)) = self.operator().filter(|(op, _)| ops.contains(op)) {
            self.pos += width;
            let rhs = self.binary(level + 1)?;
            lhs = match op {
                "|" => lhs | rhs,
                "^" => lhs ^ rhs,
                "&" => lhs & rhs,
                "<<" => lhs.checked_shl(u32::try_from(rhs).ok()?)?,
                ">>" => lhs.checked_shr(u32::try_from(rhs).ok()?)?,
                "+" => lhs.wrapping_add(rhs),
                "-" => lhs.wrapping_sub(rhs),
                "*" => lhs.wrapping_mul(rhs),
                "/" => lhs.checked_div(rhs)?,
                _ => lhs.checked_rem(rhs)?,
            };
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<i64> {
        let t = self.peek()?;
        if t.kind == TokenKind::Punctuation {
            self.pos += 1;
            return match t.text {
                "-" => self.unary().map(i64::wrapping_neg),
                "+" => self.unary(),
                "~" => self.unary().map(|v| !v),
                "!" => self.unary().map(|v| i64::from(v == 0)),
                "(" => {
                    let value = self.binary(0)?;
                    self.peek().filter(|t| t.is_punct(")"))?;
                    self.pos += 1;
                    Some(value)
                }
                _ => None,
            };
        }
        self.pos += 1;
        match t.kind {
            TokenKind::Literal(LiteralKind::Integer) => parse_integer(t.text),
            TokenKind::Literal(LiteralKind::Char) => {
                let inner = unquote_char(t.text)?;
                Some(i64::from(inner))
            }
            TokenKind::Identifier => {
                // `Enum::Key` and `Class::Key` resolve by the last component.
                let mut key = t.text;
                while self.peek().is_some_and(|t| t.is_punct("::")) {
                    let next = *self.tokens.get(self.pos + 1)?;
                    key = next.text;
                    self.pos += 2;
                }
                self.known
                    .iter()
                    .rev()
                    .find(|(name, _)| name == key)
                    .map(|(_, value)| *value)
            }
            _ => None,
        }
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|&c| c != '\'').collect();
    let digits = cleaned.trim_end_matches(['u', 'U', 'l', 'L']);
    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, hex)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, bin)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    u64::from_str_radix(body, radix).ok().map(|v| v as i64)
}

fn unquote_char(text: &str) -> Option<u8> {
    let start = text.find('\'')? + 1;
    let inner = &text[start..text.len().checked_sub(1)?];
    match inner.as_bytes() {
        [b] => Some(*b),
        [b'\\', b'n'] => Some(b'\n'),
        [b'\\', b't'] => Some(b'\t'),
        [b'\\', b'0'] => Some(0),
        [b'\\', other] => Some(*other),
        _ => None,
    }
}
