//! Parser for C++ type-ids and function-object declarations.
//!
//! Two entry points:
//!
//! - [`parse_type`] reads a single type-id such as `int(foo::*)(N<0>) const &&`
//!   or `void(__stdcall *)(int, ...)`.
//! - [`parse_declarations`] reads `struct`/`class` definitions and lambda
//!   variables, keeping only what callability depends on: the call operators,
//!   their default arguments, base classes and whether the class is literal.
//!
//! Declarators are parsed into a list of operations applied to the base type
//! in order, which is how C++ reads them inside out.

use callable_traits_types::{
    AUTO, CallOperator, CallingConvention, ClassDecl, ClassTable, Cv, FunctionType, NULLPTR_T,
    QualifierSet, RefQualifier, Type,
};

use crate::{Error, Result};

/// Parse a single C++ type-id.
pub fn parse_type(source: &str) -> Result<Type> {
    let mut parser = Parser::new(source)?;
    let ty = parser.parse_type_id()?;
    parser.expect_end()?;
    Ok(ty)
}

/// Parse a comma separated list of type-ids, as written in a parameter list.
pub fn parse_type_list(source: &str) -> Result<Vec<Type>> {
    let mut parser = Parser::new(source)?;
    let mut types = Vec::new();
    if parser.at_end() {
        return Ok(types);
    }
    loop {
        types.push(parser.parse_type_id()?);
        if !parser.eat(&TokenKind::Comma) {
            break;
        }
    }
    parser.expect_end()?;
    Ok(types)
}

/// Parse class and lambda declarations into a [`ClassTable`].
pub fn parse_declarations(source: &str) -> Result<ClassTable> {
    let mut parser = Parser::new(source)?;
    let mut table = ClassTable::new();
    while !parser.at_end() {
        if parser.eat(&TokenKind::Semi) {
            continue;
        }
        match parser.peek_ident() {
            Some("struct") | Some("class") => {
                if let Some(class) = parser.parse_class()? {
                    table.insert(class);
                }
            }
            Some("auto") => table.insert(parser.parse_lambda()?),
            _ => return Err(parser.error("expected `struct`, `class` or a lambda declaration")),
        }
    }
    log::debug!("parsed {} class declarations", table.len());
    Ok(table)
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    /// Numbers, string and character literals
    Literal(String),
    ColonColon,
    Colon,
    Star,
    Amp,
    AmpAmp,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Lt,
    Gt,
    Comma,
    Ellipsis,
    Eq,
    Semi,
    Arrow,
    Tilde,
    Punct(char),
}

impl TokenKind {
    fn spelling(&self) -> String {
        match self {
            TokenKind::Ident(s) | TokenKind::Literal(s) => s.clone(),
            TokenKind::ColonColon => "::".into(),
            TokenKind::Colon => ":".into(),
            TokenKind::Star => "*".into(),
            TokenKind::Amp => "&".into(),
            TokenKind::AmpAmp => "&&".into(),
            TokenKind::LParen => "(".into(),
            TokenKind::RParen => ")".into(),
            TokenKind::LBracket => "[".into(),
            TokenKind::RBracket => "]".into(),
            TokenKind::LBrace => "{".into(),
            TokenKind::RBrace => "}".into(),
            TokenKind::Lt => "<".into(),
            TokenKind::Gt => ">".into(),
            TokenKind::Comma => ",".into(),
            TokenKind::Ellipsis => "...".into(),
            TokenKind::Eq => "=".into(),
            TokenKind::Semi => ";".into(),
            TokenKind::Arrow => "->".into(),
            TokenKind::Tilde => "~".into(),
            TokenKind::Punct(c) => c.to_string(),
        }
    }

    fn is_word(&self) -> bool {
        matches!(self, TokenKind::Ident(_) | TokenKind::Literal(_))
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

/// The base named by a `using base::operator();` member.
fn using_call_operator(tokens: &[Token]) -> Option<String> {
    let (first, rest) = tokens.split_first()?;
    if first.kind != TokenKind::Ident("using".into()) {
        return None;
    }
    let operator = rest
        .iter()
        .position(|t| t.kind == TokenKind::Ident("operator".into()))?;
    match &rest[..operator] {
        [scope @ .., last] if !scope.is_empty() && last.kind == TokenKind::ColonColon => {
            Some(scope.iter().map(|t| t.kind.spelling()).collect())
        }
        _ => None,
    }
}

fn lex(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line_start = true;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c == b'\n' {
            line_start = true;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        // preprocessor lines
        if c == b'#' && line_start {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        line_start = false;

        if source[i..].starts_with("//") {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if source[i..].starts_with("/*") {
            match source[i + 2..].find("*/") {
                Some(end) => i += end + 4,
                None => {
                    return Err(Error::Parse {
                        position: start,
                        message: "unterminated comment".into(),
                    });
                }
            }
            continue;
        }

        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            TokenKind::Ident(source[start..i].to_string())
        } else if c.is_ascii_digit() {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'\'')
            {
                i += 1;
            }
            TokenKind::Literal(source[start..i].to_string())
        } else if c == b'"' || c == b'\'' {
            i += 1;
            while i < bytes.len() && bytes[i] != c {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= bytes.len() {
                return Err(Error::Parse {
                    position: start,
                    message: "unterminated literal".into(),
                });
            }
            i += 1;
            TokenKind::Literal(source[start..i].to_string())
        } else {
            let rest = &source[i..];
            let (kind, len) = if rest.starts_with("::") {
                (TokenKind::ColonColon, 2)
            } else if rest.starts_with("&&") {
                (TokenKind::AmpAmp, 2)
            } else if rest.starts_with("...") {
                (TokenKind::Ellipsis, 3)
            } else if rest.starts_with("->") {
                (TokenKind::Arrow, 2)
            } else {
                let kind = match c {
                    b':' => TokenKind::Colon,
                    b'*' => TokenKind::Star,
                    b'&' => TokenKind::Amp,
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b'[' => TokenKind::LBracket,
                    b']' => TokenKind::RBracket,
                    b'{' => TokenKind::LBrace,
                    b'}' => TokenKind::RBrace,
                    b'<' => TokenKind::Lt,
                    b'>' => TokenKind::Gt,
                    b',' => TokenKind::Comma,
                    b'=' => TokenKind::Eq,
                    b';' => TokenKind::Semi,
                    b'~' => TokenKind::Tilde,
                    _ => {
                        let ch = rest.chars().next().unwrap_or('?');
                        i += ch.len_utf8();
                        tokens.push(Token {
                            kind: TokenKind::Punct(ch),
                            offset: start,
                        });
                        continue;
                    }
                };
                (kind, 1)
            };
            i += len;
            kind
        };
        tokens.push(Token {
            kind,
            offset: start,
        });
    }
    Ok(tokens)
}

// ============================================================================
// Declarator Operations
// ============================================================================

const BUILTIN_WORDS: &[&str] = &[
    "void", "bool", "char", "wchar_t", "char8_t", "char16_t", "char32_t", "short", "int",
    "long", "float", "double", "signed", "unsigned",
];

const ELABORATED: &[&str] = &["typename", "struct", "class", "enum", "union"];

const RESERVED: &[&str] = &[
    "const",
    "volatile",
    "noexcept",
    "transaction_safe",
    "transaction_safe_dynamic",
    "throw",
    "operator",
    "template",
    "constexpr",
    "consteval",
    "static",
    "virtual",
    "inline",
    "explicit",
    "mutable",
    "friend",
    "public",
    "private",
    "protected",
    "override",
    "final",
    "decltype",
];

fn calling_convention(word: &str) -> Option<CallingConvention> {
    if word.starts_with('_') || word == "pascal" {
        CallingConvention::from_keyword(word).filter(|cc| *cc != CallingConvention::Default)
    } else {
        None
    }
}

#[derive(Debug)]
struct FunctionSuffix {
    params: Vec<Type>,
    qualifiers: QualifierSet,
    default_args: usize,
    trailing_return: Option<Type>,
}

#[derive(Debug)]
enum DeclOp {
    Pointer(Cv),
    LvalueRef,
    RvalueRef,
    MemberPointer(Type, Cv),
    Function(FunctionSuffix),
    Convention(CallingConvention),
}

// ============================================================================
// Parser
// ============================================================================

/// Declarators and template argument lists nested deeper than this are
/// rejected.
const MAX_NESTING: usize = 128;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    len: usize,
    depth: usize,
    /// Set once `MAX_NESTING` is hit, so backtracking does not swallow it
    too_deep: bool,
}

impl Parser {
    fn new(source: &str) -> Result<Self> {
        Ok(Self {
            tokens: lex(source)?,
            pos: 0,
            len: source.len(),
            depth: 0,
            too_deep: false,
        })
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            self.too_deep = true;
            return Err(self.error("type is nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let position = self.tokens.get(self.pos).map_or(self.len, |t| t.offset);
        Error::Parse {
            position,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(TokenKind::Ident(word)) => Some(word),
            _ => None,
        }
    }

    fn bump(&mut self) -> Option<TokenKind> {
        let token = self.tokens.get(self.pos).map(|t| t.kind.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek_ident() == Some(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`", kind.spelling())))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{word}`")))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(TokenKind::Ident(word)) if !RESERVED.contains(&word.as_str()) => {
                let word = word.clone();
                self.pos += 1;
                Ok(word)
            }
            _ => Err(self.error("expected an identifier")),
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    /// Skip a balanced group starting at the current opening token.
    fn skip_balanced(&mut self, open: &TokenKind, close: &TokenKind) -> Result<Vec<TokenKind>> {
        self.expect(open)?;
        let mut depth = 1;
        let mut inner = Vec::new();
        while let Some(token) = self.bump() {
            if &token == open {
                depth += 1;
            } else if &token == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(inner);
                }
            }
            inner.push(token);
        }
        Err(self.error(format!("unbalanced `{}`", open.spelling())))
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn parse_type_id(&mut self) -> Result<Type> {
        let base = self.parse_decl_specifiers()?;
        self.parse_declarator(base, false)
    }

    fn parse_decl_specifiers(&mut self) -> Result<Type> {
        let mut cv = Cv::NONE;
        let mut words: Vec<String> = Vec::new();
        let mut name: Option<String> = None;

        loop {
            let Some(token) = self.peek() else { break };
            let have_type = name.is_some() || !words.is_empty();
            match token {
                TokenKind::Ident(word) => match word.as_str() {
                    "const" => {
                        cv.is_const = true;
                        self.pos += 1;
                    }
                    "volatile" => {
                        cv.is_volatile = true;
                        self.pos += 1;
                    }
                    w if ELABORATED.contains(&w) && !have_type => self.pos += 1,
                    w if BUILTIN_WORDS.contains(&w) && name.is_none() => {
                        words.push(w.to_string());
                        self.pos += 1;
                    }
                    "decltype" if !have_type => {
                        self.pos += 1;
                        let inner = self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)?;
                        if inner != [TokenKind::Ident("nullptr".into())] {
                            return Err(self.error("only `decltype(nullptr)` is supported"));
                        }
                        name = Some(NULLPTR_T.to_string());
                    }
                    w if !have_type
                        && !RESERVED.contains(&w)
                        && calling_convention(w).is_none() =>
                    {
                        name = Some(self.parse_qualified_name()?);
                    }
                    _ => break,
                },
                TokenKind::ColonColon if !have_type => {
                    name = Some(self.parse_qualified_name()?);
                }
                _ => break,
            }
        }

        let base = if !words.is_empty() {
            Type::named(self.normalize_builtin(&words)?)
        } else if let Some(name) = name {
            match name.as_str() {
                "nullptr_t" | "::std::nullptr_t" => Type::named(NULLPTR_T),
                _ => Type::named(name),
            }
        } else {
            return Err(self.error("expected a type"));
        };
        Ok(Type::qualified(cv, base))
    }

    fn normalize_builtin(&self, words: &[String]) -> Result<String> {
        let mut signedness: Option<&str> = None;
        let mut longs = 0;
        let mut short = false;
        let mut base: Option<&str> = None;
        for word in words {
            match word.as_str() {
                "signed" | "unsigned" => signedness = Some(word),
                "long" => longs += 1,
                "short" => short = true,
                other => {
                    if base.is_some() {
                        return Err(self.error("conflicting type specifiers"));
                    }
                    base = Some(other);
                }
            }
        }
        let modified = signedness.is_some() || short || longs > 0;
        let name = match base {
            Some("char") if !short && longs == 0 => match signedness {
                Some(sign) => format!("{sign} char"),
                None => "char".to_string(),
            },
            Some("double") if longs == 1 && signedness.is_none() && !short => {
                "long double".to_string()
            }
            Some("int") | None => {
                let core = match (short, longs) {
                    (true, 0) => "short",
                    (false, 0) => "int",
                    (false, 1) => "long",
                    (false, 2) => "long long",
                    _ => return Err(self.error("invalid integer type specifiers")),
                };
                if signedness == Some("unsigned") {
                    format!("unsigned {core}")
                } else {
                    core.to_string()
                }
            }
            Some(other) if !modified => other.to_string(),
            Some(other) => return Err(self.error(format!("`{other}` cannot be modified"))),
        };
        Ok(name)
    }

    /// `a::b<c>::d`, stopping before a `::*` member pointer suffix.
    fn parse_qualified_name(&mut self) -> Result<String> {
        let mut out = String::new();
        if self.eat(&TokenKind::ColonColon) {
            out.push_str("::");
        }
        loop {
            out.push_str(&self.expect_ident()?);
            if self.peek() == Some(&TokenKind::Lt) {
                out.push_str(&self.parse_template_args()?);
            }
            let continues = self.peek() == Some(&TokenKind::ColonColon)
                && matches!(self.peek_at(1), Some(TokenKind::Ident(_)));
            if !continues {
                break;
            }
            self.pos += 1;
            out.push_str("::");
        }
        Ok(out)
    }

    /// Template arguments, normalized to `<a, b>` with each type argument
    /// spelled canonically.
    fn parse_template_args(&mut self) -> Result<String> {
        self.nested(Self::template_args)
    }

    fn template_args(&mut self) -> Result<String> {
        self.expect(&TokenKind::Lt)?;
        let mut args = Vec::new();
        if !self.eat(&TokenKind::Gt) {
            loop {
                let start = self.pos;
                let as_type = match self.parse_type_id() {
                    Err(error) if self.too_deep => return Err(error),
                    parsed => parsed.ok().filter(|_| {
                        matches!(self.peek(), Some(TokenKind::Comma) | Some(TokenKind::Gt))
                    }),
                };
                match as_type {
                    Some(ty) => args.push(ty.to_string()),
                    None => {
                        self.pos = start;
                        args.push(self.parse_constant_expression()?);
                    }
                }
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::Gt)?;
                break;
            }
        }
        Ok(format!("<{}>", args.join(", ")))
    }

    fn parse_constant_expression(&mut self) -> Result<String> {
        let mut out = String::new();
        let mut depth = 0;
        let mut previous_was_word = false;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated template argument list")),
                Some(TokenKind::Comma) | Some(TokenKind::Gt) if depth == 0 => break,
                Some(TokenKind::LParen) => depth += 1,
                Some(TokenKind::RParen) => depth -= 1,
                _ => {}
            }
            let Some(token) = self.bump() else { break };
            if previous_was_word && token.is_word() {
                out.push(' ');
            }
            previous_was_word = token.is_word();
            out.push_str(&token.spelling());
        }
        if out.is_empty() {
            return Err(self.error("expected a template argument"));
        }
        Ok(out)
    }

    fn parse_cv_seq(&mut self) -> Cv {
        let mut cv = Cv::NONE;
        loop {
            if self.eat_keyword("const") {
                cv.is_const = true;
            } else if self.eat_keyword("volatile") {
                cv.is_volatile = true;
            } else {
                return cv;
            }
        }
    }

    /// True if the tokens at `offset` start `name::*`.
    fn is_member_pointer_start(&self, offset: usize) -> bool {
        let mut i = self.pos + offset;
        let kind = |i: usize| self.tokens.get(i).map(|t| &t.kind);
        if kind(i) == Some(&TokenKind::ColonColon) {
            i += 1;
        }
        loop {
            match kind(i) {
                Some(TokenKind::Ident(word)) if !RESERVED.contains(&word.as_str()) => i += 1,
                _ => return false,
            }
            if kind(i) == Some(&TokenKind::Lt) {
                let mut depth = 0;
                loop {
                    match kind(i) {
                        Some(TokenKind::Lt) => depth += 1,
                        Some(TokenKind::Gt) => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        None => return false,
                        _ => {}
                    }
                    i += 1;
                }
            }
            if kind(i) != Some(&TokenKind::ColonColon) {
                return false;
            }
            i += 1;
            if kind(i) == Some(&TokenKind::Star) {
                return true;
            }
        }
    }

    fn parse_ptr_operator(&mut self) -> Result<Option<DeclOp>> {
        let op = match self.peek() {
            Some(TokenKind::Star) => {
                self.pos += 1;
                DeclOp::Pointer(self.parse_cv_seq())
            }
            Some(TokenKind::Amp) => {
                self.pos += 1;
                DeclOp::LvalueRef
            }
            Some(TokenKind::AmpAmp) => {
                self.pos += 1;
                DeclOp::RvalueRef
            }
            Some(TokenKind::Ident(_)) | Some(TokenKind::ColonColon)
                if self.is_member_pointer_start(0) =>
            {
                let class = self.parse_qualified_name()?;
                self.expect(&TokenKind::ColonColon)?;
                self.expect(&TokenKind::Star)?;
                DeclOp::MemberPointer(Type::named(class), self.parse_cv_seq())
            }
            _ => return Ok(None),
        };
        Ok(Some(op))
    }

    fn is_nested_declarator(&self) -> bool {
        match self.peek_at(1) {
            Some(TokenKind::Star) | Some(TokenKind::Amp) | Some(TokenKind::AmpAmp) => true,
            Some(TokenKind::Ident(word)) if calling_convention(word).is_some() => true,
            Some(TokenKind::Ident(_)) | Some(TokenKind::ColonColon) => {
                self.is_member_pointer_start(1)
            }
            _ => false,
        }
    }

    fn parse_declarator(&mut self, base: Type, allow_name: bool) -> Result<Type> {
        let ops = self.parse_declarator_ops(allow_name)?;
        self.apply_ops(base, ops)
    }

    fn parse_declarator_ops(&mut self, allow_name: bool) -> Result<Vec<DeclOp>> {
        self.nested(|parser| parser.declarator_ops(allow_name))
    }

    fn declarator_ops(&mut self, allow_name: bool) -> Result<Vec<DeclOp>> {
        if let Some(op) = self.parse_ptr_operator()? {
            let mut ops = vec![op];
            ops.extend(self.parse_declarator_ops(allow_name)?);
            return Ok(ops);
        }
        if let Some(cc) = self.peek_ident().and_then(calling_convention) {
            self.pos += 1;
            let mut ops = vec![DeclOp::Convention(cc)];
            ops.extend(self.parse_declarator_ops(allow_name)?);
            return Ok(ops);
        }

        let mut inner = Vec::new();
        if self.peek() == Some(&TokenKind::LParen) && self.is_nested_declarator() {
            self.pos += 1;
            inner = self.parse_declarator_ops(allow_name)?;
            self.expect(&TokenKind::RParen)?;
        } else if allow_name {
            if let Some(word) = self.peek_ident() {
                if !RESERVED.contains(&word) {
                    self.pos += 1;
                }
            }
        }

        let mut suffixes = Vec::new();
        loop {
            match self.peek() {
                Some(TokenKind::LParen) => {
                    suffixes.push(DeclOp::Function(self.parse_function_suffix()?));
                }
                Some(TokenKind::LBracket) => {
                    return Err(self.error("array types are not supported"));
                }
                _ => break,
            }
        }
        suffixes.reverse();
        suffixes.extend(inner);
        Ok(suffixes)
    }

    fn apply_ops(&self, base: Type, ops: Vec<DeclOp>) -> Result<Type> {
        let mut ty = base;
        let mut pending_convention = None;
        for op in ops {
            ty = match op {
                DeclOp::Pointer(cv) => {
                    self.check_target(&ty, "pointer")?;
                    Type::qualified(cv, Type::pointer(ty))
                }
                DeclOp::LvalueRef => {
                    self.check_target(&ty, "reference")?;
                    Type::lvalue_ref(ty)
                }
                DeclOp::RvalueRef => {
                    self.check_target(&ty, "reference")?;
                    Type::rvalue_ref(ty)
                }
                DeclOp::MemberPointer(class, cv) => {
                    if ty.is_reference() || ty.is_void() {
                        return Err(self.error(format!("cannot form a member pointer to `{ty}`")));
                    }
                    Type::qualified(cv, Type::member_pointer(class, ty))
                }
                DeclOp::Function(suffix) => {
                    if ty.is_function() {
                        return Err(self.error("a function cannot return a function"));
                    }
                    let return_type = match suffix.trailing_return {
                        Some(trailing) if ty.is_auto() => trailing,
                        Some(_) => {
                            return Err(self.error("a trailing return type requires `auto`"));
                        }
                        None => ty,
                    };
                    let mut qualifiers = suffix.qualifiers;
                    if let Some(cc) = pending_convention.take() {
                        qualifiers.calling_convention = cc;
                    }
                    Type::function(FunctionType {
                        return_type: Box::new(return_type),
                        params: suffix.params,
                        qualifiers,
                    })
                }
                DeclOp::Convention(cc) => {
                    match &mut ty {
                        Type::Function(function) => function.qualifiers.calling_convention = cc,
                        _ => pending_convention = Some(cc),
                    }
                    continue;
                }
            };
        }
        if pending_convention.is_some() {
            return Err(self.error("calling convention without a function type"));
        }
        Ok(ty)
    }

    fn check_target(&self, ty: &Type, what: &str) -> Result<()> {
        if ty.is_reference() {
            return Err(self.error(format!("cannot form a {what} to reference `{ty}`")));
        }
        if let Type::Function(function) = ty {
            if function.is_abominable() {
                return Err(self.error(format!(
                    "cannot form a {what} to abominable function type `{ty}`"
                )));
            }
        }
        if what == "reference" && ty.is_void() {
            return Err(self.error("cannot form a reference to void"));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------------

    fn parse_function_suffix(&mut self) -> Result<FunctionSuffix> {
        let (params, is_variadic, default_args) = self.parse_parameter_list()?;
        let qualifiers = self.parse_function_qualifiers()?.with_variadic(is_variadic);
        let trailing_return = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_type_id()?)
        } else {
            None
        };
        Ok(FunctionSuffix {
            params,
            qualifiers,
            default_args,
            trailing_return,
        })
    }

    /// Returns the parameters, whether the list ends in `...`, and how many
    /// trailing parameters have default arguments.
    fn parse_parameter_list(&mut self) -> Result<(Vec<Type>, bool, usize)> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        let mut is_variadic = false;
        let mut default_args = 0;

        if !self.eat(&TokenKind::RParen) {
            loop {
                if self.eat(&TokenKind::Ellipsis) {
                    is_variadic = true;
                    self.expect(&TokenKind::RParen)?;
                    break;
                }
                let base = self.parse_decl_specifiers()?;
                let param = self.parse_declarator(base, true)?;
                if self.eat(&TokenKind::Eq) {
                    self.skip_default_argument()?;
                    default_args += 1;
                } else if default_args > 0 {
                    return Err(self.error("missing default argument after a defaulted parameter"));
                }
                params.push(adjust_parameter(param));
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                if self.eat(&TokenKind::Ellipsis) {
                    is_variadic = true;
                }
                self.expect(&TokenKind::RParen)?;
                break;
            }
        }

        if params == [Type::void()] && !is_variadic {
            params.clear();
        }
        if params.iter().any(Type::is_void) {
            return Err(self.error("`void` is not a valid parameter type"));
        }
        Ok((params, is_variadic, default_args))
    }

    fn skip_default_argument(&mut self) -> Result<()> {
        let mut depth = 0;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated default argument")),
                Some(TokenKind::Comma) | Some(TokenKind::RParen) if depth == 0 => return Ok(()),
                Some(TokenKind::LParen) | Some(TokenKind::LBrace) | Some(TokenKind::LBracket) => {
                    depth += 1
                }
                Some(TokenKind::RParen) | Some(TokenKind::RBrace) | Some(TokenKind::RBracket) => {
                    depth -= 1
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    fn parse_function_qualifiers(&mut self) -> Result<QualifierSet> {
        let mut quals = QualifierSet::default();
        loop {
            match self.peek() {
                Some(TokenKind::Amp) | Some(TokenKind::AmpAmp)
                    if quals.ref_qualifier != RefQualifier::None =>
                {
                    return Err(self.error("duplicate ref-qualifier"));
                }
                Some(TokenKind::Amp) => {
                    self.pos += 1;
                    quals.ref_qualifier = RefQualifier::Lvalue;
                }
                Some(TokenKind::AmpAmp) => {
                    self.pos += 1;
                    quals.ref_qualifier = RefQualifier::Rvalue;
                }
                Some(TokenKind::Ident(word)) => match word.as_str() {
                    "const" => {
                        self.pos += 1;
                        quals.is_const = true;
                    }
                    "volatile" => {
                        self.pos += 1;
                        quals.is_volatile = true;
                    }
                    "transaction_safe" | "transaction_safe_dynamic" => {
                        self.pos += 1;
                        quals.is_transaction_safe = true;
                    }
                    "noexcept" => {
                        self.pos += 1;
                        quals.is_noexcept = true;
                        if self.peek() == Some(&TokenKind::LParen) {
                            let condition =
                                self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)?;
                            quals.is_noexcept =
                                condition != [TokenKind::Ident("false".into())];
                        }
                    }
                    "throw" => {
                        self.pos += 1;
                        let exceptions =
                            self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)?;
                        quals.is_noexcept = exceptions.is_empty();
                    }
                    _ => return Ok(quals),
                },
                _ => return Ok(quals),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn parse_class(&mut self) -> Result<Option<ClassDecl>> {
        self.pos += 1;
        let name = self.parse_qualified_name()?;
        self.eat_keyword("final");

        let mut class = ClassDecl::new(name);
        if self.eat(&TokenKind::Colon) {
            loop {
                while matches!(
                    self.peek_ident(),
                    Some("public") | Some("private") | Some("protected") | Some("virtual")
                ) {
                    self.pos += 1;
                }
                class.bases.push(self.parse_qualified_name()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if self.eat(&TokenKind::Semi) {
            // forward declaration
            return Ok(Some(class));
        }
        self.expect(&TokenKind::LBrace)?;

        loop {
            if self.eat(&TokenKind::RBrace) {
                break;
            }
            if self.at_end() {
                return Err(self.error(format!("unterminated definition of `{}`", class.name)));
            }
            if matches!(
                self.peek_ident(),
                Some("public") | Some("private") | Some("protected")
            ) && self.peek_at(1) == Some(&TokenKind::Colon)
            {
                self.pos += 2;
                continue;
            }
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            self.parse_member(&mut class)?;
        }
        self.eat(&TokenKind::Semi);
        Ok(Some(class))
    }

    /// Parse one member declaration, recording it if it is a call operator.
    fn parse_member(&mut self, class: &mut ClassDecl) -> Result<()> {
        let start = self.pos;
        let end = self.member_end()?;
        let tokens = &self.tokens[start..end];

        let is_call_operator = tokens.windows(3).any(|w| {
            w[0].kind == TokenKind::Ident("operator".into())
                && w[1].kind == TokenKind::LParen
                && w[2].kind == TokenKind::RParen
        });
        let declares_destructor = tokens.iter().any(|t| t.kind == TokenKind::Tilde);
        let is_defaulted = tokens.windows(2).any(|w| {
            w[0].kind == TokenKind::Eq && w[1].kind == TokenKind::Ident("default".into())
        });
        if declares_destructor && !is_defaulted {
            class.is_literal = false;
        }

        if is_call_operator {
            if let Some(base) = using_call_operator(tokens) {
                class.using_call_operators.push(base);
            } else if let Some(operator) = self.parse_call_operator()? {
                class.call_operators.push(operator);
            }
        }
        self.pos = end;
        Ok(())
    }

    /// Index just past the current member: its `;` or its body.
    fn member_end(&self) -> Result<usize> {
        let mut depth = 0i32;
        let mut i = self.pos;
        while let Some(token) = self.tokens.get(i) {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth -= 1,
                TokenKind::Semi if depth == 0 => return Ok(i + 1),
                TokenKind::LBrace if depth == 0 => {
                    let mut braces = 0;
                    while let Some(token) = self.tokens.get(i) {
                        match token.kind {
                            TokenKind::LBrace => braces += 1,
                            TokenKind::RBrace => {
                                braces -= 1;
                                if braces == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                    if i >= self.tokens.len() {
                        break;
                    }
                    if self.tokens.get(i + 1).map(|t| &t.kind) == Some(&TokenKind::Semi) {
                        i += 1;
                    }
                    return Ok(i + 1);
                }
                TokenKind::RBrace if depth == 0 => return Ok(i),
                _ => {}
            }
            i += 1;
        }
        Err(self.error("unterminated member declaration"))
    }

    fn parse_call_operator(&mut self) -> Result<Option<CallOperator>> {
        let mut is_template = false;
        let mut is_constexpr = false;

        if self.eat_keyword("template") {
            skip_angle_brackets(self)?;
            is_template = true;
        }
        loop {
            match self.peek_ident() {
                Some("constexpr") | Some("consteval") => {
                    is_constexpr = true;
                    self.pos += 1;
                }
                Some("inline") | Some("virtual") | Some("explicit") | Some("static")
                | Some("friend") => self.pos += 1,
                _ => break,
            }
        }

        let base = self.parse_decl_specifiers()?;
        let mut ops = Vec::new();
        while let Some(op) = self.parse_ptr_operator()? {
            ops.push(op);
        }
        let return_type = self.apply_ops(base, ops)?;

        self.expect_keyword("operator")?;
        self.expect(&TokenKind::LParen)?;
        self.expect(&TokenKind::RParen)?;
        let suffix = self.parse_function_suffix()?;

        while matches!(self.peek_ident(), Some("override") | Some("final")) {
            self.pos += 1;
        }
        if self.eat(&TokenKind::Eq) && self.peek_ident() == Some("delete") {
            return Ok(None);
        }

        let return_type = match suffix.trailing_return {
            Some(trailing) if return_type.is_auto() => trailing,
            Some(_) => return Err(self.error("a trailing return type requires `auto`")),
            None => return_type,
        };
        is_template |= suffix.params.iter().any(mentions_auto);

        Ok(Some(CallOperator {
            function: FunctionType {
                return_type: Box::new(return_type),
                params: suffix.params,
                qualifiers: suffix.qualifiers,
            },
            default_args: suffix.default_args,
            is_constexpr,
            is_template,
        }))
    }

    /// `auto name = [captures](params) specifiers -> ret { body };`
    fn parse_lambda(&mut self) -> Result<ClassDecl> {
        self.expect_keyword("auto")?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::Eq)?;
        self.skip_balanced(&TokenKind::LBracket, &TokenKind::RBracket)?;

        let mut is_template = false;
        if self.peek() == Some(&TokenKind::Lt) {
            skip_angle_brackets(self)?;
            is_template = true;
        }

        let (params, is_variadic, default_args) = if self.peek() == Some(&TokenKind::LParen) {
            self.parse_parameter_list()?
        } else {
            (Vec::new(), false, 0)
        };

        let mut qualifiers = QualifierSet {
            is_const: true,
            is_variadic,
            ..QualifierSet::default()
        };
        let mut is_constexpr = false;
        loop {
            if self.eat_keyword("mutable") {
                qualifiers.is_const = false;
            } else if self.eat_keyword("constexpr") || self.eat_keyword("consteval") {
                is_constexpr = true;
            } else if self.peek_ident() == Some("noexcept")
                || self.peek_ident() == Some("transaction_safe")
            {
                let extra = self.parse_function_qualifiers()?;
                qualifiers.is_noexcept |= extra.is_noexcept;
                qualifiers.is_transaction_safe |= extra.is_transaction_safe;
            } else {
                break;
            }
        }
        let trailing_return = if self.eat(&TokenKind::Arrow) {
            Some(self.parse_type_id()?)
        } else {
            None
        };

        let body = self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)?;
        self.eat(&TokenKind::Semi);

        let return_type = trailing_return.unwrap_or_else(|| {
            let returns_value = body.windows(2).any(|w| {
                w[0] == TokenKind::Ident("return".into()) && w[1] != TokenKind::Semi
            });
            if returns_value {
                Type::named(AUTO)
            } else {
                Type::void()
            }
        });
        is_template |= params.iter().any(mentions_auto);

        let operator = CallOperator {
            function: FunctionType {
                return_type: Box::new(return_type),
                params,
                qualifiers,
            },
            default_args,
            is_constexpr,
            is_template,
        };
        Ok(ClassDecl::new(name).with_call_operator(operator))
    }
}

fn skip_angle_brackets(parser: &mut Parser) -> Result<()> {
    parser
        .skip_balanced(&TokenKind::Lt, &TokenKind::Gt)
        .map(|_| ())
}

/// Parameter types are adjusted: top-level cv is dropped and functions
/// decay to function pointers.
fn adjust_parameter(param: Type) -> Type {
    match param {
        Type::Qualified { inner, .. } => adjust_parameter(*inner),
        Type::Function(function) => Type::pointer(Type::Function(function)),
        other => other,
    }
}

fn mentions_auto(ty: &Type) -> bool {
    match ty {
        Type::Named { name } => name == AUTO,
        Type::Qualified { inner, .. } => mentions_auto(inner),
        Type::Pointer { pointee } => mentions_auto(pointee),
        Type::LvalueReference { referent } | Type::RvalueReference { referent } => {
            mentions_auto(referent)
        }
        Type::MemberPointer { class, pointee } => mentions_auto(class) || mentions_auto(pointee),
        Type::Function(function) => {
            mentions_auto(&function.return_type) || function.params.iter().any(mentions_auto)
        }
    }
}
