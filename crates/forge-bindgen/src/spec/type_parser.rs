//! Parser for the signature mini-language
//!
//! Type strings in a spec look like C++ with a few extensions:
//!
//! ```text
//! std::vector<std::shared_ptr<Realm>> const&
//! (path: const std::string&, cb: AsyncCallback<(err: std::optional<AppError>)>) const -> void
//! ```
//!
//! Functions list named arguments, optional `const` / `noexcept` /
//! `off_thread` flags, and an optional `-> Ret` (defaulting to `void`).

use std::fmt;
use thiserror::Error;

/// A parsed, not yet resolved, type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// A possibly qualified name (`int32_t`, `std::string`)
    Name(String),
    /// A template instantiation (`std::vector<T>`)
    Template { name: String, args: Vec<TypeSpec> },
    /// A function signature
    Function(FunctionSpec),
    Const(Box<TypeSpec>),
    Pointer(Box<TypeSpec>),
    Ref(Box<TypeSpec>),
    RRef(Box<TypeSpec>),
}

/// A parsed function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub args: Vec<ArgSpec>,
    pub ret: Box<TypeSpec>,
    pub is_const: bool,
    pub is_noexcept: bool,
    pub is_off_thread: bool,
}

/// A named function argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub ty: TypeSpec,
}

/// Failure to parse a type string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse type '{input}' at offset {offset}: {message}")]
pub struct TypeParseError {
    pub input: String,
    pub offset: usize,
    pub message: String,
}

impl TypeSpec {
    pub fn void() -> Self {
        TypeSpec::Name("void".to_string())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeSpec::Name(name) if name == "void")
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Name(name) => write!(f, "{}", name),
            TypeSpec::Template { name, args } => {
                write!(f, "{}<", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeSpec::Function(func) => write!(f, "{}", func),
            TypeSpec::Const(inner) => write!(f, "{} const", inner),
            TypeSpec::Pointer(inner) => write!(f, "{}*", inner),
            TypeSpec::Ref(inner) => write!(f, "{}&", inner),
            TypeSpec::RRef(inner) => write!(f, "{}&&", inner),
        }
    }
}

impl fmt::Display for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", arg.name, arg.ty)?;
        }
        write!(f, ")")?;
        if self.is_const {
            write!(f, " const")?;
        }
        if self.is_noexcept {
            write!(f, " noexcept")?;
        }
        if self.is_off_thread {
            write!(f, " off_thread")?;
        }
        write!(f, " -> {}", self.ret)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Scope,
    Lt,
    Gt,
    Comma,
    LParen,
    RParen,
    Colon,
    Star,
    Amp,
    AmpAmp,
    Arrow,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Ident(ident) => ident,
            Token::Scope => "::",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::Colon => ":",
            Token::Star => "*",
            Token::Amp => "&",
            Token::AmpAmp => "&&",
            Token::Arrow => "->",
        };
        write!(f, "'{}'", text)
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token<'_>)>, TypeParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let token = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
                Token::Scope
            }
            b':' => {
                i += 1;
                Token::Colon
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                i += 2;
                Token::AmpAmp
            }
            b'&' => {
                i += 1;
                Token::Amp
            }
            b'-' if bytes.get(i + 1) == Some(&b'>') => {
                i += 2;
                Token::Arrow
            }
            b'<' => {
                i += 1;
                Token::Lt
            }
            b'>' => {
                i += 1;
                Token::Gt
            }
            b',' => {
                i += 1;
                Token::Comma
            }
            b'(' => {
                i += 1;
                Token::LParen
            }
            b')' => {
                i += 1;
                Token::RParen
            }
            b'*' => {
                i += 1;
                Token::Star
            }
            c if c == b'_' || c.is_ascii_alphanumeric() => {
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                Token::Ident(&input[start..i])
            }
            _ => {
                return Err(TypeParseError {
                    input: input.to_string(),
                    offset: start,
                    message: format!("unexpected character '{}'", input[start..].chars().next().unwrap_or('?')),
                })
            }
        };
        tokens.push((start, token));
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).map(|(_, t)| *t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.input.len())
    }

    fn error(&self, message: impl Into<String>) -> TypeParseError {
        TypeParseError {
            input: self.input.to_string(),
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> TypeParseError {
        match self.peek() {
            Some(token) => self.error(format!("expected {}, found {}", expected, token)),
            None => self.error(format!("expected {}, found end of input", expected)),
        }
    }

    fn eat(&mut self, token: Token<'a>) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token<'a>) -> Result<(), TypeParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn eat_keyword(&mut self, keyword: &'a str) -> bool {
        self.eat(Token::Ident(keyword))
    }

    fn ident(&mut self) -> Result<&'a str, TypeParseError> {
        match self.peek() {
            Some(Token::Ident(ident)) if ident != "const" => {
                self.pos += 1;
                Ok(ident)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    fn parse_type(&mut self) -> Result<TypeSpec, TypeParseError> {
        let leading_const = self.eat_keyword("const");

        let mut ty = if self.peek() == Some(Token::LParen) {
            TypeSpec::Function(self.parse_function()?)
        } else {
            let name = self.parse_name()?;
            if self.eat(Token::Lt) {
                let args = self.parse_template_args()?;
                TypeSpec::Template { name, args }
            } else {
                TypeSpec::Name(name)
            }
        };

        if leading_const {
            ty = TypeSpec::Const(Box::new(ty));
        }

        loop {
            ty = match self.peek() {
                Some(Token::Ident("const")) => TypeSpec::Const(Box::new(ty)),
                Some(Token::Star) => TypeSpec::Pointer(Box::new(ty)),
                Some(Token::Amp) => TypeSpec::Ref(Box::new(ty)),
                Some(Token::AmpAmp) => TypeSpec::RRef(Box::new(ty)),
                _ => break,
            };
            self.pos += 1;
        }

        Ok(ty)
    }

    fn parse_name(&mut self) -> Result<String, TypeParseError> {
        let mut name = self.ident()?.to_string();
        while self.eat(Token::Scope) {
            name.push_str("::");
            name.push_str(self.ident()?);
        }
        Ok(name)
    }

    fn parse_template_args(&mut self) -> Result<Vec<TypeSpec>, TypeParseError> {
        let mut args = vec![self.parse_type()?];
        while self.eat(Token::Comma) {
            if self.peek() == Some(Token::Gt) {
                break;
            }
            args.push(self.parse_type()?);
        }
        self.expect(Token::Gt)?;
        Ok(args)
    }

    fn parse_function(&mut self) -> Result<FunctionSpec, TypeParseError> {
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        while self.peek() != Some(Token::RParen) {
            let name = self.ident()?.to_string();
            self.expect(Token::Colon)?;
            let ty = self.parse_type()?;
            args.push(ArgSpec { name, ty });
            if !self.eat(Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;

        let mut func = FunctionSpec {
            args,
            ret: Box::new(TypeSpec::void()),
            is_const: false,
            is_noexcept: false,
            is_off_thread: false,
        };

        loop {
            if self.eat_keyword("const") {
                func.is_const = true;
            } else if self.eat_keyword("noexcept") {
                func.is_noexcept = true;
            } else if self.eat_keyword("off_thread") {
                func.is_off_thread = true;
            } else {
                break;
            }
        }

        if self.eat(Token::Arrow) {
            func.ret = Box::new(self.parse_type()?);
        }

        Ok(func)
    }
}

/// Parse a type string
pub fn parse_type(input: &str) -> Result<TypeSpec, TypeParseError> {
    let mut parser = Parser {
        input,
        tokens: tokenize(input)?,
        pos: 0,
    };
    let ty = parser.parse_type()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(ty)
}

/// Parse a type string that must be a function signature
pub fn parse_function(input: &str) -> Result<FunctionSpec, TypeParseError> {
    match parse_type(input)? {
        TypeSpec::Function(func) => Ok(func),
        other => Err(TypeParseError {
            input: input.to_string(),
            offset: 0,
            message: format!("expected a function signature, found '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(n: &str) -> TypeSpec {
        TypeSpec::Name(n.to_string())
    }

    #[test]
    fn test_parse_qualified_name() {
        assert_eq!(parse_type("foo").unwrap(), name("foo"));
        assert_eq!(parse_type("foo::bar").unwrap(), name("foo::bar"));
    }

    #[test]
    fn test_parse_nested_templates() {
        let ty = parse_type("std::vector<std::pair<int32_t, foo::bar>>").unwrap();
        assert_eq!(
            ty,
            TypeSpec::Template {
                name: "std::vector".into(),
                args: vec![TypeSpec::Template {
                    name: "std::pair".into(),
                    args: vec![name("int32_t"), name("foo::bar")],
                }],
            }
        );
    }

    #[test]
    fn test_parse_modifiers_in_order() {
        assert_eq!(
            parse_type("const EJson*").unwrap(),
            TypeSpec::Pointer(Box::new(TypeSpec::Const(Box::new(name("EJson")))))
        );
        assert_eq!(
            parse_type("std::string const&").unwrap(),
            TypeSpec::Ref(Box::new(TypeSpec::Const(Box::new(name("std::string")))))
        );
        assert_eq!(
            parse_type("Obj&&").unwrap(),
            TypeSpec::RRef(Box::new(name("Obj")))
        );
    }

    #[test]
    fn test_parse_empty_function_defaults_to_void() {
        let func = parse_function("()").unwrap();
        assert!(func.args.is_empty());
        assert!(func.ret.is_void());
        assert!(!func.is_const);
    }

    #[test]
    fn test_parse_function_with_flags() {
        let func = parse_function("(n: int32_t, cb: (ok: bool) -> void) const noexcept off_thread -> bool").unwrap();
        assert_eq!(func.args.len(), 2);
        assert_eq!(func.args[0].name, "n");
        assert!(matches!(func.args[1].ty, TypeSpec::Function(_)));
        assert!(func.is_const && func.is_noexcept && func.is_off_thread);
        assert_eq!(*func.ret, name("bool"));
    }

    #[test]
    fn test_parse_trailing_commas() {
        let func = parse_function("(a: int32_t, b: std::tuple<bool, double,>,)").unwrap();
        assert_eq!(func.args.len(), 2);
        match &func.args[1].ty {
            TypeSpec::Template { args, .. } => assert_eq!(args.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors_report_offset() {
        let err = parse_type("std::vector<int32_t").unwrap_err();
        assert_eq!(err.offset, 19);
        assert!(err.message.contains("'>'"));

        let err = parse_type("foo bar").unwrap_err();
        assert_eq!(err.offset, 4);

        let err = parse_type("foo$").unwrap_err();
        assert!(err.message.contains("unexpected character"));
    }

    #[test]
    fn test_parse_function_rejects_non_function() {
        assert!(parse_function("int32_t").is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parser() {
        let text = "(a: std::vector<int32_t> const&) const -> std::optional<bool>";
        let ty = parse_type(text).unwrap();
        assert_eq!(parse_type(&ty.to_string()).unwrap(), ty);
    }
}
