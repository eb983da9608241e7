//! @acp:module "Type Expression Parser"
//! @acp:summary "Recursive-descent parser for docstring type expressions"
//! @acp:domain types
//! @acp:layer parser
//!
//! Grammar (whitespace between tokens is ignored):
//!
//! ```text
//! expr      := atom ('|' atom)*
//! atom      := dotted ('[' args ']')?
//! dotted    := IDENT ('.' IDENT)*          no whitespace inside
//! args      := expr (',' expr)* ','?
//! ```
//!
//! `Union`, `Optional`, `Tuple` and `Callable` (bare or `typing.`-prefixed)
//! are parsed into their own tree variants. `...` is only accepted as the
//! parameter list of a `Callable` or as the last element of a `Tuple`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::expr::{CallableParams, NamePath, TypeExpr};

/// @acp:summary "Why a type expression failed to parse"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    UnbalancedBrackets,
    InvalidSyntax,
    EmptyExpression,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ParseErrorKind::UnbalancedBrackets => "unbalanced brackets",
            ParseErrorKind::InvalidSyntax => "invalid syntax",
            ParseErrorKind::EmptyExpression => "empty type expression",
        };
        f.write_str(text)
    }
}

/// Parse failure with the byte offset into the input where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind} at offset {position}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
}

impl ParseError {
    fn new(kind: ParseErrorKind, position: usize) -> Self {
        Self { kind, position }
    }

    fn syntax(position: usize) -> Self {
        Self::new(ParseErrorKind::InvalidSyntax, position)
    }
}

/// @acp:summary "Parse a single type expression string"
pub fn parse(text: &str) -> Result<TypeExpr, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyExpression, 0));
    }

    let tokens = tokenize(text)?;
    check_balance(&tokens)?;

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: text.len(),
    };
    let expr = parser.parse_expr()?;
    match parser.peek() {
        Some(token) => Err(ParseError::syntax(token.pos)),
        None => Ok(expr),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Name(NamePath),
    Ellipsis,
    LBracket,
    RBracket,
    Comma,
    Pipe,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let punct = match c {
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            '|' => Some(TokenKind::Pipe),
            _ => None,
        };
        if let Some(kind) = punct {
            chars.next();
            tokens.push(Token { kind, pos });
            continue;
        }

        if c.is_whitespace() {
            chars.next();
        } else if c == '.' {
            if !text[pos..].starts_with("...") {
                return Err(ParseError::syntax(pos));
            }
            for _ in 0..3 {
                chars.next();
            }
            tokens.push(Token {
                kind: TokenKind::Ellipsis,
                pos,
            });
        } else if is_ident_start(c) {
            let mut path = Vec::new();
            let mut segment = String::new();
            while let Some(&(dot_pos, c)) = chars.peek() {
                if is_ident_continue(c) {
                    segment.push(c);
                    chars.next();
                } else if c == '.' {
                    // a dot inside a name must be followed by another identifier
                    let next = text[dot_pos + 1..].chars().next();
                    if !next.is_some_and(is_ident_start) {
                        return Err(ParseError::syntax(dot_pos));
                    }
                    path.push(std::mem::take(&mut segment));
                    chars.next();
                } else {
                    break;
                }
            }
            path.push(segment);
            tokens.push(Token {
                kind: TokenKind::Name(path),
                pos,
            });
        } else {
            return Err(ParseError::syntax(pos));
        }
    }

    Ok(tokens)
}

fn check_balance(tokens: &[Token]) -> Result<(), ParseError> {
    let mut open = Vec::new();
    for token in tokens {
        match token.kind {
            TokenKind::LBracket => open.push(token.pos),
            TokenKind::RBracket => {
                if open.pop().is_none() {
                    return Err(ParseError::new(ParseErrorKind::UnbalancedBrackets, token.pos));
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some(pos) => Err(ParseError::new(ParseErrorKind::UnbalancedBrackets, pos)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpecialForm {
    Union,
    Optional,
    Tuple,
    Callable,
}

fn special_form(path: &[String]) -> Option<SpecialForm> {
    let name = match path {
        [name] => name.as_str(),
        [module, name] if module == "typing" => name.as_str(),
        _ => return None,
    };
    match name {
        "Union" => Some(SpecialForm::Union),
        "Optional" => Some(SpecialForm::Optional),
        "Tuple" => Some(SpecialForm::Tuple),
        "tuple" if path.len() == 1 => Some(SpecialForm::Tuple),
        "Callable" => Some(SpecialForm::Callable),
        _ => None,
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|t| &t.kind == kind)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn here(&self) -> usize {
        self.peek().map(|t| t.pos).unwrap_or(self.end)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.peek_is(&kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::syntax(self.here()))
        }
    }

    fn parse_expr(&mut self) -> Result<TypeExpr, ParseError> {
        let first = self.parse_atom()?;
        if !self.peek_is(&TokenKind::Pipe) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.peek_is(&TokenKind::Pipe) {
            self.pos += 1;
            members.push(self.parse_atom()?);
        }
        Ok(TypeExpr::Union { members })
    }

    fn parse_atom(&mut self) -> Result<TypeExpr, ParseError> {
        let at = self.here();
        let path = match self.next() {
            Some(Token {
                kind: TokenKind::Name(path),
                ..
            }) => path.clone(),
            _ => return Err(ParseError::syntax(at)),
        };

        if !self.peek_is(&TokenKind::LBracket) {
            return Ok(TypeExpr::Name { path });
        }
        self.pos += 1;

        match special_form(&path) {
            Some(SpecialForm::Callable) => self.parse_callable_args(),
            Some(SpecialForm::Tuple) => self.parse_tuple_args(),
            Some(SpecialForm::Union) => Ok(TypeExpr::Union {
                members: self.parse_args()?,
            }),
            Some(SpecialForm::Optional) => {
                let mut args = self.parse_args()?;
                if args.len() == 1 {
                    args.push(TypeExpr::none());
                    Ok(TypeExpr::Union { members: args })
                } else {
                    // left for the builder's arity check to report
                    Ok(subscript(path, args))
                }
            }
            None => {
                let args = self.parse_args()?;
                Ok(subscript(path, args))
            }
        }
    }

    /// Comma-separated expressions up to and including the closing `]`.
    fn parse_args(&mut self) -> Result<Vec<TypeExpr>, ParseError> {
        let mut args = vec![self.parse_expr()?];
        while self.peek_is(&TokenKind::Comma) {
            self.pos += 1;
            if self.peek_is(&TokenKind::RBracket) {
                break;
            }
            args.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(args)
    }

    fn parse_tuple_args(&mut self) -> Result<TypeExpr, ParseError> {
        let mut elements = Vec::new();
        let mut variadic = false;
        loop {
            if self.peek_is(&TokenKind::Ellipsis) {
                if elements.is_empty() {
                    return Err(ParseError::syntax(self.here()));
                }
                self.pos += 1;
                variadic = true;
                if self.peek_is(&TokenKind::Comma) {
                    self.pos += 1;
                }
                break;
            }
            elements.push(self.parse_expr()?);
            if !self.peek_is(&TokenKind::Comma) {
                break;
            }
            self.pos += 1;
            if self.peek_is(&TokenKind::RBracket) {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(TypeExpr::Tuple { elements, variadic })
    }

    fn parse_callable_args(&mut self) -> Result<TypeExpr, ParseError> {
        let params = if self.peek_is(&TokenKind::Ellipsis) {
            self.pos += 1;
            CallableParams::Ellipsis
        } else if self.peek_is(&TokenKind::LBracket) {
            self.pos += 1;
            if self.peek_is(&TokenKind::RBracket) {
                self.pos += 1;
                CallableParams::List(Vec::new())
            } else {
                CallableParams::List(self.parse_args()?)
            }
        } else {
            return Err(ParseError::syntax(self.here()));
        };

        self.expect(TokenKind::Comma)?;
        let returns = self.parse_expr()?;
        if self.peek_is(&TokenKind::Comma) {
            self.pos += 1;
        }
        self.expect(TokenKind::RBracket)?;
        Ok(TypeExpr::Callable {
            params,
            returns: Box::new(returns),
        })
    }
}

fn subscript(path: NamePath, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Subscript {
        base: Box::new(TypeExpr::Name { path }),
        args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn name(dotted: &str) -> TypeExpr {
        TypeExpr::name(dotted)
    }

    fn sub(base: &str, args: Vec<TypeExpr>) -> TypeExpr {
        subscript(base.split('.').map(str::to_string).collect(), args)
    }

    fn err_kind(text: &str) -> ParseErrorKind {
        parse(text).unwrap_err().kind
    }

    #[test]
    fn test_simple_names() {
        assert_eq!(parse("str").unwrap(), name("str"));
        assert_eq!(parse("  db.models.User \t").unwrap(), name("db.models.User"));
        assert_eq!(parse("A፩").unwrap(), name("A፩"));
    }

    #[test]
    fn test_nested_union_of_iterables() {
        let expr = parse("Union[Iterable[Dict], Iterable[engine.models.Product]]").unwrap();
        let TypeExpr::Union { members } = &expr else {
            panic!("expected a union, got {:?}", expr);
        };
        assert_eq!(members.len(), 2);
        let TypeExpr::Subscript { base, args } = &members[1] else {
            panic!("expected a subscript");
        };
        assert_eq!(**base, name("Iterable"));
        assert_eq!(
            args[0],
            TypeExpr::Name {
                path: vec!["engine".into(), "models".into(), "Product".into()]
            }
        );
    }

    #[test]
    fn test_optional_desugars_to_union() {
        assert_eq!(parse("Optional[int]").unwrap(), parse("Union[int, None]").unwrap());
        assert_eq!(parse("typing.Optional[int]").unwrap(), parse("int | None").unwrap());
    }

    #[test]
    fn test_optional_with_wrong_arity_is_kept() {
        assert_eq!(
            parse("Optional[int, str]").unwrap(),
            sub("Optional", vec![name("int"), name("str")])
        );
    }

    #[test]
    fn test_pipe_union() {
        assert_eq!(
            parse("int | str | None").unwrap(),
            TypeExpr::Union {
                members: vec![name("int"), name("str"), TypeExpr::none()]
            }
        );
    }

    #[test]
    fn test_generic_with_dotted_args() {
        assert_eq!(
            parse("Dict[int, db.models.User]").unwrap(),
            sub("Dict", vec![name("int"), name("db.models.User")])
        );
        assert_eq!(
            parse("my.generic.Container[int]").unwrap(),
            sub("my.generic.Container", vec![name("int")])
        );
    }

    #[test]
    fn test_multiline_with_trailing_comma() {
        let text = "Tuple[\n    int,\n    str,\n    ClassName,\n]";
        assert_eq!(
            parse(text).unwrap(),
            TypeExpr::Tuple {
                elements: vec![name("int"), name("str"), name("ClassName")],
                variadic: false,
            }
        );
    }

    #[test]
    fn test_variadic_tuple() {
        assert_eq!(
            parse("tuple[int, ...]").unwrap(),
            TypeExpr::Tuple {
                elements: vec![name("int")],
                variadic: true,
            }
        );
        assert_eq!(err_kind("Tuple[...]"), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("Tuple[int, ..., str]"), ParseErrorKind::InvalidSyntax);
    }

    #[test]
    fn test_callable_forms() {
        assert_eq!(
            parse("Callable[[int, str], Dict[int, str]]").unwrap(),
            TypeExpr::Callable {
                params: CallableParams::List(vec![name("int"), name("str")]),
                returns: Box::new(sub("Dict", vec![name("int"), name("str")])),
            }
        );
        assert_eq!(
            parse("Callable[..., None]").unwrap(),
            TypeExpr::Callable {
                params: CallableParams::Ellipsis,
                returns: Box::new(TypeExpr::none()),
            }
        );
        assert_eq!(
            parse("Callable[[], int]").unwrap(),
            TypeExpr::Callable {
                params: CallableParams::List(vec![]),
                returns: Box::new(name("int")),
            }
        );
        assert_eq!(err_kind("Callable[int, str]"), ParseErrorKind::InvalidSyntax);
    }

    #[test]
    fn test_ellipsis_outside_callable_rejected() {
        assert_eq!(err_kind("List[...]"), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("..."), ParseErrorKind::InvalidSyntax);
    }

    #[test]
    fn test_unbalanced_brackets() {
        let err = parse("Dict[str").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedBrackets);
        assert_eq!(err.position, 4);

        assert_eq!(err_kind("Dict[int, [db.models.User]"), ParseErrorKind::UnbalancedBrackets);
        assert_eq!(err_kind("Dict[int, str]]"), ParseErrorKind::UnbalancedBrackets);
        assert_eq!(err_kind("]"), ParseErrorKind::UnbalancedBrackets);
    }

    #[test]
    fn test_invalid_syntax() {
        assert_eq!(err_kind("1name"), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("no-hyphens"), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("one two"), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("int, str"), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("List[]"), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("pkg.Type."), ParseErrorKind::InvalidSyntax);
        assert_eq!(err_kind("Dict[int, [str]]"), ParseErrorKind::InvalidSyntax);
    }

    #[test]
    fn test_whitespace_inside_dotted_name_rejected() {
        let err = parse("engine. models").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.position, 6);
        assert_eq!(err_kind("engine .models"), ParseErrorKind::InvalidSyntax);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(err_kind(""), ParseErrorKind::EmptyExpression);
        assert_eq!(err_kind(" \n\t"), ParseErrorKind::EmptyExpression);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            parse("Dict[str").unwrap_err().to_string(),
            "unbalanced brackets at offset 4"
        );
    }
}
