use std::fmt;

use super::lexer::{Keyword, Token, TokenKind, tokenize};
use crate::tag_index::normalize_tag;

/// Parsed search expression.
///
/// `And`, `Or` and `Xor` hold flat operand lists in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Matches every candidate. Produced for queries with no terms.
    All,
    /// `#name`: records carrying the tag.
    Tag(String),
    /// `_name`: records of the given type (lowercase).
    Type(String),
    /// Any other word: lowercase substring of name or description.
    Word(String),
    Not(Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    /// AND-matches first, then the rest of the OR-matches.
    Xor(Vec<Expr>),
    /// `scope:expr`: tag expression restricted to a folder.
    Scoped { scope: String, expr: Box<Expr> },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unclosed '(' at position {position}")]
    UnclosedParen { position: usize },

    #[error("unexpected ')' at position {position}")]
    UnexpectedCloseParen { position: usize },

    #[error("empty group at position {position}")]
    EmptyGroup { position: usize },

    #[error("malformed scope at position {position}: {reason}")]
    MalformedScope {
        position: usize,
        reason: &'static str,
    },

    #[error("query nested too deeply at position {position}")]
    TooDeep { position: usize },
}

/// Deepest allowed nesting of groups and `not`s.
pub const MAX_DEPTH: usize = 256;

/// Parse a raw search string.
///
/// Precedence from tightest to loosest: `not`, `and` (or plain
/// whitespace), `xor`, `or` / `,`. Operator keywords that cannot act as
/// operators where they appear are skipped.
pub fn parse_query(input: &str) -> Result<Expr, ParseError> {
    Parser {
        tokens: tokenize(input),
        pos: 0,
        depth: 0,
    }
    .parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn parse(mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;
        if let Some(token) = self.peek() {
            // parse_or only stops early on a closing paren.
            return Err(ParseError::UnexpectedCloseParen {
                position: token.position,
            });
        }
        Ok(expr.unwrap_or(Expr::All))
    }

    fn parse_or(&mut self) -> Result<Option<Expr>, ParseError> {
        let mut parts = Vec::new();
        loop {
            if let Some(expr) = self.parse_xor()? {
                parts.push(expr);
            }
            let is_or = self.peek().is_some_and(|t| {
                t.kind == TokenKind::Comma || t.keyword() == Some(Keyword::Or)
            });
            if !is_or {
                break;
            }
            self.advance();
        }
        Ok(combine(parts, Expr::Or))
    }

    fn parse_xor(&mut self) -> Result<Option<Expr>, ParseError> {
        let mut parts = Vec::new();
        loop {
            if let Some(expr) = self.parse_and()? {
                parts.push(expr);
            }
            if !self.at_keyword(Keyword::Xor) {
                break;
            }
            self.advance();
        }
        Ok(combine(parts, Expr::Xor))
    }

    // Whitespace between terms is an implicit AND.
    fn parse_and(&mut self) -> Result<Option<Expr>, ParseError> {
        let mut parts = Vec::new();
        loop {
            if self.at_keyword(Keyword::And) {
                self.advance();
                continue;
            }
            let start = self.pos;
            match self.parse_unary()? {
                Some(expr) => parts.push(expr),
                None if self.pos == start => break,
                // A dangling `not` was consumed.
                None => {}
            }
        }
        Ok(combine(parts, Expr::And))
    }

    // `not` negates exactly one following term or group. A `not` with
    // nothing negatable after it is dropped.
    fn parse_unary(&mut self) -> Result<Option<Expr>, ParseError> {
        let Some(token) = self.peek() else {
            return Ok(None);
        };
        if token.keyword() != Some(Keyword::Not) {
            return self.parse_primary();
        }
        let position = token.position;
        self.advance();
        self.descend(position)?;
        let inner = self.parse_unary()?;
        self.depth -= 1;
        Ok(inner.map(|expr| Expr::Not(Box::new(expr))))
    }

    /// Parse one term or group. Returns `None` without consuming anything
    /// when the next token cannot start a term.
    fn parse_primary(&mut self) -> Result<Option<Expr>, ParseError> {
        let Some(token) = self.peek() else {
            return Ok(None);
        };
        let position = token.position;
        match &token.kind {
            TokenKind::OpenParen => {
                self.advance();
                self.parse_group(position).map(Some)
            }
            TokenKind::Colon => Err(ParseError::MalformedScope {
                position,
                reason: "missing folder name before ':'",
            }),
            TokenKind::Word(word) if token.keyword().is_none() => {
                let word = word.clone();
                self.advance();
                let scoped = self
                    .peek()
                    .is_some_and(|t| t.kind == TokenKind::Colon && !t.spaced);
                if scoped {
                    let colon = self.advance().map_or(0, |t| t.position);
                    return self.parse_scope(&word, colon).map(Some);
                }
                Ok(Some(atom(&word)))
            }
            _ => Ok(None),
        }
    }

    fn parse_group(&mut self, open: usize) -> Result<Expr, ParseError> {
        self.descend(open)?;
        let inner = self.parse_or()?;
        self.depth -= 1;
        match self.peek() {
            Some(token) if token.kind == TokenKind::CloseParen => {
                self.advance();
            }
            _ => return Err(ParseError::UnclosedParen { position: open }),
        }
        inner.ok_or(ParseError::EmptyGroup { position: open })
    }

    fn parse_scope(
        &mut self,
        folder: &str,
        colon: usize,
    ) -> Result<Expr, ParseError> {
        let scope = folder.trim_start_matches('#');
        if scope.is_empty() {
            return Err(ParseError::MalformedScope {
                position: colon,
                reason: "missing folder name before ':'",
            });
        }
        let missing_tag = ParseError::MalformedScope {
            position: colon,
            reason: "missing tag after ':'",
        };
        if self.peek().is_some_and(|t| t.kind == TokenKind::Colon) {
            return Err(missing_tag);
        }
        let Some(right) = self.parse_primary()? else {
            return Err(missing_tag);
        };
        Ok(Expr::Scoped {
            scope: scope.to_string(),
            expr: Box::new(into_tag_expr(right, colon)?),
        })
    }

    fn descend(&mut self, position: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep { position });
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_some_and(|t| t.keyword() == Some(keyword))
    }
}

fn combine(mut parts: Vec<Expr>, join: fn(Vec<Expr>) -> Expr) -> Option<Expr> {
    match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(join(parts)),
    }
}

fn atom(word: &str) -> Expr {
    if let Some(rest) = word.strip_prefix('#')
        && let Some(tag) = normalize_tag(rest)
    {
        return Expr::Tag(tag);
    }
    if let Some(rest) = word.strip_prefix('_')
        && !rest.is_empty()
    {
        return Expr::Type(rest.to_lowercase());
    }
    Expr::Word(word.to_lowercase())
}

// The right side of `scope:` may only name tags, so plain words become
// tag atoms.
fn into_tag_expr(expr: Expr, colon: usize) -> Result<Expr, ParseError> {
    let convert_all = |parts: Vec<Expr>| {
        parts
            .into_iter()
            .map(|part| into_tag_expr(part, colon))
            .collect::<Result<Vec<_>, _>>()
    };
    Ok(match expr {
        Expr::Word(word) => Expr::Tag(normalize_tag(&word).unwrap_or(word)),
        Expr::Tag(_) | Expr::All => expr,
        Expr::Not(inner) => Expr::Not(Box::new(into_tag_expr(*inner, colon)?)),
        Expr::And(parts) => Expr::And(convert_all(parts)?),
        Expr::Or(parts) => Expr::Or(convert_all(parts)?),
        Expr::Xor(parts) => Expr::Xor(convert_all(parts)?),
        Expr::Type(_) => {
            return Err(ParseError::MalformedScope {
                position: colon,
                reason: "type filters cannot be used inside a scope",
            });
        }
        Expr::Scoped { .. } => {
            return Err(ParseError::MalformedScope {
                position: colon,
                reason: "scopes cannot be nested",
            });
        }
    })
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::All => f.write_str("*"),
            Expr::Tag(tag) => write!(f, "#{tag}"),
            Expr::Type(kind) => write!(f, "_{kind}"),
            Expr::Word(word) => f.write_str(word),
            Expr::Not(inner) => write!(f, "not({inner})"),
            Expr::And(parts) => write_joined(f, parts, "and"),
            Expr::Or(parts) => write_joined(f, parts, "or"),
            Expr::Xor(parts) => write_joined(f, parts, "xor"),
            Expr::Scoped { scope, expr } => write!(f, "{scope}:{expr}"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    parts: &[Expr],
    op: &str,
) -> fmt::Result {
    f.write_str("(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, " {op} ")?;
        }
        write!(f, "{part}")?;
    }
    f.write_str(")")
}
