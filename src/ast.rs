//! Syntax tree produced by the parser and consumed by the walker.
use crate::error::Span;
use crate::lexer::TokenKind;
use std::fmt;

/// One identifier segment of a dotted reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub value: String,
    pub span: Span,
}

/// `a.b.c`
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub idents: Vec<Ident>,
    pub span: Span,
}

impl Reference {
    pub fn segments(&self) -> Vec<String> {
        self.idents.iter().map(|i| i.value.clone()).collect()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ident) in self.idents.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&ident.value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Regex,
    Int,
    Decimal,
    Bool,
}

impl LiteralKind {
    pub fn from_token(kind: TokenKind) -> Option<LiteralKind> {
        match kind {
            TokenKind::String => Some(LiteralKind::String),
            TokenKind::Regex => Some(LiteralKind::Regex),
            TokenKind::Int => Some(LiteralKind::Int),
            TokenKind::Decimal => Some(LiteralKind::Decimal),
            TokenKind::Bool => Some(LiteralKind::Bool),
            _ => None,
        }
    }
}

/// A literal scalar; `text` has escapes already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub text: String,
    pub span: Span,
}

/// A value that can be assigned with `=` or `+=`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Literal(Literal),
    /// Bare dotted reference; reads as its dotted string.
    Reference(Reference),
    Array { values: Vec<Value>, span: Span },
}

impl Value {
    pub fn span(&self) -> Span {
        match self {
            Value::Literal(l) => l.span,
            Value::Reference(r) => r.span,
            Value::Array { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    #[default]
    None,
    /// `!tag`
    Bang,
    /// `?tag`
    Question,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagKind {
    Reference(Reference),
    Literal(Literal),
}

/// A tag or qualifier on a block header.
#[derive(Debug, Clone, PartialEq)]
pub struct TagValue {
    pub mark: Mark,
    pub kind: TagKind,
    pub span: Span,
}

impl TagValue {
    pub fn reference(&self) -> Option<&Reference> {
        match &self.kind {
            TagKind::Reference(r) => Some(r),
            TagKind::Literal(_) => None,
        }
    }

    /// String form: references as their dotted text, literals as-is.
    pub fn text(&self) -> String {
        match &self.kind {
            TagKind::Reference(r) => r.to_string(),
            TagKind::Literal(l) => l.text.clone(),
        }
    }
}

/// `key = value` or `key += value`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub key: Reference,
    pub value: Value,
    pub append: bool,
    pub span: Span,
}

/// Joined `|` lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: String,
    /// `/* */` rather than `//`
    pub block: bool,
    pub span: Span,
}

/// `type tag* (: qualifier)* ({ body } | | description)?`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub type_ref: Reference,
    pub tags: Vec<TagValue>,
    pub qualifiers: Vec<TagValue>,
    pub description: Option<Description>,
    /// Header ended with `{`.
    pub open: bool,
    pub body: Body,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assignment(Assignment),
    Block(Block),
    Description(Description),
    Comment(Comment),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Assignment(a) => a.span,
            Statement::Block(b) => b.span,
            Statement::Description(d) => d.span,
            Statement::Comment(c) => c.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub statements: Vec<Statement>,
}

/// A parsed document. Comments are kept aside for formatting tools.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct File {
    pub body: Body,
    pub comments: Vec<Comment>,
}
