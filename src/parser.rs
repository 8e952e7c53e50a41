use crate::ast::*;
use crate::error::{Error, ErrorKind, Errors, Span};
use crate::lexer::{Lexer, Token, TokenKind};
use serde::Deserialize;

/// Parser configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Stop at the first lexical or syntactic error instead of recovering.
    pub fail_fast: bool,
    /// Attached to every reported error.
    pub filename: Option<String>,
}

/// The result of parsing: the tree built from every statement that parsed,
/// plus every error found along the way.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub file: File,
    pub errors: Errors,
}

impl ParseResult {
    pub fn into_result(self) -> Result<File, Errors> {
        if self.errors.is_empty() {
            Ok(self.file)
        } else {
            Err(self.errors)
        }
    }
}

/// One flat unit of source, produced before nesting is resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// A block header; when `block.open` the following fragments up to the
    /// matching close belong to its body.
    Block(Block),
    Close(Span),
    Assignment(Assignment),
    Description(Description),
    Comment(Comment),
}

impl Fragment {
    pub fn span(&self) -> Span {
        match self {
            Fragment::Block(b) => b.span,
            Fragment::Close(span) => *span,
            Fragment::Assignment(a) => a.span,
            Fragment::Description(d) => d.span,
            Fragment::Comment(c) => c.span,
        }
    }
}

/// Parse a source string into a tree.
pub fn parse(input: &str, options: &ParseOptions) -> ParseResult {
    let (fragments, mut errors) = fragments(input, options.fail_fast);
    let file = if options.fail_fast && !errors.is_empty() {
        File::default()
    } else {
        let (file, assembly_errors) = assemble(fragments);
        errors.merge(assembly_errors);
        file
    };
    errors.sort();
    if let Some(name) = &options.filename {
        errors = errors.with_filename(name);
    }
    ParseResult { file, errors }
}

/// Stage A: lex and split the input into flat fragments. Without
/// `fail_fast`, a syntax error skips the rest of its line and parsing
/// continues.
pub fn fragments(input: &str, fail_fast: bool) -> (Vec<Fragment>, Errors) {
    let lexed = Lexer::new(input).all_tokens(fail_fast);
    let mut errors = Errors::new();
    for err in lexed.errors {
        errors.push(err);
    }
    if fail_fast && !errors.is_empty() {
        return (Vec::new(), errors);
    }

    // The scan stopped mid-line; that line's partial statement is dropped.
    let mut tokens = lexed.tokens;
    if let Some(cut) = errors.iter().filter_map(|e| e.span).map(|s| s.start.line).min() {
        tokens.retain(|t| t.kind == TokenKind::Eof || t.span.start.line < cut);
    }

    let mut parser = Parser::new(tokens);
    let mut fragments = Vec::new();
    loop {
        match parser.next_fragment() {
            Ok(Some(fragment)) => fragments.push(fragment),
            Ok(None) => break,
            Err(err) => {
                tracing::trace!(error = %err, "syntax error");
                errors.push(err);
                if fail_fast {
                    break;
                }
                parser.skip_line();
            }
        }
    }
    (fragments, errors)
}

/// Stage B: nest fragments into blocks using an explicit stack of open blocks.
pub fn assemble(fragments: Vec<Fragment>) -> (File, Errors) {
    let mut errors = Errors::new();
    let mut root = Body::default();
    let mut comments = Vec::new();
    let mut stack: Vec<Block> = Vec::new();
    let mut last_end = None;

    for fragment in fragments {
        last_end = Some(fragment.span().end);
        match fragment {
            Fragment::Close(span) => match stack.pop() {
                Some(mut block) => {
                    block.span = block.span.to(span);
                    push_statement(&mut stack, &mut root, Statement::Block(block));
                }
                None => errors.push(Error::at(ErrorKind::UnexpectedCloseBlock, span)),
            },
            Fragment::Block(block) if block.open => stack.push(block),
            Fragment::Block(block) => {
                push_statement(&mut stack, &mut root, Statement::Block(block))
            }
            Fragment::Assignment(a) => {
                push_statement(&mut stack, &mut root, Statement::Assignment(a))
            }
            Fragment::Description(d) => {
                push_statement(&mut stack, &mut root, Statement::Description(d))
            }
            Fragment::Comment(c) => comments.push(c),
        }
    }

    if !stack.is_empty() {
        let end = last_end.unwrap_or_default();
        errors.push(Error::at(ErrorKind::UnclosedBlock, Span::point(end)));
        // Keep what was parsed so later stages still see it.
        while let Some(block) = stack.pop() {
            push_statement(&mut stack, &mut root, Statement::Block(block));
        }
    }

    let file = File {
        body: root,
        comments,
    };
    (file, errors)
}

fn push_statement(stack: &mut [Block], root: &mut Body, stmt: Statement) {
    match stack.last_mut() {
        Some(parent) => parent.body.statements.push(stmt),
        None => root.statements.push(stmt),
    }
}

/// Token-level parser state.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                lit: String::new(),
                span: Span::point(end),
            });
        }
        Parser { tokens, pos: 0 }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    /// Consume the current token. EOF is never consumed.
    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &[&'static str]) -> Error {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Eol | TokenKind::Eof => token.kind.describe().to_string(),
            kind => format!("{} {:?}", kind.describe(), token.lit),
        };
        Error::at(
            ErrorKind::UnexpectedToken {
                found,
                expected: expected.to_vec(),
            },
            token.span,
        )
    }

    /// Error recovery: drop tokens through the next end of line.
    fn skip_line(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Eof => return,
                TokenKind::Eol => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn skip_eols(&mut self) {
        while self.peek_kind() == TokenKind::Eol {
            self.advance();
        }
    }

    // ── Fragment Dispatch ───────────────────────────────────────────

    fn next_fragment(&mut self) -> Result<Option<Fragment>, Error> {
        self.skip_eols();
        match self.peek_kind() {
            TokenKind::Eof => Ok(None),
            TokenKind::RBrace => Ok(Some(Fragment::Close(self.advance().span))),
            TokenKind::Comment | TokenKind::BlockComment => {
                let token = self.advance();
                Ok(Some(Fragment::Comment(Comment {
                    text: token.lit,
                    block: token.kind == TokenKind::BlockComment,
                    span: token.span,
                })))
            }
            TokenKind::Description => Ok(Some(Fragment::Description(self.parse_description()))),
            TokenKind::Ident | TokenKind::Bool => self.parse_statement().map(Some),
            _ => Err(self.unexpected(&["identifier", "'}'", "comment", "description"])),
        }
    }

    /// Consecutive `|` lines joined by newlines.
    fn parse_description(&mut self) -> Description {
        let first = self.advance();
        let mut lines = vec![first.lit];
        let mut span = first.span;
        while self.peek_kind() == TokenKind::Eol && self.peek_nth_kind(1) == TokenKind::Description
        {
            self.advance();
            let line = self.advance();
            span = span.to(line.span);
            lines.push(line.lit);
        }
        Description {
            text: lines.join("\n"),
            span,
        }
    }

    // ── Statements ──────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Fragment, Error> {
        let key = self.parse_reference()?;
        match self.peek_kind() {
            TokenKind::Assign | TokenKind::Append => {
                let append = self.advance().kind == TokenKind::Append;
                let value = self.parse_value()?;
                let span = key.span.to(value.span());
                self.end_of_statement()?;
                Ok(Fragment::Assignment(Assignment {
                    key,
                    value,
                    append,
                    span,
                }))
            }
            _ => self.parse_block_header(key).map(Fragment::Block),
        }
    }

    /// Statements end at a newline; a trailing comment, `}` or EOF is left
    /// for the next fragment.
    fn end_of_statement(&mut self) -> Result<(), Error> {
        match self.peek_kind() {
            TokenKind::Eol => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof | TokenKind::Comment | TokenKind::BlockComment | TokenKind::RBrace => {
                Ok(())
            }
            _ => Err(self.unexpected(&["end of line", "comment"])),
        }
    }

    fn parse_block_header(&mut self, type_ref: Reference) -> Result<Block, Error> {
        let mut span = type_ref.span;

        let mut tags = Vec::new();
        while self.starts_tag() {
            let tag = self.parse_tag()?;
            span = span.to(tag.span);
            tags.push(tag);
        }

        let mut qualifiers = Vec::new();
        while self.peek_kind() == TokenKind::Colon {
            self.advance();
            let tag = self.parse_tag()?;
            span = span.to(tag.span);
            qualifiers.push(tag);
        }

        let mut description = None;
        let mut open = false;
        match self.peek_kind() {
            TokenKind::LBrace => {
                span = span.to(self.advance().span);
                open = true;
            }
            TokenKind::Description => {
                let d = self.parse_description();
                span = span.to(d.span);
                description = Some(d);
            }
            TokenKind::Eol => {
                self.advance();
            }
            TokenKind::Eof | TokenKind::Comment | TokenKind::BlockComment | TokenKind::RBrace => {}
            _ => {
                return Err(self.unexpected(&[
                    "tag",
                    "':'",
                    "'{'",
                    "description",
                    "end of line",
                ]))
            }
        }

        Ok(Block {
            type_ref,
            tags,
            qualifiers,
            description,
            open,
            body: Body::default(),
            span,
        })
    }

    fn starts_tag(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Ident
                | TokenKind::Bool
                | TokenKind::String
                | TokenKind::Bang
                | TokenKind::Question
        )
    }

    fn parse_tag(&mut self) -> Result<TagValue, Error> {
        let start = self.peek().span;
        let mark = match self.peek_kind() {
            TokenKind::Bang => {
                self.advance();
                Mark::Bang
            }
            TokenKind::Question => {
                self.advance();
                Mark::Question
            }
            _ => Mark::None,
        };
        let kind = match self.peek_kind() {
            TokenKind::Ident => TagKind::Reference(self.parse_reference()?),
            TokenKind::Bool | TokenKind::String => TagKind::Literal(self.parse_literal()),
            _ => return Err(self.unexpected(&["identifier", "string", "boolean"])),
        };
        let end = match &kind {
            TagKind::Reference(r) => r.span,
            TagKind::Literal(l) => l.span,
        };
        Ok(TagValue {
            mark,
            kind,
            span: start.to(end),
        })
    }

    // ── References & Values ─────────────────────────────────────────

    fn parse_reference(&mut self) -> Result<Reference, Error> {
        let first = self.parse_ident()?;
        let mut span = first.span;
        let mut idents = vec![first];
        while self.peek_kind() == TokenKind::Dot {
            self.advance();
            let next = self.parse_ident()?;
            span = span.to(next.span);
            idents.push(next);
        }
        Ok(Reference { idents, span })
    }

    fn parse_ident(&mut self) -> Result<Ident, Error> {
        match self.peek_kind() {
            TokenKind::Ident | TokenKind::Bool => {
                let token = self.advance();
                Ok(Ident {
                    value: token.lit,
                    span: token.span,
                })
            }
            _ => Err(self.unexpected(&["identifier"])),
        }
    }

    /// Caller guarantees the current token is a literal.
    fn parse_literal(&mut self) -> Literal {
        let token = self.advance();
        Literal {
            kind: LiteralKind::from_token(token.kind).unwrap_or(LiteralKind::String),
            text: token.lit,
            span: token.span,
        }
    }

    fn parse_value(&mut self) -> Result<Value, Error> {
        match self.peek_kind() {
            kind if kind.is_literal() => Ok(Value::Literal(self.parse_literal())),
            TokenKind::Ident => self.parse_reference().map(Value::Reference),
            TokenKind::LBracket => self.parse_array(),
            _ => Err(self.unexpected(&["value", "'['"])),
        }
    }

    fn parse_array(&mut self) -> Result<Value, Error> {
        let open = self.advance().span;
        let mut values = Vec::new();
        self.skip_eols();
        if self.peek_kind() == TokenKind::RBracket {
            let close = self.advance().span;
            return Ok(Value::Array {
                values,
                span: open.to(close),
            });
        }

        loop {
            values.push(self.parse_value()?);
            self.skip_eols();
            match self.peek_kind() {
                TokenKind::Comma => {
                    self.advance();
                    self.skip_eols();
                    // Allow trailing comma
                    if self.peek_kind() == TokenKind::RBracket {
                        let close = self.advance().span;
                        return Ok(Value::Array {
                            values,
                            span: open.to(close),
                        });
                    }
                }
                TokenKind::RBracket => {
                    let close = self.advance().span;
                    return Ok(Value::Array {
                        values,
                        span: open.to(close),
                    });
                }
                _ => return Err(self.unexpected(&["','", "']'"])),
            }
        }
    }
}
