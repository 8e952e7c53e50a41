use crate::error::{Error, ErrorKind, Position, Span};

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    String,
    Regex,
    Int,
    Decimal,
    Bool,
    Comment,
    BlockComment,
    /// One `| text` line; consecutive lines are joined by the parser.
    Description,

    Assign,
    Append,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Colon,
    Bang,
    Question,

    Eol,
    Eof,
}

impl TokenKind {
    /// Human-readable name used in "expected ..." messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::String => "string",
            TokenKind::Regex => "regex",
            TokenKind::Int => "integer",
            TokenKind::Decimal => "decimal",
            TokenKind::Bool => "boolean",
            TokenKind::Comment => "comment",
            TokenKind::BlockComment => "block comment",
            TokenKind::Description => "description",
            TokenKind::Assign => "'='",
            TokenKind::Append => "'+='",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Dot => "'.'",
            TokenKind::Comma => "','",
            TokenKind::Colon => "':'",
            TokenKind::Bang => "'!'",
            TokenKind::Question => "'?'",
            TokenKind::Eol => "end of line",
            TokenKind::Eof => "end of file",
        }
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::String
                | TokenKind::Regex
                | TokenKind::Int
                | TokenKind::Decimal
                | TokenKind::Bool
        )
    }
}

/// A positioned token. `lit` is the literal text with escapes resolved
/// (string/regex contents, comment text without the markers).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lit: String,
    pub span: Span,
}

/// Tokens from one pass plus any lexical errors.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<Error>,
}

impl Lexed {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Character scanner with explicit line/column bookkeeping.
pub struct Lexer<'a> {
    input: &'a str,
    pos: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            pos: Position::default(),
        }
    }

    /// Scan the whole input. With `fail_fast` the first lexical error stops
    /// the scan; otherwise the error is recorded and an EOF token is emitted
    /// at the physical end of input.
    pub fn all_tokens(mut self, fail_fast: bool) -> Lexed {
        let mut lexed = Lexed::default();
        loop {
            match self.next_token() {
                Ok(token) => {
                    let eof = token.kind == TokenKind::Eof;
                    lexed.tokens.push(token);
                    if eof {
                        break;
                    }
                }
                Err(err) => {
                    tracing::trace!(error = %err, "lexical error");
                    lexed.errors.push(err);
                    if fail_fast {
                        break;
                    }
                    while self.peek_char().is_some() {
                        self.advance();
                    }
                    let end = self.pos;
                    lexed.tokens.push(Token {
                        kind: TokenKind::Eof,
                        lit: String::new(),
                        span: Span::point(end),
                    });
                    break;
                }
            }
        }
        lexed
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn remaining(&self) -> &'a str {
        &self.input[self.pos.offset..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.remaining().chars().nth(1)
    }

    /// Consume one character. The character after a newline is column 0
    /// of the next line.
    fn advance(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos.offset += ch.len_utf8();
        if ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 0;
        } else {
            self.pos.column += 1;
        }
        Some(ch)
    }

    fn token(&self, kind: TokenKind, lit: impl Into<String>, start: Position) -> Token {
        Token {
            kind,
            lit: lit.into(),
            span: Span::new(start, self.pos),
        }
    }

    fn error_here(&self, kind: ErrorKind) -> Error {
        let mut end = self.pos;
        if let Some(ch) = self.peek_char() {
            end.offset += ch.len_utf8();
            end.column += 1;
        }
        Error::at(kind, Span::new(self.pos, end))
    }

    // ── Token Dispatch ──────────────────────────────────────────────

    pub fn next_token(&mut self) -> Result<Token, Error> {
        while let Some(' ' | '\t' | '\r') = self.peek_char() {
            self.advance();
        }

        let start = self.pos;
        let ch = match self.peek_char() {
            Some(ch) => ch,
            None => return Ok(self.token(TokenKind::Eof, "", start)),
        };

        let single = match ch {
            '\n' => Some(TokenKind::Eol),
            '=' => Some(TokenKind::Assign),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '.' => Some(TokenKind::Dot),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            '!' => Some(TokenKind::Bang),
            '?' => Some(TokenKind::Question),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return Ok(self.token(kind, ch.to_string(), start));
        }

        match ch {
            '+' => {
                if self.peek_second() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(self.token(TokenKind::Append, "+=", start))
                } else {
                    Err(self.error_here(ErrorKind::UnexpectedCharacter('+')))
                }
            }
            '"' => self.lex_string(start),
            '/' => match self.peek_second() {
                Some('/') => Ok(self.lex_line_comment(start)),
                Some('*') => Ok(self.lex_block_comment(start)),
                _ => self.lex_regex(start),
            },
            '|' => Ok(self.lex_description(start)),
            '-' if self.peek_second().map_or(false, |c| c.is_ascii_digit()) => {
                self.lex_number(start)
            }
            c if c.is_ascii_digit() => self.lex_number(start),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(self.lex_ident(start)),
            c => Err(self.error_here(ErrorKind::UnexpectedCharacter(c))),
        }
    }

    // ── Literals ────────────────────────────────────────────────────

    fn lex_ident(&mut self, start: Position) -> Token {
        let begin = self.pos.offset;
        self.advance();
        while let Some(ch) = self.peek_char() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let text = &self.input[begin..self.pos.offset];
        let kind = match text {
            "true" | "false" => TokenKind::Bool,
            _ => TokenKind::Ident,
        };
        self.token(kind, text, start)
    }

    fn lex_number(&mut self, start: Position) -> Result<Token, Error> {
        let begin = self.pos.offset;
        if self.peek_char() == Some('-') {
            self.advance();
        }
        let mut seen_dot = false;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && self.peek_second().map_or(false, |c| c.is_ascii_digit()) {
                if seen_dot {
                    let text = format!("{}.", &self.input[begin..self.pos.offset]);
                    return Err(self.error_here(ErrorKind::MalformedNumber(text)));
                }
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }
        let kind = if seen_dot {
            TokenKind::Decimal
        } else {
            TokenKind::Int
        };
        Ok(self.token(kind, &self.input[begin..self.pos.offset], start))
    }

    /// `"..."` with `\\`, `\"` and escaped-newline as the only escapes.
    fn lex_string(&mut self, start: Position) -> Result<Token, Error> {
        self.advance();
        let mut result = String::new();
        loop {
            match self.peek_char() {
                None => return Err(self.error_here(ErrorKind::UnexpectedEof)),
                Some('\n') => return Err(self.error_here(ErrorKind::NewlineInLiteral("string"))),
                Some('"') => {
                    self.advance();
                    return Ok(self.token(TokenKind::String, result, start));
                }
                Some('\\') => {
                    let escape_at = self.error_here(ErrorKind::UnexpectedEof);
                    self.advance();
                    match self.peek_char() {
                        Some(c @ ('\\' | '"' | '\n')) => {
                            self.advance();
                            result.push(c);
                        }
                        Some(c) => {
                            return Err(Error {
                                kind: ErrorKind::InvalidEscape(c),
                                ..escape_at
                            })
                        }
                        None => return Err(self.error_here(ErrorKind::UnexpectedEof)),
                    }
                }
                Some(ch) => {
                    self.advance();
                    result.push(ch);
                }
            }
        }
    }

    /// `/.../` where a doubled `//` stands for one `/`.
    fn lex_regex(&mut self, start: Position) -> Result<Token, Error> {
        self.advance();
        let mut result = String::new();
        loop {
            match self.peek_char() {
                None => return Err(self.error_here(ErrorKind::UnexpectedEof)),
                Some('\n') => return Err(self.error_here(ErrorKind::NewlineInLiteral("regex"))),
                Some('/') => {
                    self.advance();
                    if self.peek_char() == Some('/') {
                        self.advance();
                        result.push('/');
                    } else {
                        return Ok(self.token(TokenKind::Regex, result, start));
                    }
                }
                Some(ch) => {
                    self.advance();
                    result.push(ch);
                }
            }
        }
    }

    // ── Comments & Descriptions ─────────────────────────────────────

    fn lex_line_comment(&mut self, start: Position) -> Token {
        self.advance();
        self.advance();
        let begin = self.pos.offset;
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        let text = self.input[begin..self.pos.offset].trim_end_matches('\r');
        self.token(TokenKind::Comment, text, start)
    }

    /// `/* ... */`; an unterminated comment runs to end of input.
    fn lex_block_comment(&mut self, start: Position) -> Token {
        self.advance();
        self.advance();
        let begin = self.pos.offset;
        loop {
            if self.remaining().starts_with("*/") {
                let text = &self.input[begin..self.pos.offset];
                self.advance();
                self.advance();
                return self.token(TokenKind::BlockComment, text, start);
            }
            if self.advance().is_none() {
                return self.token(TokenKind::BlockComment, &self.input[begin..], start);
            }
        }
    }

    /// `| text` up to the end of the line, leading whitespace trimmed.
    fn lex_description(&mut self, start: Position) -> Token {
        self.advance();
        let begin = self.pos.offset;
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        let text = self.input[begin..self.pos.offset]
            .trim_start()
            .trim_end_matches('\r');
        self.token(TokenKind::Description, text, start)
    }
}

/// Convenience: tokenize in one call.
pub fn tokenize(input: &str, fail_fast: bool) -> Lexed {
    Lexer::new(input).all_tokens(fail_fast)
}
