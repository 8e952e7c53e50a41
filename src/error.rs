use crate::reflect::ReflectError;
use serde::Serialize;
use std::fmt;

/// A 0-based position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Position {
    /// 0-based line number
    pub line: usize,
    /// 0-based column (character offset within the line)
    pub column: usize,
    /// 0-based absolute byte offset from the start of input
    pub offset: usize,
}

/// A region of source text (begin..end, end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    pub fn point(at: Position) -> Self {
        Span { start: at, end: at }
    }

    /// The smallest span covering both.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// What went wrong, independent of where.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    // ── Lexical ─────────────────────────────────────────────────────
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("newline in {0} literal")]
    NewlineInLiteral(&'static str),
    #[error("malformed number {0:?}")]
    MalformedNumber(String),
    #[error("unexpected end of input")]
    UnexpectedEof,

    // ── Syntactic ───────────────────────────────────────────────────
    #[error("unexpected {found}, expected {}", .expected.join(" or "))]
    UnexpectedToken {
        found: String,
        expected: Vec<&'static str>,
    },
    #[error("unclosed block")]
    UnclosedBlock,
    #[error("unexpected close block")]
    UnexpectedCloseBlock,

    // ── Schema ──────────────────────────────────────────────────────
    #[error("{name:?} not found here, expected one of [{}]", .available.join(", "))]
    NameNotFound {
        name: String,
        available: Vec<String>,
    },
    #[error("{0:?} is not a container")]
    NotAContainer(String),
    #[error("{0:?} is not a scalar")]
    NotAScalar(String),
    #[error("{0:?} is not a repeated field")]
    NotACollection(String),
    #[error("scalar split: {0}")]
    ScalarSplit(String),
    #[error("{0}")]
    Tag(String),
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),
    #[error("invalid block spec for {schema}: {message}")]
    InvalidSpec { schema: String, message: String },
    #[error(transparent)]
    Reflect(#[from] ReflectError),
    #[error("missing required property {0:?}")]
    MissingRequired(String),
}

impl ErrorKind {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedCharacter(_) => "unexpected-character",
            ErrorKind::InvalidEscape(_) => "invalid-escape",
            ErrorKind::NewlineInLiteral(_) => "newline-in-literal",
            ErrorKind::MalformedNumber(_) => "malformed-number",
            ErrorKind::UnexpectedEof => "unexpected-eof",
            ErrorKind::UnexpectedToken { .. } => "unexpected-token",
            ErrorKind::UnclosedBlock => "unclosed-block",
            ErrorKind::UnexpectedCloseBlock => "unexpected-close-block",
            ErrorKind::NameNotFound { .. } => "name-not-found",
            ErrorKind::NotAContainer(_) => "not-a-container",
            ErrorKind::NotAScalar(_) => "not-a-scalar",
            ErrorKind::NotACollection(_) => "not-a-collection",
            ErrorKind::ScalarSplit(_) => "scalar-split-arity",
            ErrorKind::Tag(_) => "tag",
            ErrorKind::InvalidLiteral(_) => "invalid-literal",
            ErrorKind::InvalidSpec { .. } => "invalid-spec",
            ErrorKind::Reflect(_) => "reflect",
            ErrorKind::MissingRequired(_) => "missing-required",
        }
    }
}

/// An error with optional position, filename and a context path of
/// block/field names (outermost first).
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub span: Option<Span>,
    pub filename: Option<String>,
    pub context: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            span: None,
            filename: None,
            context: Vec::new(),
        }
    }

    pub fn at(kind: ErrorKind, span: Span) -> Self {
        Error::new(kind).with_position(span)
    }

    /// Attach a position unless the error already carries a more precise one.
    pub fn with_position(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Prepend a context name; called on the way out, so outer names end up first.
    pub fn with_context(mut self, name: impl Into<String>) -> Self {
        self.context.insert(0, name.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        if self.filename.is_none() {
            self.filename = Some(filename.into());
        }
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Render the error followed by the offending source line(s), with
    /// `context_lines` lines of surrounding source on each side.
    pub fn render(&self, source: &str, context_lines: usize) -> String {
        let mut out = format!("error: {}\n", self);
        let span = match self.span {
            Some(span) => span,
            None => return out,
        };
        let lines: Vec<&str> = source.lines().collect();
        // End of input may sit on the empty line after the final newline.
        let last_line = lines.len().saturating_sub(1).max(span.start.line);
        let first = span.start.line.saturating_sub(context_lines);
        let last = (span.start.line + context_lines).min(last_line);
        let gutter = (last + 1).to_string().len();

        for line_num in first..=last {
            let line_text = lines.get(line_num).copied().unwrap_or("");
            out.push_str(&format!("{:>gutter$} | {}\n", line_num + 1, line_text));
            if line_num != span.start.line {
                continue;
            }

            // Build the underline
            let start_col = span.start.column;
            let line_len = line_text.chars().count();
            let end_col = if span.start.line == span.end.line && span.end.column > start_col {
                span.end.column
            } else if start_col < line_len {
                // Point error or spans multiple lines: underline to end of line
                line_len
            } else {
                start_col + 1
            };

            let mut underline = String::new();
            for _ in 0..start_col {
                underline.push(' ');
            }
            underline.push('^');
            for _ in (start_col + 1)..end_col {
                underline.push('_');
            }
            out.push_str(&format!("{:>gutter$} | {}\n", "", underline));
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(filename) = &self.filename {
            write!(f, "{}:", filename)?;
        }
        if let Some(span) = &self.span {
            write!(f, "{}:{}: ", span.start.line + 1, span.start.column + 1)?;
        }
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context.join("."))?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<ReflectError> for Error {
    fn from(err: ReflectError) -> Self {
        Error::new(ErrorKind::Reflect(err))
    }
}

/// An ordered collection of independent errors from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn new() -> Self {
        Errors(Vec::new())
    }

    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    /// Append every error from `other`.
    pub fn merge(&mut self, other: Errors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.0
    }

    /// Order by start position; unpositioned errors go last.
    pub fn sort(&mut self) {
        self.0
            .sort_by_key(|e| e.span.map(|s| (0, s.start)).unwrap_or((1, Position::default())));
    }

    pub fn with_filename(self, filename: &str) -> Self {
        Errors(self.0.into_iter().map(|e| e.with_filename(filename)).collect())
    }

    /// Render every error with its surrounding source lines.
    pub fn render(&self, source: &str, context_lines: usize) -> String {
        self.0
            .iter()
            .map(|e| e.render(source, context_lines))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

impl From<Error> for Errors {
    fn from(err: Error) -> Self {
        Errors(vec![err])
    }
}

impl From<Vec<Error>> for Errors {
    fn from(errors: Vec<Error>) -> Self {
        Errors(errors)
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
