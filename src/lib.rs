pub mod ast;
pub mod blockspec;
pub mod error;
pub mod from_json;
pub mod json;
pub mod lexer;
pub mod parser;
pub mod reflect;
pub mod scope;
pub mod tree;
pub mod types;
pub mod validate;
pub mod walker;

pub use blockspec::{BlockSpec, ScalarSplit, SpecSet, Tag};
pub use error::{Error, ErrorKind, Errors, Position, Span};
pub use parser::{parse, ParseOptions, ParseResult};
pub use reflect::Reflect;
pub use tree::{DynamicTarget, Message};
pub use types::TypeSet;
pub use validate::{validate_required, SchemaError};
pub use walker::Walker;

// ── Core API ───────────────────────────────────────────────────────

/// Parse `input` fail-fast and bind it onto `target`.
///
/// Parse errors stop before binding. A bind error is returned alone,
/// carrying the filename from `options` when one is set.
pub fn parse_and_bind<T: Reflect + ?Sized>(
    input: &str,
    options: &ParseOptions,
    walker: &mut Walker,
    target: &mut T,
) -> Result<ast::File, Errors> {
    let options = ParseOptions {
        fail_fast: true,
        ..options.clone()
    };
    let file = parse(input, &options).into_result()?;
    walker.bind(target, &file.body).map_err(|err| {
        let err = match &options.filename {
            Some(name) => err.with_filename(name.as_str()),
            None => err,
        };
        Errors::from(err)
    })?;
    Ok(file)
}

#[cfg(test)]
mod tests;
