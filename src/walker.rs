use crate::ast::*;
use crate::blockspec::{ScalarSplit, SpecCache, SpecSet, Tag};
use crate::error::{Error, ErrorKind};
use crate::reflect::{Reflect, ScalarValue};
use crate::scope::{Scope, ScopeMode};
use std::collections::VecDeque;

/// Binds parsed documents onto reflective targets.
///
/// A walker owns the BlockSpec cache for one `SpecSet`. Specs are cached
/// per schema set, so one walker may bind targets of different type sets;
/// it is not shared across threads.
pub struct Walker {
    specs: SpecCache,
}

impl Walker {
    pub fn new(specs: SpecSet) -> Self {
        Walker {
            specs: SpecCache::new(specs),
        }
    }

    pub fn spec_cache(&self) -> &SpecCache {
        &self.specs
    }

    /// Apply every statement of `body` to `target`. Stops at the first
    /// schema error; the error carries position and block context.
    pub fn bind<T: Reflect + ?Sized>(&mut self, target: &mut T, body: &Body) -> Result<(), Error> {
        let scope = Scope::root(&*target, &mut self.specs)?;
        let mut walk = Walk {
            specs: &mut self.specs,
            target,
        };
        walk.body(&scope, body)
    }
}

struct Walk<'w, T: ?Sized> {
    specs: &'w mut SpecCache,
    target: &'w mut T,
}

impl<T: Reflect + ?Sized> Walk<'_, T> {
    // ── Statements ──────────────────────────────────────────────────

    fn body(&mut self, scope: &Scope, body: &Body) -> Result<(), Error> {
        for stmt in &body.statements {
            match stmt {
                Statement::Assignment(a) => self.assignment(scope, a)?,
                Statement::Block(b) => self.block(scope, b)?,
                Statement::Description(d) => self
                    .description(scope, d)
                    .map_err(|e| e.with_position(d.span))?,
                Statement::Comment(_) => {}
            }
        }
        Ok(())
    }

    /// `a.b.c = v`: every segment but the last enters a child container.
    fn assignment(&mut self, scope: &Scope, a: &Assignment) -> Result<(), Error> {
        self.assign(scope, a)
            .map_err(|e| e.with_position(a.span).with_context(a.key.to_string()))
    }

    fn assign(&mut self, scope: &Scope, a: &Assignment) -> Result<(), Error> {
        let (last, parents) = match a.key.idents.split_last() {
            Some(split) => split,
            None => return Ok(()),
        };
        let mut scope = scope.clone();
        for ident in parents {
            scope = scope
                .child_block(&ident.value, ScopeMode::Merge, &mut *self.target, &mut *self.specs)
                .map_err(|e| e.with_position(ident.span))?;
        }
        let field = scope
            .field(&last.value, &mut *self.target)
            .map_err(|e| e.with_position(last.span))?;

        let values = scalar_values(&a.value)?;
        if a.append {
            for value in values {
                field.append(&mut *self.target, value)?;
            }
            return Ok(());
        }
        if !field.collection && values.len() != 1 {
            return Err(Error::at(
                ErrorKind::NotACollection(last.value.clone()),
                a.value.span(),
            ));
        }
        for value in values {
            field.set(&mut *self.target, value)?;
        }
        Ok(())
    }

    fn description(&mut self, scope: &Scope, d: &Description) -> Result<(), Error> {
        scope
            .description(&mut *self.target)?
            .set(&mut *self.target, ScalarValue::String(d.text.clone()))
    }

    // ── Blocks ──────────────────────────────────────────────────────

    fn block(&mut self, scope: &Scope, block: &Block) -> Result<(), Error> {
        tracing::debug!(block = %block.type_ref, tags = block.tags.len(), "walking block");
        let label = match block.tags.first() {
            Some(tag) => format!("{}({})", block.type_ref, tag.text()),
            None => block.type_ref.to_string(),
        };
        self.walk_block(scope, block)
            .map_err(|e| e.with_position(block.span).with_context(label))
    }

    fn walk_block(&mut self, outer: &Scope, block: &Block) -> Result<(), Error> {
        let mut scope = self.enter(outer, &block.type_ref)?;
        let mut tags: VecDeque<&TagValue> = block.tags.iter().collect();

        // Name
        let spec = scope.current().spec.clone();
        if let Some(name_tag) = &spec.name {
            match tags.pop_front() {
                Some(tag) => {
                    tracing::trace!(tag = %tag.text(), "name tag");
                    self.tag_value(&scope, name_tag, tag)
                        .map_err(|e| e.with_position(tag.span))?;
                }
                None if name_tag.optional => {}
                None => return Err(tag_error("expected name tag")),
            }
        }

        // Type-select chain: each selected container may declare its own.
        loop {
            let spec = scope.current().spec.clone();
            let select = match &spec.type_select {
                Some(select) => select,
                None => break,
            };
            let tag = tags
                .pop_front()
                .ok_or_else(|| tag_error("expected type-select tag"))?;
            tracing::trace!(tag = %tag.text(), "type-select tag");
            scope = self
                .select(&scope, select, tag)
                .map_err(|e| e.with_position(tag.span))?;
        }

        // Leftover tags only feed a scalar split.
        if let Some(first) = tags.front() {
            let spec = scope.current().spec.clone();
            match &spec.scalar_split {
                Some(split) if tags.len() == 1 => self
                    .scalar_split(&scope, split, first)
                    .map_err(|e| e.with_position(first.span))?,
                Some(_) => {
                    return Err(tag_error(format!(
                        "expected one tag to split, found {}",
                        tags.len()
                    ))
                    .with_position(tags[1].span))
                }
                None => return Err(tag_error("no more tags expected").with_position(first.span)),
            }
        }

        // Qualifiers narrow left to right.
        let mut qualifiers = block.qualifiers.iter();
        while let Some(q) = qualifiers.next() {
            let spec = scope.current().spec.clone();
            let qualifier = spec
                .qualifier
                .as_ref()
                .ok_or_else(|| tag_error("no qualifier expected").with_position(q.span))?;
            tracing::trace!(qualifier = %q.text(), block = qualifier.block, "qualifier");
            if !qualifier.block {
                self.tag_value(&scope, qualifier, q)
                    .map_err(|e| e.with_position(q.span))?;
                if let Some(extra) = qualifiers.next() {
                    return Err(tag_error("no more qualifiers expected").with_position(extra.span));
                }
                break;
            }
            scope = self
                .select(&scope, qualifier, q)
                .map_err(|e| e.with_position(q.span))?;
        }

        if let Some(d) = &block.description {
            self.description(&scope, d)
                .map_err(|e| e.with_position(d.span))?;
        }
        self.body(&scope, &block.body)
    }

    /// Resolve the block type against the outer scope; the block body
    /// sees only the entered container.
    fn enter(&mut self, outer: &Scope, type_ref: &Reference) -> Result<Scope, Error> {
        let mut scope = outer.clone();
        for ident in &type_ref.idents {
            scope = scope
                .child_block(&ident.value, ScopeMode::Reset, &mut *self.target, &mut *self.specs)
                .map_err(|e| e.with_position(ident.span))?;
        }
        Ok(scope)
    }

    /// A block-typed tag: each reference segment names a nested container,
    /// the first inside the tag's field path.
    fn select(&mut self, scope: &Scope, spec: &Tag, tag: &TagValue) -> Result<Scope, Error> {
        let reference = tag
            .reference()
            .ok_or_else(|| tag_error(format!("expected a type name, found {:?}", tag.text())))?;
        self.mark(scope, spec, tag.mark)?;

        let mut selected = scope.clone();
        for (i, ident) in reference.idents.iter().enumerate() {
            let path: &[String] = if i == 0 { &spec.field } else { &[] };
            selected = selected
                .select(path, &ident.value, &mut *self.target, &mut *self.specs)
                .map_err(|e| e.with_position(ident.span))?;
        }
        Ok(selected)
    }

    // ── Tag values ──────────────────────────────────────────────────

    fn mark(&mut self, scope: &Scope, spec: &Tag, mark: Mark) -> Result<(), Error> {
        let path = match mark {
            Mark::None => return Ok(()),
            Mark::Bang => spec
                .bang_field
                .as_ref()
                .ok_or_else(|| tag_error("'!' is not allowed on this tag"))?,
            Mark::Question => spec
                .question_field
                .as_ref()
                .ok_or_else(|| tag_error("'?' is not allowed on this tag"))?,
        };
        scope
            .field_at(path, &mut *self.target)?
            .set(&mut *self.target, ScalarValue::Bool(true))
    }

    /// A value tag: set its field, or spread a reference over `split_ref`.
    fn tag_value(&mut self, scope: &Scope, spec: &Tag, tag: &TagValue) -> Result<(), Error> {
        self.mark(scope, spec, tag.mark)?;

        let split = match &spec.split_ref {
            Some(split) => split,
            None => {
                let value = tag_scalar(tag)?;
                return scope
                    .field_at(&spec.field, &mut *self.target)?
                    .set(&mut *self.target, value);
            }
        };

        let mut parts = match &tag.kind {
            TagKind::Reference(r) => r.segments(),
            TagKind::Literal(l) => l.text.split('.').map(str::to_string).collect(),
        };
        for (i, path) in split.iter().enumerate().rev() {
            let value = if i == 0 {
                if parts.is_empty() {
                    break;
                }
                let joined = parts.join(".");
                parts.clear();
                joined
            } else {
                match parts.pop() {
                    Some(part) => part,
                    None => break,
                }
            };
            scope
                .field_at(path, &mut *self.target)?
                .set(&mut *self.target, ScalarValue::String(value))?;
        }
        Ok(())
    }

    fn scalar_split(&mut self, scope: &Scope, split: &ScalarSplit, tag: &TagValue) -> Result<(), Error> {
        let parts: Vec<String> = match (&split.delimiter, &tag.kind) {
            (Some(delimiter), TagKind::Reference(r)) => {
                r.to_string().split(delimiter.as_str()).map(str::to_string).collect()
            }
            (Some(delimiter), TagKind::Literal(l)) if l.kind == LiteralKind::String => {
                l.text.split(delimiter.as_str()).map(str::to_string).collect()
            }
            (Some(_), _) => {
                return Err(Error::new(ErrorKind::ScalarSplit(format!(
                    "expected a string, found {:?}",
                    tag.text()
                ))))
            }
            (None, TagKind::Reference(r)) => r.segments(),
            (None, _) => {
                return Err(Error::new(ErrorKind::ScalarSplit(format!(
                    "expected a dotted name, found {:?}",
                    tag.text()
                ))))
            }
        };

        for (path, value) in split.assign(parts).map_err(Error::new)? {
            scope
                .field_at(&path, &mut *self.target)?
                .set(&mut *self.target, ScalarValue::String(value))?;
        }
        Ok(())
    }
}

fn tag_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Tag(message.into()))
}

fn tag_scalar(tag: &TagValue) -> Result<ScalarValue, Error> {
    match &tag.kind {
        TagKind::Reference(r) => Ok(ScalarValue::String(r.to_string())),
        TagKind::Literal(l) => literal_value(l),
    }
}

/// The typed form of a literal.
pub fn literal_value(l: &Literal) -> Result<ScalarValue, Error> {
    let invalid = || Error::at(ErrorKind::InvalidLiteral(l.text.clone()), l.span);
    match l.kind {
        LiteralKind::String | LiteralKind::Regex => Ok(ScalarValue::String(l.text.clone())),
        LiteralKind::Bool => Ok(ScalarValue::Bool(l.text == "true")),
        LiteralKind::Int => l.text.parse().map(ScalarValue::Int).map_err(|_| invalid()),
        LiteralKind::Decimal => l.text.parse().map(ScalarValue::Float).map_err(|_| invalid()),
    }
}

/// Scalars of an assigned value; arrays may not nest.
fn scalar_values(value: &Value) -> Result<Vec<ScalarValue>, Error> {
    match value {
        Value::Literal(l) => Ok(vec![literal_value(l)?]),
        Value::Reference(r) => Ok(vec![ScalarValue::String(r.to_string())]),
        Value::Array { values, .. } => values
            .iter()
            .map(|v| match v {
                Value::Literal(l) => literal_value(l),
                Value::Reference(r) => Ok(ScalarValue::String(r.to_string())),
                Value::Array { span, .. } => Err(Error::at(
                    ErrorKind::InvalidLiteral("nested arrays are not supported".to_string()),
                    *span,
                )),
            })
            .collect(),
    }
}
