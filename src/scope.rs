use crate::blockspec::{BlockSpec, ChildSpec, SpecCache};
use crate::error::{Error, ErrorKind};
use crate::reflect::{ContainerKind, FieldHandle, FieldRef, Location, Reflect, ScalarValue};
use std::rc::Rc;

/// A container reachable from the current point, with its spec.
#[derive(Debug, Clone)]
pub struct ContainerField {
    pub schema_name: String,
    pub kind: ContainerKind,
    /// Names walked from the root to reach this container.
    pub path: Vec<String>,
    pub location: Location,
    pub spec: Rc<BlockSpec>,
}

/// Whether entering a child replaces the scope or stacks onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    Reset,
    Merge,
}

/// Containers searched, in order, when resolving names. The first match
/// wins, so the most recently merged container shadows outer ones.
#[derive(Debug, Clone)]
pub struct Scope {
    containers: Vec<ContainerField>,
}

/// A resolved scalar or repeated-scalar field.
#[derive(Debug, Clone)]
pub struct ScalarField {
    pub field: FieldRef,
    pub collection: bool,
}

impl ScalarField {
    /// Set the value; repeated fields accumulate.
    pub fn set<T: Reflect + ?Sized>(&self, target: &mut T, value: ScalarValue) -> Result<(), Error> {
        if self.collection {
            target.append_scalar(&self.field, value)?;
        } else {
            target.set_scalar(&self.field, value)?;
        }
        Ok(())
    }

    pub fn append<T: Reflect + ?Sized>(
        &self,
        target: &mut T,
        value: ScalarValue,
    ) -> Result<(), Error> {
        if !self.collection {
            return Err(Error::new(ErrorKind::NotACollection(self.field.name.clone())));
        }
        target.append_scalar(&self.field, value)?;
        Ok(())
    }
}

impl Scope {
    /// Scope holding only the target's root container.
    pub fn root<T: Reflect + ?Sized>(target: &T, specs: &mut SpecCache) -> Result<Scope, Error> {
        let container = container_field(target, specs, Location::root(), Vec::new())?;
        Ok(Scope {
            containers: vec![container],
        })
    }

    /// The innermost container; tags and descriptions apply here.
    pub fn current(&self) -> &ContainerField {
        &self.containers[0]
    }

    /// `inner` searched first, then everything already in scope.
    pub fn merged(&self, inner: Scope) -> Scope {
        let mut containers = inner.containers;
        containers.extend(self.containers.iter().cloned());
        Scope { containers }
    }

    /// Resolve a child block name against every container in order.
    pub fn child_block<T: Reflect + ?Sized>(
        &self,
        name: &str,
        mode: ScopeMode,
        target: &mut T,
        specs: &mut SpecCache,
    ) -> Result<Scope, Error> {
        for container in &self.containers {
            let location = if container.kind == ContainerKind::Map {
                // Any key names an entry; the map's value kind decides.
                let key = [name.to_string()];
                walk_containers(target, &container.location, &key)?
            } else {
                let child = match container.spec.children.get(name) {
                    Some(child) => child,
                    None => continue,
                };
                if !child.is_container {
                    return Err(Error::new(ErrorKind::NotAContainer(name.to_string())));
                }
                walk_containers(target, &container.location, &child.path)?
            };
            let mut path = container.path.clone();
            path.push(name.to_string());
            let entered = container_field(&*target, specs, location, path)?;
            tracing::debug!(
                name,
                schema = %entered.schema_name,
                location = %entered.location,
                ?mode,
                "entered child block"
            );
            let entered = Scope {
                containers: vec![entered],
            };
            return Ok(match mode {
                ScopeMode::Reset => entered,
                ScopeMode::Merge => self.merged(entered),
            });
        }
        Err(Error::new(ErrorKind::NameNotFound {
            name: name.to_string(),
            available: self.names(|c| c.is_container),
        }))
    }

    /// Resolve `name` as a child of the container at `path` below the
    /// current one (empty path = the current container) and merge it in.
    pub fn select<T: Reflect + ?Sized>(
        &self,
        path: &[String],
        name: &str,
        target: &mut T,
        specs: &mut SpecCache,
    ) -> Result<Scope, Error> {
        let current = self.current();
        let base = if path.is_empty() {
            current.clone()
        } else {
            let location = walk_containers(target, &current.location, path)?;
            let mut names = current.path.clone();
            names.extend(path.iter().cloned());
            container_field(&*target, specs, location, names)?
        };
        let base = Scope {
            containers: vec![base],
        };
        let selected = base.child_block(name, ScopeMode::Reset, target, specs)?;
        Ok(self.merged(selected))
    }

    /// Resolve a scalar field name against every container in order.
    pub fn field<T: Reflect + ?Sized>(&self, name: &str, target: &mut T) -> Result<ScalarField, Error> {
        for container in &self.containers {
            if container.kind == ContainerKind::Map {
                return scalar_handle(target.field(&container.location, name)?, name);
            }
            let child = match container.spec.children.get(name) {
                Some(child) => child,
                None => continue,
            };
            if !child.is_scalar {
                return Err(Error::new(ErrorKind::NotAScalar(name.to_string())));
            }
            return field_at(target, &container.location, &child.path);
        }
        Err(Error::new(ErrorKind::NameNotFound {
            name: name.to_string(),
            available: self.names(|c| c.is_scalar),
        }))
    }

    /// A scalar at a raw field path below the current container.
    pub fn field_at<T: Reflect + ?Sized>(
        &self,
        path: &[String],
        target: &mut T,
    ) -> Result<ScalarField, Error> {
        field_at(target, &self.current().location, path)
    }

    /// Where description text goes: the innermost container declaring a
    /// description path, else a `description` field on the current one.
    pub fn description<T: Reflect + ?Sized>(&self, target: &mut T) -> Result<ScalarField, Error> {
        for container in &self.containers {
            if let Some(path) = &container.spec.description {
                return field_at(target, &container.location, path);
            }
        }
        self.field_at(&["description".to_string()], target)
    }

    /// Names reachable here whose child spec passes `filter`, sorted.
    pub fn names(&self, filter: impl Fn(&ChildSpec) -> bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .containers
            .iter()
            .flat_map(|c| c.spec.children.iter())
            .filter(|(_, child)| filter(child))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn container_field<T: Reflect + ?Sized>(
    target: &T,
    specs: &mut SpecCache,
    location: Location,
    path: Vec<String>,
) -> Result<ContainerField, Error> {
    Ok(ContainerField {
        schema_name: target.schema_name(&location)?,
        kind: target.container_kind(&location)?,
        spec: specs.block_spec(target, &location)?,
        path,
        location,
    })
}

/// Follow container fields from `from`, creating them as needed. Repeated
/// containers get a new element.
fn walk_containers<T: Reflect + ?Sized>(
    target: &mut T,
    from: &Location,
    path: &[String],
) -> Result<Location, Error> {
    let mut location = from.clone();
    for segment in path {
        location = match target.field(&location, segment)? {
            FieldHandle::Container(next) => next,
            FieldHandle::ContainerList(field) => target.new_element(&field)?.0,
            FieldHandle::Scalar(_) | FieldHandle::ScalarList(_) => {
                return Err(Error::new(ErrorKind::NotAContainer(segment.clone())))
            }
        };
    }
    Ok(location)
}

fn field_at<T: Reflect + ?Sized>(
    target: &mut T,
    from: &Location,
    path: &[String],
) -> Result<ScalarField, Error> {
    let (last, parents) = match path.split_last() {
        Some(split) => split,
        None => return Err(Error::new(ErrorKind::NotAScalar(String::new()))),
    };
    let location = walk_containers(target, from, parents)?;
    scalar_handle(target.field(&location, last)?, last)
}

fn scalar_handle(handle: FieldHandle, name: &str) -> Result<ScalarField, Error> {
    match handle {
        FieldHandle::Scalar(field) => Ok(ScalarField {
            field,
            collection: false,
        }),
        FieldHandle::ScalarList(field) => Ok(ScalarField {
            field,
            collection: true,
        }),
        FieldHandle::Container(_) | FieldHandle::ContainerList(_) => {
            Err(Error::new(ErrorKind::NotAScalar(name.to_string())))
        }
    }
}
