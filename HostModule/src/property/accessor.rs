//! # Accessor Engine
//!
//! Resolves parsed paths against a root node for reading and writing.
//!
//! Each step is dispatched strictly on its declared type; there is no
//! fallback from one accessor kind to another. A failing conditional step
//! turns a read into `null` and a write into a no-op. Any other failure
//! aborts the whole path.
//!
//! Plain data reached through a path is a copy. Writes below such data are
//! made on the copy and written back step by step once the final assignment
//! succeeded, so a failed write never leaves a half-applied change behind.

use std::borrow::Cow;

use bridge_shared::expression::number;
use bridge_shared::{Expression, Path, Step, StepType};
use log::trace;
use serde_json::Value;

use crate::object::{HostObject, Node, ObjectHandle};
use crate::property::conversion::{coerce_literal, into_value, value_from_text};
use crate::property::{ResolutionError, ResolveContext};

fn read<R>(
    handle: &ObjectHandle,
    f: impl FnOnce(&dyn HostObject) -> Result<R, ResolutionError>,
) -> Result<R, ResolutionError> {
    let object = handle.try_borrow().map_err(|_| ResolutionError::ObjectBusy)?;
    f(&*object)
}

fn write<R>(
    handle: &ObjectHandle,
    f: impl FnOnce(&mut dyn HostObject) -> Result<R, ResolutionError>,
) -> Result<R, ResolutionError> {
    let mut object = handle
        .try_borrow_mut()
        .map_err(|_| ResolutionError::ObjectBusy)?;
    f(&mut *object)
}

fn not_an_object(step: &Step, found: &Node) -> ResolutionError {
    ResolutionError::NotAnObject {
        step: format!("{}:{}", step.step_type, step.value),
        found: found.describe(),
    }
}

fn parse_index(key: &str) -> Result<usize, ResolutionError> {
    key.parse().map_err(|_| ResolutionError::InvalidLiteral {
        step_type: "index".to_string(),
        value: key.to_string(),
    })
}

/// Evaluate an excited payload. Path references resolve against `root`,
/// operation expressions apply to `current`.
fn evaluate(
    ctx: ResolveContext<'_>,
    root: &Node,
    current: &Node,
    payload: &str,
) -> Result<Node, ResolutionError> {
    match Expression::from_value(value_from_text(payload))? {
        Expression::Literal(value) => Ok(Node::Value(value)),
        Expression::PathRef(path) => resolve_get(ctx, root, &path),
        Expression::Operation(op) => {
            let base = into_value(current.clone())?;
            Ok(Node::Value(op.apply(&base)?))
        }
    }
}

/// The name, index or ID a traversal step addresses
fn step_key<'s>(
    ctx: ResolveContext<'_>,
    root: &Node,
    step: &'s Step,
) -> Result<Cow<'s, str>, ResolutionError> {
    if !step.excited {
        return Ok(Cow::Borrowed(step.value.as_str()));
    }
    match into_value(evaluate(ctx, root, &Node::null(), &step.value)?)? {
        Value::String(key) => Ok(Cow::Owned(key)),
        Value::Number(n) => Ok(Cow::Owned(number(n.as_f64().unwrap_or_default()).to_string())),
        other => Err(ResolutionError::TypeMismatch {
            expected: "string or number key",
            found: other.to_string(),
        }),
    }
}

fn literal(
    ctx: ResolveContext<'_>,
    root: &Node,
    current: &Node,
    step: &Step,
) -> Result<Node, ResolutionError> {
    if step.excited {
        let value = into_value(evaluate(ctx, root, current, &step.value)?)?;
        return coerce_literal(&step.step_type, value).map(Node::Value);
    }
    step.literal_value()
        .map(Node::Value)
        .ok_or_else(|| ResolutionError::InvalidLiteral {
            step_type: step.step_type.name().to_string(),
            value: step.value.clone(),
        })
}

fn call_method(handle: &ObjectHandle, method: &str, args: Vec<Value>) -> Result<Node, ResolutionError> {
    write(handle, |object| match object.invoke(method, args) {
        Some(Ok(node)) => Ok(node),
        Some(Err(message)) => Err(ResolutionError::Method {
            method: method.to_string(),
            message,
        }),
        None => Err(ResolutionError::NoSuchMethod {
            method: method.to_string(),
            type_name: object.type_name().to_string(),
        }),
    })
}

fn get_member(current: &Node, name: &str) -> Result<Node, ResolutionError> {
    let missing = |type_name: String| ResolutionError::NoSuchMember {
        member: name.to_string(),
        type_name,
    };
    match current {
        Node::Object(handle) => read(handle, |object| {
            object
                .get_member(name)
                .ok_or_else(|| missing(object.type_name().to_string()))
        }),
        Node::Value(Value::Object(record)) => record
            .get(name)
            .cloned()
            .map(Node::Value)
            .ok_or_else(|| missing("record".to_string())),
        other => Err(missing(other.describe())),
    }
}

fn get_index(current: &Node, index: usize) -> Result<Node, ResolutionError> {
    match current {
        Node::Value(Value::Array(items)) => items
            .get(index)
            .cloned()
            .map(Node::Value)
            .ok_or(ResolutionError::IndexOutOfRange {
                index,
                len: items.len(),
            }),
        Node::Object(handle) => read(handle, |object| object.get_index(index)),
        other => Err(ResolutionError::NotIndexable {
            type_name: other.describe(),
        }),
    }
}

fn get_key(current: &Node, key: &str) -> Result<Node, ResolutionError> {
    match current {
        Node::Value(Value::Object(map)) => {
            map.get(key)
                .cloned()
                .map(Node::Value)
                .ok_or_else(|| ResolutionError::NoSuchKey {
                    key: key.to_string(),
                })
        }
        Node::Object(handle) => read(handle, |object| object.get_key(key)),
        other => Err(ResolutionError::NotKeyed {
            type_name: other.describe(),
        }),
    }
}

fn get_step(
    ctx: ResolveContext<'_>,
    root: &Node,
    current: &Node,
    step: &Step,
) -> Result<Node, ResolutionError> {
    match &step.step_type {
        StepType::Member => get_member(current, &step_key(ctx, root, step)?),
        StepType::Index => get_index(current, parse_index(&step_key(ctx, root, step)?)?),
        StepType::Map => get_key(current, &step_key(ctx, root, step)?),
        StepType::Component => {
            let name = step_key(ctx, root, step)?;
            match current {
                Node::Object(handle) => read(handle, |object| {
                    object.component(&name).map(Node::Object).ok_or_else(|| {
                        ResolutionError::NoSuchComponent {
                            component: name.to_string(),
                            type_name: object.type_name().to_string(),
                        }
                    })
                }),
                other => Err(not_an_object(step, other)),
            }
        }
        StepType::Transform => {
            let name = step_key(ctx, root, step)?;
            match current {
                Node::Object(handle) => read(handle, |object| {
                    object.child(&name).map(Node::Object).ok_or_else(|| {
                        ResolutionError::NoSuchChild {
                            child: name.to_string(),
                            type_name: object.type_name().to_string(),
                        }
                    })
                }),
                other => Err(not_an_object(step, other)),
            }
        }
        StepType::Resource => {
            let name = step_key(ctx, root, step)?;
            ctx.resources
                .load(&name)
                .ok_or_else(|| ResolutionError::NoSuchResource {
                    name: name.to_string(),
                })
        }
        StepType::Object => {
            let id = step_key(ctx, root, step)?;
            ctx.store
                .get(&id)
                .map(Node::Object)
                .ok_or_else(|| ResolutionError::UnknownObjectId { id: id.to_string() })
        }
        StepType::Method => {
            let method = step_key(ctx, root, step)?;
            match current {
                Node::Object(handle) => call_method(handle, &method, Vec::new()),
                other => Err(not_an_object(step, other)),
            }
        }
        StepType::String
        | StepType::Float
        | StepType::Integer
        | StepType::Boolean
        | StepType::Null
        | StepType::Json => literal(ctx, root, current, step),
        StepType::Unknown(tag) => Err(ResolutionError::UnknownStepType { tag: tag.clone() }),
    }
}

/// Resolve `path` against `root` for reading.
///
/// The empty path yields the root itself.
pub fn resolve_get(
    ctx: ResolveContext<'_>,
    root: &Node,
    path: &Path,
) -> Result<Node, ResolutionError> {
    let mut current = root.clone();
    for step in path.steps() {
        current = match get_step(ctx, root, &current, step) {
            Ok(next) => next,
            Err(err) if step.conditional => {
                trace!("Conditional step `{}` in `{}` missed: {}", step.value, path, err);
                return Ok(Node::null());
            }
            Err(err) => return Err(err),
        };
    }
    Ok(current)
}

/// Assign `value` to the slot `path` addresses, starting from `root`.
///
/// Returns `Ok(())` without writing when a conditional step misses.
pub fn resolve_set(
    ctx: ResolveContext<'_>,
    root: &mut Node,
    path: &Path,
    value: Node,
) -> Result<(), ResolutionError> {
    if path.is_empty() {
        return Err(ResolutionError::NotAssignable {
            step: "root".to_string(),
        });
    }
    // Expressions inside excited steps read the graph as it was before the write
    let view = root.clone();
    if !set_steps(ctx, &view, root, path.steps(), value)? {
        trace!("Conditional set of `{}` skipped", path);
    }
    Ok(())
}

/// Evaluate `expr` against the current graph and assign the result.
///
/// Returns the value that was assigned.
pub fn assign(
    ctx: ResolveContext<'_>,
    root: &mut Node,
    path: &Path,
    expr: &Expression,
) -> Result<Node, ResolutionError> {
    let value = match expr {
        Expression::Literal(value) => Node::Value(value.clone()),
        Expression::PathRef(source) => resolve_get(ctx, root, source)?,
        Expression::Operation(op) => {
            let current = match resolve_get(ctx, root, path) {
                Ok(node) => into_value(node)?,
                // A new map entry starts out empty
                Err(ResolutionError::NoSuchKey { .. }) => Value::Null,
                Err(err) => return Err(err),
            };
            Node::Value(op.apply(&current)?)
        }
    };
    resolve_set(ctx, root, path, value.clone())?;
    Ok(value)
}

fn skip_if_conditional(step: &Step, err: ResolutionError) -> Result<bool, ResolutionError> {
    if step.conditional {
        trace!("Conditional step `{}` missed: {}", step.value, err);
        Ok(false)
    } else {
        Err(err)
    }
}

/// Returns whether anything was written
fn set_steps(
    ctx: ResolveContext<'_>,
    view: &Node,
    current: &mut Node,
    steps: &[Step],
    value: Node,
) -> Result<bool, ResolutionError> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(false);
    };
    if rest.is_empty() {
        return match set_final(ctx, view, current, step, value) {
            Ok(()) => Ok(true),
            Err(err) => skip_if_conditional(step, err),
        };
    }
    set_through(ctx, view, current, step, rest, value)
}

fn set_through(
    ctx: ResolveContext<'_>,
    view: &Node,
    current: &mut Node,
    step: &Step,
    rest: &[Step],
    value: Node,
) -> Result<bool, ResolutionError> {
    let mut child = match get_step(ctx, view, current, step) {
        Ok(child) => child,
        Err(err) => return skip_if_conditional(step, err),
    };

    // Only container slots can take back a modified copy
    let writes_back = matches!(
        step.step_type,
        StepType::Member | StepType::Index | StepType::Map
    );
    if matches!(child, Node::Value(_)) && !writes_back {
        let err = ResolutionError::NotAssignable {
            step: step.step_type.name().to_string(),
        };
        return skip_if_conditional(step, err);
    }

    if !set_steps(ctx, view, &mut child, rest, value)? {
        return Ok(false);
    }

    match child {
        // Live objects were mutated in place
        Node::Object(_) => Ok(true),
        copy @ Node::Value(_) => match set_final(ctx, view, current, step, copy) {
            Ok(()) => Ok(true),
            Err(err) => skip_if_conditional(step, err),
        },
    }
}

fn set_final(
    ctx: ResolveContext<'_>,
    view: &Node,
    current: &mut Node,
    step: &Step,
    value: Node,
) -> Result<(), ResolutionError> {
    match &step.step_type {
        StepType::Member => {
            let name = step_key(ctx, view, step)?;
            match current {
                Node::Object(handle) => write(handle, |object| object.set_member(&name, value)),
                Node::Value(Value::Object(record)) => match record.get_mut(name.as_ref()) {
                    Some(slot) => {
                        *slot = into_value(value)?;
                        Ok(())
                    }
                    None => Err(ResolutionError::NoSuchMember {
                        member: name.to_string(),
                        type_name: "record".to_string(),
                    }),
                },
                other => Err(ResolutionError::NoSuchMember {
                    member: name.to_string(),
                    type_name: other.describe(),
                }),
            }
        }
        StepType::Index => {
            let index = parse_index(&step_key(ctx, view, step)?)?;
            match current {
                Node::Value(Value::Array(items)) => {
                    let len = items.len();
                    let slot = items
                        .get_mut(index)
                        .ok_or(ResolutionError::IndexOutOfRange { index, len })?;
                    *slot = into_value(value)?;
                    Ok(())
                }
                Node::Object(handle) => write(handle, |object| object.set_index(index, value)),
                other => Err(ResolutionError::NotIndexable {
                    type_name: other.describe(),
                }),
            }
        }
        StepType::Map => {
            let key = step_key(ctx, view, step)?;
            match current {
                Node::Value(Value::Object(map)) => {
                    map.insert(key.into_owned(), into_value(value)?);
                    Ok(())
                }
                Node::Object(handle) => write(handle, |object| object.set_key(&key, value)),
                other => Err(ResolutionError::NotKeyed {
                    type_name: other.describe(),
                }),
            }
        }
        StepType::Method => {
            let method = step_key(ctx, view, step)?;
            match current {
                Node::Object(handle) => {
                    // The assigned value is the argument list
                    let args = match into_value(value)? {
                        Value::Array(args) => args,
                        single => vec![single],
                    };
                    call_method(handle, &method, args).map(|_| ())
                }
                other => Err(not_an_object(step, other)),
            }
        }
        StepType::Unknown(tag) => Err(ResolutionError::UnknownStepType { tag: tag.clone() }),
        other => Err(ResolutionError::NotAssignable {
            step: other.name().to_string(),
        }),
    }
}
