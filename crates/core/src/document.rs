//! Applying slash-dialect patch operations to JSON documents
//!
//! Paths are JSON Pointers (`/a/0/b`, `~1` for `/`, `~0` for `~`). The last
//! token of an array path may be `-`, meaning one past the end.
//!
//! | Operation | Object member | Array element |
//! |-----------|---------------|---------------|
//! | Add | insert or replace | insert before index, `-` appends |
//! | Set | insert or replace | replace in place, end or `-` appends |
//! | Replace | must exist | must exist |
//! | Remove | must exist | must exist, later elements shift down |
//!
//! [`apply_patch`] is atomic: either every operation applies or the document
//! is left untouched.

use crate::patch::DocumentPatch;
use serde_json::Value;
use thiserror::Error;

/// Errors from pointer navigation and patch application
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    /// Path is not a valid JSON Pointer
    #[error("invalid pointer '{0}'")]
    InvalidPointer(String),

    /// Target (or its parent) does not exist
    #[error("path not found: {0}")]
    NotFound(String),

    /// Traversal hit a value of the wrong kind
    #[error("type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Pointer being applied
        path: String,
        /// Expected kind
        expected: &'static str,
        /// Actual kind
        found: &'static str,
    },

    /// Array index past the end
    #[error("index {index} out of bounds (len {len}) at '{path}'")]
    IndexOutOfBounds {
        /// Pointer being applied
        path: String,
        /// Requested index
        index: usize,
        /// Array length
        len: usize,
    },
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Split a pointer into unescaped reference tokens
pub fn parse_pointer(pointer: &str) -> Result<Vec<String>, PointerError> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let rest = pointer
        .strip_prefix('/')
        .ok_or_else(|| PointerError::InvalidPointer(pointer.to_string()))?;
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Add,
    Set,
    Replace,
    Remove,
}

fn array_index(
    path: &str,
    token: &str,
    len: usize,
    allow_end: bool,
) -> Result<usize, PointerError> {
    if token == "-" {
        return if allow_end {
            Ok(len)
        } else {
            Err(PointerError::IndexOutOfBounds {
                path: path.to_string(),
                index: len,
                len,
            })
        };
    }
    let index: usize = token
        .parse()
        .map_err(|_| PointerError::InvalidPointer(path.to_string()))?;
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    if index > limit || (!allow_end && len == 0) {
        return Err(PointerError::IndexOutOfBounds {
            path: path.to_string(),
            index,
            len,
        });
    }
    Ok(index)
}

fn apply_one(root: &mut Value, path: &str, mode: Mode, value: Value) -> Result<(), PointerError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parents)) = tokens.split_last() else {
        return match mode {
            Mode::Remove => Err(PointerError::InvalidPointer(path.to_string())),
            _ => {
                *root = value;
                Ok(())
            }
        };
    };

    let mut current = root;
    for token in parents {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PointerError::NotFound(path.to_string()))?,
            Value::Array(items) => {
                let len = items.len();
                let index = array_index(path, token, len, false)?;
                &mut items[index]
            }
            other => {
                return Err(PointerError::TypeMismatch {
                    path: path.to_string(),
                    expected: "object or array",
                    found: kind_name(other),
                })
            }
        };
    }

    match current {
        Value::Object(map) => match mode {
            Mode::Add | Mode::Set => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Mode::Replace => match map.get_mut(last) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(PointerError::NotFound(path.to_string())),
            },
            Mode::Remove => map
                .remove(last)
                .map(|_| ())
                .ok_or_else(|| PointerError::NotFound(path.to_string())),
        },
        Value::Array(items) => {
            let len = items.len();
            match mode {
                Mode::Add => {
                    let index = array_index(path, last, len, true)?;
                    items.insert(index, value);
                }
                Mode::Set => {
                    let index = array_index(path, last, len, true)?;
                    if index == len {
                        items.push(value);
                    } else {
                        items[index] = value;
                    }
                }
                Mode::Replace => {
                    let index = array_index(path, last, len, false)?;
                    items[index] = value;
                }
                Mode::Remove => {
                    let index = array_index(path, last, len, false)?;
                    items.remove(index);
                }
            }
            Ok(())
        }
        other => Err(PointerError::TypeMismatch {
            path: path.to_string(),
            expected: "object or array",
            found: kind_name(other),
        }),
    }
}

/// Apply a list of operations in order, all or nothing
pub fn apply_patch(document: &mut Value, operations: &[DocumentPatch]) -> Result<(), PointerError> {
    let mut working = document.clone();
    for op in operations {
        let (mode, value) = match op {
            DocumentPatch::Add { value, .. } => (Mode::Add, value.clone()),
            DocumentPatch::Set { value, .. } => (Mode::Set, value.clone()),
            DocumentPatch::Replace { value, .. } => (Mode::Replace, value.clone()),
            DocumentPatch::Remove { .. } => (Mode::Remove, Value::Null),
        };
        apply_one(&mut working, op.path(), mode, value)?;
    }
    *document = working;
    Ok(())
}
