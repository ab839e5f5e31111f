//! Patch composition over the internal document model.
//!
//! The internal document is a JSON object whose `publicKeys` and `services`
//! arrays hold entries keyed by `id`. Patches are applied to a copy, so a
//! failing patch leaves the input untouched.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};
use sidetree_protocol::ProtocolParameters;
use sidetree_types::{JsonPatchOp, Patch, PatchAction};

pub const PUBLIC_KEYS: &str = "publicKeys";
pub const SERVICES: &str = "services";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("patch action {0} is not allowed")]
    NotAllowed(PatchAction),

    #[error("{0} must be a JSON object")]
    NotAnObject(&'static str),

    #[error("duplicate id {0} in one patch")]
    DuplicateId(String),

    #[error("invalid JSON pointer {0:?}")]
    Pointer(String),

    #[error("no value at {0:?}")]
    MissingPath(String),

    #[error("test failed at {0:?}")]
    TestFailed(String),

    #[error("malformed entry: {0}")]
    Malformed(String),
}

/// Applies patches under one protocol generation's allowed actions.
pub struct DocumentComposer<'a> {
    params: &'a ProtocolParameters,
}

impl<'a> DocumentComposer<'a> {
    pub fn new(params: &'a ProtocolParameters) -> Self {
        Self { params }
    }

    pub fn empty_document() -> Value {
        Value::Object(Map::new())
    }

    /// Apply `patches` in order to a copy of `document`.
    pub fn compose(&self, document: &Value, patches: &[Patch]) -> Result<Value, PatchError> {
        let mut doc = document.clone();
        for patch in patches {
            let action = patch.action();
            if !self.params.allows_patch(action) {
                return Err(PatchError::NotAllowed(action));
            }
            apply(&mut doc, patch)?;
        }
        Ok(doc)
    }
}

fn apply(doc: &mut Value, patch: &Patch) -> Result<(), PatchError> {
    match patch {
        Patch::Replace { document } => {
            if !document.is_object() {
                return Err(PatchError::NotAnObject("replacement document"));
            }
            *doc = document.clone();
        }
        Patch::AddPublicKeys { public_keys } => {
            let ids = public_keys.iter().map(|k| k.id.as_str());
            upsert(doc, PUBLIC_KEYS, ids.zip(public_keys.iter()))?;
        }
        Patch::RemovePublicKeys { ids } => remove_ids(doc, PUBLIC_KEYS, ids)?,
        Patch::AddServices { services } => {
            let ids = services.iter().map(|s| s.id.as_str());
            upsert(doc, SERVICES, ids.zip(services.iter()))?;
        }
        Patch::RemoveServices { ids } => remove_ids(doc, SERVICES, ids)?,
        Patch::IetfJsonPatch { patches } => {
            for op in patches {
                json_patch(doc, op)?;
            }
        }
    }
    Ok(())
}

fn entries<'d>(doc: &'d mut Value, key: &str) -> Result<&'d mut Vec<Value>, PatchError> {
    let map = doc
        .as_object_mut()
        .ok_or(PatchError::NotAnObject("document"))?;
    map.entry(key)
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| PatchError::Malformed(format!("{key} is not an array")))
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}

/// Add entries, replacing any existing entry with the same id.
fn upsert<'e, T: Serialize + 'e>(
    doc: &mut Value,
    key: &str,
    new: impl Iterator<Item = (&'e str, &'e T)>,
) -> Result<(), PatchError> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for (id, entry) in new {
        if !seen.insert(id) {
            return Err(PatchError::DuplicateId(id.to_string()));
        }
        let value = serde_json::to_value(entry).map_err(|e| PatchError::Malformed(e.to_string()))?;
        values.push((id, value));
    }

    let list = entries(doc, key)?;
    for (id, value) in values {
        match list.iter_mut().find(|e| entry_id(e) == Some(id)) {
            Some(existing) => *existing = value,
            None => list.push(value),
        }
    }
    Ok(())
}

/// Unknown ids are ignored.
fn remove_ids(doc: &mut Value, key: &str, ids: &[String]) -> Result<(), PatchError> {
    let list = entries(doc, key)?;
    list.retain(|e| entry_id(e).map_or(true, |id| !ids.iter().any(|r| r == id)));
    Ok(())
}

// ---- RFC 6902 subset over RFC 6901 pointers ----

fn parse_pointer(path: &str) -> Result<Vec<String>, PatchError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| PatchError::Pointer(path.to_string()))?;
    Ok(rest
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Array index token: no sign, no leading zeros, at most `max`.
fn array_index(token: &str, max: usize, path: &str) -> Result<usize, PatchError> {
    let valid = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    if !valid {
        return Err(PatchError::Pointer(path.to_string()));
    }
    match token.parse::<usize>() {
        Ok(i) if i <= max => Ok(i),
        _ => Err(PatchError::MissingPath(path.to_string())),
    }
}

fn walk<'d>(doc: &'d Value, tokens: &[String], path: &str) -> Result<&'d Value, PatchError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get(token),
            Value::Array(items) if !items.is_empty() => {
                items.get(array_index(token, items.len() - 1, path)?)
            }
            _ => None,
        }
        .ok_or_else(|| PatchError::MissingPath(path.to_string()))?;
    }
    Ok(current)
}

fn walk_mut<'d>(
    doc: &'d mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'d mut Value, PatchError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token),
            Value::Array(items) if !items.is_empty() => {
                let last = items.len() - 1;
                items.get_mut(array_index(token, last, path)?)
            }
            _ => None,
        }
        .ok_or_else(|| PatchError::MissingPath(path.to_string()))?;
    }
    Ok(current)
}

fn json_patch(doc: &mut Value, op: &JsonPatchOp) -> Result<(), PatchError> {
    match op {
        JsonPatchOp::Add { path, value } => {
            let tokens = parse_pointer(path)?;
            let Some((last, parents)) = tokens.split_last() else {
                *doc = value.clone();
                return Ok(());
            };
            match walk_mut(doc, parents, path)? {
                Value::Object(map) => {
                    map.insert(last.clone(), value.clone());
                }
                Value::Array(items) if last == "-" => items.push(value.clone()),
                Value::Array(items) => {
                    let i = array_index(last, items.len(), path)?;
                    items.insert(i, value.clone());
                }
                _ => return Err(PatchError::MissingPath(path.clone())),
            }
        }
        JsonPatchOp::Remove { path } => {
            let tokens = parse_pointer(path)?;
            let (last, parents) = tokens
                .split_last()
                .ok_or_else(|| PatchError::Pointer(path.clone()))?;
            let removed = match walk_mut(doc, parents, path)? {
                Value::Object(map) => map.remove(last),
                Value::Array(items) if !items.is_empty() => {
                    let i = array_index(last, items.len() - 1, path)?;
                    Some(items.remove(i))
                }
                _ => None,
            };
            if removed.is_none() {
                return Err(PatchError::MissingPath(path.clone()));
            }
        }
        JsonPatchOp::Replace { path, value } => {
            let tokens = parse_pointer(path)?;
            *walk_mut(doc, &tokens, path)? = value.clone();
        }
        JsonPatchOp::Test { path, value } => {
            let tokens = parse_pointer(path)?;
            if walk(doc, &tokens, path)? != value {
                return Err(PatchError::TestFailed(path.clone()));
            }
        }
    }
    Ok(())
}
