//! Fragment-mod application.
//!
//! A machine's effective configuration is a base snapshot plus a list of
//! fragment mods, each carrying `$set`/`$unset` operations addressed by
//! dotted paths. Array elements are addressed by field match, e.g.
//! `components[name=sander-motor].attributes.speed`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static ARRAY_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^.\[]+)\[(\w+)=(.+)\]$").unwrap());

/// One step of a mod path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Plain object key.
    Key(String),
    /// Array element addressed by string-field equality.
    Match {
        array: String,
        field: String,
        value: String,
    },
}

/// Parsed dotted path with first-class array addressing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModPath {
    segments: Vec<PathSegment>,
}

impl ModPath {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('.')
            .map(|part| match ARRAY_SEGMENT.captures(part) {
                Some(caps) => PathSegment::Match {
                    array: caps[1].to_string(),
                    field: caps[2].to_string(),
                    value: caps[3].to_string(),
                },
                None => PathSegment::Key(part.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

/// One tagged configuration operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigMod {
    Set { path: ModPath, value: Value },
    Unset { path: ModPath },
}

/// Extract every operation from `config.fragment_mods`, with each fragment
/// mod's operations sorted by raw path for consistent diffing.
pub fn collect_mods(config: &Value) -> Vec<ConfigMod> {
    let Some(fragment_mods) =
        config.get("fragment_mods").and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut collected = Vec::new();
    for fragment_mod in fragment_mods {
        let Some(mods) = fragment_mod.get("mods").and_then(Value::as_array)
        else {
            continue;
        };

        let mut entries: Vec<(String, ConfigMod)> = Vec::new();
        for raw in mods {
            if let Some(set) = raw.get("$set").and_then(Value::as_object) {
                for (path, value) in set {
                    entries.push((
                        path.clone(),
                        ConfigMod::Set {
                            path: ModPath::parse(path),
                            value: value.clone(),
                        },
                    ));
                }
            } else if let Some(unset) =
                raw.get("$unset").and_then(Value::as_object)
            {
                for path in unset.keys() {
                    entries.push((
                        path.clone(),
                        ConfigMod::Unset {
                            path: ModPath::parse(path),
                        },
                    ));
                }
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        collected.extend(entries.into_iter().map(|(_, m)| m));
    }
    collected
}

/// Apply every fragment mod to a base configuration, returning the derived
/// config with the `fragment_mods`/`fragments` bookkeeping stripped.
///
/// The input is never mutated.
pub fn apply_fragment_mods(config: &Value) -> Value {
    let mods = collect_mods(config);
    let mut derived = config.clone();

    debug!("applying {} fragment mod operation(s)", mods.len());
    for operation in &mods {
        match operation {
            ConfigMod::Set { path, value } => {
                set_path(&mut derived, path, value.clone());
            }
            ConfigMod::Unset { path } => unset_path(&mut derived, path),
        }
    }

    if let Some(object) = derived.as_object_mut() {
        object.remove("fragment_mods");
        object.remove("fragments");
    }
    derived
}

/// Descend one non-terminal segment. Returns `None` when the path cannot
/// be resolved (and, for sets, cannot be created).
fn descend<'a>(
    current: &'a mut Value,
    segment: &PathSegment,
    create_missing: bool,
) -> Option<&'a mut Value> {
    match segment {
        PathSegment::Key(key) => {
            let object = current.as_object_mut()?;
            if !object.contains_key(key) {
                if !create_missing {
                    return None;
                }
                object.insert(key.clone(), Value::Object(Default::default()));
            }
            object.get_mut(key)
        }
        PathSegment::Match {
            array,
            field,
            value,
        } => {
            // Array elements are never created on demand; a set through a
            // match segment that finds nothing is a no-op.
            let elements =
                current.get_mut(array).and_then(Value::as_array_mut)?;
            elements.iter_mut().find(|element| {
                element.get(field).and_then(Value::as_str)
                    == Some(value.as_str())
            })
        }
    }
}

fn set_path(root: &mut Value, path: &ModPath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        match descend(current, segment, true) {
            Some(next) => current = next,
            None => return,
        }
    }

    match last {
        PathSegment::Key(key) => {
            if let Some(object) = current.as_object_mut() {
                object.insert(key.clone(), value);
            }
        }
        PathSegment::Match {
            array,
            field,
            value: matched,
        } => {
            // Replace the matching element wholesale.
            let Some(elements) =
                current.get_mut(array).and_then(Value::as_array_mut)
            else {
                return;
            };
            if let Some(slot) = elements.iter_mut().find(|element| {
                element.get(field).and_then(Value::as_str)
                    == Some(matched.as_str())
            }) {
                *slot = value;
            }
        }
    }
}

fn unset_path(root: &mut Value, path: &ModPath) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        match descend(current, segment, false) {
            Some(next) => current = next,
            None => return,
        }
    }

    match last {
        PathSegment::Key(key) => {
            if let Some(object) = current.as_object_mut() {
                object.remove(key);
            }
        }
        PathSegment::Match {
            array,
            field,
            value,
        } => {
            let Some(elements) =
                current.get_mut(array).and_then(Value::as_array_mut)
            else {
                return;
            };
            if let Some(slot) = elements.iter().position(|element| {
                element.get(field).and_then(Value::as_str)
                    == Some(value.as_str())
            }) {
                elements.remove(slot);
            }
        }
    }
}
