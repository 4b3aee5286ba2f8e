#![forbid(unsafe_code)]

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::asar::error::{AsarError, AsarResult};
use crate::asar::path::check_name;

const FILES: &str = "files";
const OFFSET: &str = "offset";
const SIZE: &str = "size";

/// In-memory archive index.
///
/// On disk a directory is `{"files":{<name>:<node>,...}}` and a file is
/// `{"offset":"<decimal>","size":<int>}`. Offsets are relative to the start of
/// the data section. Child order is preserved in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexNode {
    Directory(IndexMap<String, IndexNode>),
    File { offset: u64, size: u64 },
}

impl Default for IndexNode {
    fn default() -> Self {
        IndexNode::Directory(IndexMap::new())
    }
}

impl IndexNode {
    pub fn is_dir(&self) -> bool {
        matches!(self, IndexNode::Directory(_))
    }

    /// Compact JSON text. Its byte length is the header's `json_size`, so no
    /// whitespace may be inserted.
    pub fn to_json(&self) -> AsarResult<String> {
        Ok(serde_json::to_string(&self.to_value())?)
    }

    pub fn from_json(text: &str) -> AsarResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        let root = Self::from_value(&value, "")?;
        if !root.is_dir() {
            return Err(AsarError::Format("index root is a file entry".into()));
        }
        Ok(root)
    }

    fn to_value(&self) -> Value {
        let mut obj = Map::new();
        match self {
            IndexNode::Directory(children) => {
                let files: Map<String, Value> = children
                    .iter()
                    .map(|(name, child)| (name.clone(), child.to_value()))
                    .collect();
                obj.insert(FILES.into(), Value::Object(files));
            }
            IndexNode::File { offset, size } => {
                obj.insert(OFFSET.into(), Value::String(offset.to_string()));
                obj.insert(SIZE.into(), Value::from(*size));
            }
        }
        Value::Object(obj)
    }

    /// Classifies a JSON node once, rejecting shapes that are neither a clean
    /// directory nor a clean file entry. `at` is the node's path, for messages.
    fn from_value(value: &Value, at: &str) -> AsarResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| AsarError::Format(format!("node {} is not an object", shown(at))))?;

        let has_files = obj.contains_key(FILES);
        let has_offset = obj.contains_key(OFFSET);
        let has_size = obj.contains_key(SIZE);

        if has_files {
            if obj.len() != 1 {
                return Err(AsarError::Format(format!(
                    "node {} mixes \"files\" with other keys",
                    shown(at)
                )));
            }
            let children = obj[FILES].as_object().ok_or_else(|| {
                AsarError::Format(format!("\"files\" of {} is not an object", shown(at)))
            })?;
            return Self::directory_from(children, at);
        }

        if has_offset || has_size {
            if !(has_offset && has_size) || obj.len() != 2 {
                return Err(AsarError::Format(format!(
                    "node {} is neither a file entry nor a directory",
                    shown(at)
                )));
            }
            let offset = parse_offset(&obj[OFFSET], at)?;
            let size = obj[SIZE].as_u64().ok_or_else(|| {
                AsarError::Format(format!("bad size for {}: {}", shown(at), obj[SIZE]))
            })?;
            return Ok(IndexNode::File { offset, size });
        }

        // Directory written without the "files" wrapper.
        Self::directory_from(obj, at)
    }

    fn directory_from(children: &Map<String, Value>, at: &str) -> AsarResult<Self> {
        let mut out = IndexMap::with_capacity(children.len());
        for (name, child) in children {
            check_name(name)?;
            let child_at = join(at, name);
            out.insert(name.clone(), Self::from_value(child, &child_at)?);
        }
        Ok(IndexNode::Directory(out))
    }

    /// Every file entry as `(relative_path, offset, size)`, in index order.
    pub fn files(&self) -> Vec<(String, u64, u64)> {
        let mut out = Vec::new();
        self.collect_files("", &mut out);
        out
    }

    fn collect_files(&self, at: &str, out: &mut Vec<(String, u64, u64)>) {
        match self {
            IndexNode::Directory(children) => {
                for (name, child) in children {
                    child.collect_files(&join(at, name), out);
                }
            }
            IndexNode::File { offset, size } => out.push((at.to_string(), *offset, *size)),
        }
    }
}

fn parse_offset(v: &Value, at: &str) -> AsarResult<u64> {
    let parsed = match v {
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse::<u64>().ok()
        }
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    parsed.ok_or_else(|| AsarError::Format(format!("bad offset for {}: {v}", shown(at))))
}

pub(crate) fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn shown(at: &str) -> &str {
    if at.is_empty() {
        "<root>"
    } else {
        at
    }
}
