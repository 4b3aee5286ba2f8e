#![forbid(unsafe_code)]

use std::path::{Component, Path};

use crate::asar::error::{AsarError, AsarResult};

/// Forward-slash path of `file_path` relative to `input_root`.
pub fn normalize_rel_path(input_root: &Path, file_path: &Path) -> AsarResult<String> {
    let rel = file_path
        .strip_prefix(input_root)
        .map_err(|_| AsarError::Outside(file_path.display().to_string()))?;

    let mut parts = Vec::new();
    for comp in rel.components() {
        match comp {
            Component::Normal(name) => parts.push(utf8_name(name, file_path)?),
            Component::CurDir => {}
            _ => return Err(AsarError::Outside(file_path.display().to_string())),
        }
    }

    if parts.is_empty() {
        return Err(AsarError::Format("empty relative path".into()));
    }
    Ok(parts.join("/"))
}

/// File name of `path` as UTF-8; index keys cannot carry anything else.
pub fn entry_name(path: &Path) -> AsarResult<String> {
    let name = path
        .file_name()
        .ok_or_else(|| AsarError::Format(format!("no file name: {}", path.display())))?;
    let name = utf8_name(name, path)?;
    check_name(&name)?;
    Ok(name)
}

fn utf8_name(name: &std::ffi::OsStr, full: &Path) -> AsarResult<String> {
    name.to_str()
        .map(str::to_owned)
        .ok_or_else(|| AsarError::Format(format!("name is not utf8: {}", full.display())))
}

/// Index keys must be a single, plain path component. `\` is only a
/// separator on Windows, so elsewhere it is an ordinary name character.
pub fn check_name(name: &str) -> AsarResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\0'])
        || (cfg!(windows) && name.contains('\\'));
    if bad {
        return Err(AsarError::Format(format!("unsafe entry name: {name:?}")));
    }
    Ok(())
}

pub fn should_exclude(norm_path: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|e| !e.is_empty() && norm_path.contains(e.as_str()))
}
