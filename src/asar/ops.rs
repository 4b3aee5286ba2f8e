#![forbid(unsafe_code)]

use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::asar::build::{plan, write_archive};
use crate::asar::error::{AsarError, AsarResult};
use crate::asar::format::EntryInfo;
use crate::asar::read::{extract, read_index};

/// Packs the directory tree under `input` into the archive `output`.
pub fn pack(input: &Path, output: &Path, excludes: &[String]) -> AsarResult<()> {
    let plan = plan(input, excludes)?;
    let header = write_archive(&plan, output)?;
    info!(
        input = %input.display(),
        output = %output.display(),
        files = plan.files.len(),
        json_size = header.json_size,
        data_size = plan.data_size,
        "packed archive"
    );
    Ok(())
}

/// Extracts `archive` into `output`. The header and index are fully validated
/// before `output` is created.
pub fn unpack(archive: &Path, output: &Path) -> AsarResult<()> {
    let mut f = File::open(archive)?;
    let (header, root) = read_index(&mut f)?;
    let files = extract(&mut f, header.data_offset(), &root, output)?;
    info!(
        archive = %archive.display(),
        output = %output.display(),
        files,
        "unpacked archive"
    );
    Ok(())
}

/// Recursively deletes `path`. A missing path is not an error.
pub fn remove(path: &Path) -> AsarResult<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    info!(path = %path.display(), "removed");
    Ok(())
}

/// Read archive entries (without extracting data).
pub fn entries(archive: &Path) -> AsarResult<Vec<EntryInfo>> {
    let mut f = File::open(archive)?;
    let (_, root) = read_index(&mut f)?;
    Ok(root
        .files()
        .into_iter()
        .map(|(path, offset, size)| EntryInfo { path, offset, size })
        .collect())
}

pub fn list(archive: &Path, verbose: bool) -> AsarResult<()> {
    for e in entries(archive)? {
        if verbose {
            println!("{}  off={} size={}", e.path, e.offset, e.size);
        } else {
            println!("{}", e.path);
        }
    }
    Ok(())
}

/// Checks header arithmetic and that every entry lies inside the data section
/// without overlapping another. Returns the number of file entries.
pub fn verify(archive: &Path) -> AsarResult<usize> {
    let mut f = File::open(archive)?;
    let (header, root) = read_index(&mut f)?;
    header.check_consistency()?;

    let file_len = f.metadata()?.len();
    let data_len = file_len.checked_sub(header.data_offset()).ok_or_else(|| {
        AsarError::Format(format!(
            "data section starts at {}, archive is {file_len} bytes",
            header.data_offset()
        ))
    })?;

    let files = root.files();
    let mut ranges: Vec<(u64, u64, &str)> = Vec::with_capacity(files.len());
    for (path, offset, size) in &files {
        let end = offset
            .checked_add(*size)
            .filter(|end| *end <= data_len)
            .ok_or_else(|| AsarError::Format(format!("data outside archive: {path}")))?;
        if *size > 0 {
            ranges.push((*offset, end, path.as_str()));
        }
    }

    ranges.sort_unstable_by_key(|r| r.0);
    for w in ranges.windows(2) {
        if w[1].0 < w[0].1 {
            return Err(AsarError::Format(format!(
                "overlapping entries: {} and {}",
                w[0].2, w[1].2
            )));
        }
    }

    info!(archive = %archive.display(), entries = files.len(), "verified");
    Ok(files.len())
}
