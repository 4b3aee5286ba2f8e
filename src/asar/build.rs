#![forbid(unsafe_code)]

use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::asar::error::{AsarError, AsarResult};
use crate::asar::format::Header;
use crate::asar::index::IndexNode;
use crate::asar::io::copy_exact;
use crate::asar::path::{entry_name, normalize_rel_path, should_exclude};

/// A source file scheduled for the data section.
#[derive(Debug, Clone)]
pub struct PackedFile {
    pub rel_path: String,
    pub source: PathBuf,
    pub offset: u64,
    pub size: u64,
}

/// Result of the single source walk: the index plus the files in the exact
/// order their bytes go into the data section.
#[derive(Debug, Clone, Default)]
pub struct PackPlan {
    pub index: IndexNode,
    pub files: Vec<PackedFile>,
    pub data_size: u64,
}

/// Walks `input` once, depth-first, siblings sorted by file name.
///
/// Directories (empty ones included) become index directories; regular files
/// get consecutive offsets starting at 0. Paths containing any of `excludes`
/// are skipped, directories with their whole subtree. Symlinks are followed
/// and stored as their target's contents; other special files are skipped.
pub fn plan(input: &Path, excludes: &[String]) -> AsarResult<PackPlan> {
    let meta = std::fs::metadata(input)?;
    if !meta.is_dir() {
        return Err(AsarError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a directory: {}", input.display()),
        )));
    }

    let mut root: IndexMap<String, IndexNode> = IndexMap::new();
    let mut files: Vec<PackedFile> = Vec::new();
    let mut cursor: u64 = 0;

    let walker = WalkDir::new(input)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| match normalize_rel_path(input, e.path()) {
            Ok(rel) => !should_exclude(&rel, excludes),
            // The root itself has no relative path.
            Err(_) => true,
        });

    for ent in walker {
        let ent = ent.map_err(walk_error)?;
        let rel = normalize_rel_path(input, ent.path())?;
        let name = entry_name(ent.path())?;
        let ft = ent.file_type();

        let node = if ft.is_dir() {
            IndexNode::default()
        } else if ft.is_file() {
            let size = ent.metadata().map_err(walk_error)?.len();
            let offset = cursor;
            cursor = cursor
                .checked_add(size)
                .ok_or_else(|| AsarError::Format("data section overflows u64".into()))?;
            files.push(PackedFile {
                rel_path: rel.clone(),
                source: ent.path().to_path_buf(),
                offset,
                size,
            });
            IndexNode::File { offset, size }
        } else {
            warn!(path = %rel, "skipping special file");
            continue;
        };

        let parent = parent_dir(&mut root, &rel)?;
        parent.insert(name, node);
    }

    Ok(PackPlan {
        index: IndexNode::Directory(root),
        files,
        data_size: cursor,
    })
}

/// Children map of the directory that holds `rel`. Parents are always
/// visited before their contents, so every ancestor already exists.
fn parent_dir<'a>(
    root: &'a mut IndexMap<String, IndexNode>,
    rel: &str,
) -> AsarResult<&'a mut IndexMap<String, IndexNode>> {
    let mut parts: Vec<&str> = rel.split('/').collect();
    parts.pop();

    let mut dir = root;
    for part in parts {
        dir = match dir.get_mut(part) {
            Some(IndexNode::Directory(children)) => children,
            _ => return Err(AsarError::Format(format!("missing parent directory for {rel}"))),
        };
    }
    Ok(dir)
}

fn walk_error(e: walkdir::Error) -> AsarError {
    let msg = e.to_string();
    let io = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, msg));
    AsarError::Io(io)
}

/// Writes header, index, padding, the 4-byte gap counted by `unk2`, and then
/// every planned file in plan order.
///
/// Returns the header that was written. A failure leaves the partial output on
/// disk.
pub fn write_archive(plan: &PackPlan, output: &Path) -> AsarResult<Header> {
    let json = plan.index.to_json()?;
    let header = Header::for_json_len(json.len())?;
    debug!(
        json_size = header.json_size,
        unk1 = header.unk1,
        unk2 = header.unk2,
        data_size = plan.data_size,
        "writing archive header"
    );

    let mut out = BufWriter::new(File::create(output)?);
    out.write_all(&header.to_bytes())?;
    out.write_all(json.as_bytes())?;
    let padding = [0u8; 4];
    out.write_all(&padding[..header.padding() as usize])?;
    out.write_all(&0u32.to_le_bytes())?;

    let pos = out.stream_position()?;
    if pos != header.data_offset() {
        return Err(AsarError::Format(format!(
            "data section at {pos}, header says {}",
            header.data_offset()
        )));
    }

    for f in &plan.files {
        let mut src = File::open(&f.source)?;
        copy_exact(&mut src, &mut out, f.size, &f.rel_path)?;
        debug!(path = %f.rel_path, offset = f.offset, size = f.size, "packed file");
    }

    out.flush()?;
    Ok(header)
}
