#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

use crate::asar::error::{AsarError, AsarResult};
use crate::asar::format::{Header, HEADER_SIZE, MAGIC};
use crate::asar::index::{join, IndexNode};
use crate::asar::io::{copy_exact, read_up_to};

/// Reads and decodes the header at the current position. A file shorter than
/// the header is a format error; a wrong magic is rejected.
pub(crate) fn read_header(r: &mut dyn Read) -> AsarResult<Header> {
    let mut buf = [0u8; HEADER_SIZE];
    let n = read_up_to(r, &mut buf)?;
    let header = Header::from_bytes(&buf[..n])?;
    if header.magic != MAGIC {
        return Err(AsarError::BadMagic(header.magic));
    }
    Ok(header)
}

/// Reads header and JSON index. Nothing outside the archive is touched.
pub(crate) fn read_index(file: &mut File) -> AsarResult<(Header, IndexNode)> {
    file.seek(SeekFrom::Start(0))?;
    let header = read_header(file)?;
    debug!(
        json_size = header.json_size,
        unk1 = header.unk1,
        unk2 = header.unk2,
        "read archive header"
    );

    let file_len = file.metadata()?.len();
    let json_end = HEADER_SIZE as u64 + u64::from(header.json_size);
    if json_end > file_len {
        return Err(AsarError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("index ends at {json_end}, archive is {file_len} bytes"),
        )));
    }

    let mut buf = vec![0u8; header.json_size as usize];
    file.read_exact(&mut buf)?;

    // The index text ends at the first NUL, if any.
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    let text = std::str::from_utf8(&buf[..end])
        .map_err(|e| AsarError::Format(format!("index is not utf8: {e}")))?;

    let root = IndexNode::from_json(text)?;
    Ok((header, root))
}

/// Materialises `root` under `dest`. File bytes are read from
/// `data_offset + entry.offset`. Returns the number of files written.
pub(crate) fn extract(
    file: &mut File,
    data_offset: u64,
    root: &IndexNode,
    dest: &Path,
) -> AsarResult<usize> {
    let mut count = 0;
    extract_node(file, data_offset, root, dest, "", &mut count)?;
    Ok(count)
}

fn extract_node(
    file: &mut File,
    data_offset: u64,
    node: &IndexNode,
    out_path: &Path,
    rel: &str,
    count: &mut usize,
) -> AsarResult<()> {
    match node {
        IndexNode::Directory(children) => {
            std::fs::create_dir_all(out_path)?;
            for (name, child) in children {
                extract_node(
                    file,
                    data_offset,
                    child,
                    &out_path.join(name),
                    &join(rel, name),
                    count,
                )?;
            }
        }
        IndexNode::File { offset, size } => {
            let start = data_offset
                .checked_add(*offset)
                .ok_or_else(|| AsarError::Format(format!("offset overflow for {rel}")))?;
            file.seek(SeekFrom::Start(start))?;

            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = BufWriter::new(File::create(out_path)?);
            copy_exact(file, &mut out, *size, rel)?;
            out.flush()?;

            debug!(path = %rel, offset, size, "extracted file");
            *count += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asar::build::{plan, write_archive};
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn raw_archive(json: &str, data: &[u8]) -> Vec<u8> {
        let header = Header::for_json_len(json.len()).unwrap();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(json.as_bytes());
        bytes.resize(header.data_offset() as usize, 0);
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn header_magic_is_checked() {
        let mut bytes = Header::for_json_len(12).unwrap().to_bytes();
        bytes[0] = 5;
        let err = read_header(&mut Cursor::new(bytes.to_vec())).unwrap_err();
        assert!(matches!(err, AsarError::BadMagic(5)));
    }

    #[test]
    fn short_file_is_format_error() {
        let err = read_header(&mut Cursor::new(vec![4u8, 0, 0])).unwrap_err();
        assert!(matches!(err, AsarError::Format(_)));
    }

    #[test]
    fn index_text_stops_at_nul() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nul.asar");
        // json_size covers trailing NULs after the real document.
        let json = "{\"files\":{}}\0\0\0\0";
        fs::write(&path, raw_archive(json, b"")).unwrap();

        let mut f = File::open(&path).unwrap();
        let (header, root) = read_index(&mut f).unwrap();
        assert_eq!(header.json_size as usize, json.len());
        assert_eq!(root, IndexNode::default());
    }

    #[test]
    fn non_utf8_index_is_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin1.asar");
        let mut json = br#"{"files":{"caf"#.to_vec();
        json.push(0xE9);
        json.extend_from_slice(br#"":{"offset":"0","size":0}}}"#);
        let header = Header::for_json_len(json.len()).unwrap();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&json);
        bytes.resize(header.data_offset() as usize, 0);
        fs::write(&path, bytes).unwrap();

        let err = read_index(&mut File::open(&path).unwrap()).unwrap_err();
        assert!(matches!(err, AsarError::Format(_)), "{err}");
    }

    #[test]
    fn raw_archive_places_data_at_header_offset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.asar");
        let json = r#"{"files":{"x":{"offset":"0","size":3}}}"#;
        fs::write(&path, raw_archive(json, b"xyz")).unwrap();

        let mut f = File::open(&path).unwrap();
        let (header, root) = read_index(&mut f).unwrap();
        let out = dir.path().join("out");
        extract(&mut f, header.data_offset(), &root, &out).unwrap();
        assert_eq!(fs::read(out.join("x")).unwrap(), b"xyz");
    }

    #[test]
    fn data_offset_comes_from_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shifted.asar");
        let json = r#"{"files":{"x":{"offset":"0","size":3}}}"#;
        let mut header = Header::for_json_len(json.len()).unwrap();
        // Producer chose a larger gap than the minimum padding.
        header.unk2 += 8;
        header.unk1 += 8;
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(json.as_bytes());
        bytes.resize(header.data_offset() as usize, 0);
        bytes.extend_from_slice(b"abc");
        fs::write(&path, bytes).unwrap();

        let mut f = File::open(&path).unwrap();
        let (header, root) = read_index(&mut f).unwrap();
        let out = dir.path().join("out");
        extract(&mut f, header.data_offset(), &root, &out).unwrap();
        assert_eq!(fs::read(out.join("x")).unwrap(), b"abc");
    }

    #[test]
    fn truncated_data_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.asar");
        let json = r#"{"files":{"x":{"offset":"0","size":10}}}"#;
        fs::write(&path, raw_archive(json, b"abc")).unwrap();

        let mut f = File::open(&path).unwrap();
        let (header, root) = read_index(&mut f).unwrap();
        let err = extract(&mut f, header.data_offset(), &root, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, AsarError::Io(_)));
    }

    #[test]
    fn truncated_index_is_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cut.asar");
        let mut bytes = raw_archive(r#"{"files":{}}"#, b"");
        bytes.truncate(20);
        fs::write(&path, bytes).unwrap();

        let err = read_index(&mut File::open(&path).unwrap()).unwrap_err();
        assert!(matches!(err, AsarError::Io(_)));
    }

    #[test]
    fn extracts_written_archive() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/file.txt"), b"hello").unwrap();
        fs::write(src.join("z.txt"), b"").unwrap();
        let archive = dir.path().join("t.asar");
        write_archive(&plan(&src, &[]).unwrap(), &archive).unwrap();

        let mut f = File::open(&archive).unwrap();
        let (header, root) = read_index(&mut f).unwrap();
        let out = dir.path().join("out");
        let n = extract(&mut f, header.data_offset(), &root, &out).unwrap();
        assert_eq!(n, 2);
        assert_eq!(fs::read(out.join("a/b/file.txt")).unwrap(), b"hello");
        assert_eq!(fs::read(out.join("z.txt")).unwrap(), b"");
    }
}
