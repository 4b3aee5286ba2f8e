#![forbid(unsafe_code)]

use std::io::{Read, Write};

use crate::asar::error::AsarResult;

pub fn read_u32(r: &mut dyn Read) -> AsarResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads until `buf` is full or the reader hits EOF. Returns the number of bytes read.
pub fn read_up_to(r: &mut dyn Read, buf: &mut [u8]) -> AsarResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Copies exactly `len` bytes from `r` to `w`, failing with `UnexpectedEof` on a short source.
pub fn copy_exact(r: &mut dyn Read, w: &mut dyn Write, len: u64, what: &str) -> AsarResult<()> {
    let copied = std::io::copy(&mut r.take(len), w)?;
    if copied != len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("{what}: expected {len} bytes, got {copied}"),
        )
        .into());
    }
    Ok(())
}
