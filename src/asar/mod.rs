#![forbid(unsafe_code)]

mod build;
mod error;
mod format;
mod index;
mod io;
mod ops;
mod path;
mod read;

pub use error::AsarError;

pub use ops::{list, pack, remove, unpack, verify};
