#![forbid(unsafe_code)]

mod asar;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "asarpak", version, about = "Pack and unpack ASAR archives")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pack a directory into an archive.
    Pack {
        /// Input directory.
        input: PathBuf,
        /// Output archive file.
        output: PathBuf,
        /// Skip paths containing this substring (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Extract an archive into a directory.
    Unpack {
        archive: PathBuf,
        output: PathBuf,
    },

    /// Recursively delete a file or directory.
    Remove { path: PathBuf },

    /// List file entries in an archive.
    List {
        archive: PathBuf,
        /// Print offsets and sizes too.
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },

    /// Check header fields and entry bounds.
    Verify { archive: PathBuf },
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("asarpak=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let res = match cli.cmd {
        Command::Pack {
            input,
            output,
            exclude,
        } => asar::pack(&input, &output, &exclude),
        Command::Unpack { archive, output } => asar::unpack(&archive, &output),
        Command::Remove { path } => asar::remove(&path),
        Command::List { archive, verbose } => asar::list(&archive, verbose),
        Command::Verify { archive } => asar::verify(&archive).map(|n| {
            println!("ok: {n} entries");
        }),
    };

    if let Err(e) = res {
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(e: &asar::AsarError) -> i32 {
    if e.is_format() {
        2
    } else {
        1
    }
}
