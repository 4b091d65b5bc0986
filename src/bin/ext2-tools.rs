// SPDX-License-Identifier: MPL-2.0

//! The command-line shell over one ext2 image.

use std::{io::Write, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use ext2_tools::{Ext2, Ext2Error, FormatOptions, Result};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and edit single-group ext2 images", long_about = None)]
struct Cli {
    /// The disk image file.
    image: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a fresh image, overwriting the file.
    Mkfs {
        /// Number of 1024-byte blocks.
        #[arg(long, default_value_t = FormatOptions::default().blocks_count)]
        blocks: u32,
        /// Number of inodes.
        #[arg(long, default_value_t = FormatOptions::default().inodes_count)]
        inodes: u32,
    },
    /// Creates a directory.
    Mkdir { path: String },
    /// Copies a host file into the image.
    Cp { source: PathBuf, path: String },
    /// Creates a hard link, or a symbolic link with `-s`.
    Ln {
        #[arg(short = 's', long = "symbolic")]
        symbolic: bool,
        source: String,
        path: String,
    },
    /// Removes a file or a link.
    Rm { path: String },
    /// Brings back a removed file.
    Restore { path: String },
    /// Detects and repairs inconsistencies.
    Check,
    /// Prints the metadata of the image.
    Dump,
    /// Prints the content of a file, or the target of a symbolic link.
    Cat { path: String },
    /// Lists a directory.
    Ls { path: String },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ext2-tools: {}", err);
            ExitCode::from(err.errno().clamp(1, u8::MAX as i32) as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut ext2 = match cli.command {
        Command::Mkfs { blocks, inodes } => Ext2::format(FormatOptions {
            blocks_count: blocks,
            inodes_count: inodes,
        })?,
        _ => Ext2::open(&cli.image)?,
    };
    match cli.command {
        Command::Mkfs { .. } => return ext2.sync_to(&cli.image),
        Command::Mkdir { path } => {
            ext2.mkdir(&path)?;
        }
        Command::Cp { source, path } => {
            let data = std::fs::read(&source)?;
            let source_name = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .ok_or_else(|| Ext2Error::InvalidPath(source.display().to_string()))?;
            ext2.copy_in(&path, &source_name, &data)?;
        }
        Command::Ln {
            symbolic: true,
            source,
            path,
        } => {
            ext2.symlink(&source, &path)?;
        }
        Command::Ln { source, path, .. } => ext2.hard_link(&source, &path)?,
        Command::Rm { path } => ext2.unlink(&path)?,
        Command::Restore { path } => {
            ext2.restore(&path)?;
        }
        Command::Check => {
            // Repairs are always reported as a success.
            match ext2.check() {
                Ok(report) => println!("{}", report),
                Err(err) => eprintln!("ext2-tools: check stopped early: {}", err),
            }
        }
        Command::Dump => {
            print!("{}", ext2.dump()?);
            return Ok(());
        }
        Command::Cat { path } => {
            let inode = ext2.read_inode(ext2.lookup(&path)?)?;
            let content = match inode.file_type()? {
                ext2_tools::FileType::Symlink => ext2.read_link(&path)?.into_bytes(),
                _ => ext2.read_file(&path)?,
            };
            std::io::stdout().write_all(&content)?;
            return Ok(());
        }
        Command::Ls { path } => {
            for entry in ext2.read_dir(&path)? {
                println!("{} {:>5} {}", entry.type_().as_char(), entry.ino(), entry.name());
            }
            return Ok(());
        }
    }
    ext2.sync()
}
