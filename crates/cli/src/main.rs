use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

/// Decompile obfuscated bytecode files into source text.
#[derive(Debug, Parser)]
#[command(name = "wick", about = "Decompiler for an obfuscated Lua-family bytecode format")]
struct Cli {
    /// Bytecode files to decompile.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Write the source here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if cli.output.is_some() && cli.files.len() > 1 {
        bail!("--output expects a single input file");
    }

    for file in &cli.files {
        let data = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        let source =
            wick::decompile(&data).with_context(|| format!("decompiling {}", file.display()))?;

        match &cli.output {
            Some(path) => fs::write(path, source)
                .with_context(|| format!("writing {}", path.display()))?,
            None => io::stdout().write_all(source.as_bytes())?,
        }
    }

    Ok(())
}
