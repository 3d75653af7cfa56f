#![forbid(unsafe_code)]
//! Interactive shell for browsing a read-only ext4 disk image.
//!
//! Mounts the image given on the command line, then reads commands from
//! stdin until `q` or end of input:
//!
//! ```text
//! l           print the volume label
//! d <path>    list the directory at <path>
//! f <path>    print the file at <path>
//! q           quit
//! ```
//!
//! With `--json`, `l` prints a structured summary of the mounted image
//! instead of the bare label. A failed command reports its error and
//! leaves the session running.

use anyhow::{Context, Result, bail};
use e4nav::{Ext4Image, format_entry};
use std::env;
use std::io::{self, BufRead, Write};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args(env::args().skip(1)).map_err(|error| {
        print_usage();
        error
    })?;

    let image = Ext4Image::open(&args.image_path)
        .with_context(|| format!("failed to mount {}", args.image_path))?;

    repl(&image, args.json, io::stdin().lock(), io::stdout().lock())
}

struct CliArgs {
    image_path: String,
    json: bool,
}

/// Accepts exactly one image path, plus the optional `--json` flag.
fn parse_args(args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut image_path = None;
    let mut json = false;
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            _ if image_path.is_none() => image_path = Some(arg),
            _ => bail!("expected exactly one image path"),
        }
    }
    match image_path {
        Some(image_path) => Ok(CliArgs { image_path, json }),
        None => bail!("expected exactly one image path"),
    }
}

fn print_usage() {
    println!("e4nav\n");
    println!("USAGE:");
    println!("  e4nav <image-path> [--json]");
    println!();
    println!("COMMANDS (read from stdin):");
    println!("  l           print the volume label");
    println!("  d <path>    list the directory at <path>");
    println!("  f <path>    print the file at <path>");
    println!("  q           quit");
}

fn repl(image: &Ext4Image, json: bool, input: impl BufRead, mut out: impl Write) -> Result<()> {
    for line in input.lines() {
        let line = line.context("read command")?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };

        let outcome = match (command, words.next()) {
            ("q", _) => break,
            ("l", _) => print_label(image, json, &mut out),
            ("d", Some(path)) => list_dir(image, path, &mut out),
            ("d", None) => {
                eprintln!("d requires a path");
                continue;
            }
            ("f", Some(path)) => print_file(image, path, &mut out),
            ("f", None) => {
                eprintln!("f requires a path");
                continue;
            }
            _ => {
                eprintln!("unknown command: {command} (try l, d, f, q)");
                continue;
            }
        };

        // A failing operation is reported but does not end the session.
        if let Err(error) = outcome {
            eprintln!("error: {error:#}");
        }
    }
    Ok(())
}

fn print_label(image: &Ext4Image, json: bool, out: &mut impl Write) -> Result<()> {
    if json {
        let summary = serde_json::to_string_pretty(&image.summary())
            .context("serialize summary")?;
        writeln!(out, "{summary}")?;
    } else {
        writeln!(out, "volume: {}", image.label())?;
    }
    Ok(())
}

fn list_dir(image: &Ext4Image, path: &str, out: &mut impl Write) -> Result<()> {
    let (_, inode) = image.resolve_path(path)?;
    for entry in image.list_dir(&inode)? {
        writeln!(out, "{}", format_entry(&entry))?;
    }
    Ok(())
}

fn print_file(image: &Ext4Image, path: &str, out: &mut impl Write) -> Result<()> {
    let (_, inode) = image.resolve_path(path)?;
    let text = image.file_text(&inode)?;
    out.write_all(&text)?;
    out.flush()?;
    Ok(())
}
