use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use sarc_core::{Archive, ArchiveOptions, IndexEntry, IndexLayout};

#[derive(Parser)]
#[command(name = "sarc", about = "sarc: named payloads packed into one file")]
struct Cli {
    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(ValueEnum, Clone, Copy)]
enum CliLayout {
    Sized,
    Positioned,
}

impl From<CliLayout> for IndexLayout {
    fn from(l: CliLayout) -> Self {
        match l {
            CliLayout::Sized => IndexLayout::Sized,
            CliLayout::Positioned => IndexLayout::Positioned,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Append files (keyed by base name), creating the archive if needed
    Add {
        #[arg(long)]
        archive: PathBuf,
        /// Index record layout; must match what the archive was written with
        #[arg(long, value_enum, default_value_t = CliLayout::Positioned)]
        layout: CliLayout,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    List {
        #[arg(long)]
        archive: PathBuf,
        #[arg(long, value_enum, default_value_t = CliLayout::Positioned)]
        layout: CliLayout,
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write the first entry with this name to --out or stdout
    Get {
        #[arg(long)]
        archive: PathBuf,
        #[arg(long, value_enum, default_value_t = CliLayout::Positioned)]
        layout: CliLayout,
        #[arg(long)]
        name: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Write every entry under --dir; later duplicates win
    Extract {
        #[arg(long)]
        archive: PathBuf,
        #[arg(long, value_enum, default_value_t = CliLayout::Positioned)]
        layout: CliLayout,
        #[arg(long)]
        dir: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

fn open_existing(path: &Path, layout: CliLayout) -> Result<Archive> {
    if !path.exists() {
        bail!("archive not found: {}", path.display());
    }
    let opts = ArchiveOptions::default().with_layout(layout.into());
    let ar = Archive::open_with(path, opts).with_context(|| format!("opening {}", path.display()))?;
    tracing::debug!(archive = %ar.path().display(), layout = ?ar.layout(), entries = ar.len(), "archive opened");
    Ok(ar)
}

/// Entry names become relative paths under the extract dir.
fn entry_target(dir: &Path, name: &str) -> Result<PathBuf> {
    let rel = Path::new(name);
    if name.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        bail!("refusing to extract entry with unsafe name {name:?}");
    }
    Ok(dir.join(rel))
}

fn copy_entry(ar: &Archive, e: &IndexEntry, out: &mut impl Write) -> Result<u64> {
    let mut r = ar.read_file(e)?;
    Ok(io::copy(&mut r, out)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.cmd {
        Cmd::Add { archive, layout, files } => {
            let opts = ArchiveOptions::append().with_layout(layout.into());
            let mut ar = Archive::open_with(&archive, opts)
                .with_context(|| format!("opening {}", archive.display()))?;
            for f in &files {
                let e = ar.add_path(f).with_context(|| format!("adding {}", f.display()))?;
                println!("added: {e}");
            }
            let n = ar.len();
            let path = ar.finalize()?;
            tracing::info!(entries = n, archive = %path.display(), "archive written");
        }
        Cmd::List { archive, layout, json } => {
            let ar = open_existing(&archive, layout)?;
            if json {
                println!("{}", serde_json::to_string_pretty(ar.entries())?);
            } else {
                for e in ar.entries() {
                    println!("{:>12} {:>12} {}", e.pos, e.size, e.name);
                }
            }
        }
        Cmd::Get { archive, layout, name, out } => {
            let ar = open_existing(&archive, layout)?;
            let Some(e) = ar.find(&name) else {
                bail!("no entry named {name:?} in {}", archive.display());
            };
            let n = match out {
                Some(p) => {
                    let mut w = BufWriter::new(File::create(&p).with_context(|| format!("creating {}", p.display()))?);
                    let n = copy_entry(&ar, e, &mut w)?;
                    w.flush()?;
                    n
                }
                None => {
                    let stdout = io::stdout();
                    let mut lock = stdout.lock();
                    let n = copy_entry(&ar, e, &mut lock)?;
                    lock.flush()?;
                    n
                }
            };
            tracing::debug!(name = %name, bytes = n, "entry written");
        }
        Cmd::Extract { archive, layout, dir } => {
            let ar = open_existing(&archive, layout)?;
            fs::create_dir_all(&dir)?;
            for e in ar.entries() {
                let target = entry_target(&dir, &e.name)?;
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut w = BufWriter::new(File::create(&target)?);
                copy_entry(&ar, e, &mut w)?;
                w.flush()?;
            }
            println!("extracted {} entries to {}", ar.len(), dir.display());
        }
    }
    Ok(())
}
