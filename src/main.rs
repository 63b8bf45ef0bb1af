use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use minarc::archive::{Archive, OpenOptions};
use minarc::codec::CodecId;
use minarc::io_stream::{write_single_entry, ArchiveWriter, WriteOptions};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Name of the single entry the CLI stores and retrieves.
const ENTRY_NAME: &str = "file";

#[derive(Parser)]
#[command(name = "minarc", about = "Minimal random-access .marc container")]
#[command(group(ArgGroup::new("mode").required(true).args(["compress", "decompress", "list"])))]
struct Cli {
    /// Pack <PATH> into compressed_<PATH> as a single entry
    #[arg(short = 'c')]
    compress: bool,
    /// Unpack the entry from <PATH> into decompressed_<PATH>
    #[arg(short = 'd')]
    decompress: bool,
    /// List the entries of <PATH>
    #[arg(short = 'l')]
    list: bool,
    /// Codec used with -c: none (default) or lz4
    #[arg(long, default_value = "none", value_parser = parse_codec)]
    codec: CodecId,
    /// Load the whole archive into memory before reading
    #[arg(long)]
    cache: bool,
    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
    path: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Usage errors are not failures; print and leave.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            let _ = e.print();
            return Ok(());
        }
        Err(e) => {
            eprint!("{}", usage_message(&e));
            return Ok(());
        }
    };

    // ── Compress ─────────────────────────────────────────────────────────────
    if cli.compress {
        let codec = cli.codec;
        let data = std::fs::read(&cli.path)?;
        let output = sibling(&cli.path, "compressed_")?;
        match codec {
            CodecId::PassThrough => {
                write_single_entry(BufWriter::new(File::create(&output)?), ENTRY_NAME, &data)?;
            }
            CodecId::Lz4Block => {
                let opts = WriteOptions { codec, ..Default::default() };
                let mut w = ArchiveWriter::with_options(BufWriter::new(File::create(&output)?), opts)?;
                w.add_entry(ENTRY_NAME, &data)?;
                w.finish()?;
            }
        }
        println!("Created: {}", output.display());
        return Ok(());
    }

    let opts = OpenOptions { cache_in_memory: cli.cache, ..Default::default() };
    let mut ar = Archive::open_with(&cli.path, opts)?;

    // ── Decompress ───────────────────────────────────────────────────────────
    if cli.decompress {
        let data = ar.get(ENTRY_NAME)?;
        let output = sibling(&cli.path, "decompressed_")?;
        std::fs::write(&output, &data)?;
        println!("Wrote: {} ({} bytes)", output.display(), data.len());
        return Ok(());
    }

    // ── List ─────────────────────────────────────────────────────────────────
    let entries = ar.list();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("Archive: {} (codec {})", ar.path().display(), ar.codec().name());
        println!("{:<26} {:>12} {:>12} {:>12}", "Name", "Size", "Stored", "Offset");
        for e in entries {
            println!("{:<26} {:>12} {:>12} {:>12}",
                e.name, e.original_size, e.compressed_size, e.offset);
        }
    }
    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Render a parse failure.  Bad values get the usage line clap leaves off.
fn usage_message(e: &clap::Error) -> String {
    let mut msg = e.render().to_string();
    if matches!(e.kind(), ErrorKind::ValueValidation | ErrorKind::InvalidValue) {
        msg.push_str(&format!("\n{}\n", Cli::command().render_usage()));
    }
    msg
}

fn parse_codec(s: &str) -> Result<CodecId, String> {
    CodecId::from_name(s).ok_or_else(|| format!("unknown codec '{s}', expected none or lz4"))
}

/// `dir/<prefix><file name>` next to `path`.
fn sibling(path: &Path, prefix: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let name = path.file_name()
        .ok_or_else(|| format!("{} has no file name", path.display()))?;
    Ok(path.with_file_name(format!("{prefix}{}", name.to_string_lossy())))
}
