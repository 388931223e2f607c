use anyhow::{Context, Result, anyhow};
use bufrtables::prelude::{
    CompiledTableB, CompiledTableD, CsvTableLoader, ElementCsvLoader, SequenceCsvLoader,
};
use clap::{Parser, Subcommand};
use libtreebufr::{Decoder, DecoderConfig, StreamEvent, parser};
use rustc_hash::FxHashSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "treebufr")]
#[command(about = "BUFR decoder", long_about = None)]
struct Cli {
    /// Decoder configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Table directory, overrides the configuration
    #[arg(short, long, global = true)]
    tables: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a BUFR file and print every observation
    Dump {
        input: PathBuf,

        /// Print only the section summary of each message
        #[arg(long)]
        headers: bool,
    },
    /// Print the expanded descriptor tree of each distinct schema
    Tree { input: PathBuf },
    /// Convert a CSV table to a compiled .bufrtbl file
    Compile {
        /// Table type: "b" or "d"
        #[arg(short, long)]
        kind: String,

        input: PathBuf,

        /// Output path (extension replaced by .bufrtbl)
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Dump { input, headers } => {
            let mut decoder = open_decoder(cli.config, cli.tables)?;
            dump(&mut decoder, input, headers)
        }
        Commands::Tree { input } => {
            let decoder = open_decoder(cli.config, cli.tables)?;
            tree(&decoder, input)
        }
        Commands::Compile {
            kind,
            input,
            output,
        } => compile(&kind, input, output),
    }
}

fn open_decoder(config: Option<PathBuf>, tables: Option<PathBuf>) -> Result<Decoder> {
    let mut config = match config {
        Some(path) => DecoderConfig::load_from_file(path)?,
        None => DecoderConfig::default(),
    };
    if tables.is_some() {
        config.tables_path = tables;
    }
    Decoder::from_config(config).context("Failed to open tables")
}

fn dump(decoder: &mut Decoder, input: PathBuf, headers: bool) -> Result<()> {
    let source = parser::open(&input)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    for event in decoder.decode_bytes(source.bytes()) {
        match event {
            StreamEvent::Decoded(decoded) => {
                println!("{}", decoded.message);
                if decoded.incomplete {
                    println!("(incomplete schema: values may be wrong)");
                }
                for warning in &decoded.warnings {
                    println!("warning: {}", warning);
                }
                if headers {
                    continue;
                }
                for observation in &decoded.observations {
                    print!("{}", observation);
                }
                println!();
            }
            StreamEvent::TablesLoaded {
                offset,
                elements,
                sequences,
            } => println!(
                "Table message at offset {}: {} elements, {} sequences",
                offset, elements, sequences
            ),
            StreamEvent::Skipped(skipped) => {
                eprintln!("Skipped data at offset {}: {}", skipped.offset, skipped.error)
            }
            StreamEvent::Rejected { offset, error } => {
                eprintln!("Rejected message at offset {}: {}", offset, error)
            }
        }
    }
    Ok(())
}

fn tree(decoder: &Decoder, input: PathBuf) -> Result<()> {
    let source = parser::open(&input)
        .with_context(|| format!("Failed to open {}", input.display()))?;

    let mut seen = FxHashSet::default();
    for scanned in source.scan() {
        let parser::Scanned::Message(message) = scanned else {
            continue;
        };
        if !seen.insert((message.descriptors().to_vec(), message.table_key())) {
            continue;
        }
        match decoder.tree_for(&message) {
            Ok(tree) => println!("Message at offset {}:\n{}", message.offset(), tree),
            Err(e) => eprintln!("Message at offset {}: {}", message.offset(), e),
        }
    }
    Ok(())
}

fn compile(kind: &str, input: PathBuf, output: PathBuf) -> Result<()> {
    match kind.to_lowercase().as_str() {
        "b" => {
            let entries = CsvTableLoader::<ElementCsvLoader>::default().load_path(&input)?;
            let table = CompiledTableB::build(entries, &output)?;
            println!("Wrote {} Table B entries to {}", table.len(), table.path().display());
        }
        "d" => {
            let entries = CsvTableLoader::<SequenceCsvLoader>::default().load_path(&input)?;
            let table = CompiledTableD::build(entries, &output)?;
            println!("Wrote {} Table D entries to {}", table.len(), table.path().display());
        }
        other => return Err(anyhow!("Unknown table type {:?}, expected \"b\" or \"d\"", other)),
    }
    Ok(())
}
