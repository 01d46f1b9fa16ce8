use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bufr2obs::records::ReportKind;
use bufr2obs::translate::Assembler;
use bufrdec::Decoder;
use bufrdec::block::MessageBlock;
use bufrdec::sections::MessageEdition;
use bufrdec::subset::Atom;
use bufrdec::tables::TableStore;

#[derive(Parser)]
#[command(name = "bufr2obs")]
#[command(about = "Translates BUFR messages into surface observation reports", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate every subset into a SYNOP, BUOY or CLIMAT report
    Decode {
        /// Input file, plain or gzip, BUFR messages at any offset
        #[arg(short, long)]
        input: PathBuf,

        /// Directory with WMO table CSV files (else BUFRDEC_TABLES_PATH)
        #[arg(short, long)]
        tables: Option<PathBuf>,

        /// Emit reports as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print per-message section metadata, no tables needed
    Inspect {
        /// Input file, plain or gzip
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the decoded atom sequence of every subset
    Dump {
        /// Input file, plain or gzip
        #[arg(short, long)]
        input: PathBuf,

        /// Directory with WMO table CSV files (else BUFRDEC_TABLES_PATH)
        #[arg(short, long)]
        tables: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Decode {
            input,
            tables,
            json,
        } => decode(&input, tables.as_deref(), json),
        Commands::Inspect { input } => inspect(&input),
        Commands::Dump { input, tables } => dump(&input, tables.as_deref()),
    }
}

fn init_logging(verbose: u8) {
    use log::LevelFilter;

    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}

/// Table stores already loaded in this run, keyed by the versions and
/// centre a message advertises. Reused across messages through
/// `Decoder::substitute_tables`.
#[derive(Default)]
struct TableCache {
    stores: FxHashMap<(u8, u8, u16, u16), Arc<TableStore>>,
}

impl TableCache {
    fn fetch(&mut self, block: &MessageBlock) -> Result<Arc<TableStore>> {
        let info = block.table_info();
        let key = (
            info.master_table_version,
            info.local_table_version,
            info.center_id,
            info.subcenter_id,
        );
        if let Some(store) = self.stores.get(&key) {
            return Ok(store.clone());
        }
        let store = block.load_tables().with_context(|| {
            format!(
                "Loading tables for master version {}",
                info.master_table_version
            )
        })?;
        self.stores.insert(key, store.clone());
        Ok(store)
    }
}

fn decode(input: &Path, tables: Option<&Path>, json: bool) -> Result<()> {
    if let Some(dir) = tables {
        bufrdec::set_tables_base_path(dir);
    }
    let file = bufrdec::parse(input)
        .with_context(|| format!("Failed to read BUFR messages from {}", input.display()))?;
    if file.message_count() == 0 {
        anyhow::bail!("No BUFR messages found in {}", input.display());
    }

    let mut decoder = Decoder::new();
    let mut cache = TableCache::default();
    let mut reports = 0usize;

    for (index, block) in file.messages().iter().enumerate() {
        match decode_message(&mut decoder, &mut cache, block, json) {
            Ok(count) => reports += count,
            Err(err) => log::error!("Message {}: {:#}", index, err),
        }
    }

    log::info!(
        "{} report(s) from {} message(s)",
        reports,
        file.message_count()
    );
    Ok(())
}

fn decode_message(
    decoder: &mut Decoder,
    cache: &mut TableCache,
    block: &MessageBlock,
    json: bool,
) -> Result<usize> {
    let info = block.table_info();
    let Some(kind) = ReportKind::from_category(info.data_category, info.international_subcategory)
    else {
        log::warn!(
            "Data category {} has no surface report form, message skipped",
            info.data_category
        );
        return Ok(0);
    };

    decoder.substitute_tables(Some(cache.fetch(block)?));
    decoder.start_message(block)?;

    let mut assembler = Assembler::new(kind);
    let mut count = 0usize;
    while let Some(subset) = decoder.next_subset(block)? {
        assembler.reset(kind);
        assembler.assemble(subset)?;
        if json {
            println!("{}", serde_json::to_string_pretty(assembler.record())?);
        } else {
            println!("{}", assembler.record());
            println!();
        }
        count += 1;
    }
    Ok(count)
}

fn inspect(input: &Path) -> Result<()> {
    let file = bufrdec::parse(input)
        .with_context(|| format!("Failed to read BUFR messages from {}", input.display()))?;
    println!("{}: {} message(s)", input.display(), file.message_count());
    for (index, block) in file.messages().iter().enumerate() {
        println!();
        println!("Message {}:", index);
        print!("{}", block);
    }
    Ok(())
}

fn dump(input: &Path, tables: Option<&Path>) -> Result<()> {
    if let Some(dir) = tables {
        bufrdec::set_tables_base_path(dir);
    }
    let file = bufrdec::parse(input)
        .with_context(|| format!("Failed to read BUFR messages from {}", input.display()))?;

    let mut decoder = Decoder::new();
    let mut cache = TableCache::default();

    for (index, block) in file.messages().iter().enumerate() {
        println!("Message {} (edition {}):", index, block.edition());
        if let Err(err) = dump_message(&mut decoder, &mut cache, block) {
            log::error!("Message {}: {:#}", index, err);
        }
    }
    Ok(())
}

fn dump_message(decoder: &mut Decoder, cache: &mut TableCache, block: &MessageBlock) -> Result<()> {
    decoder.substitute_tables(Some(cache.fetch(block)?));
    decoder.start_message(block)?;

    while let Some(subset) = decoder.next_subset(block)? {
        let lines: Vec<String> = subset.atoms().iter().map(atom_line).collect();
        println!("  Subset {}:", decoder.subset_index());
        for line in lines {
            println!("    {}", line);
        }
    }
    Ok(())
}

fn atom_line(atom: &Atom) -> String {
    if atom.is_missing() {
        return format!("{} missing", atom.desc);
    }
    if let Some(text) = &atom.text {
        return format!("{} {:?}", atom.desc, text);
    }
    format!("{} {}", atom.desc, atom.value)
}
