//! Arnika CLI binary.
//!
//! Administrative tooling around the keyword index artifact: build one
//! from a JSONL corpus export, run keyword-only queries against it, and
//! inspect its statistics.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use arnika::corpus::{CorpusItem, FilterSpec};
use arnika::error::Result;
use arnika::keyword::{KeywordIndex, persist};

#[derive(Parser)]
#[command(name = "arnika", version, about = "Keyword index tooling for the Arnika retrieval pipeline")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a keyword index artifact from a JSONL corpus file.
    Build {
        /// Corpus file, one CorpusItem JSON object per line.
        #[arg(long)]
        corpus: PathBuf,
        /// Output path for the index artifact.
        #[arg(long)]
        out: PathBuf,
        /// BM25 term frequency saturation parameter.
        #[arg(long, default_value_t = 1.5)]
        k1: f32,
        /// BM25 length normalization parameter.
        #[arg(long, default_value_t = 0.75)]
        b: f32,
    },
    /// Run a keyword-only query against an index artifact.
    Search {
        /// Path to the index artifact.
        #[arg(long)]
        index: PathBuf,
        /// The query text.
        query: String,
        /// Number of results to return.
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Restrict to these categories (repeatable).
        #[arg(long)]
        category: Vec<String>,
        /// Restrict to this language.
        #[arg(long)]
        language: Option<String>,
        /// Restrict to this source type.
        #[arg(long)]
        source_type: Option<String>,
    },
    /// Print statistics of an index artifact.
    Stats {
        /// Path to the index artifact.
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Build { corpus, out, k1, b } => {
            let items = read_corpus(&corpus)?;
            println!("Read {} chunks from {}", items.len(), corpus.display());

            let index = KeywordIndex::build(items, k1, b)?;
            persist::save(&index, &out)?;

            let stats = index.stats();
            println!(
                "Built index: {} docs, {} unique terms, avg length {:.1} tokens",
                stats.doc_count, stats.unique_terms, stats.avg_doc_len
            );
            println!("Saved to {}", out.display());
        }
        Command::Search {
            index,
            query,
            top_k,
            category,
            language,
            source_type,
        } => {
            let index = persist::load(&index)?;
            let filter = FilterSpec {
                category: (!category.is_empty()).then_some(category),
                language,
                source_type,
            };
            let filter = (!filter.is_empty()).then_some(filter);

            let results = index.search(&query, top_k, filter.as_ref())?;
            if results.is_empty() {
                println!("No results.");
            }
            for (rank, result) in results.iter().enumerate() {
                println!(
                    "{:>2}. [{:.4}] {} ({}) {}",
                    rank + 1,
                    result.bm25_score,
                    result.chunk_id,
                    result.metadata.category,
                    truncate(&result.text, 80),
                );
            }
        }
        Command::Stats { index } => {
            let index = persist::load(&index)?;
            let stats = index.stats();
            println!("Documents:    {}", stats.doc_count);
            println!("Unique terms: {}", stats.unique_terms);
            println!("Avg length:   {:.1} tokens", stats.avg_doc_len);
            println!("k1:           {}", stats.k1);
            println!("b:            {}", stats.b);
        }
    }
    Ok(())
}

fn read_corpus(path: &PathBuf) -> Result<Vec<CorpusItem>> {
    let reader = BufReader::new(File::open(path)?);
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        items.push(serde_json::from_str(&line)?);
    }
    Ok(items)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}
