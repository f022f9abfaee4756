use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prodquery_core::config::{Config, Settings};
use prodquery_embed::get_default_embedder;
use prodquery_retrieval::{RetrievalService, RetrievedDocument, ServiceStatus};

/// Index a directory of product descriptions and answer nearest-neighbor queries.
#[derive(Parser, Debug)]
#[command(name = "prodquery", version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (ignored when RUST_LOG is set).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and index the corpus, then print a summary.
    Build {
        /// Corpus directory; defaults to data.corpus_dir.
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
    /// Build the index and print the documents closest to TEXT.
    Query {
        text: String,
        /// Number of documents to return; defaults to retrieval.default_top_k.
        #[arg(short = 'k', long = "top-k", allow_negative_numbers = true)]
        top_k: Option<i64>,
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Build once, then read queries from stdin.
    Repl {
        #[arg(long)]
        corpus: Option<PathBuf>,
        #[arg(short = 'k', long = "top-k", allow_negative_numbers = true)]
        top_k: Option<i64>,
    },
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let embedder = get_default_embedder(&settings.embedding).context("failed to initialise the embedder")?;
    let service = RetrievalService::from_settings(Arc::from(embedder), &settings);

    match cli.command {
        Command::Build { corpus } => {
            let dir = corpus_dir(corpus, &settings);
            let report = service.rebuild(&dir)?;
            println!("✅ Indexed {} documents from {}", report.documents, dir.display());
            println!("   model:       {} (d={})", report.model_id, report.dim);
            println!("   fingerprint: {}", report.fingerprint);
            println!("   elapsed:     {:.2?}", report.elapsed);
        }
        Command::Query { text, top_k, corpus, json } => {
            let dir = corpus_dir(corpus, &settings);
            service.rebuild(&dir)?;
            let top_k = top_k.unwrap_or(service.default_top_k() as i64);
            let hits = service.retrieve_scored(&text, top_k)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                print_hits(&text, &hits);
            }
        }
        Command::Repl { corpus, top_k } => {
            let dir = corpus_dir(corpus, &settings);
            service.rebuild(&dir)?;
            let top_k = top_k.unwrap_or(service.default_top_k() as i64);
            repl(&service, &dir, top_k)?;
        }
    }
    Ok(())
}

fn corpus_dir(flag: Option<PathBuf>, settings: &Settings) -> PathBuf {
    flag.unwrap_or_else(|| settings.data.corpus_path())
}

fn print_hits(query: &str, hits: &[RetrievedDocument]) {
    if hits.is_empty() {
        println!("No documents for \"{}\"", query);
        return;
    }
    println!("🔍 \"{}\"", query);
    for hit in hits {
        println!("{:>2}. [{}] d={:.4}  {}", hit.rank, hit.document.id, hit.distance, hit.document.content.trim());
    }
}

fn repl(service: &RetrievalService, dir: &std::path::Path, top_k: i64) -> anyhow::Result<()> {
    println!("Type a question, :status, :rebuild or :quit");
    let stdin = io::stdin();
    let mut out = io::stdout();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 { break; }
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" | ":exit" => break,
            ":status" => match service.status() {
                ServiceStatus::NotReady => println!("not ready"),
                ServiceStatus::Ready { documents, dim, model_id, fingerprint, built_at } => {
                    println!("ready: {} documents, {} d={}, built {}", documents, model_id, dim, built_at.to_rfc3339());
                    println!("fingerprint {}", fingerprint);
                }
            },
            ":rebuild" => match service.rebuild(dir) {
                Ok(report) => println!("✅ Rebuilt: {} documents in {:.2?}", report.documents, report.elapsed),
                Err(e) => eprintln!("❌ Rebuild failed, keeping the previous index: {}", e),
            },
            query => match service.retrieve_scored(query, top_k) {
                Ok(hits) => print_hits(query, &hits),
                Err(e) => eprintln!("❌ {}", e),
            },
        }
    }
    Ok(())
}
