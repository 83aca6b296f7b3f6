//! strata CLI — thin command-line driver over `strata-core`'s `IndexManager`.
//!
//! Calls the engine in-process; there is no server overhead.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use strata_core::manager::IndexManager;
use strata_core::snapshot::{GitSnapshotProvider, PlainSnapshotProvider, SnapshotProvider};
use strata_core::types::{IndexOptions, RepositorySpec};

/// strata — repository indexing engine.
#[derive(Parser)]
#[command(name = "strata", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Treat the path as a git repository rather than a plain directory
    #[arg(long, global = true)]
    git: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a repository and print a summary
    Index {
        /// Repository path
        path: PathBuf,

        /// Revision to index (defaults to the working tree / HEAD)
        #[arg(long)]
        revision: Option<String>,

        /// Scan for leaked secrets
        #[arg(long)]
        scan_secrets: bool,

        /// Don't persist the result in the in-process store
        #[arg(long)]
        dry_run: bool,
    },
    /// List indexed files
    Files {
        path: PathBuf,

        #[arg(long)]
        revision: Option<String>,

        /// Glob to include (repeatable)
        #[arg(long = "include")]
        include: Vec<String>,

        /// Glob to exclude (repeatable)
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Case-insensitive text search over indexed chunks
    Search {
        path: PathBuf,
        query: String,

        #[arg(long)]
        revision: Option<String>,

        #[arg(long)]
        path_glob: Option<String>,
    },
    /// Diff the chunk ids between two revisions
    DiffChunks {
        path: PathBuf,
        base_revision: String,
        head_revision: String,

        #[arg(long, default_value = "200")]
        limit: usize,
    },
    /// Show line-by-line authorship for a file (git repositories only)
    Blame {
        path: PathBuf,
        file: String,

        #[arg(long)]
        revision: Option<String>,
    },
    /// Assemble a token-budgeted context pack from indexed chunks
    ContextPack {
        path: PathBuf,

        #[arg(long)]
        revision: Option<String>,

        #[arg(long)]
        max_tokens: Option<usize>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Print the files, chunk count, and any findings for a revision
    Report {
        path: PathBuf,

        #[arg(long)]
        revision: Option<String>,
    },
}

fn provider(use_git: bool) -> Arc<dyn SnapshotProvider> {
    if use_git {
        Arc::new(GitSnapshotProvider::new())
    } else {
        Arc::new(PlainSnapshotProvider::new())
    }
}

fn spec_for(path: &PathBuf, use_git: bool) -> RepositorySpec {
    if use_git {
        RepositorySpec::version_controlled(path)
    } else {
        RepositorySpec::filesystem(path)
    }
}

fn die(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("strata=warn".parse().unwrap()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let manager = IndexManager::new(provider(cli.git));

    match cli.command {
        Commands::Index { path, revision, scan_secrets, dry_run } => {
            let spec = spec_for(&path, cli.git);
            let mut options = IndexOptions { revision, scan_secrets, dry_run, ..IndexOptions::default() };
            if cli.git {
                options.incremental = true;
            }
            let result = manager.index(&spec, &options).await.unwrap_or_else(|e| die(e));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result).unwrap());
            } else {
                println!("Files:    {}", result.files.len());
                println!("Chunks:   {}", result.chunks.len());
                println!("Secrets:  {}", result.secret_findings.len());
                println!("Findings: {}", result.policy_findings.len());
                if let Some(rev) = &result.revision {
                    println!("Revision: {rev}");
                }
            }
        }
        Commands::Files { path, revision, include, exclude } => {
            let spec = spec_for(&path, cli.git);
            let files = manager.list_files(&spec, revision.as_deref(), &include, &exclude).unwrap_or_else(|e| die(e));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&files).unwrap());
            } else {
                for f in &files {
                    println!("{:<60} {:>10}  {}", f.path, f.size_bytes, f.language.as_deref().unwrap_or("-"));
                }
                eprintln!("\n{} files", files.len());
            }
        }
        Commands::Search { path, query, revision, path_glob } => {
            let spec = spec_for(&path, cli.git);
            let hits = manager.search_text(&spec, &query, revision.as_deref(), path_glob.as_deref()).unwrap_or_else(|e| die(e));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&hits).unwrap());
            } else {
                if hits.is_empty() {
                    eprintln!("No matches for '{query}'");
                    std::process::exit(1);
                }
                for hit in &hits {
                    println!("{}:{}: {}", hit.path, hit.line, hit.excerpt);
                }
                eprintln!("\n{} matches", hits.len());
            }
        }
        Commands::DiffChunks { path, base_revision, head_revision, limit } => {
            let spec = spec_for(&path, cli.git);
            let diff = manager
                .diff_chunks(&spec, &base_revision, &head_revision, None, limit, &IndexOptions::default())
                .await
                .unwrap_or_else(|e| die(e));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&diff).unwrap());
            } else {
                println!("Added chunks:   {}", diff.added.len());
                println!("Removed chunks: {}", diff.removed.len());
                println!("Changed files:  {}", diff.changed_files.len());
                for f in &diff.changed_files {
                    println!("  {f}");
                }
            }
        }
        Commands::Blame { path, file, revision } => {
            let spec = spec_for(&path, cli.git);
            let lines = manager.blame_file(&spec, &file, revision.as_deref()).unwrap_or_else(|e| die(e));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&lines).unwrap());
            } else {
                for line in &lines {
                    println!("{} {:<20} {:>6} {}", &line.commit[..line.commit.len().min(12)], line.author, line.line, line.content);
                }
            }
        }
        Commands::ContextPack { path, revision, max_tokens, limit } => {
            let spec = spec_for(&path, cli.git);
            let chunks = manager.build_context_pack(&spec, revision.as_deref(), None, limit, max_tokens).unwrap_or_else(|e| die(e));

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&chunks).unwrap());
            } else {
                for c in &chunks {
                    println!(
                        "--- {} ({}-{}, {} tokens) ---\n{}\n",
                        c.chunk.metadata.path, c.chunk.metadata.start_line, c.chunk.metadata.end_line, c.chunk.metadata.token_count, c.chunk.text
                    );
                }
            }
        }
        Commands::Report { path, revision } => {
            let spec = spec_for(&path, cli.git);
            let files = manager.list_files(&spec, revision.as_deref(), &[], &[]).unwrap_or_else(|e| die(e));
            let symbols = manager.search_symbols(&spec, None, revision.as_deref()).unwrap_or_else(|e| die(e));

            if cli.json {
                let output = serde_json::json!({
                    "files": files.len(),
                    "symbols": symbols.len(),
                });
                println!("{}", serde_json::to_string_pretty(&output).unwrap());
            } else {
                println!("Files:   {}", files.len());
                println!("Symbols: {}", symbols.len());
            }
        }
    }
}
