use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use aurelia_core::bootstrap::{
    create_orchestrator, create_provider, load_config, resolve_config_path,
};
use aurelia_index::{Answer, BuildReport, CorpusSnapshot, RagOrchestrator, Retrieval};

#[derive(Debug, Parser)]
#[command(name = "aurelia")]
#[command(about = "Index a source tree and ask grounded questions about it", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the TOML config (falls back to `AURELIA_CONFIG`, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load and embed every matching file under ROOT
    Index {
        root: PathBuf,

        /// Write the built index to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Print the files nearest to QUERY without calling the LLM
    Search {
        query: String,

        #[command(flatten)]
        corpus: CorpusSource,

        /// Number of files to return (defaults to retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },

    /// Answer QUESTION from the retrieved source files
    Ask {
        question: String,

        #[command(flatten)]
        corpus: CorpusSource,
    },
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct CorpusSource {
    /// Index this directory before querying
    #[arg(long)]
    root: Option<PathBuf>,

    /// Reuse an index written by `index --save`
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = load_config(&config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    let rag = create_orchestrator(&config)?;

    match cli.command {
        Command::Index { root, save } => {
            let report = rag.build(&root).await?;
            if let Some(path) = save {
                save_snapshot(&rag, &path).await?;
            }
            print_report(&report, cli.json)?;
        }
        Command::Search {
            query,
            corpus,
            top_k,
        } => {
            prepare_corpus(&rag, &corpus).await?;
            let k = top_k.unwrap_or(rag.config().top_k);
            let retrieval = rag.retrieve(&query, k).await?;
            print_retrieval(&retrieval, cli.json)?;
        }
        Command::Ask { question, corpus } => {
            let provider = create_provider(&config)?;
            prepare_corpus(&rag, &corpus).await?;
            let answer = rag.answer(&provider, &question).await?;
            print_answer(&answer, cli.json)?;
        }
    }

    Ok(())
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn prepare_corpus(rag: &RagOrchestrator, source: &CorpusSource) -> anyhow::Result<()> {
    if let Some(path) = &source.snapshot {
        let snapshot = CorpusSnapshot::load(path)
            .with_context(|| format!("failed to load index from {}", path.display()))?;
        rag.install_snapshot(snapshot).await?;
        tracing::info!(path = %path.display(), "index loaded");
    } else if let Some(root) = &source.root {
        rag.build(root).await?;
    }
    Ok(())
}

async fn save_snapshot(rag: &RagOrchestrator, path: &Path) -> anyhow::Result<()> {
    let snapshot = rag
        .snapshot()
        .await
        .context("no index available to save")?;
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || snapshot.save(&target)).await??;
    tracing::info!(path = %path.display(), "index saved");
    Ok(())
}

fn print_report(report: &BuildReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "indexed {} files ({} skipped, {} without summary) in {} ms",
        report.indexed_count, report.skipped_count, report.parse_failures, report.duration_ms
    );
    Ok(())
}

fn print_retrieval(retrieval: &Retrieval, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&retrieval.hits)?);
        return Ok(());
    }
    if retrieval.is_empty() {
        println!("no matching files");
    }
    for (rank, hit) in retrieval.hits.iter().enumerate() {
        println!("{}. {} (distance {:.4})", rank + 1, hit.source, hit.distance);
    }
    Ok(())
}

fn print_answer(answer: &Answer, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  {source}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_index_with_save() {
        let cli =
            Cli::try_parse_from(["aurelia", "index", "./repo", "--save", "idx.json"]).unwrap();
        match cli.command {
            Command::Index { root, save } => {
                assert_eq!(root, PathBuf::from("./repo"));
                assert_eq!(save, Some(PathBuf::from("idx.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(!cli.json);
    }

    #[test]
    fn parse_search_with_snapshot_and_top_k() {
        let cli = Cli::try_parse_from([
            "aurelia",
            "search",
            "where is foo",
            "--snapshot",
            "idx.json",
            "-k",
            "5",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Search {
                query,
                corpus,
                top_k,
            } => {
                assert_eq!(query, "where is foo");
                assert_eq!(corpus.snapshot, Some(PathBuf::from("idx.json")));
                assert!(corpus.root.is_none());
                assert_eq!(top_k, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "aurelia",
            "ask",
            "what does main do?",
            "--root",
            ".",
            "--config",
            "custom.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn corpus_source_is_required() {
        assert!(Cli::try_parse_from(["aurelia", "ask", "question"]).is_err());
    }

    #[test]
    fn corpus_sources_are_exclusive() {
        let result = Cli::try_parse_from([
            "aurelia",
            "search",
            "q",
            "--root",
            ".",
            "--snapshot",
            "idx.json",
        ]);
        assert!(result.is_err());
    }
}
