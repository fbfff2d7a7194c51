use std::path::{Path, PathBuf};
use std::process;
use clap::{Parser, Subcommand};
use paperir::ircore::CFG_NAME;
use paperir::ircore::common::{DocTier, RetrievalModel};
use paperir::ircore::config::Config;
use paperir::ircore::engine::Engine;
use paperir::ircore::error::{IndexError, Result};

#[derive(Parser)]
#[derive(Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
/// Search engine over a scientific paper corpus
struct Cli {
    #[clap(short, long, value_parser)]
    /// YAML configuration file
    config: Option<String>,
    #[clap(short, long, value_parser)]
    /// Index directory, overrides the configuration
    index_dir: Option<String>,
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
#[derive(Debug)]
enum Commands {
    /// Build index
    Build {
        #[clap(short, long, value_parser)]
        /// Corpus directory or JSON lines file
        corpus_dir: String,
    },
    /// Ranked search
    Search {
        #[clap(value_parser)]
        /// free text query
        query: String,
        #[clap(short, long, value_parser)]
        /// set, vsm or bm25
        model: Option<String>,
        #[clap(short = 'k', long, value_parser, default_value_t = 10)]
        top_k: usize,
        #[clap(short, long, value_parser, default_value_t = String::from("display"))]
        /// plain, scoring or display
        tier: String,
        #[clap(short = 'w', long, value_parser)]
        /// citation importance weight in [0, 1]
        pagerank_weight: Option<f64>,
    },
    /// Show index statistics
    Info,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load(Path::new(path))?,
        None if Path::new(CFG_NAME).is_file() => Config::load(Path::new(CFG_NAME))?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.index_dir {
        cfg.index_dir = PathBuf::from(dir);
    }
    Ok(cfg)
}

fn run(cli: &Cli) -> Result<()> {
    let mut cfg = load_config(cli)?;
    match &cli.command {
        Some(Commands::Build { corpus_dir }) => command_build_index(cfg, corpus_dir),
        Some(Commands::Search { query, model, top_k, tier, pagerank_weight }) => {
            if let Some(w) = pagerank_weight {
                cfg.pagerank_weight = *w;
            }
            let model = match model {
                Some(m) => m.parse::<RetrievalModel>().map_err(IndexError::Config)?,
                None => cfg.retrieval_model,
            };
            let tier = tier.parse::<DocTier>().map_err(IndexError::Config)?;
            command_search(cfg, query, model, *top_k, tier)
        }
        None | Some(Commands::Info) => command_info(cfg),
    }
}

fn load_engine(cfg: Config) -> Result<Engine> {
    let engine = Engine::new(cfg)?;
    engine.load()?;
    engine.wait()?;
    Ok(engine)
}

fn command_build_index(cfg: Config, corpus_dir: &str) -> Result<()> {
    let engine = Engine::new(cfg)?;
    engine.build(Path::new(corpus_dir))?;
    engine.wait()?;
    engine.load()?;
    engine.wait()?;
    println!("{} documents indexed into {}", engine.total_documents()?, engine.index_dir().display());
    Ok(())
}

fn command_search(cfg: Config, query: &str, model: RetrievalModel, top_k: usize, tier: DocTier) -> Result<()> {
    let engine = load_engine(cfg)?;
    let ranked = engine.search(query, model, top_k, tier)?;
    println!("{} matches, top {} by {}:", ranked.total_matches, ranked.results.len(), model);
    for (i, result) in ranked.results.iter().enumerate() {
        match &result.doc.details {
            Some(details) if details.year > 0 => {
                println!("{}: {} {:.4} {} ({})", i + 1, result.doc.id, result.score, details.title, details.year)
            }
            Some(details) => println!("{}: {} {:.4} {}", i + 1, result.doc.id, result.score, details.title),
            None => println!("{}: {} {:.4}", i + 1, result.doc.id, result.score),
        }
    }
    Ok(())
}

fn command_info(cfg: Config) -> Result<()> {
    let engine = load_engine(cfg)?;
    let meta = engine.meta()?;
    println!("index {}", engine.index_dir().display());
    println!("{} documents, {} terms, {} postings", meta.documents, meta.terms, meta.postings);
    if meta.documents > 0 {
        println!("average document length {:.2}", meta.total_length as f64 / meta.documents as f64);
    }
    Ok(())
}
