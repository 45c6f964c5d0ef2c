//! `phonosim` command line: feature matrix → segment similarity → word distances.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use phonosim_core::output::write_text;
use phonosim_core::pairwise::{check_word_pair, Alphabet};
use phonosim_core::similarity::read_similarity_table;
use phonosim_core::{
    analyze_inventory, natural_classes, run_pipeline, word_distances, FeatureInventory,
    NeedlemanWunsch, PipelineConfig, SegmentDistances, WordList,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "phonosim")]
#[command(about = "Natural-class segment similarity and phonological word distances")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Gap penalty (overrides the configuration file)
    #[arg(long, global = true)]
    gap_penalty: Option<f64>,

    /// Worker threads (overrides the configuration file)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the natural classes of a feature matrix
    Classes {
        /// Feature matrix (TSV)
        #[arg(short, long)]
        features: PathBuf,

        #[arg(long, value_enum, default_value = "tsv")]
        format: DumpFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compute the segment similarity table
    Similarity {
        /// Feature matrix (TSV)
        #[arg(short, long)]
        features: PathBuf,

        /// Similarity table to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Compute the word distance table from a similarity table
    Distances {
        /// Segment similarity table (TSV)
        #[arg(short, long)]
        similarity: PathBuf,

        /// Word list (TSV, column `lemma`)
        #[arg(short, long)]
        words: PathBuf,

        /// Distance table to write; `.gz` compresses
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Feature matrix and word list to both tables in one pass
    Run {
        #[arg(short, long)]
        features: PathBuf,

        #[arg(short, long)]
        words: PathBuf,

        #[arg(long)]
        similarity_output: PathBuf,

        #[arg(long)]
        distances_output: PathBuf,
    },

    /// Show the optimal alignment of two words
    Align {
        #[arg(short, long)]
        similarity: PathBuf,

        word1: String,

        word2: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpFormat {
    Tsv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Classes {
            features,
            format,
            output,
        } => cmd_classes(&features, format, output.as_deref(), &config),
        Commands::Similarity { features, output } => cmd_similarity(&features, &output, &config),
        Commands::Distances {
            similarity,
            words,
            output,
        } => cmd_distances(&similarity, &words, &output, &config),
        Commands::Run {
            features,
            words,
            similarity_output,
            distances_output,
        } => cmd_run(&features, &words, &similarity_output, &distances_output, &config),
        Commands::Align {
            similarity,
            word1,
            word2,
        } => cmd_align(&similarity, &word1, &word2, &config),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(gap_penalty) = cli.gap_penalty {
        config.gap_penalty = gap_penalty;
    }
    if let Some(threads) = cli.threads {
        config.threads = Some(threads);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_inventory(path: &Path) -> Result<FeatureInventory> {
    FeatureInventory::from_path(path)
        .with_context(|| format!("Failed to load feature matrix {}", path.display()))
}

fn load_distances(path: &Path, config: &PipelineConfig) -> Result<SegmentDistances> {
    let entries = read_similarity_table(path)
        .with_context(|| format!("Failed to load similarity table {}", path.display()))?;
    if entries.is_empty() {
        bail!("Similarity table {} has no segment pairs", path.display());
    }
    SegmentDistances::from_similarity_entries(&entries, config.missing_distance)
        .with_context(|| format!("Inconsistent similarity table {}", path.display()))
}

fn load_words(path: &Path, alphabet: &Alphabet) -> Result<WordList> {
    WordList::from_path(path, alphabet)
        .with_context(|| format!("Failed to load word list {}", path.display()))
}

fn cmd_classes(
    features: &Path,
    format: DumpFormat,
    output: Option<&Path>,
    config: &PipelineConfig,
) -> Result<()> {
    let inventory = load_inventory(features)?;
    let classes = config.install(|| natural_classes(&inventory))??;
    let summaries: Vec<_> = classes
        .classes()
        .iter()
        .map(|c| c.summary(&inventory))
        .collect();

    let mut rendered = String::new();
    match format {
        DumpFormat::Json => {
            rendered = serde_json::to_string_pretty(&summaries)?;
            rendered.push('\n');
        }
        DumpFormat::Tsv => {
            rendered.push_str("spec\tsize\tsegments\n");
            for summary in &summaries {
                rendered.push_str(&format!(
                    "{}\t{}\t{}\n",
                    summary.spec,
                    summary.segments.chars().count(),
                    summary.segments
                ));
            }
        }
    }

    match output {
        Some(path) => write_text(path, &rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => std::io::stdout().write_all(rendered.as_bytes())?,
    }

    let stats = classes.stats();
    info!(
        raw_specs = stats.raw_specs,
        non_empty = stats.non_empty,
        retained = stats.retained,
        "natural classes"
    );
    Ok(())
}

fn cmd_similarity(features: &Path, output: &Path, config: &PipelineConfig) -> Result<()> {
    let inventory = load_inventory(features)?;
    let (_, matrix) = analyze_inventory(&inventory, config)?;
    matrix
        .write_tsv(output)
        .with_context(|| format!("Failed to write similarity table {}", output.display()))
}

fn cmd_distances(
    similarity: &Path,
    words: &Path,
    output: &Path,
    config: &PipelineConfig,
) -> Result<()> {
    let distances = load_distances(similarity, config)?;
    let words = load_words(words, &distances.segments())?;

    let table = word_distances(&distances, &words, config)?;
    table
        .write_tsv(output)
        .with_context(|| format!("Failed to write distance table {}", output.display()))
}

fn cmd_run(
    features: &Path,
    words: &Path,
    similarity_output: &Path,
    distances_output: &Path,
    config: &PipelineConfig,
) -> Result<()> {
    let summary = run_pipeline(features, words, similarity_output, distances_output, config)
        .context("Pipeline failed; no output written")?;
    info!(
        segments = summary.segments,
        classes = summary.classes,
        words = summary.words,
        "done"
    );
    Ok(())
}

fn cmd_align(similarity: &Path, word1: &str, word2: &str, config: &PipelineConfig) -> Result<()> {
    let distances = load_distances(similarity, config)?;
    let alphabet = distances.segments();
    let (left, right) = check_word_pair(word1, word2, &alphabet)?;

    let alignment = NeedlemanWunsch::new(&distances, config.gap_penalty).align(&left, &right);

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", alignment.left_row())?;
    writeln!(out, "{}", alignment.right_row())?;
    for pair in &alignment.pairs {
        writeln!(
            out,
            "{}\t{}\t{:?}\t{:.4}",
            pair.left.map(String::from).unwrap_or_default(),
            pair.right.map(String::from).unwrap_or_default(),
            pair.op,
            pair.cost
        )?;
    }
    writeln!(out, "phon_dist\t{:.4}", alignment.cost)?;
    Ok(())
}
