use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use regbpe::config::{CorpusConfig, TrainerConfig};
use regbpe::corpus::load_text_corpus;
use regbpe::model::TokenId;
use regbpe::serialization::{model_path, vocab_path};
use regbpe::{BpeModel, Trainer};
use serde_json::json;

const DEFAULT_PREFIX: &str = "tokenizer";

#[derive(Parser, Debug)]
#[command(author, version, about = "Regex-segmented BPE toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train a new tokenizer from text files
    Train(TrainArgs),
    /// Encode text with a trained tokenizer
    Encode(EncodeArgs),
    /// Decode token ids back into text
    Decode(DecodeArgs),
    /// Inspect a model file
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Text files or directories to train on
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output prefix; writes PREFIX.bpe and PREFIX.vocab
    #[arg(short, long, value_name = "PREFIX", default_value = DEFAULT_PREFIX)]
    output: PathBuf,

    /// Target vocabulary size (must exceed 256)
    #[arg(long, value_name = "SIZE")]
    vocab_size: Option<usize>,

    /// Override the segmentation pattern
    #[arg(long, value_name = "REGEX")]
    pattern: Option<String>,

    /// Register a special token after training (repeat flag)
    #[arg(long = "special-token", value_name = "TOKEN")]
    special_tokens: Vec<String>,

    /// Skip writing the human-readable vocabulary dump
    #[arg(long)]
    no_vocab: bool,

    /// Write training metrics as JSON
    #[arg(long, value_name = "PATH")]
    metrics: Option<PathBuf>,

    /// Disable per-iteration logging/progress
    #[arg(long)]
    no_progress: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,

    /// Text inserted between input files
    #[arg(long, value_name = "TEXT", default_value = "\n")]
    separator: String,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Model file to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Text to encode
    #[arg(long, value_name = "TEXT", conflicts_with = "input")]
    text: Option<String>,

    /// File to encode (reads stdin when neither this nor --text is given)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Treat special token literals as ordinary text
    #[arg(long)]
    no_special: bool,

    /// Emit a JSON record instead of space separated ids
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Model file to load
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Path to whitespace separated token ids
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Token ids to decode when --input is omitted
    #[arg(value_name = "ID", required_unless_present = "input")]
    tokens: Vec<TokenId>,

    /// Output file for decoded text (defaults to stdout)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Write the exact token bytes instead of text with invalid UTF-8 replaced by U+FFFD
    #[arg(long)]
    raw: bool,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Model file to inspect
    #[arg(short = 'm', long, value_name = "PATH")]
    model: PathBuf,

    /// Emit machine-readable JSON summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Train(args) => run_train(args),
        Commands::Encode(args) => run_encode(args),
        Commands::Decode(args) => run_decode(args),
        Commands::Info(args) => run_info(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = match (quiet, verbose) {
        (0, 0) => LevelFilter::Info,
        (0, 1) => LevelFilter::Debug,
        (0, _) => LevelFilter::Trace,
        (1, _) => LevelFilter::Warn,
        _ => LevelFilter::Error,
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn load_model(path: &Path) -> Result<BpeModel> {
    BpeModel::load(path).with_context(|| format!("failed to load model from {}", path.display()))
}

fn training_spinner(enabled: bool) -> Result<Option<ProgressBar>> {
    if !enabled {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} training merges... {elapsed}")
        .context("invalid progress template")?
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(Some(pb))
}

fn run_train(args: TrainArgs) -> Result<()> {
    let mut cfg = TrainerConfig::builder()
        .special_tokens(args.special_tokens.clone())
        .show_progress(!args.no_progress);
    if let Some(vocab_size) = args.vocab_size {
        cfg = cfg.target_vocab_size(vocab_size);
    }
    if let Some(pattern) = &args.pattern {
        cfg = cfg.pattern(pattern.clone());
    }
    let trainer_cfg = cfg.build()?;

    let corpus_cfg = CorpusConfig::builder()
        .recursive(!args.no_recursive)
        .follow_symlinks(args.follow_symlinks)
        .separator(args.separator.clone())
        .build();
    let corpus = load_text_corpus(&args.inputs, &corpus_cfg)
        .with_context(|| "failed to load text corpus")?;
    info!("loaded corpus of {} bytes", corpus.len());

    let spinner = training_spinner(!args.no_progress)?;
    let start = Instant::now();
    let artifacts = Trainer::new(trainer_cfg).train(&corpus)?;
    if let Some(pb) = spinner {
        pb.finish_with_message("training complete");
    }
    let elapsed = start.elapsed();

    let model_file = model_path(&args.output);
    artifacts
        .model
        .save(&model_file)
        .with_context(|| format!("failed to save model to {}", model_file.display()))?;
    if !args.no_vocab {
        let vocab_file = vocab_path(&args.output);
        artifacts
            .model
            .save_vocab(&vocab_file)
            .with_context(|| format!("failed to save vocabulary to {}", vocab_file.display()))?;
    }
    if let Some(path) = &args.metrics {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &artifacts.metrics)
            .with_context(|| format!("failed to write metrics to {}", path.display()))?;
    }

    println!(
        "wrote model with vocab {} ({} merges) to {}",
        artifacts.model.vocab_size(),
        artifacts.model.merges().len(),
        model_file.display()
    );
    println!(
        "   corpus {} bytes | {} unique chunks | duration {:.2?}",
        corpus.len(),
        artifacts.metrics.unique_chunks,
        elapsed
    );
    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let model = load_model(&args.model)?;
    let (source, text) = if let Some(text) = args.text {
        ("text".to_string(), text)
    } else if let Some(path) = &args.input {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        (path.display().to_string(), text)
    } else {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        ("stdin".to_string(), text)
    };

    let tokens = model.encode(&text, !args.no_special)?;
    if args.json {
        let record = json!({
            "source": source,
            "tokens": tokens,
        });
        println!("{}", serde_json::to_string(&record)?);
    } else {
        let mut stdout = io::stdout().lock();
        write_token_sequence(&mut stdout, &tokens)?;
    }
    Ok(())
}

fn run_decode(args: DecodeArgs) -> Result<()> {
    let model = load_model(&args.model)?;
    let tokens = if let Some(input_path) = &args.input {
        let contents = fs::read_to_string(input_path)
            .with_context(|| format!("failed to read {}", input_path.display()))?;
        parse_token_list(&contents)?
    } else {
        args.tokens
    };

    let bytes = if args.raw {
        model.decode_bytes(&tokens)?
    } else {
        model.decode(&tokens)?.into_bytes()
    };
    if let Some(path) = &args.output {
        let mut file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(&bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("wrote {} bytes to {}", bytes.len(), path.display());
    } else {
        io::stdout().write_all(&bytes)?;
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<()> {
    let model = load_model(&args.model)?;
    let special_tokens = model.special_tokens().literals();
    let summary = json!({
        "path": args.model.display().to_string(),
        "pattern": model.pattern(),
        "vocab_size": model.vocab_size(),
        "merges": model.merges().len(),
        "special_tokens": special_tokens,
    });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Pattern       : {}", model.pattern());
        println!("Vocab size    : {}", model.vocab_size());
        println!("Merges        : {}", model.merges().len());
        if special_tokens.is_empty() {
            println!("Special tokens: (none)");
        } else {
            println!("Special tokens: {}", special_tokens.join(", "));
        }
    }
    Ok(())
}

fn write_token_sequence<W: Write>(writer: &mut W, tokens: &[TokenId]) -> Result<()> {
    for (idx, token) in tokens.iter().enumerate() {
        if idx > 0 {
            writer.write_all(b" ")?;
        }
        write!(writer, "{token}")?;
    }
    writer.write_all(b"\n")?;
    Ok(())
}

fn parse_token_list(text: &str) -> Result<Vec<TokenId>> {
    text.split_whitespace()
        .map(|part| {
            part.parse::<TokenId>()
                .map_err(|err| anyhow!("invalid token id `{part}`: {err}"))
        })
        .collect()
}
