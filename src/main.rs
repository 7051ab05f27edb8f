use clap::{Parser, Subcommand};
use hum2midi::predictor::JsonMelodyPredictor;
use hum2midi::{validate_input, Config, HumToMidi, SearchReport};
use std::path::PathBuf;

/// Hum-to-MIDI Transcription and Melody Search
#[derive(Parser)]
#[command(name = "hum2midi")]
#[command(about = "Transcribe sung melodies to MIDI and search MIDI melodies by humming")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Custom configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a sung recording to MIDI
    Transcribe {
        /// Input audio file (WAV)
        input: PathBuf,

        /// Melody estimate produced by the pitch model (JSON)
        #[arg(short, long)]
        melody: PathBuf,

        /// Output directory for the MIDI file
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },
    /// Rank a MIDI corpus against a query MIDI file
    Search {
        /// Query MIDI file
        query: PathBuf,

        /// Directory of candidate MIDI files
        #[arg(long)]
        corpus: PathBuf,

        /// Window slack added to the query length
        #[arg(long)]
        window_size: Option<usize>,

        /// Show only the best N matches
        #[arg(long)]
        top: Option<usize>,

        /// Also write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Transcribe a sung query and rank a MIDI corpus against it
    Query {
        /// Input audio file (WAV)
        input: PathBuf,

        /// Melody estimate produced by the pitch model (JSON)
        #[arg(short, long)]
        melody: PathBuf,

        /// Directory of candidate MIDI files
        #[arg(long)]
        corpus: PathBuf,

        /// Show only the best N matches
        #[arg(long)]
        top: Option<usize>,

        /// Also write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose && cli.quiet {
        anyhow::bail!("Cannot specify both --verbose and --quiet");
    }
    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = if let Some(config_path) = &cli.config {
        hum2midi::config::load_config(config_path)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Transcribe {
            input,
            melody,
            output,
        } => {
            validate_input(&input, &config)?;
            let predictor = JsonMelodyPredictor::from_file(&melody)?;
            let processor = HumToMidi::new(config);

            if !cli.quiet {
                println!("Processing {}...", input.display());
            }
            let midi_path = processor.transcribe_file(&input, &predictor, &output)?;
            if !cli.quiet {
                println!("MIDI saved to {}", midi_path.display());
            }
        }
        Commands::Search {
            query,
            corpus,
            window_size,
            top,
            json,
        } => {
            let mut config = config;
            if let Some(window_size) = window_size {
                config.matching.window_size = window_size;
            }
            let processor = HumToMidi::new(config);
            let report = processor.search(&query, &corpus)?;
            finish_report(report, top, json, cli.quiet)?;
        }
        Commands::Query {
            input,
            melody,
            corpus,
            top,
            json,
        } => {
            validate_input(&input, &config)?;
            let predictor = JsonMelodyPredictor::from_file(&melody)?;
            let processor = HumToMidi::new(config);
            let report = processor.query_by_humming(&input, &predictor, &corpus)?;
            finish_report(report, top, json, cli.quiet)?;
        }
        Commands::ValidateConfig { config } => {
            let config = hum2midi::config::load_config(config)?;
            println!("Configuration is valid");
            if let Ok(json) = serde_json::to_string_pretty(&config) {
                println!("{}", json);
            }
        }
        Commands::ShowConfig => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}

/// Truncate, print and optionally save a search report
fn finish_report(
    mut report: SearchReport,
    top: Option<usize>,
    json: Option<PathBuf>,
    quiet: bool,
) -> anyhow::Result<()> {
    if let Some(n) = top {
        report.results.truncate(n);
    }

    if !quiet {
        if !report.corpus_found {
            println!("No candidate MIDI files found");
        }
        for (rank, result) in report.results.iter().enumerate() {
            println!("{:>4}  {:<40} {:.4}", rank + 1, result.file, result.distance);
        }
        println!("Completed in {:.3}s", report.execution_time);
    }

    if let Some(path) = json {
        hum2midi::analysis::export_report(&report, &path)?;
    }
    Ok(())
}
