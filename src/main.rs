use anyhow::{Context, Result};
use chartwords::analyzer::WeekExtractor;
use chartwords::series::SummaryStatsRow;
use chartwords::series::stats::Band;
use chartwords::series::table::WideTable;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chartwords", version, about = "Weekly chart lyric trend extractor")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store weekly chart snapshot files (JSON)
    Ingest {
        /// Snapshot files to store
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Extract one stored week and append it to the tables
    Extract {
        /// Chart date (YYYY-MM-DD); defaults to the latest stored week
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Re-extract every stored week and rebuild the tables from scratch
    Rebuild {
        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Most popular artists of a week
    Artists {
        /// Number of results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Chart date; defaults to the latest week
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Most frequent lyric words of a week
    Words {
        /// Number of results
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Chart date; defaults to the latest week
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Emotion frequencies of a week
    Emotions {
        /// Number of results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Chart date; defaults to the latest week
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Summary statistics of the latest weeks
    Summary {
        /// Number of weeks
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Write the tables as row-oriented JSON files
    Export {
        /// Output directory
        dir: PathBuf,
    },

    /// Show store statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = chartwords::config::AppConfig::load();
    let frac = config.pipeline.confidence_frac;

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(chartwords::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = chartwords::db::Database::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Commands::Ingest { files } => {
            let result = chartwords::pipeline::ingest_files(&db, &files).context("Ingest failed")?;
            println!(
                "Ingest complete: {} weeks stored, {} failed",
                result.stored.len(),
                result.failed
            );
        }

        Commands::Extract { date } => {
            let extractor = WeekExtractor::from_config(&config.pipeline)?;
            let result = chartwords::pipeline::extract_week(&db, &extractor, frac, date)
                .context("Extraction failed")?;
            println!(
                "Week {}: {} songs, {} with analyzed lyrics ({} weeks in tables)",
                result.date, result.n_songs, result.n_songs_lyrics_analyzed, result.total_weeks
            );
        }

        Commands::Rebuild { jobs } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let extractor = WeekExtractor::from_config(&config.pipeline)?;
            let result = chartwords::pipeline::rebuild(&db, &extractor, frac, workers)
                .context("Rebuild failed")?;
            println!(
                "Rebuild complete: {} weeks, {} skipped, {} artists, {} words",
                result.weeks, result.skipped, result.artists, result.words
            );
        }

        Commands::Artists { limit, date } => {
            let series = chartwords::pipeline::load_series(&db)?;
            print_top(&series.artist_popularity, "Artist", date, limit, 0);
        }

        Commands::Words { limit, date } => {
            let series = chartwords::pipeline::load_series(&db)?;
            print_top(&series.word_frequency, "Word", date, limit, 4);
        }

        Commands::Emotions { limit, date } => {
            let series = chartwords::pipeline::load_series(&db)?;
            print_top(&series.emotion_frequency, "Emotion", date, limit, 4);
        }

        Commands::Summary { limit } => {
            let series = chartwords::pipeline::load_series(&db)?;
            if series.summary.is_empty() {
                println!("No weeks extracted yet.");
            } else {
                print_summary(series.summary.latest(limit));
            }
        }

        Commands::Export { dir } => {
            let written = chartwords::pipeline::export(&db, &dir).context("Export failed")?;
            for path in &written {
                println!("{}", path.display());
            }
        }

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            println!("Store Statistics");
            println!("================");
            println!("Snapshots:   {}", stats.snapshots);
            if let (Some(first), Some(last)) = (&stats.first_week, &stats.last_week) {
                println!("Weeks:       {} .. {}", first, last);
            }
            println!();

            if !stats.tables.is_empty() {
                println!("Tables:");
                for (name, bytes) in &stats.tables {
                    println!("  {:<20} {} bytes", name, bytes);
                }
            }
        }
    }

    Ok(())
}

/// Print the largest columns of one week's row.
fn print_top(table: &WideTable, label: &str, date: Option<NaiveDate>, limit: usize, precision: usize) {
    let Some(date) = date.or(table.latest_date()) else {
        println!("No weeks extracted yet.");
        return;
    };
    let top = table.top_columns(date, limit);
    if top.is_empty() {
        println!("No values for {}", date);
        return;
    }

    println!("Week of {}", date);
    println!("{:<30} {:>10}", label, "Value");
    println!("{}", "-".repeat(41));
    for (name, value) in top {
        let name: String = if name.chars().count() > 30 {
            format!("{}...", name.chars().take(27).collect::<String>())
        } else {
            name.to_string()
        };
        println!("{:<30} {:>10.*}", name, precision, value);
    }
}

fn format_band(band: Option<Band>) -> String {
    match band {
        Some(b) => format!("{:.1} (-{:.1}/+{:.1})", b.median, b.err_low, b.err_high),
        None => "-".to_string(),
    }
}

/// Print summary rows with median and error bars.
fn print_summary(rows: &[SummaryStatsRow]) {
    println!(
        "{:<10} {:>5} {:>5}  {:<20} {:<22} {:<20}  {}",
        "Date", "Songs", "Lyr", "Minutes", "Words/min", "Weeks on chart", "Top tags"
    );
    println!("{}", "-".repeat(110));

    for r in rows {
        let tags: Vec<&str> = r.top_tags.iter().take(3).map(|(t, _)| t.as_str()).collect();
        println!(
            "{:<10} {:>5} {:>5}  {:<20} {:<22} {:<20}  {}",
            r.date,
            r.n_songs,
            r.n_songs_lyrics_analyzed,
            format_band(r.duration),
            format_band(r.wpm),
            format_band(r.weeks_on_chart),
            tags.join(", ")
        );
    }
}
