use std::{
    error::Error,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use songprint::{
    AudioClip, EnrollOutcome, FingerprintConfig, Fingerprinter, QueryOutcome,
    audio::load_wav,
    config::{FFT_ORDER, MAX_CLIP_SECONDS, PLOT_HEIGHT},
    db::{self, LoadStatus},
    enroll_batch, query, telemetry, visualize,
};

#[derive(Parser)]
#[command(name = "songprint", version, about = "Identify songs from short audio clips")]
struct Cli {
    /// Frames hold 2^order samples
    #[arg(long, global = true, default_value_t = FFT_ORDER)]
    fft_order: u32,

    /// Clips longer than this many seconds are ignored
    #[arg(long, global = true, default_value_t = MAX_CLIP_SECONDS)]
    max_duration: f64,

    /// Decimate input audio to this rate before fingerprinting
    #[arg(long, global = true)]
    sample_rate: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fingerprint WAV files and add them to the database
    Enroll {
        #[arg(long, default_value = "fingerprints.db")]
        db: PathBuf,
        /// Song name to store; defaults to the file stem. Only valid with one file
        #[arg(long)]
        name: Option<String>,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Identify a WAV clip against the database
    Query {
        #[arg(long, default_value = "fingerprints.db")]
        db: PathBuf,
        file: PathBuf,
        /// Only use the clip from this second on
        #[arg(long)]
        start: Option<u32>,
        /// Only use the clip up to this second
        #[arg(long)]
        end: Option<u32>,
    },
    /// Print the database in its textual form
    Dump {
        #[arg(long, default_value = "fingerprints.db")]
        db: PathBuf,
    },
    /// Render a WAV file's spectrogram, optionally with its constellation
    Plot {
        file: PathBuf,
        #[arg(long, default_value = "spectrogram.png")]
        out: PathBuf,
        #[arg(long)]
        constellation: bool,
        #[arg(long, default_value_t = PLOT_HEIGHT)]
        height: u32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    telemetry::init();
    let cli = Cli::parse();

    let config = FingerprintConfig::default()
        .with_fft_order(cli.fft_order)
        .with_max_duration(cli.max_duration);
    let fingerprinter = Fingerprinter::new(config)?;

    match cli.command {
        Command::Enroll { db, name, files } => {
            if name.is_some() && files.len() > 1 {
                return Err("--name can only be used with a single file".into());
            }
            let mut index = load_index(&db)?;

            let mut clips = Vec::with_capacity(files.len());
            for file in &files {
                let song_id = match &name {
                    Some(name) => name.clone(),
                    None => song_name(file)?,
                };
                if index.contains_song(&song_id) {
                    warn!("{} is already enrolled, adding its fingerprints again", song_id);
                }
                clips.push((song_id, load_wav(file, cli.sample_rate)?));
            }

            let outcomes = enroll_batch(&mut index, &fingerprinter, &clips)?;
            for outcome in &outcomes {
                match outcome {
                    EnrollOutcome::Enrolled {
                        song_id,
                        fingerprints,
                    } => println!("enrolled {} ({} fingerprints)", song_id, fingerprints),
                    EnrollOutcome::Rejected(rejection) => println!("skipped: {}", rejection),
                }
            }
            db::save(&index, &db)?;
        }
        Command::Query {
            db,
            file,
            start,
            end,
        } => {
            let index = load_index(&db)?;
            let mut clip = load_wav(&file, cli.sample_rate)?;
            if start.is_some() || end.is_some() {
                clip = slice(&clip, start, end);
            }

            match query(&index, &fingerprinter, &clip) {
                QueryOutcome::Match(prediction) => println!(
                    "match: {} (votes: {}, offset: {}s, confidence: {:.1}% [{}])",
                    prediction.song_id,
                    prediction.votes,
                    prediction.offset,
                    prediction.confidence,
                    prediction.quality()
                ),
                QueryOutcome::NoMatch { fingerprints } => {
                    println!("no match ({} query fingerprints)", fingerprints)
                }
                QueryOutcome::Rejected(rejection) => println!("skipped: {}", rejection),
            }
        }
        Command::Dump { db } => {
            let index = load_index(&db)?;
            info!(
                "{} fingerprints, {} entries, {} songs",
                index.len(),
                index.entry_count(),
                index.song_count()
            );
            let mut out = BufWriter::new(io::stdout().lock());
            db::write_to(&index, &mut out)?;
            out.flush()?;
        }
        Command::Plot {
            file,
            out,
            constellation,
            height,
        } => {
            let clip = load_wav(&file, cli.sample_rate)?;
            if let Err(rejection) = fingerprinter.check(&clip) {
                println!("skipped: {}", rejection);
                return Ok(());
            }
            let spectrogram = fingerprinter.spectrogram(&clip);
            if constellation {
                let peak_sets = fingerprinter.peak_sets(&clip, &spectrogram);
                visualize::render_constellation(&spectrogram, &peak_sets, height, &out)?;
            } else {
                visualize::render_spectrogram(&spectrogram, height, &out)?;
            }
        }
    }

    Ok(())
}

fn load_index(path: &Path) -> Result<songprint::FingerprintIndex, Box<dyn Error>> {
    let report = db::load(path)?;
    if let LoadStatus::Truncated { line, reason } = &report.status {
        eprintln!(
            "warning: {} is damaged at line {} ({}); using the {} records before it",
            path.display(),
            line,
            reason,
            report.records
        );
    }
    Ok(report.index)
}

fn song_name(path: &Path) -> Result<String, Box<dyn Error>> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.trim().replace(char::is_whitespace, "_"))
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| format!("cannot derive a song name from {}", path.display()).into())
}

fn slice(clip: &AudioClip, start: Option<u32>, end: Option<u32>) -> AudioClip {
    let start = start.unwrap_or(0);
    let end = end.unwrap_or_else(|| clip.duration_secs().ceil() as u32);
    clip.slice_secs(start, end)
}
