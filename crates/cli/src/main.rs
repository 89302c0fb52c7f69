use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use store::{
    BackendKind, SaveOutcome, SlotBackend, StaticTrackProvider, StoreConfig, TimelineEngine,
};
use timeline::{
    adjust_bar_time, apply_uniform_length, bar_choices, check_contiguity, delete_section_by_id,
    split_section, to_flat, EditOutcome, SongRecord,
};
use tracing::{debug, info, warn};

type Engine = TimelineEngine<Box<dyn SlotBackend>, StaticTrackProvider>;

#[derive(Parser)]
#[command(name = "barline")]
#[command(about = "Barline - inspect and edit bar/section timelines of songs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the marker records (defaults to the app data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Storage backend (fs, sqlite)
    #[arg(long, global = true, default_value = "fs")]
    backend: BackendKind,

    /// Track duration in seconds, used for new records
    #[arg(long, global = true)]
    duration: Option<f64>,

    /// Audio file of the track, recorded in new records
    #[arg(long, global = true)]
    audio: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the timeline of a song as JSON
    Show {
        song: String,

        /// Print the stored flat layout instead of nested sections
        #[arg(long)]
        flat: bool,
    },

    /// List the bars of a song as pick-list entries
    Bars { song: String },

    /// Build a timeline from two markers
    Generate {
        song: String,

        /// First marker in seconds
        first: f64,

        /// Second marker in seconds
        second: f64,
    },

    /// Shift the start of a bar and everything after it
    Adjust {
        song: String,

        /// Bar id
        bar: String,

        /// Signed shift in seconds
        #[arg(allow_hyphen_values = true)]
        shift: f64,
    },

    /// Give a bar and every following bar the same length
    Uniform {
        song: String,

        /// First bar to retime
        bar: String,

        /// Bar length in seconds
        length: f64,
    },

    /// Move a range of bars into a new section
    Split {
        song: String,

        /// Section to split
        section: String,

        /// First bar of the range
        start_bar: String,

        /// Last bar of the range
        end_bar: String,

        /// Type of the new section
        #[arg(long = "type", default_value = "section")]
        section_type: String,
    },

    /// Merge a section into the one before it
    DeleteSection { song: String, section: String },

    /// Mark the current timeline as approved
    Approve { song: String },

    /// List songs whose current timeline is approved
    Approved,

    /// List backup numbers of a song
    History { song: String },

    /// Verify that bars and sections tile the timeline without gaps
    Check { song: String },
}

/// Options shared by every subcommand.
struct Globals {
    config: StoreConfig,
    duration: Option<f64>,
    audio: Option<String>,
}

impl Globals {
    fn engine(&self, song: &str) -> Result<Engine> {
        let store = self
            .config
            .open()
            .with_context(|| format!("opening store at {}", self.config.root.display()))?;
        let mut tracks = StaticTrackProvider::new();
        if let Some(duration) = self.duration {
            tracks = tracks.with_track(song, duration, self.audio.clone());
        }
        Ok(TimelineEngine::new(store, tracks))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = StoreConfig::default();
    config.backend = cli.backend;
    if let Some(dir) = cli.data_dir {
        config.root = dir;
    }
    let globals = Globals {
        config,
        duration: cli.duration,
        audio: cli.audio,
    };
    debug!(root = %globals.config.root.display(), backend = %globals.config.backend, "store");

    match cli.command {
        Commands::Show { song, flat } => show_command(&globals, song, flat).await,
        Commands::Bars { song } => bars_command(&globals, song).await,
        Commands::Generate {
            song,
            first,
            second,
        } => generate_command(&globals, song, first, second).await,
        Commands::Adjust { song, bar, shift } => adjust_command(&globals, song, bar, shift).await,
        Commands::Uniform { song, bar, length } => {
            uniform_command(&globals, song, bar, length).await
        }
        Commands::Split {
            song,
            section,
            start_bar,
            end_bar,
            section_type,
        } => split_command(&globals, song, section, start_bar, end_bar, section_type).await,
        Commands::DeleteSection { song, section } => {
            delete_section_command(&globals, song, section).await
        }
        Commands::Approve { song } => approve_command(&globals, song).await,
        Commands::Approved => approved_command(&globals).await,
        Commands::History { song } => history_command(&globals, song).await,
        Commands::Check { song } => check_command(&globals, song).await,
    }
}

async fn show_command(globals: &Globals, song: String, flat: bool) -> Result<()> {
    let engine = globals.engine(&song)?;
    let record = engine
        .load_timeline(&song)
        .with_context(|| format!("loading timeline of {song}"))?;
    let json = if flat {
        serde_json::to_string_pretty(&to_flat(&record))?
    } else {
        serde_json::to_string_pretty(&record)?
    };
    println!("{json}");
    Ok(())
}

async fn bars_command(globals: &Globals, song: String) -> Result<()> {
    let engine = globals.engine(&song)?;
    let record = engine
        .load_timeline(&song)
        .with_context(|| format!("loading timeline of {song}"))?;
    for choice in bar_choices(&record.sections) {
        println!("{}\t{}", choice.id, choice.label);
    }
    Ok(())
}

async fn generate_command(globals: &Globals, song: String, first: f64, second: f64) -> Result<()> {
    if globals.duration.is_none() {
        warn!("no --duration given, generation needs the track length");
    }
    let engine = globals.engine(&song)?;
    let record = engine
        .generate_timeline(&song, first, second)
        .with_context(|| format!("generating timeline of {song}"))?;
    info!(
        "Generated {} sections with {} bars for {}",
        record.sections.len(),
        record.bar_count(),
        song
    );
    Ok(())
}

/// Loads `song`, applies `edit` to it and saves the result when the edit
/// changed anything.
fn edit_and_save<F>(globals: &Globals, song: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut SongRecord) -> Result<EditOutcome>,
{
    let engine = globals.engine(song)?;
    let mut record = engine
        .load_timeline(song)
        .with_context(|| format!("loading timeline of {song}"))?;

    match edit(&mut record)? {
        EditOutcome::SoftMiss { reason } => {
            warn!("Nothing changed: {}", reason);
            Ok(())
        }
        EditOutcome::Applied => {
            let outcome = engine
                .save_timeline(song, &record)
                .with_context(|| format!("saving timeline of {song}"))?;
            info!("Saved {} ({:?})", song, outcome);
            Ok(())
        }
    }
}

async fn adjust_command(globals: &Globals, song: String, bar: String, shift: f64) -> Result<()> {
    edit_and_save(globals, &song, |record| {
        adjust_bar_time(&mut record.sections, &bar, shift)
            .with_context(|| format!("shifting bar {bar} by {shift}s"))
    })
}

async fn uniform_command(globals: &Globals, song: String, bar: String, length: f64) -> Result<()> {
    edit_and_save(globals, &song, |record| {
        apply_uniform_length(&mut record.sections, &bar, length)
            .with_context(|| format!("retiming from bar {bar} to {length}s bars"))
    })
}

async fn split_command(
    globals: &Globals,
    song: String,
    section: String,
    start_bar: String,
    end_bar: String,
    section_type: String,
) -> Result<()> {
    edit_and_save(globals, &song, |record| {
        split_section(
            &mut record.sections,
            &section,
            &start_bar,
            &end_bar,
            &section_type,
        )
        .with_context(|| format!("splitting bars {start_bar}..{end_bar} out of {section}"))
    })
}

async fn delete_section_command(globals: &Globals, song: String, section: String) -> Result<()> {
    edit_and_save(globals, &song, |record| {
        delete_section_by_id(&mut record.sections, &section)
            .with_context(|| format!("deleting section {section}"))
    })
}

async fn approve_command(globals: &Globals, song: String) -> Result<()> {
    let engine = globals.engine(&song)?;
    let outcome = engine
        .approve(&song)
        .with_context(|| format!("approving {song}"))?;
    if outcome == SaveOutcome::Unchanged {
        info!("{} was already approved", song);
    } else {
        info!("Approved {}", song);
    }
    Ok(())
}

async fn approved_command(globals: &Globals) -> Result<()> {
    let engine = globals.engine("")?;
    for song in engine.approved_songs().context("listing approved songs")? {
        println!("{song}");
    }
    Ok(())
}

async fn history_command(globals: &Globals, song: String) -> Result<()> {
    let engine = globals.engine(&song)?;
    let versions = engine
        .history(&song)
        .with_context(|| format!("listing backups of {song}"))?;
    if versions.is_empty() {
        info!("No backups for {}", song);
    }
    for version in versions {
        println!("{}", store::backup_name(&song, version));
    }
    Ok(())
}

async fn check_command(globals: &Globals, song: String) -> Result<()> {
    let engine = globals.engine(&song)?;
    let record = engine
        .load_timeline(&song)
        .with_context(|| format!("loading timeline of {song}"))?;
    if let Err(e) = check_contiguity(&record.sections) {
        bail!("{song} is not contiguous: {e}");
    }
    info!(
        "{} is contiguous: {} sections, {} bars",
        song,
        record.sections.len(),
        record.bar_count()
    );
    Ok(())
}
