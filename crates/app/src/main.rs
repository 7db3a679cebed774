use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use arranger_core::{
    AudioOutput, EngineConfig, ExportFormat, NullOutput, PlayheadStep, Project, Session,
    SoundLibrary, load_project, load_project_metadata, open_output,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Playhead refresh interval while playing.
const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "arranger")]
#[command(about = "Inspect, render and play audio arrangements")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of an arrangement file
    Info {
        /// Arrangement file (JSON or MessagePack)
        project: PathBuf,
    },

    /// Mix an arrangement down to a WAV or MP3 file
    Render {
        project: PathBuf,

        /// Directory sound ids are resolved against (defaults to the project's directory)
        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// wav or mp3 (defaults to the output extension)
        #[arg(long)]
        format: Option<ExportFormat>,

        #[arg(long)]
        sample_rate: Option<u32>,

        /// 1 or 2
        #[arg(long)]
        channels: Option<u16>,

        /// MP3 bitrate in kbps
        #[arg(long)]
        bitrate: Option<u32>,
    },

    /// Play an arrangement on the default output device
    Play {
        project: PathBuf,

        #[arg(short, long)]
        library: Option<PathBuf>,

        /// Start position in seconds
        #[arg(long, default_value_t = 0.0)]
        from: f64,

        /// Loop region as START:END in seconds; plays until interrupted
        #[arg(long = "loop", value_parser = parse_loop)]
        loop_region: Option<(f64, f64)>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path),
        None => EngineConfig::load(),
    };

    match cli.command {
        Commands::Info { project } => info_command(&project),
        Commands::Render {
            project,
            library,
            output,
            format,
            sample_rate,
            channels,
            bitrate,
        } => {
            let mut config = config;
            if let Some(rate) = sample_rate {
                config.export.sample_rate = rate;
            }
            if let Some(channels) = channels {
                config.export.channels = channels;
            }
            if let Some(bitrate) = bitrate {
                config.export.mp3_bitrate_kbps = bitrate;
            }
            render_command(&project, library, &output, format, config)
        }
        Commands::Play {
            project,
            library,
            from,
            loop_region,
        } => play_command(&project, library, from, loop_region, config),
    }
}

fn info_command(path: &Path) -> Result<()> {
    let metadata = load_project_metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    println!("name:     {}", metadata.name);
    println!("bpm:      {}", metadata.bpm);
    println!("duration: {:.3} s", metadata.duration);
    println!("tracks:   {}", metadata.track_count);
    println!("clips:    {}", metadata.clip_count);
    Ok(())
}

fn open_session<O: AudioOutput>(
    output: O,
    path: &Path,
    library: Option<PathBuf>,
    config: EngineConfig,
) -> Result<Session<O>> {
    let project: Project =
        load_project(path).with_context(|| format!("failed to read {}", path.display()))?;

    let root = library.unwrap_or_else(|| {
        path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let mut sounds = SoundLibrary::new(&root);

    let (mut session, offline) = Session::from_project(output, config, &project, &mut sounds);
    session.set_sound_root(root);
    for clip in &offline {
        warn!(
            track = %clip.track_id,
            sound_id = clip.sound_id,
            start = clip.start_time,
            "clip offline: {}",
            clip.error
        );
    }
    Ok(session)
}

fn render_command(
    path: &Path,
    library: Option<PathBuf>,
    output: &Path,
    format: Option<ExportFormat>,
    config: EngineConfig,
) -> Result<()> {
    let format = match format {
        Some(format) => format,
        None => output
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or(ExportFormat::Wav),
    };

    let session = open_session(NullOutput::new(), path, library, config)?;
    let exported = session.export(format)?;

    std::fs::write(output, &exported.bytes)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        output = %output.display(),
        mime = exported.mime(),
        bytes = exported.bytes.len(),
        "render complete"
    );
    Ok(())
}

fn play_command(
    path: &Path,
    library: Option<PathBuf>,
    from: f64,
    loop_region: Option<(f64, f64)>,
    config: EngineConfig,
) -> Result<()> {
    let output = open_output()?;
    let mut session = open_session(output, path, library, config)?;

    if session.arrangement().duration() <= 0.0 {
        anyhow::bail!("{} has nothing to play", path.display());
    }

    session.set_loop(loop_region)?;
    session.seek(from)?;
    let report = session.play()?;
    info!(
        name = session.name(),
        from,
        scheduled = report.scheduled,
        device_rate = session.output().sample_rate(),
        "playing"
    );

    let mut last = Instant::now();
    loop {
        std::thread::sleep(FRAME);
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        if let PlayheadStep::Ended(position) = session.tick(dt)? {
            info!(position, "playback finished");
            break;
        }
    }

    Ok(())
}

fn parse_loop(s: &str) -> Result<(f64, f64), String> {
    let (start, end) = s
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{s}'"))?;
    let start: f64 = start
        .trim()
        .parse()
        .map_err(|e| format!("invalid loop start '{start}': {e}"))?;
    let end: f64 = end
        .trim()
        .parse()
        .map_err(|e| format!("invalid loop end '{end}': {e}"))?;
    if end <= start {
        return Err(format!("loop end {end} must be after start {start}"));
    }
    Ok((start, end))
}
