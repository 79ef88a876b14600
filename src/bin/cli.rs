//! stave CLI: inspect, play, convert and split songs.
//!
//! Usage:
//!   stave-cli info song.sho
//!   stave-cli play song.sho --from 8
//!   stave-cli export song.sho out.wav
//!   stave-cli split long.sho slices.zs0

use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{crate_version, Parser, Subcommand};
use stave_master::{Command, Controller, Outcome, SaveKind, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(version = crate_version!(), about = "Three-channel note grid sequencer.")]
struct Cli {
    /// Settings file (YAML). `STAVE_*` environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the fields and note count of a song.
    Info {
        /// The song file (.sho, .zst, .zs0-.zs9, .z00-.z99, .000-.999).
        path: PathBuf,
    },
    /// Plays a song through the default audio device.
    Play {
        path: PathBuf,
        /// Beat to start from.
        #[arg(short, long, default_value_t = 0)]
        from: usize,
        /// Stop after this many seconds, even if the song loops.
        #[arg(short, long)]
        seconds: Option<u64>,
    },
    /// Saves a song under another name; the extension picks the format.
    /// A .zst target must already exist. A .wav target is a rendering.
    Export { path: PathBuf, output: PathBuf },
    /// Splits a song into 96-beat savestates: name.zs0, name.zs1, ...
    Split { path: PathBuf, output: PathBuf },
    /// Checks a song for errors, or a sample sheet for its entry count.
    Check { path: PathBuf },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { path } => {
            let loaded = stave_formats::load_song(&path)?;
            let song = &loaded.song;
            let notes: usize = song
                .columns()
                .iter()
                .flatten()
                .filter(|cell| cell.is_playable())
                .count();

            println!("Title:    {}", song.title);
            println!("Author:   {}", song.author);
            println!("Length:   {} / {} beats", song.length(), song.limit());
            println!("Tempo:    {}", song.tempo);
            println!("Metre:    {}/4", song.metre.beats());
            println!("Loop:     {}", if song.looping { "on" } else { "off" });
            println!("Notes:    {}", notes);
            if loaded.corrected {
                println!("Errors were found in the file and corrected.");
            }
        }
        Commands::Play { path, from, seconds } => {
            let mut ctrl = Controller::new(settings)?;
            load(&mut ctrl, &path)?;
            let rate = ctrl.start_audio()?;
            println!("Playing at {} Hz...", rate);

            ctrl.execute(Command::SetScroll(from))?;
            ctrl.execute(Command::PlayFromView)?;
            play_until_done(&mut ctrl, seconds.map(Duration::from_secs));
            ctrl.stop_audio();
            println!("\rDone.          ");
        }
        Commands::Export { path, output } => {
            let mut ctrl = Controller::new(settings)?;
            load(&mut ctrl, &path)?;
            match ctrl.execute(Command::Save(output.clone()))? {
                Outcome::Saved(SaveKind::Export) => println!("Rendered {}", output.display()),
                _ => println!("Saved {}", output.display()),
            }
        }
        Commands::Split { path, output } => {
            let mut ctrl = Controller::new(settings)?;
            load(&mut ctrl, &path)?;
            if let Outcome::Written(paths) = ctrl.execute(Command::MultiSave(output))? {
                for path in paths {
                    println!("- {}", path.display());
                }
            }
        }
        Commands::Check { path } => check(&path)?,
    }

    Ok(())
}

fn load(ctrl: &mut Controller, path: &Path) -> Result<(), Box<dyn Error>> {
    let outcome = ctrl.execute(Command::Load {
        path: path.to_path_buf(),
        discard_changes: true,
    })?;
    if outcome == Outcome::Corrected {
        println!("Errors were found in the file. These have been automatically corrected.");
    }
    Ok(())
}

fn play_until_done(ctrl: &mut Controller, limit: Option<Duration>) {
    let start = Instant::now();
    let mut last = start;

    while ctrl.is_playing() {
        std::thread::sleep(Duration::from_millis(10));
        let now = Instant::now();
        ctrl.update(now.duration_since(last).as_millis() as u32);
        last = now;

        if let Some(beat) = ctrl.playback_beat() {
            print!("\rBeat: {:4}", beat);
            let _ = std::io::stdout().flush();
        }
        if limit.is_some_and(|limit| now.duration_since(start) >= limit) {
            info!("time limit reached");
            let _ = ctrl.execute(Command::Stop);
        }
    }
}

fn check(path: &Path) -> Result<(), Box<dyn Error>> {
    if stave_formats::Format::from_path(path)? == stave_formats::Format::Wav {
        let bank = stave_formats::load_sample_sheet(path)?;
        println!(
            "{}: {} of {} entries",
            path.display(),
            bank.loaded(),
            stave_engine::BANK_SIZE
        );
        return Ok(());
    }

    let loaded = stave_formats::load_song(path)?;
    if loaded.corrected {
        println!("{}: errors corrected on load", path.display());
    } else {
        println!("{}: ok", path.display());
    }
    Ok(())
}
