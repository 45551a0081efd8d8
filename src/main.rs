use clap::Parser;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sound_stream::{
    AudioStream, CpalVoice, PlaybackState, SettingsManager, StreamError, StreamEventType,
    StreamLogger, ToneProducer,
};

/// Stream a generated tone through the default output device
#[derive(Parser, Debug)]
#[command(name = "stream-play", version, about)]
struct Args {
    /// Tone frequency in Hz
    #[arg(short, long, default_value_t = 440.0)]
    frequency: f32,

    /// Length of the tone in seconds
    #[arg(short, long, default_value_t = 3.0)]
    seconds: f64,

    /// Restart from the beginning when the tone ends
    #[arg(short, long)]
    looping: bool,

    /// Start playback this many seconds into the tone
    #[arg(short, long)]
    offset: Option<f64>,

    /// Output channel count
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,
}

fn main() {
    if let Err(e) = StreamLogger::init() {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e.user_message());
        for suggestion in e.recovery_suggestions() {
            eprintln!("  - {}", suggestion);
        }
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), StreamError> {
    let journal = StreamLogger::new();

    let settings = match SettingsManager::new() {
        Ok(manager) => manager.get_settings().clone(),
        Err(e) => {
            warn!("falling back to default settings: {}", e);
            Default::default()
        }
    };

    let voice = CpalVoice::open_default(args.channels, args.sample_rate)?;
    let producer = ToneProducer::new(
        args.frequency,
        Duration::from_secs_f64(args.seconds),
        args.channels,
        args.sample_rate,
    );

    let mut stream = AudioStream::with_settings(Box::new(voice), Box::new(producer), settings);
    stream.initialize(args.channels, args.sample_rate)?;
    stream.set_looping(args.looping);

    if let Some(offset) = args.offset {
        stream.set_playing_offset(Duration::from_secs_f64(offset))?;
        journal.log_event(
            StreamEventType::SeekApplied,
            format!("starting {}s into the tone", offset),
        );
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .map_err(|e| {
            sound_stream::DeviceError::Backend(format!("failed to install signal handler: {}", e))
        })?;
    }

    stream.play()?;
    journal.log_event(
        StreamEventType::PlaybackStarted,
        format!("{} Hz tone, {}s", args.frequency, args.seconds),
    );

    println!(
        "Playing a {} Hz tone for {}s{} (Ctrl-C to stop)",
        args.frequency,
        args.seconds,
        if args.looping { ", looping" } else { "" }
    );

    loop {
        if interrupted.load(Ordering::SeqCst) {
            println!();
            info!("interrupted, stopping playback");
            break;
        }
        if stream.status() == PlaybackState::Stopped {
            println!();
            break;
        }

        let position = stream.playing_offset();
        print!(
            "\r  {:6.2}s / {:.2}s",
            position.as_secs_f64(),
            stream.duration().as_secs_f64()
        );
        use std::io::Write;
        let _ = std::io::stdout().flush();

        std::thread::sleep(Duration::from_millis(100));
    }

    stream.stop()?;
    journal.log_event(StreamEventType::PlaybackStopped, "playback finished");
    Ok(())
}
