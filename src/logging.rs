use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use chrono::{DateTime, Utc};

/// Stream event for logging and debugging
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: StreamEventType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEventType {
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    SeekApplied,
    LoopWrap,
    StarvationResume,
    DataCorruption,
    DeviceFailure,
}

impl StreamEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamEventType::PlaybackStarted => "PLAYBACK_STARTED",
            StreamEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            StreamEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            StreamEventType::SeekApplied => "SEEK_APPLIED",
            StreamEventType::LoopWrap => "LOOP_WRAP",
            StreamEventType::StarvationResume => "STARVATION_RESUME",
            StreamEventType::DataCorruption => "DATA_CORRUPTION",
            StreamEventType::DeviceFailure => "DEVICE_FAILURE",
        }
    }

    fn log_level(&self) -> log::Level {
        match self {
            StreamEventType::PlaybackStarted
            | StreamEventType::PlaybackPaused
            | StreamEventType::PlaybackStopped
            | StreamEventType::SeekApplied => log::Level::Info,
            StreamEventType::LoopWrap => log::Level::Debug,
            StreamEventType::StarvationResume => log::Level::Warn,
            StreamEventType::DataCorruption | StreamEventType::DeviceFailure => log::Level::Error,
        }
    }
}

/// Logger for streaming engine operations and debugging
#[derive(Clone)]
pub struct StreamLogger {
    events: Arc<Mutex<VecDeque<StreamEvent>>>,
    max_events: usize,
}

impl StreamLogger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: 1000, // Keep last 1000 events
        }
    }

    /// Initialize logging system with appropriate log level
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        // Set log level based on environment variable or default to Info
        let log_level = std::env::var("SOUND_STREAM_LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        // Set custom format for better readability
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        // Parse and set log level
        match log_level.to_lowercase().as_str() {
            "trace" => builder.filter_level(log::LevelFilter::Trace),
            "debug" => builder.filter_level(log::LevelFilter::Debug),
            "info" => builder.filter_level(log::LevelFilter::Info),
            "warn" => builder.filter_level(log::LevelFilter::Warn),
            "error" => builder.filter_level(log::LevelFilter::Error),
            _ => builder.filter_level(log::LevelFilter::Info),
        };

        builder.try_init()?;
        Ok(())
    }

    /// Record an event in the journal and forward it to the log facade
    pub fn log_event(&self, event_type: StreamEventType, details: impl Into<String>) {
        let details = details.into();
        let event = StreamEvent {
            timestamp: Utc::now(),
            event_type,
            details: details.clone(),
        };

        match event_type.log_level() {
            log::Level::Error => error!("{}: {}", event_type.as_str(), details),
            log::Level::Warn => warn!("{}: {}", event_type.as_str(), details),
            log::Level::Info => info!("{}: {}", event_type.as_str(), details),
            _ => debug!("{}: {}", event_type.as_str(), details),
        }

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    /// Convenience wrapper for position-related events
    pub fn log_seek(&self, target: Duration) {
        self.log_event(
            StreamEventType::SeekApplied,
            format!("playing offset set to {:.3}s", target.as_secs_f64()),
        );
    }

    /// Get the most recent events, newest last
    pub fn recent_events(&self, count: usize) -> Vec<StreamEvent> {
        if let Ok(events) = self.events.lock() {
            events.iter().rev().take(count).rev().cloned().collect()
        } else {
            Vec::new()
        }
    }

    /// Count events of a given type currently held in the journal
    pub fn count_events(&self, event_type: StreamEventType) -> usize {
        if let Ok(events) = self.events.lock() {
            events.iter().filter(|e| e.event_type == event_type).count()
        } else {
            0
        }
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for StreamLogger {
    fn default() -> Self {
        Self::new()
    }
}
