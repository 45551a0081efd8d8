use thiserror::Error;

/// Main error type for the streaming engine
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),
}

impl StreamError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            StreamError::Config(err) => err.user_message(),
            StreamError::Device(err) => err.user_message(),
        }
    }

    /// Actionable suggestions to accompany the user message
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            StreamError::Config(err) => err.recovery_suggestions(),
            StreamError::Device(err) => err.recovery_suggestions(),
        }
    }

    /// Check if this error allows for automatic recovery
    pub fn is_recoverable(&self) -> bool {
        match self {
            StreamError::Config(err) => err.is_recoverable(),
            StreamError::Device(err) => err.is_recoverable(),
        }
    }
}

/// Configuration errors: stream format problems and settings-file problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stream format has not been initialized")]
    NotInitialized,

    #[error("unsupported channel count: {channels}")]
    UnsupportedChannelCount { channels: u16 },

    #[error("invalid sample rate: {rate}")]
    InvalidSampleRate { rate: u32 },

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::NotInitialized => {
                "Stream was played before its format was set - call initialize() first".to_string()
            }
            ConfigError::UnsupportedChannelCount { channels } => {
                format!("{} channels are not supported (expected 1 to 8)", channels)
            }
            ConfigError::InvalidSampleRate { rate } => {
                format!("Sample rate {} Hz is not a valid stream rate", rate)
            }
            ConfigError::InvalidSetting(msg) => {
                format!("Invalid setting value: {}", msg)
            }
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::NotInitialized => vec![
                "Call initialize(channel_count, sample_rate) before the first play()".to_string(),
            ],
            ConfigError::UnsupportedChannelCount { .. } => vec![
                "Use a channel count between 1 (mono) and 8 (7.1 surround)".to_string(),
            ],
            ConfigError::InvalidSampleRate { .. } => vec![
                "Use a positive sample rate (common rates: 44100, 48000, 96000 Hz)".to_string(),
            ],
            ConfigError::InvalidSetting(_) => vec![
                "Reset settings to defaults or fix the offending value".to_string(),
            ],
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Try deleting and recreating the configuration file".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Settings will keep their current in-memory values".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            ConfigError::NotInitialized => true, // Caller can initialize and retry
            ConfigError::UnsupportedChannelCount { .. } => false,
            ConfigError::InvalidSampleRate { .. } => false,
            ConfigError::InvalidSetting(_) => true, // Defaults can be used instead
            ConfigError::ConfigDirNotFound => true,
            ConfigError::IoError(_) => true,
            ConfigError::SerializationError(_) => true,
            ConfigError::DeserializationError(_) => true,
        }
    }
}

/// Playback-handle errors; every device interaction is validated immediately
/// and a failure ends the current streaming cycle
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("playback handle is no longer available")]
    HandleLost,

    #[error("no processed buffer available to unqueue")]
    NoBufferReady,

    #[error("unknown buffer handle: {id}")]
    UnknownBuffer { id: u32 },

    #[error("buffer format mismatch: {0}")]
    FormatMismatch(String),

    #[error("audio backend error: {0}")]
    Backend(String),
}

impl DeviceError {
    pub fn user_message(&self) -> String {
        match self {
            DeviceError::HandleLost => {
                "The playback device went away - the sound was detached or torn down".to_string()
            }
            DeviceError::NoBufferReady => {
                "The device had no finished buffer to hand back".to_string()
            }
            DeviceError::UnknownBuffer { id } => {
                format!("Buffer handle {} is not known to this voice", id)
            }
            DeviceError::FormatMismatch(msg) => {
                format!("Queued audio does not match the voice format: {}", msg)
            }
            DeviceError::Backend(msg) => {
                format!("Audio playback interrupted: {}", msg)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            DeviceError::HandleLost => vec![
                "Attach a new voice before playing again".to_string(),
            ],
            DeviceError::NoBufferReady => vec![
                "This is usually transient - the next poll will pick the buffer up".to_string(),
            ],
            DeviceError::UnknownBuffer { .. } => vec![
                "Stop and restart playback to rebuild the buffer ring".to_string(),
            ],
            DeviceError::FormatMismatch(_) => vec![
                "Re-initialize the stream with the channel count and sample rate of the voice".to_string(),
            ],
            DeviceError::Backend(_) => vec![
                "Try stopping and restarting playback".to_string(),
                "Check audio device connections".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            DeviceError::HandleLost => false, // Requires a new voice
            DeviceError::NoBufferReady => true,
            DeviceError::UnknownBuffer { .. } => true, // A restart rebuilds the ring
            DeviceError::FormatMismatch(_) => false,
            DeviceError::Backend(_) => true,
        }
    }
}
