//! Continuous audio streaming engine.
//!
//! Feeds an output device from sources too large (or too unbounded) to hold
//! in memory: a small ring of device buffers is kept topped up by a
//! background worker that pulls chunks from a [`SampleProducer`]. On top of
//! that sits a play/pause/stop/seek interface that behaves like an in-memory
//! sound, including looping and a playback position that stays consistent
//! across buffer recycling.

pub mod audio;
pub mod config;
pub mod error;
pub mod logging;

pub use audio::{
    AudioStream, BufferRing, Chunk, CpalVoice, PlaybackState, SampleProducer, StreamFormat,
    ToneProducer, Voice, BUFFER_COUNT, MAX_CHANNELS,
};
pub use config::{SettingsManager, StreamSettings};
pub use error::{ConfigError, DeviceError, StreamError};
pub use logging::{StreamEvent, StreamEventType, StreamLogger};
