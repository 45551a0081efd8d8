use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::audio::producer::SampleProducer;
use crate::audio::voice::{PlaybackState, Voice};
use crate::audio::worker::StreamWorker;
use crate::config::StreamSettings;
use crate::error::{ConfigError, DeviceError, StreamError};

/// Highest channel count the engine will accept
pub const MAX_CHANNELS: u16 = 8;

/// Channel count and sample rate of a stream, set once before first play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub channel_count: u16,
    pub sample_rate: u32,
}

/// Fields read by the worker and written by the controlling thread
#[derive(Debug)]
pub(crate) struct Control {
    /// State the controller wants the device to be in
    pub(crate) desired: PlaybackState,
    /// Whether a worker is (or should be) active
    pub(crate) streaming: bool,
}

/// Shared state bridging the controller and the worker.
///
/// `control` is the only lock-protected piece; `looping` is deliberately
/// relaxed - a toggle mid-stream is observed within one polling interval,
/// not atomically with the rest of the state.
#[derive(Debug)]
pub(crate) struct StreamShared {
    pub(crate) control: Mutex<Control>,
    pub(crate) looping: AtomicBool,
    pub(crate) samples_processed: AtomicU64,
}

/// Streaming sound: plays audio too large to hold in memory by pulling
/// chunks from a producer on a background worker and cycling them through a
/// small pool of device buffers.
///
/// Play/pause/stop/seek behave like a fully-buffered sound; `stop()` and
/// teardown block until the worker has fully unwound, everything else is
/// non-blocking.
pub struct AudioStream {
    voice: Arc<Mutex<Option<Box<dyn Voice>>>>,
    producer: Arc<Mutex<Box<dyn SampleProducer>>>,
    shared: Arc<StreamShared>,
    format: Option<StreamFormat>,
    settings: StreamSettings,
    worker: Option<thread::JoinHandle<()>>,
}

impl AudioStream {
    pub fn new(voice: Box<dyn Voice>, producer: Box<dyn SampleProducer>) -> Self {
        Self::with_settings(voice, producer, StreamSettings::default())
    }

    pub fn with_settings(
        voice: Box<dyn Voice>,
        producer: Box<dyn SampleProducer>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            voice: Arc::new(Mutex::new(Some(voice))),
            producer: Arc::new(Mutex::new(producer)),
            shared: Arc::new(StreamShared {
                control: Mutex::new(Control {
                    desired: PlaybackState::Stopped,
                    streaming: false,
                }),
                looping: AtomicBool::new(false),
                samples_processed: AtomicU64::new(0),
            }),
            format: None,
            settings,
            worker: None,
        }
    }

    /// Set the stream format. Must be called before the first `play()`.
    pub fn initialize(&mut self, channel_count: u16, sample_rate: u32) -> Result<(), StreamError> {
        if channel_count == 0 || channel_count > MAX_CHANNELS {
            return Err(ConfigError::UnsupportedChannelCount {
                channels: channel_count,
            }
            .into());
        }
        if sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate { rate: sample_rate }.into());
        }

        // Re-initializing a live stream restarts it from a clean state
        if self.worker.is_some() {
            self.stop()?;
        }

        self.format = Some(StreamFormat {
            channel_count,
            sample_rate,
        });
        Ok(())
    }

    /// Start or resume playback. Non-blocking: returns once the worker is
    /// launched, overlapping with or preceding actual device playback.
    pub fn play(&mut self) -> Result<(), StreamError> {
        let format = self.format.ok_or(ConfigError::NotInitialized)?;

        if self.voice.lock().unwrap().is_none() {
            warn!("play() called without a playback handle, ignoring");
            return Ok(());
        }

        self.reap_finished_worker();

        enum Action {
            Resume,
            Restart,
            Fresh,
        }

        let action = {
            let mut control = self.shared.control.lock().unwrap();
            if control.streaming {
                if control.desired == PlaybackState::Paused {
                    control.desired = PlaybackState::Playing;
                    Action::Resume
                } else {
                    Action::Restart
                }
            } else {
                Action::Fresh
            }
        };

        match action {
            Action::Resume => {
                // Worker keeps running; just nudge the device back into playback
                return self.device_call(|voice| voice.play());
            }
            Action::Restart => {
                // Restart from a consistent state rather than rewinding in place
                self.stop()?;
            }
            Action::Fresh => {}
        }

        self.producer.lock().unwrap().seek(Duration::ZERO);
        self.shared.samples_processed.store(0, Ordering::Relaxed);
        self.launch_worker(PlaybackState::Playing, format)?;
        info!(
            "playback started ({} ch, {} Hz)",
            format.channel_count, format.sample_rate
        );
        Ok(())
    }

    /// Pause playback in place. No-op when no worker is active.
    pub fn pause(&mut self) -> Result<(), StreamError> {
        {
            let mut control = self.shared.control.lock().unwrap();
            if !control.streaming {
                return Ok(());
            }
            control.desired = PlaybackState::Paused;
        }
        self.device_call(|voice| voice.pause())
    }

    /// Stop playback and block until the worker has fully unwound.
    ///
    /// Idempotent; after it returns no worker is touching the buffer ring,
    /// the producer is rewound and the playing offset reads zero.
    pub fn stop(&mut self) -> Result<(), StreamError> {
        {
            self.shared.control.lock().unwrap().streaming = false;
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("stream worker panicked during shutdown");
            }
        }

        self.producer.lock().unwrap().seek(Duration::ZERO);
        self.shared.samples_processed.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Current playback status.
    ///
    /// The device momentarily reports Stopped between a play request and
    /// actual playback; while a worker is active that transient reading is
    /// replaced by the requested state. The window is bounded structurally:
    /// the worker clears the streaming flag on any device failure or true
    /// end of stream.
    pub fn status(&self) -> PlaybackState {
        let device_state = {
            let guard = self.voice.lock().unwrap();
            match guard.as_ref() {
                Some(voice) => voice.state(),
                None => PlaybackState::Stopped,
            }
        };

        if device_state == PlaybackState::Stopped {
            let control = self.shared.control.lock().unwrap();
            if control.streaming {
                return control.desired;
            }
        }

        device_state
    }

    /// Time played since the start of the stream, capped at `duration()`
    pub fn playing_offset(&self) -> Duration {
        let Some(format) = self.format else {
            return Duration::ZERO;
        };

        let device_offset = {
            let guard = self.voice.lock().unwrap();
            match guard.as_ref() {
                Some(voice) => voice.playback_position(),
                None => Duration::ZERO,
            }
        };

        let processed = self.shared.samples_processed.load(Ordering::Relaxed);
        let processed_time = Duration::from_secs_f64(
            processed as f64 / (format.sample_rate as f64 * format.channel_count as f64),
        );

        (device_offset + processed_time).min(self.duration())
    }

    /// Jump to a position in the stream, preserving the playing/paused state
    pub fn set_playing_offset(&mut self, offset: Duration) -> Result<(), StreamError> {
        let format = self.format.ok_or(ConfigError::NotInitialized)?;

        let previous = self.status();
        self.stop()?;

        let target = offset.min(self.duration());
        self.producer.lock().unwrap().seek(target);
        let samples = (target.as_secs_f64()
            * format.sample_rate as f64
            * format.channel_count as f64) as u64;
        self.shared.samples_processed.store(samples, Ordering::Relaxed);

        match previous {
            PlaybackState::Stopped => Ok(()),
            resumed => self.launch_worker(resumed, format),
        }
    }

    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Relaxed)
    }

    /// Toggle looping. Takes effect within one polling interval.
    pub fn set_looping(&mut self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }

    /// Total duration of the underlying source
    pub fn duration(&self) -> Duration {
        self.producer.lock().unwrap().duration()
    }

    pub fn format(&self) -> Option<StreamFormat> {
        self.format
    }

    /// Samples consumed since the last position reset (stop, seek, loop wrap)
    pub fn processed_samples(&self) -> u64 {
        self.shared.samples_processed.load(Ordering::Relaxed)
    }

    /// Take the playback handle away from the stream.
    ///
    /// A worker caught mid-cycle ends that cycle as if the device failed;
    /// subsequent play/pause/stop calls become warning-level no-ops.
    pub fn detach_voice(&mut self) -> Option<Box<dyn Voice>> {
        self.voice.lock().unwrap().take()
    }

    /// Force a full stop-and-join, then release the playback handle
    pub fn shutdown(&mut self) {
        {
            self.shared.control.lock().unwrap().streaming = false;
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        *self.voice.lock().unwrap() = None;
    }

    /// Launch a new worker. The previous cycle's thread, if any, must have
    /// terminated; a finished handle is joined here before the new start.
    fn launch_worker(
        &mut self,
        desired: PlaybackState,
        format: StreamFormat,
    ) -> Result<(), StreamError> {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        {
            let mut control = self.shared.control.lock().unwrap();
            control.streaming = true;
            control.desired = desired;
        }

        let worker = StreamWorker::new(
            Arc::clone(&self.voice),
            Arc::clone(&self.producer),
            Arc::clone(&self.shared),
            format,
            self.settings.clone(),
        );

        let handle = thread::Builder::new()
            .name("sound-stream".to_string())
            .spawn(move || worker.run())
            .map_err(|e| {
                self.shared.control.lock().unwrap().streaming = false;
                DeviceError::Backend(format!("failed to spawn stream worker: {}", e))
            })?;

        self.worker = Some(handle);
        Ok(())
    }

    /// Short bracket call into the device; a missing handle is a warning,
    /// any other device failure propagates to the caller.
    fn device_call(
        &self,
        operation: impl FnOnce(&mut dyn Voice) -> Result<(), DeviceError>,
    ) -> Result<(), StreamError> {
        let mut guard = self.voice.lock().unwrap();
        match guard.as_mut() {
            Some(voice) => operation(voice.as_mut()).map_err(StreamError::from),
            None => {
                warn!("device command ignored: playback handle not available");
                Ok(())
            }
        }
    }

    /// Join a worker whose cycle already ended so a new one can start
    fn reap_finished_worker(&mut self) {
        if self
            .worker
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(false)
        {
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}
