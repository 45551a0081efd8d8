use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use log::{debug, error, info, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::audio::voice::{BufferId, PlaybackState, Voice};
use crate::error::DeviceError;

const BITS_PER_SAMPLE: u16 = 16;

/// Samples uploaded into one device buffer
#[derive(Debug, Default)]
struct BufferData {
    samples: Vec<i16>,
    queued: bool,
}

/// State shared between the controlling side and the output callback
#[derive(Debug)]
struct VoiceShared {
    state: PlaybackState,
    buffers: HashMap<BufferId, BufferData>,
    /// Buffers waiting to be consumed; the front one is being played
    queue: VecDeque<BufferId>,
    /// Buffers fully consumed but not yet handed back
    consumed: VecDeque<BufferId>,
    /// Play cursor within the front buffer, in samples
    cursor: usize,
    /// Total sample count of the buffers in `consumed`
    consumed_samples: u64,
    next_id: BufferId,
}

impl VoiceShared {
    fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            buffers: HashMap::new(),
            queue: VecDeque::new(),
            consumed: VecDeque::new(),
            cursor: 0,
            consumed_samples: 0,
            next_id: 1,
        }
    }

    /// Pull one sample for the output callback, advancing the queue.
    /// Returns None once the queue is exhausted.
    fn next_sample(&mut self) -> Option<i16> {
        loop {
            let front = *self.queue.front()?;
            let (len, sample) = {
                let data = self.buffers.get(&front)?;
                (data.samples.len(), data.samples.get(self.cursor).copied())
            };

            if let Some(sample) = sample {
                self.cursor += 1;
                return Some(sample);
            }

            // Front buffer drained: hand it to the consumed list
            self.queue.pop_front();
            self.consumed.push_back(front);
            self.consumed_samples += len as u64;
            self.cursor = 0;
        }
    }
}

/// Voice backed by a cpal output stream.
///
/// cpal streams are not `Send`, so the stream is built and owned by a
/// dedicated thread; this handle only touches the shared queue state. The
/// output callback consumes queued buffers while the state is Playing and
/// flips the state back to Stopped on its own once the queue runs dry.
pub struct CpalVoice {
    shared: Arc<Mutex<VoiceShared>>,
    channels: u16,
    sample_rate: u32,
    shutdown: Arc<AtomicBool>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl CpalVoice {
    /// Open the default output device with the given stream format
    pub fn open_default(channels: u16, sample_rate: u32) -> Result<Self, DeviceError> {
        let shared = Arc::new(Mutex::new(VoiceShared::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_shared = Arc::clone(&shared);
        let thread_shutdown = Arc::clone(&shutdown);
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), DeviceError>>();

        let output_thread = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                match Self::run_output(channels, sample_rate, thread_shared, &thread_shutdown) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Keep the stream alive until shutdown
                        while !thread_shutdown.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(50));
                        }
                        drop(stream);
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                    }
                }
            })
            .map_err(|e| DeviceError::Backend(format!("failed to spawn output thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("output device opened ({} ch, {} Hz)", channels, sample_rate);
                Ok(Self {
                    shared,
                    channels,
                    sample_rate,
                    shutdown,
                    output_thread: Some(output_thread),
                })
            }
            Ok(Err(err)) => {
                let _ = output_thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = output_thread.join();
                Err(DeviceError::Backend(
                    "output thread exited before reporting readiness".to_string(),
                ))
            }
        }
    }

    /// Build and start the cpal stream. Runs on the output thread; the
    /// returned stream must stay on that thread.
    fn run_output(
        channels: u16,
        sample_rate: u32,
        shared: Arc<Mutex<VoiceShared>>,
        _shutdown: &AtomicBool,
    ) -> Result<cpal::Stream, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| DeviceError::Backend("no output device available".to_string()))?;

        let default_config = device
            .default_output_config()
            .map_err(|e| DeviceError::Backend(format!("failed to query output config: {}", e)))?;

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        debug!(
            "building output stream: {} ch, {} Hz, {:?}",
            channels,
            sample_rate,
            default_config.sample_format()
        );

        let stream = match default_config.sample_format() {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, shared)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, shared)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, shared)?,
            other => {
                return Err(DeviceError::FormatMismatch(format!(
                    "unsupported device sample format: {:?}",
                    other
                )))
            }
        };

        stream
            .play()
            .map_err(|e| DeviceError::Backend(format!("failed to start output stream: {}", e)))?;

        Ok(stream)
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        shared: Arc<Mutex<VoiceShared>>,
    ) -> Result<cpal::Stream, DeviceError>
    where
        T: cpal::SizedSample + cpal::FromSample<i16>,
    {
        device
            .build_output_stream(
                config,
                move |output: &mut [T], _| {
                    // Never block the audio callback on the queue lock
                    let Ok(mut guard) = shared.try_lock() else {
                        output.fill(T::from_sample(0i16));
                        return;
                    };

                    for slot in output.iter_mut() {
                        let sample = if guard.state == PlaybackState::Playing {
                            guard.next_sample()
                        } else {
                            None
                        };
                        *slot = T::from_sample(sample.unwrap_or(0));
                    }

                    // Ran dry while playing: report Stopped so the feeding
                    // side can tell starvation from normal progress
                    if guard.state == PlaybackState::Playing && guard.queue.is_empty() {
                        guard.state = PlaybackState::Stopped;
                    }
                },
                |err| error!("output stream error: {}", err),
                None,
            )
            .map_err(|e| DeviceError::Backend(format!("failed to build output stream: {}", e)))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VoiceShared> {
        self.shared.lock().unwrap()
    }
}

impl Voice for CpalVoice {
    fn play(&mut self) -> Result<(), DeviceError> {
        self.lock().state = PlaybackState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        let mut guard = self.lock();
        if guard.state == PlaybackState::Playing {
            guard.state = PlaybackState::Paused;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        let mut guard = self.lock();
        guard.state = PlaybackState::Stopped;
        guard.cursor = 0;
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        self.lock().state
    }

    fn processed_buffers(&mut self) -> Result<usize, DeviceError> {
        Ok(self.lock().consumed.len())
    }

    fn queued_buffers(&self) -> usize {
        let guard = self.lock();
        guard.queue.len() + guard.consumed.len()
    }

    fn create_buffer(&mut self) -> Result<BufferId, DeviceError> {
        let mut guard = self.lock();
        let id = guard.next_id;
        guard.next_id += 1;
        guard.buffers.insert(id, BufferData::default());
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), DeviceError> {
        let mut guard = self.lock();
        match guard.buffers.get(&id) {
            Some(data) if data.queued => Err(DeviceError::Backend(format!(
                "buffer {} is still queued",
                id
            ))),
            Some(_) => {
                guard.buffers.remove(&id);
                Ok(())
            }
            None => Err(DeviceError::UnknownBuffer { id }),
        }
    }

    fn queue_buffer(
        &mut self,
        id: BufferId,
        samples: &[i16],
        channels: u16,
        sample_rate: u32,
    ) -> Result<(), DeviceError> {
        if channels != self.channels || sample_rate != self.sample_rate {
            return Err(DeviceError::FormatMismatch(format!(
                "buffer format {} ch / {} Hz does not match voice format {} ch / {} Hz",
                channels, sample_rate, self.channels, self.sample_rate
            )));
        }

        let mut guard = self.lock();
        let data = guard
            .buffers
            .get_mut(&id)
            .ok_or(DeviceError::UnknownBuffer { id })?;
        data.samples.clear();
        data.samples.extend_from_slice(samples);
        data.queued = true;
        guard.queue.push_back(id);
        Ok(())
    }

    fn unqueue_buffer(&mut self) -> Result<BufferId, DeviceError> {
        let mut guard = self.lock();

        // Consumed buffers first; after a stop the still-pending ones follow
        if let Some(id) = guard.consumed.pop_front() {
            let len = guard
                .buffers
                .get(&id)
                .map(|data| data.samples.len() as u64)
                .unwrap_or(0);
            guard.consumed_samples = guard.consumed_samples.saturating_sub(len);
            if let Some(data) = guard.buffers.get_mut(&id) {
                data.queued = false;
            }
            return Ok(id);
        }

        if let Some(id) = guard.queue.pop_front() {
            guard.cursor = 0;
            if let Some(data) = guard.buffers.get_mut(&id) {
                data.queued = false;
            }
            return Ok(id);
        }

        Err(DeviceError::NoBufferReady)
    }

    fn buffer_byte_size(&self, id: BufferId) -> Result<usize, DeviceError> {
        let guard = self.lock();
        let data = guard
            .buffers
            .get(&id)
            .ok_or(DeviceError::UnknownBuffer { id })?;
        Ok(data.samples.len() * std::mem::size_of::<i16>())
    }

    fn buffer_bits_per_sample(&self, id: BufferId) -> Result<u16, DeviceError> {
        let guard = self.lock();
        if !guard.buffers.contains_key(&id) {
            return Err(DeviceError::UnknownBuffer { id });
        }
        Ok(BITS_PER_SAMPLE)
    }

    fn playback_position(&self) -> Duration {
        let guard = self.lock();
        let samples = guard.consumed_samples + guard.cursor as u64;
        Duration::from_secs_f64(
            samples as f64 / (self.sample_rate as f64 * self.channels as f64),
        )
    }

    fn detach_buffers(&mut self) -> Result<(), DeviceError> {
        let mut guard = self.lock();
        let queued: Vec<BufferId> = guard
            .queue
            .iter()
            .chain(guard.consumed.iter())
            .copied()
            .collect();
        for id in queued {
            if let Some(data) = guard.buffers.get_mut(&id) {
                data.queued = false;
            }
        }
        guard.queue.clear();
        guard.consumed.clear();
        guard.cursor = 0;
        guard.consumed_samples = 0;
        Ok(())
    }
}

impl Drop for CpalVoice {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.output_thread.take() {
            if handle.join().is_err() {
                warn!("output thread panicked during shutdown");
            }
        }
    }
}
