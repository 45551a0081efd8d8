//! Test doubles shared by the streaming test suites.
//!
//! `MockVoice` stands in for a real output device: it consumes every queued
//! buffer on each `processed_buffers()` poll while playing, and reports
//! Stopped the moment its queue runs dry, which is exactly the starvation
//! signal the worker keys off. Handles are cheap clones over shared state so
//! a test can keep one for inspection after moving the boxed voice into a
//! stream.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::producer::{Chunk, SampleProducer};
use crate::audio::voice::{BufferId, PlaybackState, Voice};
use crate::error::DeviceError;

#[derive(Debug, Default)]
struct MockBuffer {
    samples: Vec<i16>,
    queued: bool,
}

#[derive(Debug)]
struct MockInner {
    state: PlaybackState,
    buffers: HashMap<BufferId, MockBuffer>,
    queue: VecDeque<BufferId>,
    consumed: VecDeque<BufferId>,
    consumed_samples: u64,
    next_id: BufferId,
    fail_create_after: Option<usize>,
    created: usize,
    bits_override: Option<u16>,
    play_calls: usize,
    stop_calls: usize,
}

/// In-memory device double implementing the full voice contract
#[derive(Clone)]
pub struct MockVoice {
    inner: Arc<Mutex<MockInner>>,
    channels: u16,
    sample_rate: u32,
}

impl MockVoice {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                state: PlaybackState::Stopped,
                buffers: HashMap::new(),
                queue: VecDeque::new(),
                consumed: VecDeque::new(),
                consumed_samples: 0,
                next_id: 1,
                fail_create_after: None,
                created: 0,
                bits_override: None,
                play_calls: 0,
                stop_calls: 0,
            })),
            channels,
            sample_rate,
        }
    }

    /// Number of device buffers currently allocated
    pub fn buffer_count(&self) -> usize {
        self.inner.lock().unwrap().buffers.len()
    }

    /// Make `create_buffer` fail once `count` buffers exist
    pub fn fail_create_after(&mut self, count: usize) {
        self.inner.lock().unwrap().fail_create_after = Some(count);
    }

    /// Report this bit depth for every buffer (0 simulates corrupted data)
    pub fn override_bits_per_sample(&self, bits: u16) {
        self.inner.lock().unwrap().bits_override = Some(bits);
    }

    /// Force the device state from the outside, e.g. to simulate the device
    /// stopping on its own
    pub fn force_state(&self, state: PlaybackState) {
        self.inner.lock().unwrap().state = state;
    }

    pub fn play_calls(&self) -> usize {
        self.inner.lock().unwrap().play_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.inner.lock().unwrap().stop_calls
    }

    pub fn queue_len(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.queue.len() + inner.consumed.len()
    }
}

impl Voice for MockVoice {
    fn play(&mut self) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.play_calls += 1;
        inner.state = PlaybackState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == PlaybackState::Playing {
            inner.state = PlaybackState::Paused;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.stop_calls += 1;
        inner.state = PlaybackState::Stopped;
        Ok(())
    }

    fn state(&self) -> PlaybackState {
        let inner = self.inner.lock().unwrap();
        // A playing device with nothing left to consume has stopped
        if inner.state == PlaybackState::Playing && inner.queue.is_empty() {
            PlaybackState::Stopped
        } else {
            inner.state
        }
    }

    fn processed_buffers(&mut self) -> Result<usize, DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        // The mock device consumes instantly: every queued buffer is done
        // by the next poll, as long as playback is running
        if inner.state == PlaybackState::Playing {
            while let Some(id) = inner.queue.pop_front() {
                let len = inner
                    .buffers
                    .get(&id)
                    .map(|b| b.samples.len() as u64)
                    .unwrap_or(0);
                inner.consumed.push_back(id);
                inner.consumed_samples += len;
            }
        }
        Ok(inner.consumed.len())
    }

    fn queued_buffers(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.queue.len() + inner.consumed.len()
    }

    fn create_buffer(&mut self) -> Result<BufferId, DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(limit) = inner.fail_create_after {
            if inner.created >= limit {
                return Err(DeviceError::Backend("buffer allocation refused".into()));
            }
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.created += 1;
        inner.buffers.insert(id, MockBuffer::default());
        Ok(id)
    }

    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .buffers
            .remove(&id)
            .map(|_| ())
            .ok_or(DeviceError::UnknownBuffer { id })
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
                "expected {} ch / {} Hz",
                self.channels, self.sample_rate
            )));
        }
        let mut inner = self.inner.lock().unwrap();
        let buffer = inner
            .buffers
            .get_mut(&id)
            .ok_or(DeviceError::UnknownBuffer { id })?;
        buffer.samples = samples.to_vec();
        buffer.queued = true;
        inner.queue.push_back(id);
        Ok(())
    }

    fn unqueue_buffer(&mut self) -> Result<BufferId, DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(id) = inner.consumed.pop_front() {
            let len = inner
                .buffers
                .get(&id)
                .map(|b| b.samples.len() as u64)
                .unwrap_or(0);
            inner.consumed_samples = inner.consumed_samples.saturating_sub(len);
            if let Some(buffer) = inner.buffers.get_mut(&id) {
                buffer.queued = false;
            }
            return Ok(id);
        }
        if let Some(id) = inner.queue.pop_front() {
            if let Some(buffer) = inner.buffers.get_mut(&id) {
                buffer.queued = false;
            }
            return Ok(id);
        }
        Err(DeviceError::NoBufferReady)
    }

    fn buffer_byte_size(&self, id: BufferId) -> Result<usize, DeviceError> {
        let inner = self.inner.lock().unwrap();
        let buffer = inner
            .buffers
            .get(&id)
            .ok_or(DeviceError::UnknownBuffer { id })?;
        Ok(buffer.samples.len() * std::mem::size_of::<i16>())
    }

    fn buffer_bits_per_sample(&self, id: BufferId) -> Result<u16, DeviceError> {
        let inner = self.inner.lock().unwrap();
        if !inner.buffers.contains_key(&id) {
            return Err(DeviceError::UnknownBuffer { id });
        }
        Ok(inner.bits_override.unwrap_or(16))
    }

    fn playback_position(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        Duration::from_secs_f64(
            inner.consumed_samples as f64 / (self.sample_rate as f64 * self.channels as f64),
        )
    }

    fn detach_buffers(&mut self) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock().unwrap();
        let queued: Vec<BufferId> = inner
            .queue
            .iter()
            .chain(inner.consumed.iter())
            .copied()
            .collect();
        for id in queued {
            if let Some(buffer) = inner.buffers.get_mut(&id) {
                buffer.queued = false;
            }
        }
        inner.queue.clear();
        inner.consumed.clear();
        inner.consumed_samples = 0;
        Ok(())
    }
}

#[derive(Debug)]
struct ScriptInner {
    chunks: Vec<Vec<i16>>,
    cursor: usize,
    next_calls: usize,
    seeks: Vec<Duration>,
}

/// Producer double replaying a fixed list of chunks.
///
/// Empty chunks model starvation; once the list is exhausted every further
/// pull signals end of stream. Seeks reposition by sample count, so a seek
/// to zero replays the script from the top.
#[derive(Clone)]
pub struct ScriptedProducer {
    inner: Arc<Mutex<ScriptInner>>,
    channels: u16,
    sample_rate: u32,
}

impl ScriptedProducer {
    pub fn new(chunks: Vec<Vec<i16>>, channels: u16, sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScriptInner {
                chunks,
                cursor: 0,
                next_calls: 0,
                seeks: Vec::new(),
            })),
            channels,
            sample_rate,
        }
    }

    /// Script of `count` identical tone-free chunks, each `frames` long
    pub fn silence(count: usize, frames: usize, channels: u16, sample_rate: u32) -> Self {
        let chunk = vec![0i16; frames * channels as usize];
        Self::new(vec![chunk; count], channels, sample_rate)
    }

    /// Script that starves forever: every pull yields an empty data chunk
    pub fn starved(channels: u16, sample_rate: u32) -> Self {
        Self::new(vec![Vec::new(); 64], channels, sample_rate)
    }

    pub fn next_calls(&self) -> usize {
        self.inner.lock().unwrap().next_calls
    }

    pub fn seek_count(&self) -> usize {
        self.inner.lock().unwrap().seeks.len()
    }

    pub fn last_seek(&self) -> Option<Duration> {
        self.inner.lock().unwrap().seeks.last().copied()
    }
}

impl SampleProducer for ScriptedProducer {
    fn next_chunk(&mut self) -> Chunk {
        let mut inner = self.inner.lock().unwrap();
        inner.next_calls += 1;
        if inner.cursor >= inner.chunks.len() {
            return Chunk::end();
        }
        let chunk = inner.chunks[inner.cursor].clone();
        inner.cursor += 1;
        Chunk::data(chunk)
    }

    fn seek(&mut self, position: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.seeks.push(position);

        let mut target =
            (position.as_secs_f64() * self.sample_rate as f64) as usize * self.channels as usize;
        let mut cursor = inner.chunks.len();
        for (index, chunk) in inner.chunks.iter().enumerate() {
            if target < chunk.len().max(1) {
                cursor = index;
                break;
            }
            target -= chunk.len();
        }
        inner.cursor = cursor;
    }

    fn duration(&self) -> Duration {
        let inner = self.inner.lock().unwrap();
        let samples: usize = inner.chunks.iter().map(Vec::len).sum();
        Duration::from_secs_f64(
            samples as f64 / (self.sample_rate as f64 * self.channels as f64),
        )
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Settings tuned for fast test turnaround
pub fn test_settings() -> crate::config::StreamSettings {
    crate::config::StreamSettings {
        poll_interval_ms: 1,
        buffer_retries: 2,
    }
}
