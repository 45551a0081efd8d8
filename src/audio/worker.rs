use log::{debug, error, warn};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::audio::producer::SampleProducer;
use crate::audio::ring::{BufferRing, BUFFER_COUNT};
use crate::audio::stream::{StreamFormat, StreamShared};
use crate::audio::voice::{PlaybackState, Voice};
use crate::config::StreamSettings;
use crate::error::DeviceError;

/// Background task owning one play cycle's fill/drain loop.
///
/// A worker is created fresh for every cycle and joined synchronously by
/// `AudioStream::stop()`; it primes the buffer ring, starts the device, then
/// polls for consumed buffers and refills them until told to stop or until
/// the producer runs out of data. Clearing the streaming flag is the sole
/// cancellation signal and is observed within one polling interval.
pub(crate) struct StreamWorker {
    voice: Arc<Mutex<Option<Box<dyn Voice>>>>,
    producer: Arc<Mutex<Box<dyn SampleProducer>>>,
    shared: Arc<StreamShared>,
    format: StreamFormat,
    settings: StreamSettings,
}

impl StreamWorker {
    pub(crate) fn new(
        voice: Arc<Mutex<Option<Box<dyn Voice>>>>,
        producer: Arc<Mutex<Box<dyn SampleProducer>>>,
        shared: Arc<StreamShared>,
        format: StreamFormat,
        settings: StreamSettings,
    ) -> Self {
        Self {
            voice,
            producer,
            shared,
            format,
            settings,
        }
    }

    pub(crate) fn run(self) {
        if let Err(err) = self.stream_cycle() {
            error!("streaming cycle aborted: {}", err);
        }

        // The cycle is over either way: make that observable to the
        // controller and leave the position at the top of the stream.
        let mut control = self.shared.control.lock().unwrap();
        control.streaming = false;
        self.shared.samples_processed.store(0, Ordering::Relaxed);
    }

    fn stream_cycle(&self) -> Result<(), DeviceError> {
        // A start requested then immediately cancelled must not touch the device
        let start_state = {
            let mut control = self.shared.control.lock().unwrap();
            if control.desired == PlaybackState::Stopped || !control.streaming {
                control.streaming = false;
                return Ok(());
            }
            control.desired
        };

        let mut ring = self.with_voice(|voice| BufferRing::allocate(voice))?;
        debug!("stream worker started, ring of {} buffers allocated", BUFFER_COUNT);

        let result = self.fill_and_drain(&mut ring, start_state);

        // Unwind the device state no matter how the loop ended
        let cleanup = self.with_voice(|voice| {
            voice.stop()?;
            let queued = voice.queued_buffers();
            for _ in 0..queued {
                voice.unqueue_buffer()?;
            }
            voice.detach_buffers()?;
            ring.release(voice)
        });
        if let Err(err) = cleanup {
            warn!("cycle cleanup incomplete: {}", err);
        }
        debug!("stream worker finished");

        result
    }

    fn fill_and_drain(
        &self,
        ring: &mut BufferRing,
        start_state: PlaybackState,
    ) -> Result<(), DeviceError> {
        let mut request_stop = false;

        // Prime the ring. Slot 0 gets the immediate-loop treatment so that a
        // source already at end-of-stream does not corrupt the counters.
        for slot in 0..BUFFER_COUNT {
            if request_stop {
                break;
            }
            if self.with_voice(|voice| self.fill_and_push(voice, ring, slot, slot == 0))? {
                request_stop = true;
            }
        }

        self.with_voice(|voice| voice.play())?;
        if start_state == PlaybackState::Paused {
            // Honor a start-paused request before the device gets audible
            self.with_voice(|voice| voice.pause())?;
        }

        loop {
            if !self.shared.control.lock().unwrap().streaming {
                break;
            }

            // The device stopping on its own is either transient starvation
            // (smooth it over) or the true end of the stream.
            if self.with_voice(|voice| Ok(voice.state()))? == PlaybackState::Stopped {
                if !request_stop {
                    warn!("device stopped without a stop request, resuming playback");
                    self.with_voice(|voice| voice.play())?;
                } else {
                    self.shared.control.lock().unwrap().streaming = false;
                }
            }

            let processed = self.with_voice(|voice| voice.processed_buffers())?;
            for _ in 0..processed {
                let id = self.with_voice(|voice| voice.unqueue_buffer())?;
                let Some(slot) = ring.slot_of(id) else {
                    warn!("device returned unknown buffer handle {}", id);
                    continue;
                };

                if ring.is_end_marker(slot) {
                    // The buffer that wrapped or ended the stream has fully
                    // drained: position bookkeeping starts over.
                    self.shared.samples_processed.store(0, Ordering::Relaxed);
                    ring.clear_end(slot);
                } else {
                    let (byte_size, bits) = self.with_voice(|voice| {
                        Ok((
                            voice.buffer_byte_size(id)?,
                            voice.buffer_bits_per_sample(id)?,
                        ))
                    })?;
                    let bytes_per_sample = (bits / 8) as usize;
                    if bytes_per_sample == 0 {
                        error!(
                            "buffer {} reports {} bits per sample, treating stream data as corrupted",
                            id, bits
                        );
                        self.shared.control.lock().unwrap().streaming = false;
                        request_stop = true;
                        break;
                    }
                    self.shared
                        .samples_processed
                        .fetch_add((byte_size / bytes_per_sample) as u64, Ordering::Relaxed);
                }

                if !request_stop
                    && self.with_voice(|voice| self.fill_and_push(voice, ring, slot, false))?
                {
                    request_stop = true;
                }
            }

            // Leave the CPU alone while the device chews through the queue
            if self.with_voice(|voice| Ok(voice.state()))? != PlaybackState::Stopped {
                thread::sleep(self.settings.poll_interval());
            }
        }

        Ok(())
    }

    /// Pull a chunk and queue it into the given slot's device buffer.
    ///
    /// Returns true when the caller must transition toward stopping once this
    /// slot's role completes: the producer signaled a non-looping end, or it
    /// starved past the retry budget. `immediate_loop` is set only for slot 0
    /// during priming - a wrap that happens before any data was queued must
    /// eagerly reset the position counter and drop the end marker.
    fn fill_and_push(
        &self,
        voice: &mut dyn Voice,
        ring: &mut BufferRing,
        slot: usize,
        immediate_loop: bool,
    ) -> Result<bool, DeviceError> {
        for _attempt in 0..=self.settings.buffer_retries {
            let chunk = self.producer.lock().unwrap().next_chunk();

            if chunk.end_of_stream {
                ring.mark_end(slot);

                if !self.shared.looping.load(Ordering::Relaxed) {
                    debug!("end of stream reached on slot {}", slot);
                    return Ok(true);
                }

                // Wrap to the beginning and ask again
                self.producer.lock().unwrap().seek(Duration::ZERO);
                if immediate_loop {
                    self.shared.samples_processed.store(0, Ordering::Relaxed);
                    ring.clear_end(slot);
                }
                continue;
            }

            if chunk.samples.is_empty() {
                // Starved; counts against the retry budget
                continue;
            }

            voice.queue_buffer(
                ring.id(slot),
                &chunk.samples,
                self.format.channel_count,
                self.format.sample_rate,
            )?;
            return Ok(false);
        }

        debug!(
            "producer yielded no data for slot {} within {} retries",
            slot, self.settings.buffer_retries
        );
        Ok(true)
    }

    /// Run a device operation, treating a detached voice as a lost handle.
    ///
    /// The lock is held only for the duration of one operation so that the
    /// controller's bracket calls (pause, status) interleave freely.
    fn with_voice<T>(
        &self,
        operation: impl FnOnce(&mut dyn Voice) -> Result<T, DeviceError>,
    ) -> Result<T, DeviceError> {
        let mut guard = self.voice.lock().unwrap();
        match guard.as_mut() {
            Some(voice) => operation(voice.as_mut()),
            None => Err(DeviceError::HandleLost),
        }
    }
}
