use std::time::Duration;
use crate::error::DeviceError;

/// Playback state reported by a voice and requested by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Handle identifying one device-side sample buffer
pub type BufferId = u32;

/// Device-side voice: one audible, independently controllable sound instance.
///
/// The streaming engine is the sole long-running caller during a play cycle;
/// the controlling thread only issues short bracket calls (play/pause/stop,
/// status queries). Every fallible call is validated immediately - a failure
/// is fatal to the current streaming cycle.
pub trait Voice: Send {
    /// Tell the device to start or resume consuming queued buffers
    fn play(&mut self) -> Result<(), DeviceError>;

    /// Tell the device to pause without losing the queue
    fn pause(&mut self) -> Result<(), DeviceError>;

    /// Tell the device to stop consuming buffers
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// The device's own transient state. May lag behind a play request.
    fn state(&self) -> PlaybackState;

    /// Number of queued buffers the device has finished consuming and is
    /// ready to hand back via `unqueue_buffer`
    fn processed_buffers(&mut self) -> Result<usize, DeviceError>;

    /// Number of buffers currently queued on the voice, consumed or not
    fn queued_buffers(&self) -> usize;

    /// Allocate a device buffer and return its handle
    fn create_buffer(&mut self) -> Result<BufferId, DeviceError>;

    /// Release a device buffer. The buffer must not be queued.
    fn destroy_buffer(&mut self, id: BufferId) -> Result<(), DeviceError>;

    /// Upload samples into a buffer and append it to the voice's queue
    fn queue_buffer(
        &mut self,
        id: BufferId,
        samples: &[i16],
        channels: u16,
        sample_rate: u32,
    ) -> Result<(), DeviceError>;

    /// Remove the oldest consumed buffer from the queue and return its handle
    fn unqueue_buffer(&mut self) -> Result<BufferId, DeviceError>;

    /// Size in bytes of the samples last uploaded into the buffer
    fn buffer_byte_size(&self, id: BufferId) -> Result<usize, DeviceError>;

    /// Bit depth of the samples in the buffer; 0 signals corrupted data
    fn buffer_bits_per_sample(&self, id: BufferId) -> Result<u16, DeviceError>;

    /// Sub-buffer playback offset: time consumed from buffers that are still
    /// queued (resets as buffers are unqueued)
    fn playback_position(&self) -> Duration;

    /// Drop every queued buffer reference from the voice without destroying
    /// the buffers themselves
    fn detach_buffers(&mut self) -> Result<(), DeviceError>;
}
