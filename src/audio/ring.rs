use log::warn;
use crate::audio::voice::{BufferId, Voice};
use crate::error::DeviceError;

/// Number of device buffers cycled by a streaming voice
pub const BUFFER_COUNT: usize = 3;

/// One slot of the ring: a device buffer handle plus its end-of-stream marker
#[derive(Debug, Clone, Copy)]
struct BufferSlot {
    id: BufferId,
    is_end_marker: bool,
}

/// Fixed pool of device buffers cycled in round-robin order.
///
/// Slot indices are stable for the lifetime of the ring; the device handles
/// are allocated when a play cycle starts and released when it ends. The end
/// marker tags the slot whose drain completion must reset the processed
/// sample counter (stream wrap or true end).
#[derive(Debug)]
pub struct BufferRing {
    slots: [BufferSlot; BUFFER_COUNT],
}

impl BufferRing {
    /// Allocate the ring's device buffers with all end markers clear
    pub fn allocate(voice: &mut dyn Voice) -> Result<Self, DeviceError> {
        let mut ids = [0 as BufferId; BUFFER_COUNT];
        for (index, id) in ids.iter_mut().enumerate() {
            match voice.create_buffer() {
                Ok(created) => *id = created,
                Err(err) => {
                    // Roll back the slots that were already allocated
                    for allocated in &ids[..index] {
                        if let Err(destroy_err) = voice.destroy_buffer(*allocated) {
                            warn!("failed to roll back buffer {}: {}", allocated, destroy_err);
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(Self {
            slots: ids.map(|id| BufferSlot {
                id,
                is_end_marker: false,
            }),
        })
    }

    /// Device handle held by the given slot
    pub fn id(&self, slot: usize) -> BufferId {
        self.slots[slot].id
    }

    /// Map a device handle back to its slot index
    pub fn slot_of(&self, id: BufferId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id == id)
    }

    pub fn is_end_marker(&self, slot: usize) -> bool {
        self.slots[slot].is_end_marker
    }

    pub fn mark_end(&mut self, slot: usize) {
        self.slots[slot].is_end_marker = true;
    }

    pub fn clear_end(&mut self, slot: usize) {
        self.slots[slot].is_end_marker = false;
    }

    /// Destroy the ring's device buffers. Call only after the voice queue has
    /// been drained and detached.
    pub fn release(self, voice: &mut dyn Voice) -> Result<(), DeviceError> {
        let mut first_error = None;
        for slot in &self.slots {
            if let Err(err) = voice.destroy_buffer(slot.id) {
                warn!("failed to destroy buffer {}: {}", slot.id, err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
