pub mod device;
pub mod producer;
pub mod ring;
pub mod stream;
pub mod voice;

pub(crate) mod worker;

#[cfg(test)]
pub mod tests;

pub use device::CpalVoice;
pub use producer::{Chunk, SampleProducer, ToneProducer};
pub use ring::{BufferRing, BUFFER_COUNT};
pub use stream::{AudioStream, StreamFormat, MAX_CHANNELS};
pub use voice::{BufferId, PlaybackState, Voice};
