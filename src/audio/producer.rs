use std::f32::consts::TAU;
use std::time::Duration;

/// One pull's worth of decoded samples
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// Interleaved signed 16-bit samples
    pub samples: Vec<i16>,
    /// True once the source has no further data to give
    pub end_of_stream: bool,
}

impl Chunk {
    pub fn data(samples: Vec<i16>) -> Self {
        Self {
            samples,
            end_of_stream: false,
        }
    }

    pub fn end() -> Self {
        Self {
            samples: Vec::new(),
            end_of_stream: true,
        }
    }
}

/// Contract the stream worker pulls decoded samples through.
///
/// Implementations keep all decoding concerns (file, network, synthesis) to
/// themselves; the engine only ever asks for the next chunk, a seek, or the
/// total duration. Final samples are expected in a regular chunk, with
/// `end_of_stream` signaled on the following pull.
pub trait SampleProducer: Send {
    /// Pull the next chunk of interleaved i16 samples
    fn next_chunk(&mut self) -> Chunk;

    /// Reposition the source so the next chunk starts at `position`
    fn seek(&mut self, position: Duration);

    /// Total duration of the source data
    fn duration(&self) -> Duration;
}

/// Bounded sine generator emitting fixed-size chunks.
///
/// Serves as the demo binary's data source and as a deterministic fixture:
/// every chunk is 100ms of tone, sample-accurate across seeks.
pub struct ToneProducer {
    frequency: f32,
    channels: u16,
    sample_rate: u32,
    total_frames: u64,
    cursor_frames: u64,
    chunk_frames: u64,
}

impl ToneProducer {
    pub fn new(frequency: f32, length: Duration, channels: u16, sample_rate: u32) -> Self {
        let total_frames = (length.as_secs_f64() * sample_rate as f64) as u64;
        Self {
            frequency,
            channels,
            sample_rate,
            total_frames,
            cursor_frames: 0,
            chunk_frames: (sample_rate / 10).max(1) as u64,
        }
    }

    fn sample_at(&self, frame: u64) -> i16 {
        let t = frame as f32 / self.sample_rate as f32;
        let value = (t * self.frequency * TAU).sin() * 0.6;
        (value * i16::MAX as f32) as i16
    }
}

impl SampleProducer for ToneProducer {
    fn next_chunk(&mut self) -> Chunk {
        if self.cursor_frames >= self.total_frames {
            return Chunk::end();
        }

        let frames = self.chunk_frames.min(self.total_frames - self.cursor_frames);
        let mut samples = Vec::with_capacity((frames * self.channels as u64) as usize);
        for frame in self.cursor_frames..self.cursor_frames + frames {
            let sample = self.sample_at(frame);
            for _ in 0..self.channels {
                samples.push(sample);
            }
        }
        self.cursor_frames += frames;

        Chunk::data(samples)
    }

    fn seek(&mut self, position: Duration) {
        let frame = (position.as_secs_f64() * self.sample_rate as f64) as u64;
        self.cursor_frames = frame.min(self.total_frames);
    }

    fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_frames as f64 / self.sample_rate as f64)
    }
}
