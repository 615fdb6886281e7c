//! Immutable multi-channel sample buffers for buffer-source nodes.

/// A block of audio held in memory, one `Vec` per channel.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: f64,
}

impl AudioBuffer {
    /// Build from per-channel sample data. All channels must share a length;
    /// longer channels are truncated to the shortest.
    pub fn from_channels(mut channels: Vec<Vec<f32>>, sample_rate: f64) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for ch in channels.iter_mut() {
            ch.truncate(frames);
        }
        AudioBuffer {
            channels,
            sample_rate,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Read one frame mixed down to mono (speaker downmix: channel average).
    pub fn frame_mono(&self, index: usize) -> f64 {
        if self.channels.is_empty() || index >= self.len() {
            return 0.0;
        }
        let sum: f64 = self.channels.iter().map(|ch| ch[index] as f64).sum();
        sum / self.channels.len() as f64
    }
}
