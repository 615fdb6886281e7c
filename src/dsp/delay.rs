//! Single-tap delay line.

/// A mono delay line with a fixed delay time.
///
/// Output is the input from `delay_time` seconds ago; feedback and wet
/// level are expressed by routing through gain nodes in the graph.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    /// Create a delay of `delay_time` seconds at the given sample rate.
    pub fn new(sample_rate: f64, delay_time: f64) -> Self {
        let delay_samples = (delay_time.max(0.0) * sample_rate).round() as usize;
        Self {
            buffer: vec![0.0; delay_samples + 1],
            write_pos: 0,
            delay_samples,
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Push one sample in and return the delayed sample.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let buffer_len = self.buffer.len();
        self.buffer[self.write_pos] = input as f32;
        let read_pos = (self.write_pos + buffer_len - self.delay_samples) % buffer_len;
        self.write_pos = (self.write_pos + 1) % buffer_len;

        self.buffer[read_pos] as f64
    }

    /// Clear the delay buffer.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
