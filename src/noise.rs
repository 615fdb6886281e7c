//! White-noise buffer generation.

use crate::dsp::buffer::AudioBuffer;
use crate::random::ParamSource;

/// Fill a `channels × length` buffer with independent uniform samples in
/// `[-1, 1)`.
///
/// Allocation is proportional to the request; the long texture loop is made
/// once per engine and transient buffers are dropped with their event.
pub fn make_buffer(rng: &mut dyn ParamSource, channels: usize, length: usize, sample_rate: f64) -> AudioBuffer {
    let data = (0..channels)
        .map(|_| (0..length).map(|_| rng.uniform(-1.0, 1.0) as f32).collect())
        .collect();
    AudioBuffer::from_channels(data, sample_rate)
}

/// Frames needed to hold `seconds` of audio, rounded up.
pub fn frames_for(seconds: f64, sample_rate: f64) -> usize {
    (seconds * sample_rate).ceil().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{ScriptedParams, SeededParams};

    #[test]
    fn fills_requested_shape() {
        let mut rng = SeededParams::new(1);
        let buf = make_buffer(&mut rng, 2, 1000, 44100.0);
        assert_eq!(buf.num_channels(), 2);
        assert_eq!(buf.len(), 1000);
    }

    #[test]
    fn samples_span_unit_interval() {
        let mut rng = SeededParams::new(9);
        let buf = make_buffer(&mut rng, 1, 20_000, 44100.0);
        let data = buf.channel(0).unwrap();
        assert!(data.iter().all(|&s| (-1.0..=1.0).contains(&s)));

        let min = data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!(min < -0.99 && max > 0.99, "range [{min}, {max}] too narrow");

        let mean: f64 = data.iter().map(|&s| s as f64).sum::<f64>() / data.len() as f64;
        assert!(mean.abs() < 0.02, "mean {mean} should be near zero");
    }

    #[test]
    fn channels_are_independent() {
        let mut rng = SeededParams::new(3);
        let buf = make_buffer(&mut rng, 2, 64, 44100.0);
        assert_ne!(buf.channel(0), buf.channel(1));
    }

    #[test]
    fn maps_unit_draws_linearly() {
        let mut rng = ScriptedParams::new(vec![0.0, 0.5, 0.75]);
        let buf = make_buffer(&mut rng, 1, 3, 1000.0);
        assert_eq!(buf.channel(0).unwrap(), &[-1.0, 0.0, 0.5]);
    }

    #[test]
    fn frame_count_rounds_up() {
        assert_eq!(frames_for(0.5, 1000.0), 500);
        assert_eq!(frames_for(0.0501, 1000.0), 51);
        assert_eq!(frames_for(4.0, 48000.0), 192_000);
    }
}
