//! Offline renderer: plays a soundscape from a fresh start and encodes the
//! result as a WAV byte buffer.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::debug;

use crate::config::SoundscapeConfig;
use crate::error::{Result, SoundscapeError};
use crate::soundscape::Soundscape;

/// Render `seconds` of a freshly started soundscape to 16-bit stereo PCM
/// WAV bytes. The same seed always yields the same file.
pub fn render_wav(config: SoundscapeConfig, seed: u64, seconds: f64) -> Result<Vec<u8>> {
    if !(seconds.is_finite() && seconds >= 0.0) {
        return Err(SoundscapeError::InvalidConfig(format!(
            "render length must be finite and >= 0, got {seconds}"
        )));
    }
    let sample_rate = config.sample_rate;
    let frames = (seconds * sample_rate).round() as usize;

    let mut soundscape = Soundscape::with_seed(config, seed)?;
    soundscape.init()?;
    soundscape.toggle();

    let mut samples = vec![0.0f32; frames * 2];
    soundscape.render_stereo_interleaved(&mut samples);

    let spec = WavSpec {
        channels: 2,
        sample_rate: sample_rate.round() as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for &s in &samples {
        writer.write_sample(to_i16(s))?;
    }
    writer.finalize()?;

    debug!(frames, seed, "rendered soundscape to wav");
    Ok(cursor.into_inner())
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}
