//! In-memory WAV generation for decode and playback tests

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

/// Sample rate of generated assets (differs from the engine rate on purpose)
pub const TEST_SAMPLE_RATE: u32 = 22050;

/// Stereo 16-bit sine wave, returned as WAV file bytes
pub fn sine_wav_bytes(duration_ms: u64, frequency_hz: f32, amplitude: f32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: TEST_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("wav header");
        let total_frames = TEST_SAMPLE_RATE as u64 * duration_ms / 1000;
        let peak = amplitude * i16::MAX as f32;

        for frame in 0..total_frames {
            let t = frame as f32 / TEST_SAMPLE_RATE as f32;
            let sample = ((2.0 * PI * frequency_hz * t).sin() * peak) as i16;
            writer.write_sample(sample).expect("left sample");
            writer.write_sample(sample).expect("right sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}
