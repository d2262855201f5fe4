use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;
const FIRST_HZ: f32 = 880.0;
const SECOND_HZ: f32 = 1320.0;
const TONE_SECS: f32 = 0.25;
const REPEATS: usize = 3;

/// Two-tone beep played when the alert file cannot be used.
/// Mono, finite: `REPEATS` rounds of a low tone followed by a high one.
pub struct AlertTone {
    num_sample: usize,
    samples_per_tone: usize,
    total: usize,
}

impl AlertTone {
    pub fn new() -> Self {
        let samples_per_tone = (SAMPLE_RATE as f32 * TONE_SECS) as usize;
        Self {
            num_sample: 0,
            samples_per_tone,
            total: samples_per_tone * 2 * REPEATS,
        }
    }
}

impl Default for AlertTone {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for AlertTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total {
            return None;
        }

        let tone_index = self.num_sample / self.samples_per_tone;
        let freq = if tone_index % 2 == 0 { FIRST_HZ } else { SECOND_HZ };
        let t = self.num_sample as f32 / SAMPLE_RATE as f32;

        // short ramp at each tone edge to avoid clicks
        let within = (self.num_sample % self.samples_per_tone) as f32;
        let edge = within.min(self.samples_per_tone as f32 - within);
        let envelope = (edge / 200.0).min(1.0);

        self.num_sample += 1;
        Some((2.0 * PI * freq * t).sin() * 0.3 * envelope)
    }
}

impl Source for AlertTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total - self.num_sample.min(self.total))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(TONE_SECS * 2.0 * REPEATS as f32))
    }
}
