//! Local voice-activity detection: per-frame RMS energy and the
//! consecutive-high-frame counter that drives local barge-in.

/// Rolling VAD state for one session.
#[derive(Debug, Clone, Copy, Default)]
pub struct VadState {
    consecutive_high_rms: u32,
}

impl VadState {
    /// Creates a fresh VAD state with the counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes RMS of a little-endian PCM16 frame, normalized to `[0, 1]`.
    pub fn rms(frame: &[u8]) -> f32 {
        if frame.len() < 2 {
            return 0.0;
        }
        let samples: Vec<i32> = frame
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as i32)
            .collect();
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let mean_sq = sum_sq / samples.len() as f64;
        (mean_sq.sqrt() / 32768.0) as f32
    }

    /// Feeds one frame's RMS through the detector, updating the
    /// consecutive-high-frame counter.
    ///
    /// Returns `true` if this frame's RMS is at or above `threshold`.
    pub fn observe(&mut self, rms: f32, threshold: f32) -> bool {
        if rms >= threshold {
            self.consecutive_high_rms += 1;
            true
        } else {
            self.consecutive_high_rms = 0;
            false
        }
    }

    /// Whether the consecutive-high-frame counter has reached the barge-in
    /// threshold.
    pub fn should_barge_in(&self, frames_threshold: u32) -> bool {
        self.consecutive_high_rms >= frames_threshold
    }

    /// Resets the consecutive-high-frame counter, e.g. after a barge-in has
    /// fired.
    pub fn reset(&mut self) {
        self.consecutive_high_rms = 0;
    }

    /// Current value of the consecutive-high-frame counter.
    pub fn consecutive_high_rms(&self) -> u32 {
        self.consecutive_high_rms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_frame(amplitude: i16, samples: usize) -> Vec<u8> {
        (0..samples)
            .flat_map(|_| amplitude.to_le_bytes())
            .collect()
    }

    #[test]
    fn silence_has_zero_rms() {
        let frame = vec![0u8; 320];
        assert_eq!(VadState::rms(&frame), 0.0);
    }

    #[test]
    fn full_scale_tone_has_rms_near_one() {
        let frame = tone_frame(i16::MAX, 160);
        let rms = VadState::rms(&frame);
        assert!(rms > 0.99, "expected near 1.0, got {rms}");
    }

    #[test]
    fn barge_in_fires_after_threshold_consecutive_frames() {
        let mut vad = VadState::new();
        let loud = tone_frame(10_000, 160);
        let rms = VadState::rms(&loud);

        assert!(vad.observe(rms, 0.08));
        assert!(!vad.should_barge_in(2));
        assert!(vad.observe(rms, 0.08));
        assert!(vad.should_barge_in(2));
    }

    #[test]
    fn quiet_frame_resets_counter() {
        let mut vad = VadState::new();
        let loud = tone_frame(10_000, 160);
        let quiet = tone_frame(0, 160);
        let loud_rms = VadState::rms(&loud);
        let quiet_rms = VadState::rms(&quiet);

        vad.observe(loud_rms, 0.08);
        vad.observe(quiet_rms, 0.08);
        assert_eq!(vad.consecutive_high_rms(), 0);
    }
}
