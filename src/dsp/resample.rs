//! Stateless rational resampler between the telephony (8 kHz) and dialog
//! model (24 kHz) sample rates.
//!
//! The ratio between the two rates this bridge ever resamples between is
//! fixed and exact (1:3 / 3:1), so rather than pull in a general-purpose
//! polyphase resampling crate this is a direct linear-interpolation
//! implementation: deterministic, allocation-light, and easy to check
//! against the exact-length invariants the session pipeline depends on.

/// Resamples a little-endian PCM16 buffer from `rate_in` to `rate_out`.
///
/// Produces `floor(input_samples * rate_out / rate_in)` output samples, per
/// the interface contract. Stateless: every call is independent, which is
/// sufficient given the short, fixed-size frames this bridge resamples.
pub fn resample(pcm: &[u8], rate_in: u32, rate_out: u32) -> Vec<u8> {
    debug_assert_eq!(pcm.len() % 2, 0, "pcm16 buffer must have even length");

    let input: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect();

    if input.is_empty() {
        return Vec::new();
    }
    if rate_in == rate_out {
        return pcm.to_vec();
    }

    let out_len = ((input.len() as u64 * rate_out as u64) / rate_in as u64) as usize;
    let mut out = Vec::with_capacity(out_len * 2);

    for i in 0..out_len {
        let src_pos = (i as f64) * (rate_in as f64) / (rate_out as f64);
        let idx = src_pos.floor() as usize;
        let frac = src_pos - idx as f64;

        let s0 = input[idx.min(input.len() - 1)] as f64;
        let s1 = input[(idx + 1).min(input.len() - 1)] as f64;
        let interpolated = s0 + (s1 - s0) * frac;
        let sample = interpolated.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ratio_is_exact_passthrough() {
        let pcm: Vec<u8> = (0..320u16).flat_map(|i| (i as i16).to_le_bytes()).collect();
        let out = resample(&pcm, 8000, 8000);
        assert_eq!(out, pcm);
    }

    #[test]
    fn upsampling_triples_sample_count() {
        let samples = 160usize;
        let pcm: Vec<u8> = (0..samples as u16)
            .flat_map(|i| (i as i16).to_le_bytes())
            .collect();
        let out = resample(&pcm, 8000, 24000);
        let out_samples = out.len() / 2;
        assert_eq!(out_samples, samples * 3);
    }

    #[test]
    fn downsampling_thirds_sample_count() {
        let samples = 960usize;
        let pcm: Vec<u8> = (0..samples as u16)
            .flat_map(|i| (i as i16).to_le_bytes())
            .collect();
        let out = resample(&pcm, 24000, 8000);
        let out_samples = out.len() / 2;
        assert_eq!(out_samples, samples / 3);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(resample(&[], 8000, 24000).is_empty());
    }
}
