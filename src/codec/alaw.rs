//! ITU-T G.711 A-law codec: linear PCM16 <-> 8-bit A-law.
//!
//! Straightforward bit-twiddling per the standard; no lookup tables beyond
//! what the segment encoding needs.

use crate::error::CodecError;

const SIGN_BIT: u8 = 0x80;
const QUANT_MASK: u8 = 0x0F;
const SEG_SHIFT: u8 = 4;
const SEG_MASK: u8 = 0x70;

fn search_segment(val: i16, table: &[i16; 8]) -> u8 {
    for (i, &boundary) in table.iter().enumerate() {
        if val <= boundary {
            return i as u8;
        }
    }
    8
}

const SEG_END: [i16; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

/// Encodes one linear 16-bit PCM sample to 8-bit A-law.
pub fn encode_sample(pcm: i16) -> u8 {
    let mut pcm_val = (pcm >> 3) as i32;
    let mask: u8 = if pcm_val >= 0 {
        0xD5
    } else {
        pcm_val = -pcm_val - 1;
        0x55
    };

    let seg = search_segment(pcm_val as i16, &SEG_END);
    let aval: u8 = if seg >= 8 {
        0x7F ^ mask
    } else {
        let shift = seg + 1;
        let low = ((pcm_val >> shift) & 0x0F) as u8;
        let byte = (seg << SEG_SHIFT) | low;
        byte ^ mask
    };
    aval
}

/// Decodes one 8-bit A-law sample to linear 16-bit PCM.
pub fn decode_sample(alaw: u8) -> i16 {
    let alaw = alaw ^ 0x55;
    let sign = alaw & SIGN_BIT;
    let segment = (alaw & SEG_MASK) >> SEG_SHIFT;
    let mantissa = (alaw & QUANT_MASK) as i16;

    let mut sample = (mantissa << 4) as i16 + 8;
    if segment != 0 {
        sample += 0x100;
    }
    if segment > 1 {
        sample <<= segment - 1;
    }

    if sign == 0 {
        -sample
    } else {
        sample
    }
}

/// Decodes an A-law buffer (one byte per sample) into little-endian PCM16.
pub fn decode(alaw: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(alaw.len() * 2);
    for &byte in alaw {
        pcm.extend_from_slice(&decode_sample(byte).to_le_bytes());
    }
    pcm
}

/// Encodes a little-endian PCM16 buffer into A-law (one byte per sample).
///
/// Returns [`CodecError::OddLength`] if `pcm` is not an even number of bytes.
pub fn encode(pcm: &[u8]) -> Result<Vec<u8>, CodecError> {
    if pcm.len() % 2 != 0 {
        return Err(CodecError::OddLength(pcm.len()));
    }
    let mut alaw = Vec::with_capacity(pcm.len() / 2);
    for chunk in pcm.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        alaw.push(encode_sample(sample));
    }
    Ok(alaw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_byte_decodes_near_zero() {
        let pcm = decode_sample(crate::constants::ALAW_SILENCE_BYTE);
        assert!(pcm.abs() < 16, "expected near-zero, got {pcm}");
    }

    #[test]
    fn round_trip_is_idempotent_once_quantized() {
        for pcm in [-20000i16, -1000, -8, 0, 8, 1000, 20000, i16::MAX, i16::MIN] {
            let once = encode_sample(pcm);
            let decoded_once = decode_sample(once);
            let twice = encode_sample(decoded_once);
            let decoded_twice = decode_sample(twice);
            assert_eq!(
                decoded_once, decoded_twice,
                "alaw round trip should be a fixed point after one pass, pcm={pcm}"
            );
        }
    }

    #[test]
    fn buffer_round_trip_preserves_length() {
        let pcm: Vec<u8> = (0..320u16)
            .flat_map(|i| (i as i16).to_le_bytes())
            .collect();
        let alaw = encode(&pcm).expect("even length");
        assert_eq!(alaw.len(), 160);
        let back = decode(&alaw);
        assert_eq!(back.len(), 320);
    }

    #[test]
    fn odd_length_pcm_is_rejected() {
        let err = encode(&[0u8; 3]).unwrap_err();
        assert!(matches!(err, CodecError::OddLength(3)));
    }
}
