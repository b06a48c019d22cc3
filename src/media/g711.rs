//! G.711 µ-law codec for the PCMU media track.

const BIAS: i32 = 0x84;
const CLIP: i32 = 32_635;

/// Encode one linear PCM16 sample to µ-law.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn ulaw_encode_sample(sample: i16) -> u8 {
    let mut pcm = i32::from(sample);
    let sign: u8 = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };
    if pcm > CLIP {
        pcm = CLIP;
    }
    pcm += BIAS;

    let mut exponent: u8 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && (pcm & mask) == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((pcm >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}

/// Decode one µ-law byte to linear PCM16.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn ulaw_decode_sample(byte: u8) -> i16 {
    let byte = !byte;
    let sign = byte & 0x80;
    let exponent = (byte >> 4) & 0x07;
    let mantissa = i32::from(byte & 0x0F);
    let magnitude = ((mantissa << 3) + BIAS) << exponent;
    let pcm = magnitude - BIAS;
    if sign == 0 { pcm as i16 } else { (-pcm) as i16 }
}

/// Encode a PCM16 frame to µ-law bytes.
#[must_use]
pub fn ulaw_encode(frame: &[i16]) -> Vec<u8> {
    frame.iter().map(|&s| ulaw_encode_sample(s)).collect()
}

/// Decode µ-law bytes to a PCM16 frame.
#[must_use]
pub fn ulaw_decode(payload: &[u8]) -> Vec<i16> {
    payload.iter().map(|&b| ulaw_decode_sample(b)).collect()
}
