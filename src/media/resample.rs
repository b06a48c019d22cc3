//! Linear-interpolation resampler between device rate and the 8 kHz track.
//!
//! Telephony-grade audio does not justify a windowed-sinc dependency; linear
//! interpolation keeps the capture path allocation-light and predictable.

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub(crate) fn resample_linear(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if input.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate {
        return input.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos as usize;
        let frac = pos - idx as f64;
        let a = f64::from(input[idx]);
        let b = f64::from(input[(idx + 1).min(input.len() - 1)]);
        let sample = frac.mul_add(b - a, a);
        output.push(sample.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_when_rates_match() {
        let input = vec![1i16, 2, 3, 4];
        assert_eq!(resample_linear(&input, 8_000, 8_000), input);
    }

    #[test]
    fn downsampling_halves_length() {
        let input: Vec<i16> = (0..320).map(|i| i as i16).collect();
        let out = resample_linear(&input, 16_000, 8_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn upsampling_doubles_length() {
        let input = vec![0i16; 80];
        let out = resample_linear(&input, 8_000, 16_000);
        assert_eq!(out.len(), 160);
    }

    #[test]
    fn constant_signal_stays_constant() {
        let input = vec![1_000i16; 480];
        let out = resample_linear(&input, 48_000, 8_000);
        assert!(out.iter().all(|&s| s == 1_000));
    }

    #[test]
    fn empty_and_zero_rate_are_safe() {
        assert!(resample_linear(&[], 48_000, 8_000).is_empty());
        assert!(resample_linear(&[1, 2, 3], 0, 8_000).is_empty());
    }
}
