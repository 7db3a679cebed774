use std::f32::consts::FRAC_PI_2;

use crate::audio::AudioArc;

/// Equal-power stereo panner.
///
/// Mono sources are spread between both outputs. For stereo sources the
/// channel on the side being panned away from is folded into the other one,
/// so a hard pan keeps all of the signal.
#[inline]
pub fn pan_frame(left: f32, right: f32, source_channels: u16, pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if source_channels == 1 {
        let x = (pan + 1.0) * 0.5 * FRAC_PI_2;
        return (left * x.cos(), left * x.sin());
    }

    if pan <= 0.0 {
        let x = (pan + 1.0) * FRAC_PI_2;
        (left + right * x.cos(), right * x.sin())
    } else {
        let x = pan * FRAC_PI_2;
        (left * x.cos(), right + left * x.sin())
    }
}

/// One stereo output frame of `audio` at `frame`, panned and scaled.
///
/// Sources with more than two channels contribute their first two.
#[inline]
pub fn stereo_frame(audio: &AudioArc, frame: usize, gain: f32, pan: f32) -> (f32, f32) {
    let channels = audio.channels();
    let left = audio.sample(frame, 0);
    let right = if channels > 1 {
        audio.sample(frame, 1)
    } else {
        left
    };
    let (l, r) = pan_frame(left, right, channels.min(2), pan);
    (l * gain, r * gain)
}
