//! Square crops around a center point.

use crate::fancy::FancyImage;

/// Read a `diameter × diameter` window of `octave` centered on `(cx, cy)`.
///
/// Output pixel `(i, j)` comes from `(cx - diameter/2 + i, cy - diameter/2 + j)`.
/// Samples outside the octave are NaN. The result is interleaved with
/// `image.channels()` samples per pixel.
pub fn crop_around(
    image: &FancyImage,
    octave: isize,
    cx: isize,
    cy: isize,
    diameter: usize,
) -> Vec<f32> {
    let channels = image.channels();
    let half = (diameter / 2) as isize;
    let mut out = Vec::with_capacity(diameter * diameter * channels);

    for j in 0..diameter as isize {
        for i in 0..diameter as isize {
            let x = cx - half + i;
            let y = cy - half + j;
            for l in 0..channels as isize {
                out.push(image.sample_at_octave(octave, x, y, l));
            }
        }
    }
    out
}
