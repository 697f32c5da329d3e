//! In-memory octave pyramid.
//!
//! Octave 0 is the decoded image itself. Each next octave is a 2x2 box
//! filter of the previous one on a zero-padded grid: output dimensions are
//! `ceil(w / 2) × ceil(h / 2)`, and a neighbor outside the input counts as
//! zero while the sum is still divided by four. Edge pixels of odd-sized
//! octaves are therefore darker than the interior.
//!
//! Octaves `1..=max_octaves` are derived on top of octave 0, and building
//! stops right after an octave whose `width + height ≤ 2` has been
//! produced.

use tracing::{debug, info};

use crate::error::PyramidError;

/// One octave: interleaved `f32` samples, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Octave {
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl Octave {
    /// Sample at `(x, y, channel)`; the caller checks bounds.
    #[inline]
    pub fn index(&self, x: usize, y: usize, channel: usize, channels: usize) -> usize {
        (y * self.width + x) * channels + channel
    }
}

/// Whether an octave is the last one the builder will produce.
#[inline]
fn is_terminal(width: usize, height: usize) -> bool {
    width + height <= 2
}

/// Build the octave ladder from a full-resolution buffer.
///
/// `buffer` holds `width × height × channels` interleaved samples and
/// becomes octave 0 without copying. Up to `max_octaves` further octaves
/// follow it, so a ceiling of zero returns octave 0 alone. Allocation failure of any octave aborts the whole build.
pub fn build(
    buffer: Vec<f32>,
    width: usize,
    height: usize,
    channels: usize,
    max_octaves: usize,
    verbose: bool,
) -> Result<Vec<Octave>, PyramidError> {
    let expected = width * height * channels;
    if buffer.len() != expected {
        return Err(PyramidError::SizeMismatch {
            expected,
            actual: buffer.len(),
        });
    }

    let mut octaves = vec![Octave {
        data: buffer,
        width,
        height,
    }];

    for s in 1..=max_octaves {
        let next = zoom_out(&octaves[s - 1], channels, s)?;
        let terminal = is_terminal(next.width, next.height);
        octaves.push(next);
        if terminal {
            break;
        }
    }

    for (index, octave) in octaves.iter().enumerate() {
        if verbose {
            info!(octave = index, width = octave.width, height = octave.height, "Pyramid octave");
        } else {
            debug!(octave = index, width = octave.width, height = octave.height, "Pyramid octave");
        }
    }

    Ok(octaves)
}

/// Halve an octave with a zero-padded 2x2 box filter.
fn zoom_out(input: &Octave, channels: usize, octave: usize) -> Result<Octave, PyramidError> {
    let (iw, ih) = (input.width, input.height);
    let (ow, oh) = (iw.div_ceil(2), ih.div_ceil(2));

    let len = ow * oh * channels;
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| PyramidError::Allocation {
            octave,
            bytes: len * std::mem::size_of::<f32>(),
        })?;
    data.resize(len, 0.0f32);

    let sample = |x: usize, y: usize, l: usize| -> f32 {
        if x < iw && y < ih {
            input.data[(y * iw + x) * channels + l]
        } else {
            0.0
        }
    };

    for j in 0..oh {
        for i in 0..ow {
            let (x, y) = (2 * i, 2 * j);
            for l in 0..channels {
                let sum = sample(x, y, l)
                    + sample(x + 1, y, l)
                    + sample(x, y + 1, l)
                    + sample(x + 1, y + 1, l);
                data[(j * ow + i) * channels + l] = sum * 0.25;
            }
        }
    }

    Ok(Octave {
        data,
        width: ow,
        height: oh,
    })
}
