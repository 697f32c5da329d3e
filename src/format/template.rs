//! Octave-numbered file names.
//!
//! An identifier such as `slide_%d.tif` or `pyr/level%02d.tif` names one
//! file per octave. The placeholder follows printf integer syntax: `%d` or
//! `%i`, optionally with a zero flag and a width. `%%` is a literal percent
//! sign. Anything else after `%` is copied through unchanged.

/// A parsed integer placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placeholder {
    zero_pad: bool,
    width: usize,
}

impl Placeholder {
    fn render(self, value: usize, out: &mut String) {
        let digits = value.to_string();
        let pad = self.width.saturating_sub(digits.len());
        let fill = if self.zero_pad { '0' } else { ' ' };
        out.extend(std::iter::repeat(fill).take(pad));
        out.push_str(&digits);
    }
}

/// One piece of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Percent,
    Octave(Placeholder),
}

/// Try to parse a placeholder at the start of `spec` (just past the `%`).
///
/// Returns the placeholder and the number of bytes consumed.
fn parse_placeholder(spec: &str) -> Option<(Placeholder, usize)> {
    let bytes = spec.as_bytes();
    let mut pos = 0;

    let zero_pad = bytes.first() == Some(&b'0');
    if zero_pad {
        pos += 1;
    }

    let width_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let width = if pos > width_start {
        spec[width_start..pos].parse().ok()?
    } else {
        0
    };

    match bytes.get(pos) {
        Some(b'd') | Some(b'i') => Some((Placeholder { zero_pad, width }, pos + 1)),
        _ => None,
    }
}

fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;

    while let Some(idx) = rest.find('%') {
        if idx > 0 {
            out.push(Segment::Literal(&rest[..idx]));
        }
        let after = &rest[idx + 1..];

        if let Some(stripped) = after.strip_prefix('%') {
            out.push(Segment::Percent);
            rest = stripped;
        } else if let Some((placeholder, consumed)) = parse_placeholder(after) {
            out.push(Segment::Octave(placeholder));
            rest = &after[consumed..];
        } else {
            out.push(Segment::Literal(&rest[idx..idx + 1]));
            rest = after;
        }
    }

    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    out
}

/// Whether `template` contains an octave placeholder.
pub fn has_octave_placeholder(template: &str) -> bool {
    segments(template)
        .iter()
        .any(|s| matches!(s, Segment::Octave(_)))
}

/// Expand every octave placeholder in `template` with `octave`.
///
/// Identifiers without a placeholder come back unchanged (apart from `%%`
/// collapsing to `%`).
pub fn octave_path(template: &str, octave: usize) -> String {
    let mut out = String::with_capacity(template.len() + 4);
    for segment in segments(template) {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Percent => out.push('%'),
            Segment::Octave(placeholder) => placeholder.render(octave, &mut out),
        }
    }
    out
}
