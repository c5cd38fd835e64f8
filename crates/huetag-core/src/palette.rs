//! Deterministic color description for a palette seed.
//!
//! The palette generator proper lives in the web application; the pipeline
//! only needs a stable, structured rendering of a seed's colors to send to
//! providers. Each seed maps to five color stops taken from its SHA-256
//! digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const STOP_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    pub hex: String,
    pub rgb: [u8; 3],
    /// Hue in degrees, saturation and lightness in percent.
    pub hsl: [f64; 3],
    /// CIE L*C*h(ab), D65 white point.
    pub lch: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorDescription {
    pub seed: String,
    pub stops: Vec<ColorSample>,
}

impl ColorDescription {
    /// Render the stops as the plain-text block providers receive.
    #[must_use]
    pub fn to_prompt_text(&self) -> String {
        let mut out = format!(
            "Gradient palette with {} color stops:\n",
            self.stops.len()
        );
        for (i, stop) in self.stops.iter().enumerate() {
            let [r, g, b] = stop.rgb;
            let [h, s, l] = stop.hsl;
            let [lum, chroma, hue] = stop.lch;
            out.push_str(&format!(
                "{}. HEX {} | RGB({r}, {g}, {b}) | HSL({h:.0}, {s:.0}%, {l:.0}%) | LCH({lum:.1}, {chroma:.1}, {hue:.0})\n",
                i + 1,
                stop.hex,
            ));
        }
        out
    }
}

/// Describe the colors of `seed`. Same seed, same description.
#[must_use]
pub fn describe_seed(seed: &str) -> ColorDescription {
    let digest = Sha256::digest(seed.as_bytes());
    let stops = digest
        .chunks(3)
        .take(STOP_COUNT)
        .map(|c| sample([c[0], c[1], c[2]]))
        .collect();
    ColorDescription {
        seed: seed.to_string(),
        stops,
    }
}

fn sample(rgb: [u8; 3]) -> ColorSample {
    ColorSample {
        hex: format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2]),
        rgb,
        hsl: to_hsl(rgb),
        lch: to_lch(rgb),
    }
}

fn to_hsl([r, g, b]: [u8; 3]) -> [f64; 3] {
    let (r, g, b) = (
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    );
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return [0.0, 0.0, l * 100.0];
    }
    let s = d / (1.0 - (2.0 * l - 1.0).abs());
    let h = if (max - r).abs() < f64::EPSILON {
        60.0 * ((g - b) / d).rem_euclid(6.0)
    } else if (max - g).abs() < f64::EPSILON {
        60.0 * ((b - r) / d + 2.0)
    } else {
        60.0 * ((r - g) / d + 4.0)
    };
    [h, s * 100.0, l * 100.0]
}

fn to_lch([r, g, b]: [u8; 3]) -> [f64; 3] {
    fn linear(c: u8) -> f64 {
        let c = f64::from(c) / 255.0;
        if c <= 0.040_45 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }
    fn f(t: f64) -> f64 {
        const DELTA: f64 = 6.0 / 29.0;
        if t > DELTA.powi(3) {
            t.cbrt()
        } else {
            t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
        }
    }

    let (r, g, b) = (linear(r), linear(g), linear(b));
    let x = (0.412_456_4 * r + 0.357_576_1 * g + 0.180_437_5 * b) / 0.950_47;
    let y = 0.212_672_9 * r + 0.715_152_2 * g + 0.072_175_0 * b;
    let z = (0.019_333_9 * r + 0.119_192 * g + 0.950_304_1 * b) / 1.088_83;

    let (fx, fy, fz) = (f(x), f(y), f(z));
    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let bb = 200.0 * (fy - fz);
    let c = a.hypot(bb);
    let h = bb.atan2(a).to_degrees().rem_euclid(360.0);
    [l, c, h]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_description() {
        assert_eq!(describe_seed("abc"), describe_seed("abc"));
        assert_ne!(describe_seed("abc"), describe_seed("abd"));
        assert_eq!(describe_seed("abc").stops.len(), STOP_COUNT);
    }

    #[test]
    fn hsl_of_primaries() {
        assert_eq!(to_hsl([255, 0, 0]), [0.0, 100.0, 50.0]);
        let [h, _, _] = to_hsl([0, 0, 255]);
        assert!((h - 240.0).abs() < 1e-9);
        assert_eq!(to_hsl([128, 128, 128])[1], 0.0);
    }

    #[test]
    fn lch_of_white_and_black() {
        let [l, c, _] = to_lch([255, 255, 255]);
        assert!((l - 100.0).abs() < 0.01, "white L* was {l}");
        assert!(c < 0.01, "white chroma was {c}");
        let [l, _, _] = to_lch([0, 0, 0]);
        assert!(l.abs() < 0.01, "black L* was {l}");
    }

    #[test]
    fn prompt_text_lists_every_stop() {
        let text = describe_seed("sunset").to_prompt_text();
        assert!(text.starts_with("Gradient palette with 5 color stops"));
        assert_eq!(text.lines().filter(|l| l.contains("HEX #")).count(), 5);
    }
}
