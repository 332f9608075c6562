use serde::{Deserialize, Serialize};

/// A decoded frame as packed 8-bit RGB, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap a raw RGB24 buffer. Returns `None` when the buffer length does not
    /// match `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != Self::byte_len(width, height) {
            return None;
        }
        Some(Frame { width, height, data })
    }

    /// A frame filled with one color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Frame { width, height, data }
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }
}

/// The representative frame of one whole second of video.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    pub second: u32,
    pub frame: Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbMeans {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

/// Mean CIELAB chroma of a frame (D65). Positive `a` leans red, negative
/// green; positive `b` leans warm yellow, negative cool blue. Neutral is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorCast {
    pub a: f64,
    pub b: f64,
}

/// Deterministic image statistics for one sampled frame. All intensity values
/// are on the 0-255 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    pub rgb_means: RgbMeans,
    pub saturation: f64,
    pub contrast: f64,
    pub brightness: f64,
    /// Variance of the Laplacian of the grey image. Lower means blurrier.
    pub sharpness: f64,
    pub grayscale: bool,
    pub color_cast: ColorCast,
}

fn luma([r, g, b]: [u8; 3]) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// HSV saturation scaled to 0-255.
fn hsv_saturation([r, g, b]: [u8; 3]) -> f64 {
    let max = r.max(g).max(b);
    if max == 0 {
        return 0.0;
    }
    let min = r.min(g).min(b);
    (max - min) as f64 * 255.0 / max as f64
}

fn srgb_to_linear(c: u8) -> f64 {
    let c = c as f64 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// a* and b* of one pixel. `linear` maps each 8-bit sRGB level to linear light.
fn lab_ab(linear: &[f64; 256], [r, g, b]: [u8; 3]) -> (f64, f64) {
    let (r, g, b) = (linear[r as usize], linear[g as usize], linear[b as usize]);
    // rows sum to the D65 white point
    let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;
    let (fx, fy, fz) = (lab_f(x / 0.95047), lab_f(y), lab_f(z / 1.08883));
    (500.0 * (fx - fy), 200.0 * (fy - fz))
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn laplacian_variance(gray: &[f64], width: usize, height: usize) -> f64 {
    if width < 3 || height < 3 {
        return 0.0;
    }
    let mut responses = Vec::with_capacity((width - 2) * (height - 2));
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let at = |x: usize, y: usize| gray[y * width + x];
            responses.push(
                at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4.0 * at(x, y),
            );
        }
    }
    let (_, std) = mean_and_std(&responses);
    std * std
}

impl FrameStats {
    pub fn from_frame(frame: &Frame) -> Self {
        let count = frame.pixel_count();
        if count == 0 {
            return FrameStats {
                rgb_means: RgbMeans { red: 0.0, green: 0.0, blue: 0.0 },
                saturation: 0.0,
                contrast: 0.0,
                brightness: 0.0,
                sharpness: 0.0,
                grayscale: true,
                color_cast: ColorCast { a: 0.0, b: 0.0 },
            };
        }

        let mut sums = [0u64; 3];
        let mut saturation_sum = 0.0;
        let mut grayscale = true;
        let mut gray = Vec::with_capacity(count);
        let linear: [f64; 256] = std::array::from_fn(|i| srgb_to_linear(i as u8));
        let (mut a_sum, mut b_sum) = (0.0, 0.0);

        for px in frame.pixels() {
            sums[0] += px[0] as u64;
            sums[1] += px[1] as u64;
            sums[2] += px[2] as u64;
            saturation_sum += hsv_saturation(px);
            grayscale &= px[0] == px[1] && px[1] == px[2];
            gray.push(luma(px));
            let (a, b) = lab_ab(&linear, px);
            a_sum += a;
            b_sum += b;
        }

        let n = count as f64;
        let (brightness, contrast) = mean_and_std(&gray);

        FrameStats {
            rgb_means: RgbMeans {
                red: sums[0] as f64 / n,
                green: sums[1] as f64 / n,
                blue: sums[2] as f64 / n,
            },
            saturation: saturation_sum / n,
            contrast,
            brightness,
            sharpness: laplacian_variance(&gray, frame.width as usize, frame.height as usize),
            grayscale,
            color_cast: ColorCast {
                a: a_sum / n,
                b: b_sum / n,
            },
        }
    }
}

/// Natural-language description of the frame sampled at `second`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescription {
    pub second: u32,
    pub text: String,
}

/// Per-second visual output of the sampler: `descriptions[i].second == i` and
/// `stats[i]` belongs to the same frame.
#[derive(Debug, Clone, Default)]
pub struct VisualContext {
    pub descriptions: Vec<FrameDescription>,
    pub stats: Vec<FrameStats>,
}

impl VisualContext {
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
