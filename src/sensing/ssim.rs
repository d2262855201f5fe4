use image::RgbImage;

/// Side of the square comparison window.
pub const WINDOW: usize = 7;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;
const C1: f64 = (K1 * DATA_RANGE) * (K1 * DATA_RANGE);
const C2: f64 = (K2 * DATA_RANGE) * (K2 * DATA_RANGE);
const SAMPLES: f64 = (WINDOW * WINDOW) as f64;

/// Mean structural similarity of two equally sized RGB images, in `[0, 1]`.
///
/// Each channel is compared with a uniform 7x7 window (sample covariance,
/// only windows fully inside the image) and the three channel means are
/// averaged, so colour differences count. Mismatched or too-small inputs
/// score 0.
pub fn ssim_rgb(lhs: &RgbImage, rhs: &RgbImage) -> f64 {
    if lhs.dimensions() != rhs.dimensions() {
        return 0.0;
    }
    let (width, height) = (lhs.width() as usize, lhs.height() as usize);
    if width < WINDOW || height < WINDOW {
        return 0.0;
    }

    let total: f64 = (0..3)
        .map(|channel| channel_ssim(lhs.as_raw(), rhs.as_raw(), width, height, channel))
        .sum();

    let score = total / 3.0;
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Horizontal window sums for one row (or, accumulated, one window band).
struct WindowSums {
    x: Vec<u32>,
    y: Vec<u32>,
    xx: Vec<u32>,
    yy: Vec<u32>,
    xy: Vec<u32>,
}

impl WindowSums {
    fn new(len: usize) -> Self {
        Self {
            x: vec![0; len],
            y: vec![0; len],
            xx: vec![0; len],
            yy: vec![0; len],
            xy: vec![0; len],
        }
    }

    fn fill_row(&mut self, lhs: &[u8], rhs: &[u8], width: usize, row: usize, channel: usize) {
        let base = row * width * 3 + channel;
        let at = |buf: &[u8], col: usize| buf[base + col * 3] as u32;

        let (mut sx, mut sy, mut sxx, mut syy, mut sxy) = (0u32, 0u32, 0u32, 0u32, 0u32);
        for col in 0..width {
            let (a, b) = (at(lhs, col), at(rhs, col));
            sx += a;
            sy += b;
            sxx += a * a;
            syy += b * b;
            sxy += a * b;

            if col >= WINDOW {
                let (a, b) = (at(lhs, col - WINDOW), at(rhs, col - WINDOW));
                sx -= a;
                sy -= b;
                sxx -= a * a;
                syy -= b * b;
                sxy -= a * b;
            }

            if col + 1 >= WINDOW {
                let i = col + 1 - WINDOW;
                self.x[i] = sx;
                self.y[i] = sy;
                self.xx[i] = sxx;
                self.yy[i] = syy;
                self.xy[i] = sxy;
            }
        }
    }

    fn add(&mut self, row: &WindowSums) {
        for i in 0..self.x.len() {
            self.x[i] += row.x[i];
            self.y[i] += row.y[i];
            self.xx[i] += row.xx[i];
            self.yy[i] += row.yy[i];
            self.xy[i] += row.xy[i];
        }
    }

    fn subtract(&mut self, row: &WindowSums) {
        for i in 0..self.x.len() {
            self.x[i] -= row.x[i];
            self.y[i] -= row.y[i];
            self.xx[i] -= row.xx[i];
            self.yy[i] -= row.yy[i];
            self.xy[i] -= row.xy[i];
        }
    }

    fn window_score(&self, i: usize) -> f64 {
        let mean_x = self.x[i] as f64 / SAMPLES;
        let mean_y = self.y[i] as f64 / SAMPLES;
        let unbias = SAMPLES / (SAMPLES - 1.0);
        let var_x = (self.xx[i] as f64 / SAMPLES - mean_x * mean_x) * unbias;
        let var_y = (self.yy[i] as f64 / SAMPLES - mean_y * mean_y) * unbias;
        let cov = (self.xy[i] as f64 / SAMPLES - mean_x * mean_y) * unbias;

        let numerator = (2.0 * mean_x * mean_y + C1) * (2.0 * cov + C2);
        let denominator = (mean_x * mean_x + mean_y * mean_y + C1) * (var_x + var_y + C2);
        numerator / denominator
    }
}

fn channel_ssim(lhs: &[u8], rhs: &[u8], width: usize, height: usize, channel: usize) -> f64 {
    let out_width = width - WINDOW + 1;
    // ring of the last WINDOW rows' horizontal sums; `band` is their total
    let mut rows: Vec<WindowSums> = (0..WINDOW).map(|_| WindowSums::new(out_width)).collect();
    let mut band = WindowSums::new(out_width);

    let mut total = 0.0;
    let mut windows = 0u64;

    for row in 0..height {
        let slot = row % WINDOW;
        if row >= WINDOW {
            band.subtract(&rows[slot]);
        }
        rows[slot].fill_row(lhs, rhs, width, row, channel);
        band.add(&rows[slot]);

        if row + 1 >= WINDOW {
            total += (0..out_width).map(|i| band.window_score(i)).sum::<f64>();
            windows += out_width as u64;
        }
    }

    total / windows as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) * 3 % 256) as u8])
        })
    }

    fn checkerboard(width: u32, height: u32, invert: bool) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let on = ((x / 2 + y / 2) % 2 == 0) ^ invert;
            if on {
                Rgb([240, 240, 240])
            } else {
                Rgb([15, 15, 15])
            }
        })
    }

    #[test]
    fn identical_images_score_one() {
        let img = gradient(40, 30);
        let score = ssim_rgb(&img, &img);
        assert!((score - 1.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn inverted_structure_scores_near_zero() {
        let score = ssim_rgb(&checkerboard(32, 32, false), &checkerboard(32, 32, true));
        assert!(score < 0.05, "score was {score}");
    }

    #[test]
    fn small_perturbation_scores_high_but_below_one() {
        let original = gradient(48, 48);
        let mut noisy = original.clone();
        for (i, pixel) in noisy.pixels_mut().enumerate() {
            if i % 11 == 0 {
                pixel.0[0] = pixel.0[0].wrapping_add(40);
            }
        }
        let score = ssim_rgb(&original, &noisy);
        assert!(score > 0.5 && score < 1.0, "score was {score}");
    }

    #[test]
    fn colour_only_difference_is_detected() {
        let red = RgbImage::from_pixel(16, 16, Rgb([200, 30, 30]));
        let blue = RgbImage::from_pixel(16, 16, Rgb([30, 30, 200]));
        assert!(ssim_rgb(&red, &blue) < 0.9);
    }

    #[test]
    fn unusable_inputs_score_zero() {
        assert_eq!(ssim_rgb(&gradient(10, 10), &gradient(10, 11)), 0.0);
        assert_eq!(ssim_rgb(&gradient(6, 20), &gradient(6, 20)), 0.0);
        assert_eq!(ssim_rgb(&RgbImage::new(0, 0), &RgbImage::new(0, 0)), 0.0);
    }

    #[test]
    fn scoring_is_deterministic_and_bounded() {
        let a = gradient(33, 21);
        let b = checkerboard(33, 21, false);
        let first = ssim_rgb(&a, &b);
        assert_eq!(first, ssim_rgb(&a, &b));
        assert!((0.0..=1.0).contains(&first));
    }
}
