use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{otsu_level, threshold};
use imageproc::filter::filter3x3;
use log::debug;
use rayon::prelude::*;

use crate::models::{PreprocessingConfig, RawDocument, ThresholdMethod};
use crate::utils::{CardError, Result};

/// Single-channel image produced by [`ImageNormalizer::normalize`].
pub type NormalizedImage = GrayImage;

/// Filter strength, template side and search side of the denoiser.
const NLM_STRENGTH: f64 = 10.0;
const NLM_TEMPLATE: u32 = 7;
const NLM_SEARCH: u32 = 21;

const SHARPEN_KERNEL: [i32; 9] = [-1, -1, -1, -1, 9, -1, -1, -1, -1];

/// Pixels darker than this count as ink when estimating skew.
const INK_LEVEL: u8 = 128;

/// Deterministic resize / denoise / sharpen / binarize / deskew / close pipeline.
pub struct ImageNormalizer {
    config: PreprocessingConfig,
}

impl ImageNormalizer {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, document: &RawDocument) -> Result<NormalizedImage> {
        let (width, height) = (document.image.width(), document.image.height());
        if width == 0 || height == 0 {
            return Err(CardError::InvalidImage(format!(
                "{} has no pixels",
                document.source.display()
            )));
        }

        let resized = resize_to_width(&document.image, self.config.resize_width);
        debug!("Resized {}x{} to {}x{}", width, height, resized.width(), resized.height());

        let mut gray = resized.to_luma8();

        if self.config.denoise {
            gray = denoise_nl_means(&gray, NLM_STRENGTH, NLM_TEMPLATE, NLM_SEARCH);
            debug!("Applied non-local means denoising");
        }

        if self.config.sharpen {
            gray = sharpen(&gray);
            debug!("Applied sharpening kernel");
        }

        let mut binary = match self.config.threshold_method {
            ThresholdMethod::Adaptive => adaptive_threshold(
                &gray,
                self.config.adaptive_block_size,
                self.config.adaptive_offset,
            ),
            ThresholdMethod::Otsu => threshold(&gray, otsu_level(&gray)),
        };
        debug!("Binarized with {:?} thresholding", self.config.threshold_method);

        if self.config.deskew {
            binary = deskew(&binary);
        }

        if self.config.morph_cleanup {
            binary = close_2x2(&binary);
            debug!("Applied 2x2 closing");
        }

        Ok(binary)
    }
}

/// Scale to `target_width`, keeping the aspect ratio. A zero target leaves the image as is.
pub fn resize_to_width(image: &DynamicImage, target_width: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    if target_width == 0 || width == 0 || width == target_width {
        return image.clone();
    }
    let scale = target_width as f64 / width as f64;
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    image.resize_exact(target_width, target_height, FilterType::Lanczos3)
}

/// Output rows handled by one parallel denoising task.
const NLM_BAND_ROWS: usize = 32;

/// Non-local means: every pixel becomes a weighted mean over a search window,
/// weighted by how similar the surrounding templates are. Patch distances are
/// computed per offset with an integral image of squared differences.
///
/// Row bands run in parallel; each pixel sums its offsets in the same order,
/// so the output does not depend on scheduling.
pub fn denoise_nl_means(image: &GrayImage, strength: f64, template: u32, search: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let padded = PaddedImage::replicate(image, (search / 2) as usize);
    let window = NlmWindow {
        template_radius: (template / 2) as usize,
        search_radius: (search / 2) as isize,
        strength_sq: strength * strength,
    };

    let w = width as usize;
    let mut output = GrayImage::new(width, height);
    output
        .par_chunks_mut(w * NLM_BAND_ROWS)
        .enumerate()
        .for_each(|(band, rows)| {
            let y0 = band * NLM_BAND_ROWS;
            denoise_band(&padded, &window, y0, y0 + rows.len() / w, rows);
        });
    output
}

/// Grayscale pixels with a replicated border of `pad` on every side.
struct PaddedImage {
    pixels: Vec<u8>,
    stride: usize,
    pad: usize,
    width: usize,
    height: usize,
}

impl PaddedImage {
    fn replicate(image: &GrayImage, pad: usize) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let stride = width + 2 * pad;
        let raw = image.as_raw();
        let mut pixels = Vec::with_capacity(stride * (height + 2 * pad));
        for py in 0..height + 2 * pad {
            let y = py.saturating_sub(pad).min(height - 1);
            let row = &raw[y * width..(y + 1) * width];
            pixels.extend(std::iter::repeat(row[0]).take(pad));
            pixels.extend_from_slice(row);
            pixels.extend(std::iter::repeat(row[width - 1]).take(pad));
        }
        Self {
            pixels,
            stride,
            pad,
            width,
            height,
        }
    }

    /// Row `y` shifted by `(dx, dy)`, as a slice of `width` pixels.
    fn shifted_row(&self, y: usize, dx: isize, dy: isize) -> &[u8] {
        let row = (y + self.pad) as isize + dy;
        let col = self.pad as isize + dx;
        let start = row as usize * self.stride + col as usize;
        &self.pixels[start..start + self.width]
    }
}

struct NlmWindow {
    template_radius: usize,
    search_radius: isize,
    strength_sq: f64,
}

/// Denoise output rows `y0..y1` into `out`.
fn denoise_band(padded: &PaddedImage, window: &NlmWindow, y0: usize, y1: usize, out: &mut [u8]) {
    let (w, h) = (padded.width, padded.height);
    let tr = window.template_radius;
    // Integral rows needed by the templates of this band.
    let ya = y0.saturating_sub(tr);
    let yb = (y1 + tr).min(h);
    let stride = w + 1;

    let mut integral = vec![0u64; stride * (yb - ya + 1)];
    let mut weight_sum = vec![0f64; (y1 - y0) * w];
    let mut value_sum = vec![0f64; (y1 - y0) * w];

    let sr = window.search_radius;
    for dy in -sr..=sr {
        for dx in -sr..=sr {
            for y in ya..yb {
                let base = padded.shifted_row(y, 0, 0);
                let moved = padded.shifted_row(y, dx, dy);
                let row = (y - ya + 1) * stride;
                let mut row_sum = 0u64;
                for x in 0..w {
                    let diff = base[x] as i32 - moved[x] as i32;
                    row_sum += (diff * diff) as u64;
                    integral[row + x + 1] = integral[row - stride + x + 1] + row_sum;
                }
            }

            for y in y0..y1 {
                let top = y.saturating_sub(tr) - ya;
                let bottom = (y + tr).min(h - 1) + 1 - ya;
                let moved = padded.shifted_row(y, dx, dy);
                let out_row = (y - y0) * w;
                for x in 0..w {
                    let left = x.saturating_sub(tr);
                    let right = (x + tr).min(w - 1) + 1;
                    let ssd = integral[bottom * stride + right] + integral[top * stride + left]
                        - integral[top * stride + right]
                        - integral[bottom * stride + left];
                    let count = ((bottom - top) * (right - left)) as f64;
                    let weight = (-(ssd as f64 / count) / window.strength_sq).exp();
                    weight_sum[out_row + x] += weight;
                    value_sum[out_row + x] += weight * moved[x] as f64;
                }
            }
        }
    }

    for (px, (value, weight)) in out.iter_mut().zip(value_sum.iter().zip(&weight_sum)) {
        *px = (value / weight).round().clamp(0.0, 255.0) as u8;
    }
}

/// Edge-enhancing 3x3 convolution (centre 9, neighbours -1).
pub fn sharpen(image: &GrayImage) -> GrayImage {
    filter3x3::<_, i32, u8>(image, &SHARPEN_KERNEL)
}

/// Local-mean thresholding: a pixel is white when brighter than the mean of its
/// `block_size` window minus `offset`.
pub fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    let radius = block_size.max(1) / 2;
    let stride = width as usize + 1;

    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    ImageBuffer::from_fn(width, height, |x, y| {
        let left = x.saturating_sub(radius) as usize;
        let top = y.saturating_sub(radius) as usize;
        let right = (x + radius).min(width - 1) as usize + 1;
        let bottom = (y + radius).min(height - 1) as usize + 1;
        let sum = integral[bottom * stride + right] + integral[top * stride + left]
            - integral[top * stride + right]
            - integral[bottom * stride + left];
        let count = ((right - left) * (bottom - top)) as f64;
        let limit = sum as f64 / count - offset as f64;
        let value = image.get_pixel(x, y)[0] as f64;
        Luma([if value > limit { 255 } else { 0 }])
    })
}

/// Estimate the text-block rotation and undo it.
pub fn deskew(image: &GrayImage) -> GrayImage {
    match estimate_skew_angle(image) {
        Some(angle) if angle.abs() > 0.0 => {
            debug!("Deskewing by {:.2} degrees", angle);
            rotate_bicubic(image, -angle.to_radians())
        }
        _ => image.clone(),
    }
}

/// Angle in degrees, within (-45, 45], of the minimum-area rectangle around the
/// ink pixels. `None` when there is too little ink to tell.
pub fn estimate_skew_angle(image: &GrayImage) -> Option<f64> {
    // Only the extreme ink pixels of every row can lie on the convex hull.
    let mut points = Vec::new();
    for y in 0..image.height() {
        let mut first = None;
        let mut last = None;
        for x in 0..image.width() {
            if image.get_pixel(x, y)[0] < INK_LEVEL {
                first.get_or_insert(x);
                last = Some(x);
            }
        }
        if let (Some(first), Some(last)) = (first, last) {
            points.push((first as f64, y as f64));
            if last != first {
                points.push((last as f64, y as f64));
            }
        }
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        return None;
    }

    let mut best: Option<(f64, f64)> = None;
    for i in 0..hull.len() {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % hull.len()];
        let theta = (y1 - y0).atan2(x1 - x0);
        let (sin, cos) = theta.sin_cos();

        let mut min_u = f64::MAX;
        let mut max_u = f64::MIN;
        let mut min_v = f64::MAX;
        let mut max_v = f64::MIN;
        for &(px, py) in &hull {
            let u = px * cos + py * sin;
            let v = -px * sin + py * cos;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }
        let area = (max_u - min_u) * (max_v - min_v);
        // Equal areas keep the earlier edge so float noise cannot flip the pick.
        if best.map_or(true, |(best_area, _)| area < best_area * (1.0 - 1e-9)) {
            best = Some((area, theta));
        }
    }

    best.map(|(_, theta)| {
        let mut angle = theta.to_degrees();
        while angle > 45.0 {
            angle -= 90.0;
        }
        while angle <= -45.0 {
            angle += 90.0;
        }
        if angle.abs() < 1e-6 {
            0.0
        } else {
            angle
        }
    })
}

/// Andrew's monotone chain; returns the hull counter-clockwise without repeats.
fn convex_hull(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    points.dedup();
    if points.len() < 3 {
        return points;
    }

    fn cross(o: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    }

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Rotate clockwise (as displayed) by `theta` radians about the image centre,
/// sampling with a cubic kernel and replicating edge pixels.
pub fn rotate_bicubic(image: &GrayImage, theta: f64) -> GrayImage {
    let (width, height) = image.dimensions();
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;
    let (sin, cos) = theta.sin_cos();

    ImageBuffer::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let src_x = cx + cos * dx + sin * dy;
        let src_y = cy - sin * dx + cos * dy;
        Luma([sample_bicubic(image, src_x, src_y)])
    })
}

fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.75;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

fn sample_bicubic(image: &GrayImage, x: f64, y: f64) -> u8 {
    let max_x = image.width() as i64 - 1;
    let max_y = image.height() as i64 - 1;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut acc = 0.0;
    for j in -1..=2i64 {
        let wy = cubic_weight(fy - j as f64);
        let sy = (y0 + j).clamp(0, max_y) as u32;
        for i in -1..=2i64 {
            let wx = cubic_weight(fx - i as f64);
            let sx = (x0 + i).clamp(0, max_x) as u32;
            acc += wx * wy * image.get_pixel(sx, sy)[0] as f64;
        }
    }
    acc.round().clamp(0.0, 255.0) as u8
}

/// Closing (dilate then erode) with a 2x2 square structuring element.
pub fn close_2x2(image: &GrayImage) -> GrayImage {
    let dilated = apply_2x2(image, -1, u8::max);
    apply_2x2(&dilated, 1, u8::min)
}

/// Combine each pixel with its neighbours at offsets {0, step} in x and y.
fn apply_2x2(image: &GrayImage, step: i64, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    ImageBuffer::from_fn(width, height, |x, y| {
        let nx = (x as i64 + step).clamp(0, max_x) as u32;
        let ny = (y as i64 + step).clamp(0, max_y) as u32;
        let value = pick(
            pick(image.get_pixel(x, y)[0], image.get_pixel(nx, y)[0]),
            pick(image.get_pixel(x, ny)[0], image.get_pixel(nx, ny)[0]),
        );
        Luma([value])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn small_config() -> PreprocessingConfig {
        PreprocessingConfig {
            resize_width: 96,
            ..PreprocessingConfig::default()
        }
    }

    /// White card with a few dark "words".
    fn card_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let in_line = (y % 20) >= 6 && (y % 20) < 12;
            let in_word = (x % 30) >= 4 && (x % 30) < 24;
            if in_line && in_word && x > 8 && x < width - 8 {
                image::Rgb([20, 20, 30])
            } else {
                image::Rgb([235, 232, 228])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn document(image: DynamicImage) -> RawDocument {
        RawDocument::from_image(image, "card.png")
    }

    #[test]
    fn resize_preserves_aspect_ratio() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(200, 100));
        let resized = resize_to_width(&img, 100);
        assert_eq!((resized.width(), resized.height()), (100, 50));
    }

    #[test]
    fn normalize_is_deterministic() {
        let normalizer = ImageNormalizer::new(small_config());
        let doc = document(card_image(160, 80));
        let first = normalizer.normalize(&doc).unwrap();
        let second = normalizer.normalize(&doc).unwrap();
        assert_eq!(first.dimensions(), (96, 48));
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn output_is_binary_without_deskew() {
        let config = PreprocessingConfig {
            deskew: false,
            ..small_config()
        };
        let binary = ImageNormalizer::new(config)
            .normalize(&document(card_image(160, 80)))
            .unwrap();
        assert!(binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(binary.pixels().any(|p| p[0] == 0));
        assert!(binary.pixels().any(|p| p[0] == 255));
    }

    #[test]
    fn otsu_separates_two_levels() {
        let config = PreprocessingConfig {
            threshold_method: ThresholdMethod::Otsu,
            denoise: false,
            sharpen: false,
            deskew: false,
            morph_cleanup: false,
            resize_width: 0,
            ..PreprocessingConfig::default()
        };
        let img = GrayImage::from_fn(40, 10, |x, _| Luma([if x < 20 { 40 } else { 200 }]));
        let binary = ImageNormalizer::new(config)
            .normalize(&document(DynamicImage::ImageLuma8(img)))
            .unwrap();
        assert_eq!(binary.get_pixel(5, 5)[0], 0);
        assert_eq!(binary.get_pixel(35, 5)[0], 255);
    }

    #[test]
    fn empty_image_is_invalid() {
        let normalizer = ImageNormalizer::new(small_config());
        let err = normalizer
            .normalize(&document(DynamicImage::ImageLuma8(GrayImage::new(0, 0))))
            .unwrap_err();
        assert!(matches!(err, CardError::InvalidImage(_)));
    }

    #[test]
    fn sharpen_keeps_flat_regions() {
        let img = GrayImage::from_pixel(8, 8, Luma([120]));
        assert_eq!(sharpen(&img).as_raw(), img.as_raw());
    }

    #[test]
    fn adaptive_threshold_on_uniform_image_is_white() {
        let img = GrayImage::from_pixel(30, 30, Luma([90]));
        let binary = adaptive_threshold(&img, 21, 11);
        assert!(binary.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn adaptive_threshold_keeps_dark_strokes() {
        let img = GrayImage::from_fn(30, 30, |x, _| Luma([if x == 15 { 10 } else { 220 }]));
        let binary = adaptive_threshold(&img, 21, 11);
        assert_eq!(binary.get_pixel(15, 15)[0], 0);
        assert_eq!(binary.get_pixel(3, 15)[0], 255);
    }

    #[test]
    fn denoise_pulls_outlier_towards_background() {
        let mut img = GrayImage::from_pixel(15, 15, Luma([200]));
        img.put_pixel(7, 7, Luma([180]));
        let denoised = denoise_nl_means(&img, 10.0, 3, 7);
        assert!(denoised.get_pixel(7, 7)[0] > 180);
        assert_eq!(denoised.get_pixel(0, 0)[0], 200);
    }

    /// Direct per-pixel form: clamp at the border, sum each template window.
    fn denoise_reference(image: &GrayImage, strength: f64, template: u32, search: u32) -> GrayImage {
        let (w, h) = (image.width() as i64, image.height() as i64);
        let at = |x: i64, y: i64| image.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32)[0] as f64;
        let (tr, sr) = ((template / 2) as i64, (search / 2) as i64);
        GrayImage::from_fn(image.width(), image.height(), |x, y| {
            let (x, y) = (x as i64, y as i64);
            let (mut weights, mut values) = (0.0, 0.0);
            for dy in -sr..=sr {
                for dx in -sr..=sr {
                    let mut ssd = 0u64;
                    let mut count = 0;
                    for ty in (y - tr).max(0)..=(y + tr).min(h - 1) {
                        for tx in (x - tr).max(0)..=(x + tr).min(w - 1) {
                            let diff = at(tx, ty) as i64 - at(tx + dx, ty + dy) as i64;
                            ssd += (diff * diff) as u64;
                            count += 1;
                        }
                    }
                    let weight = (-(ssd as f64 / count as f64) / (strength * strength)).exp();
                    weights += weight;
                    values += weight * at(x + dx, y + dy);
                }
            }
            Luma([(values / weights).round().clamp(0.0, 255.0) as u8])
        })
    }

    fn noisy_card(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let stripe = if (y / 6) % 2 == 0 { 40 } else { 210 };
            Luma([(stripe + (x * 37 + y * 91) % 23) as u8])
        })
    }

    #[test]
    fn denoise_matches_direct_window_sums() {
        let img = noisy_card(12, 9);
        for (template, search) in [(3, 7), (1, 3), (5, 5)] {
            let fast = denoise_nl_means(&img, 10.0, template, search);
            let direct = denoise_reference(&img, 10.0, template, search);
            assert_eq!(fast.as_raw(), direct.as_raw(), "template {} search {}", template, search);
        }
    }

    #[test]
    fn denoise_bands_join_seamlessly() {
        // Taller than one band, so rows on both sides of a band edge are compared.
        let img = noisy_card(7, (NLM_BAND_ROWS * 2 + 5) as u32);
        let fast = denoise_nl_means(&img, 12.0, 3, 5);
        assert_eq!(fast.as_raw(), denoise_reference(&img, 12.0, 3, 5).as_raw());
        assert_eq!(fast.as_raw(), denoise_nl_means(&img, 12.0, 3, 5).as_raw());
    }

    #[test]
    fn denoise_empty_image() {
        let img = GrayImage::new(0, 0);
        assert_eq!(denoise_nl_means(&img, 10.0, 7, 21).dimensions(), (0, 0));
    }

    #[test]
    fn denoise_moderate_image_in_bounded_time() {
        let img = noisy_card(480, 300);
        let started = std::time::Instant::now();
        let denoised = denoise_nl_means(&img, NLM_STRENGTH, NLM_TEMPLATE, NLM_SEARCH);
        assert_eq!(denoised.dimensions(), img.dimensions());
        assert!(
            started.elapsed() < std::time::Duration::from_secs(30),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn axis_aligned_block_has_no_skew() {
        let img = GrayImage::from_fn(60, 40, |x, y| {
            Luma([if (10..50).contains(&x) && (15..25).contains(&y) { 0 } else { 255 }])
        });
        assert_eq!(estimate_skew_angle(&img), Some(0.0));
        assert_eq!(deskew(&img).as_raw(), img.as_raw());
    }

    #[test]
    fn tilted_block_angle_is_recovered() {
        let tilt = 8.0f64.to_radians();
        let (sin, cos) = tilt.sin_cos();
        let img = GrayImage::from_fn(200, 200, |x, y| {
            let dx = x as f64 - 100.0;
            let dy = y as f64 - 100.0;
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            Luma([if u.abs() < 70.0 && v.abs() < 12.0 { 0 } else { 255 }])
        });
        let angle = estimate_skew_angle(&img).unwrap();
        assert!((angle - 8.0).abs() < 1.0, "angle was {}", angle);

        let straightened = estimate_skew_angle(&deskew(&img)).unwrap();
        assert!(straightened.abs() < 1.5, "residual was {}", straightened);
    }

    #[test]
    fn blank_page_has_no_skew_estimate() {
        let img = GrayImage::from_pixel(20, 20, Luma([255]));
        assert_eq!(estimate_skew_angle(&img), None);
    }

    #[test]
    fn closing_removes_isolated_dark_pixel() {
        let mut img = GrayImage::from_pixel(6, 6, Luma([255]));
        img.put_pixel(3, 3, Luma([0]));
        let closed = close_2x2(&img);
        assert!(closed.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn closing_keeps_solid_strokes() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if (3..7).contains(&x) { 0 } else { 255 }]));
        let closed = close_2x2(&img);
        assert_eq!(closed.get_pixel(5, 5)[0], 0);
        assert_eq!(closed.get_pixel(0, 5)[0], 255);
    }
}
