use crate::core::state::CoverPreset;
use crate::utils::data_uri::ImagePayload;
use anyhow::Result;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const COVER_WIDTH: u32 = 600;
pub const COVER_HEIGHT: u32 = 800;
const JPEG_QUALITY: u8 = 80;

const SPACE_TOP: Rgb<u8> = Rgb([0x0f, 0x17, 0x2a]);
const SPACE_BOTTOM: Rgb<u8> = Rgb([0x43, 0x38, 0xca]);
const STAR_COUNT: usize = 150;

const RAINBOW: [Rgb<u8>; 7] = [
    Rgb([0xfc, 0xa5, 0xa5]),
    Rgb([0xfd, 0xba, 0x74]),
    Rgb([0xfd, 0xe0, 0x47]),
    Rgb([0x86, 0xef, 0xac]),
    Rgb([0x93, 0xc5, 0xfd]),
    Rgb([0xa5, 0xb4, 0xfc]),
    Rgb([0xd8, 0xb4, 0xfe]),
];
const STRIPE_WIDTH: f32 = 100.0;

const DOODLE_GROUND: Rgb<u8> = Rgb([0xf0, 0xf9, 0xff]);
const DOODLE_INK: [Rgb<u8>; 3] = [
    Rgb([0x0e, 0xa5, 0xe9]),
    Rgb([0xf4, 0x3f, 0x5e]),
    Rgb([0x8b, 0x5c, 0xf6]),
];
const DOODLE_COUNT: usize = 30;
const DOODLE_LINE: f32 = 3.0;

/// Builds the three built-in cover backgrounds. With a seed the random
/// decorations are reproducible.
pub fn cover_presets(seed: Option<u64>) -> Result<Vec<CoverPreset>> {
    match seed {
        Some(seed) => presets_with_rng(&mut StdRng::seed_from_u64(seed)),
        None => presets_with_rng(&mut rand::rng()),
    }
}

pub fn find_preset<'a>(presets: &'a [CoverPreset], id: &str) -> Option<&'a CoverPreset> {
    presets.iter().find(|p| p.id == id)
}

fn presets_with_rng<R: Rng>(rng: &mut R) -> Result<Vec<CoverPreset>> {
    let presets = vec![
        CoverPreset {
            id: "space",
            name: "Cosmic",
            image: encode_jpeg(&draw_space(rng))?,
        },
        CoverPreset {
            id: "rainbow",
            name: "Rainbow",
            image: encode_jpeg(&draw_rainbow())?,
        },
        CoverPreset {
            id: "doodle",
            name: "Doodles",
            image: encode_jpeg(&draw_doodles(rng))?,
        },
    ];
    log::debug!("Generated {} cover presets", presets.len());
    Ok(presets)
}

fn encode_jpeg(img: &RgbImage) -> Result<ImagePayload> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(img)?;
    Ok(ImagePayload::from_bytes("image/jpeg", &buf))
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

fn blend(dst: &mut Rgb<u8>, src: Rgb<u8>, alpha: f32) {
    for c in 0..3 {
        dst.0[c] = lerp(dst.0[c], src.0[c], alpha);
    }
}

/// Vertical gradient with scattered translucent stars.
fn draw_space<R: Rng>(rng: &mut R) -> RgbImage {
    let mut img = RgbImage::from_fn(COVER_WIDTH, COVER_HEIGHT, |_, y| {
        let t = y as f32 / (COVER_HEIGHT - 1) as f32;
        Rgb([
            lerp(SPACE_TOP.0[0], SPACE_BOTTOM.0[0], t),
            lerp(SPACE_TOP.0[1], SPACE_BOTTOM.0[1], t),
            lerp(SPACE_TOP.0[2], SPACE_BOTTOM.0[2], t),
        ])
    });

    let white = Rgb([255, 255, 255]);
    for _ in 0..STAR_COUNT {
        let cx = rng.random::<f32>() * COVER_WIDTH as f32;
        let cy = rng.random::<f32>() * COVER_HEIGHT as f32;
        let radius = rng.random::<f32>() * 2.0;
        let alpha = rng.random::<f32>();
        fill_circle(&mut img, cx, cy, radius.max(0.5), white, alpha);
    }
    img
}

/// Diagonal stripes, 45 degrees, cycling through the palette.
fn draw_rainbow() -> RgbImage {
    let (sin, cos) = std::f32::consts::FRAC_PI_4.sin_cos();
    RgbImage::from_fn(COVER_WIDTH, COVER_HEIGHT, |x, y| {
        let u = x as f32 * cos + y as f32 * sin;
        let stripe = (u / STRIPE_WIDTH).floor() as i64;
        RAINBOW[stripe.unsigned_abs() as usize % RAINBOW.len()]
    })
}

fn draw_doodles<R: Rng>(rng: &mut R) -> RgbImage {
    let mut img = RgbImage::from_pixel(COVER_WIDTH, COVER_HEIGHT, DOODLE_GROUND);
    for _ in 0..DOODLE_COUNT {
        let ink = DOODLE_INK[rng.random_range(0..DOODLE_INK.len())];
        let cx = rng.random::<f32>() * COVER_WIDTH as f32;
        let cy = rng.random::<f32>() * COVER_HEIGHT as f32;
        let size = 30.0 + rng.random::<f32>() * 40.0;
        if rng.random_bool(0.5) {
            stroke_circle(&mut img, cx, cy, size / 2.0, ink);
        } else {
            stroke_square(&mut img, cx, cy, size, ink);
        }
    }
    img
}

/// Pixel bounds of a box around (cx, cy), clamped to the image.
fn clip(img: &RgbImage, cx: f32, cy: f32, reach: f32) -> (u32, u32, u32, u32) {
    let x0 = (cx - reach).floor().max(0.0) as u32;
    let y0 = (cy - reach).floor().max(0.0) as u32;
    let x1 = ((cx + reach).ceil().max(0.0) as u32).min(img.width());
    let y1 = ((cy + reach).ceil().max(0.0) as u32).min(img.height());
    (x0, y0, x1, y1)
}

fn fill_circle(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, color: Rgb<u8>, alpha: f32) {
    let (x0, y0, x1, y1) = clip(img, cx, cy, radius);
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                blend(img.get_pixel_mut(x, y), color, alpha);
            }
        }
    }
}

fn stroke_circle(img: &mut RgbImage, cx: f32, cy: f32, radius: f32, color: Rgb<u8>) {
    let half = DOODLE_LINE / 2.0;
    let (x0, y0, x1, y1) = clip(img, cx, cy, radius + half);
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if ((dx * dx + dy * dy).sqrt() - radius).abs() <= half {
                img.put_pixel(x, y, color);
            }
        }
    }
}

fn stroke_square(img: &mut RgbImage, cx: f32, cy: f32, size: f32, color: Rgb<u8>) {
    let half_line = DOODLE_LINE / 2.0;
    let half_size = size / 2.0;
    let (x0, y0, x1, y1) = clip(img, cx, cy, half_size + half_line);
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = (x as f32 + 0.5 - cx).abs();
            let dy = (y as f32 + 0.5 - cy).abs();
            let edge = dx.max(dy);
            if (edge - half_size).abs() <= half_line {
                img.put_pixel(x, y, color);
            }
        }
    }
}
