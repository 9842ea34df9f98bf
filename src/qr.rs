//! QR provisioning: one branded PNG per catalog location plus a gallery page.
//!
//! Image layout on a 400x400 canvas:
//!   - rounded square split into four coloured quadrants (the background)
//!   - the plain code in the centred 300x300 region
//!   - the `FEEDBACK` label in the top-left margin
//!   - a 90x90 quadrant emblem centred on the code
//!
//! The emblem must stay under 10% of the code area so level H error
//! correction can still recover the hidden modules.

use image::{ImageFormat, Rgba, RgbaImage};
use log::{error, info};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::config::QrConfig;
use crate::constants::FORM_PATH_PREFIX;
use crate::locations::{catalog, CatalogLocation};
use crate::pages;

pub const CANVAS_SIZE: u32 = 400;
pub const CODE_SIZE: u32 = 300;
pub const CODE_OFFSET: u32 = (CANVAS_SIZE - CODE_SIZE) / 2;
pub const CORNER_RADIUS: u32 = 40;
pub const EMBLEM_SIZE: u32 = 90;
const EMBLEM_BORDER: u32 = 4;
const EMBLEM_RADIUS: u32 = 12;
const QUIET_ZONE_MODULES: usize = 2;

const LABEL: &str = "FEEDBACK";
const LABEL_SCALE: u32 = 3;
const LABEL_X: u32 = 24;
const LABEL_Y: u32 = 14;

const BLUE: Rgba<u8> = Rgba([66, 133, 244, 255]);
const RED: Rgba<u8> = Rgba([234, 67, 53, 255]);
const YELLOW: Rgba<u8> = Rgba([251, 188, 5, 255]);
const GREEN: Rgba<u8> = Rgba([52, 168, 83, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Share of the code region hidden under the emblem
pub fn emblem_area_ratio() -> f64 {
    (EMBLEM_SIZE * EMBLEM_SIZE) as f64 / (CODE_SIZE * CODE_SIZE) as f64
}

/// Address a location's code points at
pub fn destination_url(base_url: &str, location_id: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        FORM_PATH_PREFIX,
        location_id
    )
}

/// Whether the centre of pixel (x, y) lies inside the square at (left, top)
/// of side `size` with corners rounded by `radius`
fn inside_rounded_square(x: u32, y: u32, left: u32, top: u32, size: u32, radius: u32) -> bool {
    if x < left || y < top || x >= left + size || y >= top + size {
        return false;
    }
    let px = (x - left) as f64 + 0.5;
    let py = (y - top) as f64 + 0.5;
    let size = size as f64;
    let r = radius as f64;

    let cx = if px < r {
        r
    } else if px > size - r {
        size - r
    } else {
        return true;
    };
    let cy = if py < r {
        r
    } else if py > size - r {
        size - r
    } else {
        return true;
    };
    (px - cx).powi(2) + (py - cy).powi(2) <= r * r
}

/// Quadrant colour of a point relative to a square of side `size`
fn quadrant_color(x: u32, y: u32, size: u32) -> Rgba<u8> {
    let half = size / 2;
    match (x < half, y < half) {
        (true, true) => BLUE,
        (false, true) => RED,
        (true, false) => YELLOW,
        (false, false) => GREEN,
    }
}

fn draw_background(canvas: &mut RgbaImage) {
    for y in 0..CANVAS_SIZE {
        for x in 0..CANVAS_SIZE {
            let color = if inside_rounded_square(x, y, 0, 0, CANVAS_SIZE, CORNER_RADIUS) {
                quadrant_color(x, y, CANVAS_SIZE)
            } else {
                CLEAR
            };
            canvas.put_pixel(x, y, color);
        }
    }
}

fn draw_code(canvas: &mut RgbaImage, code: &QrCode) {
    let width = code.width();
    let colors = code.to_colors();
    let modules = width + 2 * QUIET_ZONE_MODULES;

    for py in 0..CODE_SIZE {
        let my = py as usize * modules / CODE_SIZE as usize;
        for px in 0..CODE_SIZE {
            let mx = px as usize * modules / CODE_SIZE as usize;
            let dark = mx >= QUIET_ZONE_MODULES
                && my >= QUIET_ZONE_MODULES
                && mx < QUIET_ZONE_MODULES + width
                && my < QUIET_ZONE_MODULES + width
                && colors[(my - QUIET_ZONE_MODULES) * width + (mx - QUIET_ZONE_MODULES)]
                    == Color::Dark;
            canvas.put_pixel(CODE_OFFSET + px, CODE_OFFSET + py, if dark { BLACK } else { WHITE });
        }
    }
}

/// 5x7 bitmap rows, most significant of the low five bits is the left column
fn glyph(c: char) -> [u8; 7] {
    match c {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        _ => [0; 7],
    }
}

fn draw_label(canvas: &mut RgbaImage, text: &str, left: u32, top: u32, scale: u32) {
    let advance = 6 * scale;
    for (i, c) in text.chars().enumerate() {
        let origin_x = left + i as u32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..5u32 {
                if bits & (0b10000 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = origin_x + col * scale + dx;
                        let y = top + row as u32 * scale + dy;
                        if x < canvas.width() && y < canvas.height() {
                            canvas.put_pixel(x, y, WHITE);
                        }
                    }
                }
            }
        }
    }
}

fn draw_emblem(canvas: &mut RgbaImage) {
    let left = (CANVAS_SIZE - EMBLEM_SIZE) / 2;
    let inner_left = left + EMBLEM_BORDER;
    let inner_size = EMBLEM_SIZE - 2 * EMBLEM_BORDER;
    let inner_radius = EMBLEM_RADIUS.saturating_sub(EMBLEM_BORDER);

    for y in left..left + EMBLEM_SIZE {
        for x in left..left + EMBLEM_SIZE {
            if !inside_rounded_square(x, y, left, left, EMBLEM_SIZE, EMBLEM_RADIUS) {
                continue;
            }
            let color = if inside_rounded_square(x, y, inner_left, inner_left, inner_size, inner_radius) {
                quadrant_color(x - inner_left, y - inner_left, inner_size)
            } else {
                WHITE
            };
            canvas.put_pixel(x, y, color);
        }
    }
}

/// Render the branded code image for `url`
pub fn render_location_image(url: &str) -> Result<RgbaImage, Box<dyn std::error::Error>> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::H)?;

    let mut canvas = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);
    draw_background(&mut canvas);
    draw_code(&mut canvas, &code);
    draw_label(&mut canvas, LABEL, LABEL_X, LABEL_Y, LABEL_SCALE);
    draw_emblem(&mut canvas);
    Ok(canvas)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// Render and write one location's image, returning the written path
pub fn write_location_image(
    location: &CatalogLocation,
    base_url: &str,
    output_dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let url = destination_url(base_url, &location.id);
    let png = encode_png(&render_location_image(&url)?)?;
    let path = output_dir.join(location.image_file_name());
    std::fs::write(&path, png)?;
    Ok(path)
}

/// Outcome of one provisioning run
#[derive(Debug, Default)]
pub struct ProvisionReport {
    pub generated: Vec<PathBuf>,
    /// Location id and error message of every image that failed
    pub failed: Vec<(String, String)>,
    pub index_path: PathBuf,
}

/// Generate images for every configured location, one at a time, then the gallery page.
///
/// A failing location is logged and recorded; the remaining ones still run.
/// Only failures to create the output directory or write the gallery are returned as errors.
pub fn generate_qr_codes(config: &QrConfig) -> Result<ProvisionReport, Box<dyn std::error::Error>> {
    let output_dir = &config.output_dir;
    std::fs::create_dir_all(output_dir).map_err(|e| {
        format!(
            "Failed to create output directory {}: {}",
            output_dir.display(),
            e
        )
    })?;

    info!(
        "Generating {} QR codes for {} into {}",
        config.location_count,
        config.base_url,
        output_dir.display()
    );

    let locations = catalog(config.location_count);
    let mut report = ProvisionReport::default();

    for location in &locations {
        match write_location_image(location, &config.base_url, output_dir) {
            Ok(path) => {
                info!("Generated QR code for {}", location.id);
                report.generated.push(path);
            }
            Err(e) => {
                error!("Error generating QR code for {}: {}", location.id, e);
                report.failed.push((location.id.clone(), e.to_string()));
            }
        }
    }

    let index_path = output_dir.join("index.html");
    std::fs::write(&index_path, pages::provisioned_index_page(&locations))?;
    info!("Generated QR codes overview page {}", index_path.display());
    report.index_path = index_path;

    Ok(report)
}
