//! QR code rasterization for `/png.sqrl`.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, Luma};
use qrcode::{Color, QrCode};

use crate::{Result, SspError};

/// Pixels per QR module.
const SCALE: u32 = 8;
/// Quiet-zone width in modules, per the QR spec.
const QUIET_ZONE: u32 = 4;

/// Render a payload (the `sqrl://` login URL) as a PNG image.
pub fn render_png(payload: &str) -> Result<Vec<u8>> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| SspError::Qr(e.to_string()))?;
    let modules = code.width() as u32;
    let size = (modules + 2 * QUIET_ZONE) * SCALE;

    let mut image = GrayImage::from_pixel(size, size, Luma([0xFF]));
    for y in 0..modules {
        for x in 0..modules {
            if code[(x as usize, y as usize)] == Color::Dark {
                let left = (x + QUIET_ZONE) * SCALE;
                let top = (y + QUIET_ZONE) * SCALE;
                for py in top..top + SCALE {
                    for px in left..left + SCALE {
                        image.put_pixel(px, py, Luma([0x00]));
                    }
                }
            }
        }
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| SspError::Png(e.to_string()))?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_render_is_png() {
        let png =
            render_png("sqrl://example.com/cli.sqrl?nut=oHEbbCFEu0nMdJORt8kAyw").expect("render");
        assert!(png.len() > 8);
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_render_empty_payload() {
        let png = render_png("").expect("render");
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_different_payloads_differ() {
        let a = render_png("sqrl://example.com/cli.sqrl?nut=aaaa").expect("render");
        let b = render_png("sqrl://example.com/cli.sqrl?nut=bbbb").expect("render");
        assert_ne!(a, b);
    }
}
