//! Rasterize packed SubTextures into the sheet image and derive the icon.

use image::RgbaImage;
use image::imageops::{self, FilterType};
use tracing::debug;

use crate::report::{BuildReport, BuildWarning};

use super::sub_texture::SubTexture;

/// Counters from one compositing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeStats {
    /// Tile copies drawn into the sheet.
    pub blits: u32,
    /// SubTextures whose pixels were consumed.
    pub sub_textures: u32,
}

/// Draw every SubTexture into a new `width` x `height` sheet.
///
/// Each SubTexture is copied `copies_u` x `copies_v` times starting at its
/// origin. Its source pixels are released as soon as it has been drawn. A
/// copy that would extend past the sheet ends that SubTexture's tiling.
pub fn composite(
    sub_textures: &mut [SubTexture],
    width: u32,
    height: u32,
    report: &mut BuildReport,
) -> (RgbaImage, CompositeStats) {
    let mut sheet = RgbaImage::new(width, height);
    let mut stats = CompositeStats::default();

    for st in sub_textures.iter_mut() {
        let Some(pixels) = st.take_pixels() else {
            continue;
        };
        stats.sub_textures += 1;

        let (origin_x, origin_y) = st.origin();
        let (w, h) = (st.width(), st.height());
        let expected = st.copies_u() * st.copies_v();
        let mut copied = 0u32;

        'tiles: for cu in 0..st.copies_u() {
            for cv in 0..st.copies_v() {
                let off_x = origin_x + w * cu;
                let off_y = origin_y + h * cv;
                if off_x + w > width || off_y + h > height {
                    break 'tiles;
                }
                imageops::replace(&mut sheet, &pixels, i64::from(off_x), i64::from(off_y));
                copied += 1;
            }
        }
        stats.blits += copied;

        if copied < expected {
            report.push(BuildWarning::TileTruncated {
                key: st.key().to_string(),
                copied,
                expected,
            });
        }
    }

    debug!(
        width,
        height,
        blits = stats.blits,
        sub_textures = stats.sub_textures,
        "Composited sheet"
    );
    (sheet, stats)
}

/// Icon dimensions for a sheet, or `None` when the sheet is small enough
/// to be its own icon.
///
/// Larger sheets are scaled by `sqrt(threshold / area)` so the icon's
/// pixel count is about `threshold`.
pub fn icon_dimensions(width: u32, height: u32, threshold: u64) -> Option<(u32, u32)> {
    let area = u64::from(width) * u64::from(height);
    if area <= threshold {
        return None;
    }
    let scale = (threshold as f64 / area as f64).sqrt();
    let w = ((f64::from(width) * scale) as u32).max(1);
    let h = ((f64::from(height) * scale) as u32).max(1);
    Some((w, h))
}

/// Downscale the sheet with a bilinear filter, or `None` to reuse it.
pub fn make_icon(sheet: &RgbaImage, threshold: u64) -> Option<RgbaImage> {
    let (w, h) = icon_dimensions(sheet.width(), sheet.height(), threshold)?;
    debug!(from_w = sheet.width(), from_h = sheet.height(), w, h, "Scaling icon");
    Some(imageops::resize(sheet, w, h, FilterType::Triangle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::wrap::UvBounds;
    use image::Rgba;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn draws_at_origin_and_releases_pixels() {
        let mut subs = vec![
            SubTexture::from_image("red", RgbaImage::from_pixel(4, 4, RED)),
            SubTexture::swatch("generated:blue", BLUE.0),
        ];
        subs[1].set_origin(4, 0);
        let mut report = BuildReport::new();

        let (sheet, stats) = composite(&mut subs, 12, 8, &mut report);
        assert_eq!(sheet.get_pixel(0, 0), &RED);
        assert_eq!(sheet.get_pixel(3, 3), &RED);
        assert_eq!(sheet.get_pixel(4, 0), &BLUE);
        assert_eq!(sheet.get_pixel(11, 7), &BLUE);
        assert_eq!(stats.blits, 2);
        assert!(subs.iter().all(|s| !s.has_pixels()));
        assert!(report.is_empty());
    }

    #[test]
    fn tiles_repeat_copies() {
        let img = RgbaImage::from_fn(2, 2, |x, _| if x == 0 { RED } else { BLUE });
        let mut st = SubTexture::from_image("stripe", img);
        st.extend(&UvBounds {
            min_u: 0,
            max_u: 3,
            min_v: 0,
            max_v: 2,
        });
        let mut subs = vec![st];
        let mut report = BuildReport::new();

        let (sheet, stats) = composite(&mut subs, 6, 4, &mut report);
        assert_eq!(stats.blits, 6);
        for x in 0..6 {
            let expected = if x % 2 == 0 { RED } else { BLUE };
            assert_eq!(sheet.get_pixel(x, 3), &expected);
        }
    }

    #[test]
    fn out_of_bounds_tiles_are_truncated() {
        let img = RgbaImage::from_fn(4, 4, |x, _| if x < 2 { RED } else { BLUE });
        let mut st = SubTexture::from_image("red", img);
        st.extend(&UvBounds {
            min_u: 0,
            max_u: 2,
            min_v: 0,
            max_v: 1,
        });
        let mut subs = vec![st];
        let mut report = BuildReport::new();

        let (_, stats) = composite(&mut subs, 6, 4, &mut report);
        assert_eq!(stats.blits, 1);
        assert_eq!(
            report.warnings(),
            &[BuildWarning::TileTruncated {
                key: "red".into(),
                copied: 1,
                expected: 2
            }]
        );
    }

    #[test]
    fn small_sheet_is_its_own_icon() {
        assert_eq!(icon_dimensions(1024, 1024, 1024 * 1024), None);
        let sheet = RgbaImage::new(8, 8);
        assert!(make_icon(&sheet, 64).is_none());
    }

    #[test]
    fn icon_preserves_aspect_and_area() {
        let (w, h) = icon_dimensions(4096, 1024, 1024 * 1024).unwrap();
        assert_eq!((w, h), (2048, 512));
        assert!(u64::from(w) * u64::from(h) <= 1024 * 1024);

        let sheet = RgbaImage::from_pixel(64, 16, RED);
        let icon = make_icon(&sheet, 256).unwrap();
        assert_eq!(icon.dimensions(), (32, 8));
        assert_eq!(icon.get_pixel(10, 4), &RED);
    }
}
