//! Greedy row (shelf) packing.

use tracing::debug;

use crate::report::{BuildReport, BuildWarning};

use super::sub_texture::SubTexture;

/// Position of one rectangle in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &Placement) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Result of shelf packing, with placements in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ShelfLayout {
    pub width: u32,
    pub height: u32,
    pub placements: Vec<Placement>,
}

/// Pack `(width, height)` rectangles left to right in rows no wider than
/// `max_width`.
///
/// Rectangles are visited largest area first (ties keep input order). The
/// resulting sheet is at least 1x1.
pub fn shelf_pack(sizes: &[(u32, u32)], max_width: u32) -> ShelfLayout {
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(u64::from(sizes[i].0) * u64::from(sizes[i].1)));

    let mut placements = vec![
        Placement {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
        sizes.len()
    ];

    let mut current_x = 0u32;
    let mut current_y = 0u32;
    let mut row_height = 0u32;
    let mut width = 0u32;
    let mut height = 0u32;

    for idx in order {
        let (w, h) = sizes[idx];

        if current_x + w > max_width {
            current_x = 0;
            current_y += row_height;
            row_height = 0;
        }

        placements[idx] = Placement {
            x: current_x,
            y: current_y,
            width: w,
            height: h,
        };

        row_height = row_height.max(h);
        current_x += w;
        width = width.max(current_x);
        height = height.max(current_y + row_height);
    }

    ShelfLayout {
        width: width.max(1),
        height: height.max(1),
        placements,
    }
}

/// Assign an origin to every SubTexture and return the sheet size.
///
/// Sheets larger than `max_texture_size` are reported, not rejected.
pub fn pack(
    sub_textures: &mut [SubTexture],
    max_texture_size: u32,
    report: &mut BuildReport,
) -> (u32, u32) {
    let sizes: Vec<(u32, u32)> = sub_textures
        .iter()
        .map(|st| (st.placed_width(), st.placed_height()))
        .collect();

    for st in sub_textures.iter() {
        if st.placed_width() > max_texture_size {
            report.push(BuildWarning::OversizedSubTexture {
                key: st.key().to_string(),
                width: st.placed_width(),
                max: max_texture_size,
            });
        }
    }

    let layout = shelf_pack(&sizes, max_texture_size);
    for (st, p) in sub_textures.iter_mut().zip(&layout.placements) {
        st.set_origin(p.x, p.y);
        debug!(
            key = st.key(),
            x = p.x,
            y = p.y,
            copies_u = st.copies_u(),
            copies_v = st.copies_v(),
            "Placed SubTexture"
        );
    }

    debug!(max_texture_size, width = layout.width, height = layout.height, "Packed sheet");
    if layout.width > max_texture_size || layout.height > max_texture_size {
        report.push(BuildWarning::SheetExceedsLimit {
            width: layout.width,
            height: layout.height,
            max: max_texture_size,
        });
    }

    (layout.width, layout.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn assert_no_overlap(placements: &[Placement]) {
        for (i, a) in placements.iter().enumerate() {
            for b in &placements[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn empty_input_is_one_by_one() {
        let layout = shelf_pack(&[], 4096);
        assert_eq!((layout.width, layout.height), (1, 1));
        assert!(layout.placements.is_empty());
    }

    #[test]
    fn texture_and_swatch_side_by_side() {
        let layout = shelf_pack(&[(8, 8), (16, 16)], 4096);
        assert_eq!((layout.width, layout.height), (24, 16));
        // Larger first.
        assert_eq!(layout.placements[1].x, 0);
        assert_eq!(layout.placements[0].x, 16);
        assert_no_overlap(&layout.placements);
    }

    #[test]
    fn wraps_to_next_row() {
        let layout = shelf_pack(&[(64, 32), (64, 16), (64, 8)], 128);
        assert_eq!(layout.placements[0], Placement { x: 0, y: 0, width: 64, height: 32 });
        assert_eq!(layout.placements[1], Placement { x: 64, y: 0, width: 64, height: 16 });
        assert_eq!(layout.placements[2], Placement { x: 0, y: 32, width: 64, height: 8 });
        assert_eq!((layout.width, layout.height), (128, 40));
        assert_no_overlap(&layout.placements);
    }

    #[test]
    fn many_rects_never_overlap() {
        let sizes: Vec<(u32, u32)> = (0..60u32)
            .map(|i| (4 + (i * 7) % 29, 3 + (i * 11) % 23))
            .collect();
        let layout = shelf_pack(&sizes, 100);
        assert_no_overlap(&layout.placements);
        for p in &layout.placements {
            assert!(p.right() <= layout.width);
            assert!(p.bottom() <= layout.height);
        }
    }

    #[test]
    fn oversized_sheet_is_reported() {
        let mut subs = vec![
            SubTexture::from_image("a", RgbaImage::from_pixel(64, 64, Rgba([1, 2, 3, 255]))),
            SubTexture::from_image("b", RgbaImage::from_pixel(64, 64, Rgba([3, 2, 1, 255]))),
        ];
        let mut report = BuildReport::new();
        let (w, h) = pack(&mut subs, 32, &mut report);

        assert_eq!((w, h), (64, 128));
        assert!(report.warnings().iter().any(|w| matches!(w, BuildWarning::SheetExceedsLimit { .. })));
        assert_eq!(
            report
                .warnings()
                .iter()
                .filter(|w| matches!(w, BuildWarning::OversizedSubTexture { .. }))
                .count(),
            2
        );
        assert_eq!(subs[0].origin(), (0, 0));
        assert_eq!(subs[1].origin(), (0, 64));
    }
}
