//! What a media-block read returns for bytes left or right of the surface.
//!
//! Hardware never reads outside a surface row: it replicates edge pixels. For ordinary formats
//! that means stepping back (or forward) by whole pixels until the address is inside the row. For
//! packed 4:2:2 formats a pixel pair shares its chroma bytes, so the edge macropixel is rebuilt
//! lane by lane: chroma lanes copy the boundary macropixel's chroma and luma lanes copy the
//! boundary luma sample.

use cm_surface::SurfaceFormat;

use crate::element::{assemble, load, Element};

/// Byte order of a packed 4:2:2 macropixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct YuvLayout {
    /// Byte lane of the left luma sample.
    y0: i64,
    /// Byte lane of the right luma sample.
    y1: i64,
}

impl YuvLayout {
    /// `YCRCB_NORMAL`: Y0 U Y1 V.
    const YUYV: YuvLayout = YuvLayout { y0: 0, y1: 2 };
    /// `YCRCB_SWAPY`: U Y0 V Y1.
    const UYVY: YuvLayout = YuvLayout { y0: 1, y1: 3 };

    fn is_luma(self, lane: i64) -> bool {
        lane == self.y0 || lane == self.y1
    }

    /// Row index supplying byte `pos`, which lies outside `[0, width)`.
    fn source(self, width: i64, pos: i64) -> i64 {
        let lane = pos.rem_euclid(4);
        let (base, luma) = if pos >= width {
            let base = (width - 1) / 4 * 4;
            (base, base + self.y1)
        } else {
            (0, self.y0)
        };
        let src = if self.is_luma(lane) { luma } else { base + lane };
        src.clamp(0, width - 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EdgeStrategy {
    /// Replicate the boundary pixel, `bpp` bytes wide.
    Replicate { bpp: i64 },
    /// Rebuild the boundary macropixel of a packed 4:2:2 surface.
    PackedYuv(YuvLayout),
}

impl EdgeStrategy {
    pub(crate) fn for_format(format: SurfaceFormat) -> Self {
        match format {
            SurfaceFormat::YcrcbNormal => EdgeStrategy::PackedYuv(YuvLayout::YUYV),
            SurfaceFormat::YcrcbSwapy => EdgeStrategy::PackedYuv(YuvLayout::UYVY),
            other => EdgeStrategy::Replicate {
                bpp: i64::from(other.bytes_per_pixel()),
            },
        }
    }

    /// Element at byte `x` of `row`, where `row` is exactly `width` bytes and the element is not
    /// fully inside it.
    pub(crate) fn element<T: Element>(self, row: &[u8], x: i64) -> T {
        let width = row.len() as i64;
        let size = T::SIZE as i64;
        match self {
            EdgeStrategy::Replicate { bpp } => {
                if size <= bpp {
                    if let Some(x) = step_inside(x, size, width, bpp) {
                        if let Some(value) = load(row, x as u64) {
                            return value;
                        }
                    }
                }
                assemble(|k| row[clamp_byte(x + k as i64, width, bpp) as usize])
            }
            EdgeStrategy::PackedYuv(layout) => assemble(|k| {
                let pos = x + k as i64;
                let src = if (0..width).contains(&pos) {
                    pos
                } else {
                    layout.source(width, pos)
                };
                row[src as usize]
            }),
        }
    }
}

fn div_ceil(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

/// Shifts `x` by whole pixels until `[x, x + size)` lies inside the row.
fn step_inside(mut x: i64, size: i64, width: i64, bpp: i64) -> Option<i64> {
    if x + size > width {
        x -= div_ceil(x + size - width, bpp) * bpp;
    }
    if x < 0 {
        x += div_ceil(-x, bpp) * bpp;
    }
    (x >= 0 && x + size <= width).then_some(x)
}

/// Shifts byte position `pos` by whole pixels into `[0, width)`.
fn clamp_byte(mut pos: i64, width: i64, bpp: i64) -> i64 {
    if pos >= width {
        pos -= div_ceil(pos - width + 1, bpp) * bpp;
    }
    if pos < 0 {
        pos += div_ceil(-pos, bpp) * bpp;
    }
    pos.clamp(0, width - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_row(pixels: &[u32]) -> Vec<u8> {
        pixels.iter().flat_map(|p| p.to_ne_bytes()).collect()
    }

    #[test]
    fn replicates_last_pixel_past_right_edge() {
        let row = u32_row(&[10, 11, 12, 13]);
        let edge = EdgeStrategy::for_format(SurfaceFormat::R32Uint);
        assert_eq!(edge.element::<u32>(&row, 16), 13);
        assert_eq!(edge.element::<u32>(&row, 28), 13);
        // A misaligned read straddling the edge steps back a whole pixel.
        assert_eq!(edge.element::<u32>(&row, 14), u32::from_ne_bytes([row[10], row[11], row[12], row[13]]));
    }

    #[test]
    fn replicates_first_pixel_past_left_edge() {
        let row = u32_row(&[10, 11, 12, 13]);
        let edge = EdgeStrategy::for_format(SurfaceFormat::R32Uint);
        assert_eq!(edge.element::<u32>(&row, -4), 10);
        assert_eq!(edge.element::<u32>(&row, -12), 10);
    }

    #[test]
    fn wide_elements_fill_byte_by_byte() {
        let row: Vec<u8> = (1..=8).collect();
        let edge = EdgeStrategy::for_format(SurfaceFormat::R8Uint);
        let value: u32 = edge.element(&row, 6);
        assert_eq!(value.to_ne_bytes(), [7, 8, 8, 8]);
        let value: u32 = edge.element(&row, -2);
        assert_eq!(value.to_ne_bytes(), [1, 1, 1, 2]);
    }

    #[test]
    fn yuyv_right_edge_keeps_chroma_lanes() {
        // Y0 U0 Y1 V0 | Y2 U1 Y3 V1
        let row = [0x10, 0x80, 0x11, 0x90, 0x12, 0x81, 0x13, 0x91];
        let edge = EdgeStrategy::for_format(SurfaceFormat::YcrcbNormal);
        let value: u32 = edge.element(&row, 8);
        assert_eq!(value.to_ne_bytes(), [0x13, 0x81, 0x13, 0x91]);

        // Straddling: the in-bounds bytes are read as-is.
        let value: u32 = edge.element(&row, 6);
        assert_eq!(value.to_ne_bytes(), [0x13, 0x91, 0x13, 0x81]);
    }

    #[test]
    fn yuyv_left_edge_uses_first_luma() {
        let row = [0x10, 0x80, 0x11, 0x90, 0x12, 0x81, 0x13, 0x91];
        let edge = EdgeStrategy::for_format(SurfaceFormat::YcrcbNormal);
        let value: u32 = edge.element(&row, -4);
        assert_eq!(value.to_ne_bytes(), [0x10, 0x80, 0x10, 0x90]);
    }

    #[test]
    fn uyvy_right_edge() {
        // U0 Y0 V0 Y1 | U1 Y2 V1 Y3
        let row = [0x80, 0x10, 0x90, 0x11, 0x81, 0x12, 0x91, 0x13];
        let edge = EdgeStrategy::for_format(SurfaceFormat::YcrcbSwapy);
        let value: u32 = edge.element(&row, 8);
        assert_eq!(value.to_ne_bytes(), [0x81, 0x13, 0x91, 0x13]);
    }
}
