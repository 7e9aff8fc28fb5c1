//! 2D media-block reads and writes.
//!
//! A block is `R` rows of `C` elements. Element `(i, j)` lives at byte `x + j * size_of::<T>()`
//! of row `y + i` (or of the interlaced row for field attributes). Reads never fail on bounds:
//! rows clamp to the surface and columns replicate the edge pixel. Writes drop cells that fall
//! outside the surface.

use cm_surface::{SurfaceDescriptor, SurfaceId};

use crate::attrib::{BufferAttrib, Field, SurfacePlane};
use crate::context::{block_read_view, block_write_view, require_aligned, EmuContext};
use crate::edge::EdgeStrategy;
use crate::element::{load, store, Element};
use crate::error::{DataportError, Result};
use crate::stats::LaneTally;

/// Row layout of the plane a block call addresses.
#[derive(Clone, Copy, Debug)]
struct PlaneGeometry {
    width: i64,
    rows: i64,
    first_row: u64,
    row_pitch: u64,
}

impl PlaneGeometry {
    fn new(desc: &SurfaceDescriptor, plane: SurfacePlane, op: &'static str) -> Result<Self> {
        let height = u64::from(desc.height());
        let (first_row, rows) = match plane {
            SurfacePlane::Y => (0, height),
            SurfacePlane::Uv => {
                if !desc.format().is_planar_420() {
                    return Err(DataportError::UnsupportedFormat {
                        id: desc.id(),
                        op,
                        format: desc.format(),
                    });
                }
                if desc.chroma_rows() == 0 {
                    return Err(DataportError::InvalidSurfaceShape {
                        id: desc.id(),
                        op,
                        height: desc.height(),
                        expected: 2,
                    });
                }
                (height, u64::from(desc.chroma_rows()))
            }
        };
        Ok(Self {
            width: i64::from(desc.width()),
            rows: rows as i64,
            first_row,
            row_pitch: desc.row_pitch(),
        })
    }

    /// Bytes `[0, width)` of plane row `row`, which must be in range.
    fn row<'a>(&self, bytes: &'a [u8], row: i64) -> &'a [u8] {
        let start = (self.first_row + row as u64) * self.row_pitch;
        let start = start as usize;
        &bytes[start..start + self.width as usize]
    }

    fn row_offset(&self, row: i64) -> u64 {
        (self.first_row + row as u64) * self.row_pitch
    }
}

fn surface_row(field: Option<Field>, y: i64) -> i64 {
    match field {
        Some(field) => field.surface_row(y),
        None => y,
    }
}

impl EmuContext {
    /// Reads an `R`x`C` block whose top-left element is at byte column `x`, row `y`.
    pub fn read_block_2d<T: Element, const R: usize, const C: usize>(
        &self,
        id: SurfaceId,
        attrib: BufferAttrib,
        x: i32,
        y: i32,
    ) -> Result<[[T; C]; R]> {
        self.read_media_block("read_block_2d", id, attrib, SurfacePlane::Y, x, y)
    }

    /// Reads a block from one plane of a planar surface.
    pub fn read_plane<T: Element, const R: usize, const C: usize>(
        &self,
        id: SurfaceId,
        plane: SurfacePlane,
        x: i32,
        y: i32,
    ) -> Result<[[T; C]; R]> {
        self.read_media_block("read_plane", id, BufferAttrib::None, plane, x, y)
    }

    /// Reads an `R`x`C` block and returns it transposed.
    pub fn read_transpose<T: Element, const R: usize, const C: usize>(
        &self,
        id: SurfaceId,
        x: i32,
        y: i32,
    ) -> Result<[[T; R]; C]> {
        let block: [[T; C]; R] = self.read_media_block("read_transpose", id, BufferAttrib::None, SurfacePlane::Y, x, y)?;
        let mut out = [[T::default(); R]; C];
        for (i, row) in block.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                out[j][i] = *value;
            }
        }
        Ok(out)
    }

    /// Writes an `R`x`C` block. `x` and the block's row length must be DWord multiples.
    pub fn write_block_2d<T: Element, const R: usize, const C: usize>(
        &self,
        id: SurfaceId,
        attrib: BufferAttrib,
        x: i32,
        y: i32,
        block: &[[T; C]; R],
    ) -> Result<()> {
        self.write_media_block("write_block_2d", id, attrib, SurfacePlane::Y, x, y, block)
    }

    /// Writes a block into one plane of a planar surface.
    pub fn write_plane<T: Element, const R: usize, const C: usize>(
        &self,
        id: SurfaceId,
        plane: SurfacePlane,
        x: i32,
        y: i32,
        block: &[[T; C]; R],
    ) -> Result<()> {
        self.write_media_block("write_plane", id, BufferAttrib::None, plane, x, y, block)
    }

    fn read_media_block<T: Element, const R: usize, const C: usize>(
        &self,
        op: &'static str,
        id: SurfaceId,
        attrib: BufferAttrib,
        plane: SurfacePlane,
        x: i32,
        y: i32,
    ) -> Result<[[T; C]; R]> {
        self.dispatch(op, Some(id), || {
            let desc = self.resolve(id, op)?;
            let view = block_read_view(&desc, attrib, op)?;
            let geo = PlaneGeometry::new(&desc, plane, op)?;
            let edge = EdgeStrategy::for_format(desc.format());
            let field = attrib.field();
            let size = T::SIZE as i64;

            let mut out = [[T::default(); C]; R];
            let mut lanes = LaneTally::default();
            let bytes = view.read();
            for (i, out_row) in out.iter_mut().enumerate() {
                let row_y = surface_row(field, i64::from(y) + i as i64);
                let clamped_y = row_y.clamp(0, geo.rows - 1);
                let row = geo.row(&bytes, clamped_y);
                for (j, cell) in out_row.iter_mut().enumerate() {
                    let col_x = i64::from(x) + j as i64 * size;
                    let inside = col_x >= 0 && col_x + size <= geo.width;
                    *cell = match inside.then(|| load(row, col_x as u64)).flatten() {
                        Some(value) => value,
                        None => edge.element(row, col_x),
                    };
                    if inside && clamped_y == row_y {
                        lanes.executed();
                    } else {
                        lanes.out_of_bounds();
                    }
                }
            }
            drop(bytes);

            self.stats().inc_reads();
            self.finish(lanes);
            Ok(out)
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn write_media_block<T: Element, const R: usize, const C: usize>(
        &self,
        op: &'static str,
        id: SurfaceId,
        attrib: BufferAttrib,
        plane: SurfacePlane,
        x: i32,
        y: i32,
        block: &[[T; C]; R],
    ) -> Result<()> {
        self.dispatch(op, Some(id), || {
            let desc = self.resolve(id, op)?;
            let view = block_write_view(&desc, op)?;
            require_aligned(id, op, i64::from(x), 4)?;
            let row_bytes = (C * T::SIZE) as u64;
            if row_bytes % 4 != 0 {
                return Err(DataportError::MisalignedSize {
                    id,
                    op,
                    bytes: row_bytes,
                    required: 4,
                });
            }
            let geo = PlaneGeometry::new(&desc, plane, op)?;
            let field = attrib.field();
            let size = T::SIZE as i64;

            let mut lanes = LaneTally::default();
            let mut bytes = view.write();
            for (i, src_row) in block.iter().enumerate() {
                let row_y = surface_row(field, i64::from(y) + i as i64);
                for (j, value) in src_row.iter().enumerate() {
                    let col_x = i64::from(x) + j as i64 * size;
                    let inside = (0..geo.rows).contains(&row_y) && col_x >= 0 && col_x + size <= geo.width;
                    if inside && store(&mut bytes, geo.row_offset(row_y) + col_x as u64, *value) {
                        lanes.executed();
                    } else {
                        lanes.out_of_bounds();
                    }
                }
            }
            drop(bytes);

            self.stats().inc_writes();
            self.finish(lanes);
            Ok(())
        })
    }
}
