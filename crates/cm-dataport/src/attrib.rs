use bitflags::bitflags;

use crate::error::{DataportError, Result};

/// Buffer attribute of a block read or write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BufferAttrib {
    #[default]
    None,
    TopField,
    BottomField,
    DwAligned,
    Modified,
    ModifiedTopField,
    ModifiedBottomField,
    ModifiedDwAligned,
    Constant,
    ConstantDwAligned,
}

/// Interlaced field selected by a field attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Top,
    Bottom,
}

impl Field {
    /// Surface row holding logical row `row` of this field.
    pub fn surface_row(self, row: i64) -> i64 {
        match self {
            Field::Top => 2 * row,
            Field::Bottom => 2 * row + 1,
        }
    }
}

impl BufferAttrib {
    /// Reads through the volatile view (data written earlier by the same kernel).
    pub fn is_modified(self) -> bool {
        matches!(
            self,
            BufferAttrib::Modified
                | BufferAttrib::ModifiedTopField
                | BufferAttrib::ModifiedBottomField
                | BufferAttrib::ModifiedDwAligned
        )
    }

    /// Attributes at or above `Modified`, constant ones included, need an input/output surface
    /// and read its volatile view.
    pub fn reads_volatile_view(self) -> bool {
        self.is_modified() || matches!(self, BufferAttrib::Constant | BufferAttrib::ConstantDwAligned)
    }

    /// Relaxes OWord block alignment from 16 to 4 bytes.
    pub fn is_dw_aligned(self) -> bool {
        matches!(
            self,
            BufferAttrib::DwAligned | BufferAttrib::ModifiedDwAligned | BufferAttrib::ConstantDwAligned
        )
    }

    pub fn field(self) -> Option<Field> {
        match self {
            BufferAttrib::TopField | BufferAttrib::ModifiedTopField => Some(Field::Top),
            BufferAttrib::BottomField | BufferAttrib::ModifiedBottomField => Some(Field::Bottom),
            _ => None,
        }
    }
}

/// Per-lane execution mask. Lanes with a `false` flag have no side effect.
#[derive(Clone, Copy, Debug, Default)]
pub enum LaneMask<'a> {
    #[default]
    All,
    Lanes(&'a [bool]),
}

impl<'a> LaneMask<'a> {
    pub fn enabled(&self, lane: usize) -> bool {
        match self {
            LaneMask::All => true,
            LaneMask::Lanes(flags) => flags.get(lane).copied().unwrap_or(false),
        }
    }

    pub(crate) fn check_len(&self, op: &'static str, lanes: usize) -> Result<()> {
        match self {
            LaneMask::Lanes(flags) if flags.len() != lanes => Err(DataportError::VectorLengthMismatch {
                op,
                what: "mask",
                expected: lanes,
                found: flags.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl<'a> From<&'a [bool]> for LaneMask<'a> {
    fn from(flags: &'a [bool]) -> Self {
        LaneMask::Lanes(flags)
    }
}

bitflags! {
    /// Channels enabled for a typed or untyped access.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl ChannelMask {
    pub const RG: ChannelMask = ChannelMask::R.union(ChannelMask::G);
    pub const RGB: ChannelMask = ChannelMask::RG.union(ChannelMask::B);
    pub const RGBA: ChannelMask = ChannelMask::all();

    /// Positions (R=0 .. A=3) of the enabled channels, in R, G, B, A order.
    pub fn positions(self) -> impl Iterator<Item = u32> {
        (0..4u32).filter(move |c| self.bits() & (1 << c) != 0)
    }

    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }
}

/// Plane of a planar 4:2:0 surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SurfacePlane {
    /// Full-resolution luma plane. Also the only plane of non-planar surfaces.
    #[default]
    Y,
    /// Half-height interleaved chroma plane.
    Uv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_classification() {
        assert!(BufferAttrib::ModifiedTopField.is_modified());
        assert!(!BufferAttrib::Constant.is_modified());
        assert!(BufferAttrib::Constant.reads_volatile_view());
        assert!(BufferAttrib::ConstantDwAligned.reads_volatile_view());
        assert!(BufferAttrib::ModifiedDwAligned.reads_volatile_view());
        assert!(!BufferAttrib::BottomField.reads_volatile_view());
        assert!(BufferAttrib::ConstantDwAligned.is_dw_aligned());
        assert_eq!(BufferAttrib::ModifiedBottomField.field(), Some(Field::Bottom));
        assert_eq!(BufferAttrib::DwAligned.field(), None);
        assert_eq!(Field::Top.surface_row(3), 6);
        assert_eq!(Field::Bottom.surface_row(3), 7);
    }

    #[test]
    fn channel_positions() {
        let mask = ChannelMask::R | ChannelMask::B | ChannelMask::A;
        assert_eq!(mask.positions().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(mask.count(), 3);
        assert_eq!(ChannelMask::RGBA.count(), 4);
        assert_eq!(ChannelMask::RGB.positions().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn mask_length_checked() {
        let flags = [true, false];
        let mask = LaneMask::from(&flags[..]);
        assert!(mask.check_len("test", 2).is_ok());
        assert!(mask.check_len("test", 8).is_err());
        assert!(!mask.enabled(1));
        assert!(LaneMask::All.enabled(31));
    }
}
