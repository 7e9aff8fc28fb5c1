//! Surface pixel formats and their byte sizes.
//!
//! The numeric values are the hardware `SURFACE_FORMAT` encodings. Kernels and the runtime pass
//! formats around as raw integers, so both the typed enum and the raw-id entry points exist.

use std::fmt;
use std::str::FromStr;

macro_rules! surface_formats {
    ($($variant:ident = $raw:literal => $name:literal,)*) => {
        /// Hardware surface format.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum SurfaceFormat {
            $($variant = $raw,)*
        }

        impl SurfaceFormat {
            /// Every supported format, in encoding order.
            pub const ALL: &'static [SurfaceFormat] = &[$(SurfaceFormat::$variant,)*];

            /// Decodes a raw `SURFACE_FORMAT` value.
            pub fn from_raw(raw: u32) -> Option<Self> {
                match raw {
                    $($raw => Some(SurfaceFormat::$variant),)*
                    _ => None,
                }
            }

            /// Hardware name, e.g. `R32_UINT`.
            pub fn name(self) -> &'static str {
                match self {
                    $(SurfaceFormat::$variant => $name,)*
                }
            }
        }
    };
}

surface_formats! {
    R32G32B32A32Float = 0x000 => "R32G32B32A32_FLOAT",
    R32G32B32A32Sint = 0x001 => "R32G32B32A32_SINT",
    R32G32B32A32Uint = 0x002 => "R32G32B32A32_UINT",
    R32G32B32A32Unorm = 0x003 => "R32G32B32A32_UNORM",
    R32G32B32A32Snorm = 0x004 => "R32G32B32A32_SNORM",
    R64G64Float = 0x005 => "R64G64_FLOAT",
    R32G32B32X32Float = 0x006 => "R32G32B32X32_FLOAT",
    R32G32B32A32Sscaled = 0x007 => "R32G32B32A32_SSCALED",
    R32G32B32A32Uscaled = 0x008 => "R32G32B32A32_USCALED",
    R32G32B32A32Sfixed = 0x020 => "R32G32B32A32_SFIXED",
    R64G64Passthru = 0x021 => "R64G64_PASSTHRU",
    R32G32B32Float = 0x040 => "R32G32B32_FLOAT",
    R32G32B32Sint = 0x041 => "R32G32B32_SINT",
    R32G32B32Uint = 0x042 => "R32G32B32_UINT",
    R32G32B32Unorm = 0x043 => "R32G32B32_UNORM",
    R32G32B32Snorm = 0x044 => "R32G32B32_SNORM",
    R32G32B32Sscaled = 0x045 => "R32G32B32_SSCALED",
    R32G32B32Uscaled = 0x046 => "R32G32B32_USCALED",
    R32G32B32Sfixed = 0x050 => "R32G32B32_SFIXED",
    R16G16B16A16Unorm = 0x080 => "R16G16B16A16_UNORM",
    R16G16B16A16Snorm = 0x081 => "R16G16B16A16_SNORM",
    R16G16B16A16Sint = 0x082 => "R16G16B16A16_SINT",
    R16G16B16A16Uint = 0x083 => "R16G16B16A16_UINT",
    R16G16B16A16Float = 0x084 => "R16G16B16A16_FLOAT",
    R32G32Float = 0x085 => "R32G32_FLOAT",
    R32G32Sint = 0x086 => "R32G32_SINT",
    R32G32Uint = 0x087 => "R32G32_UINT",
    R32FloatX8X24Typeless = 0x088 => "R32_FLOAT_X8X24_TYPELESS",
    X32TypelessG8X24Uint = 0x089 => "X32_TYPELESS_G8X24_UINT",
    L32A32Float = 0x08A => "L32A32_FLOAT",
    R32G32Unorm = 0x08B => "R32G32_UNORM",
    R32G32Snorm = 0x08C => "R32G32_SNORM",
    R64Float = 0x08D => "R64_FLOAT",
    R16G16B16X16Unorm = 0x08E => "R16G16B16X16_UNORM",
    R16G16B16X16Float = 0x08F => "R16G16B16X16_FLOAT",
    A32X32Float = 0x090 => "A32X32_FLOAT",
    L32X32Float = 0x091 => "L32X32_FLOAT",
    I32X32Float = 0x092 => "I32X32_FLOAT",
    R16G16B16A16Sscaled = 0x093 => "R16G16B16A16_SSCALED",
    R16G16B16A16Uscaled = 0x094 => "R16G16B16A16_USCALED",
    R32G32Sscaled = 0x095 => "R32G32_SSCALED",
    R32G32Uscaled = 0x096 => "R32G32_USCALED",
    R32G32Sfixed = 0x0A0 => "R32G32_SFIXED",
    R64Passthru = 0x0A1 => "R64_PASSTHRU",
    B8G8R8A8Unorm = 0x0C0 => "B8G8R8A8_UNORM",
    B8G8R8A8UnormSrgb = 0x0C1 => "B8G8R8A8_UNORM_SRGB",
    R10G10B10A2Unorm = 0x0C2 => "R10G10B10A2_UNORM",
    R10G10B10A2UnormSrgb = 0x0C3 => "R10G10B10A2_UNORM_SRGB",
    R10G10B10A2Uint = 0x0C4 => "R10G10B10A2_UINT",
    R10G10B10SnormA2Unorm = 0x0C5 => "R10G10B10_SNORM_A2_UNORM",
    R8G8B8A8Unorm = 0x0C7 => "R8G8B8A8_UNORM",
    R8G8B8A8UnormSrgb = 0x0C8 => "R8G8B8A8_UNORM_SRGB",
    R8G8B8A8Snorm = 0x0C9 => "R8G8B8A8_SNORM",
    R8G8B8A8Sint = 0x0CA => "R8G8B8A8_SINT",
    R8G8B8A8Uint = 0x0CB => "R8G8B8A8_UINT",
    R16G16Unorm = 0x0CC => "R16G16_UNORM",
    R16G16Snorm = 0x0CD => "R16G16_SNORM",
    R16G16Sint = 0x0CE => "R16G16_SINT",
    R16G16Uint = 0x0CF => "R16G16_UINT",
    R16G16Float = 0x0D0 => "R16G16_FLOAT",
    B10G10R10A2Unorm = 0x0D1 => "B10G10R10A2_UNORM",
    B10G10R10A2UnormSrgb = 0x0D2 => "B10G10R10A2_UNORM_SRGB",
    R11G11B10Float = 0x0D3 => "R11G11B10_FLOAT",
    R32Sint = 0x0D6 => "R32_SINT",
    R32Uint = 0x0D7 => "R32_UINT",
    R32Float = 0x0D8 => "R32_FLOAT",
    R24UnormX8Typeless = 0x0D9 => "R24_UNORM_X8_TYPELESS",
    X24TypelessG8Uint = 0x0DA => "X24_TYPELESS_G8_UINT",
    L32Unorm = 0x0DD => "L32_UNORM",
    A32Unorm = 0x0DE => "A32_UNORM",
    L16A16Unorm = 0x0DF => "L16A16_UNORM",
    I24X8Unorm = 0x0E0 => "I24X8_UNORM",
    L24X8Unorm = 0x0E1 => "L24X8_UNORM",
    A24X8Unorm = 0x0E2 => "A24X8_UNORM",
    I32Float = 0x0E3 => "I32_FLOAT",
    L32Float = 0x0E4 => "L32_FLOAT",
    A32Float = 0x0E5 => "A32_FLOAT",
    X8B8UnormG8R8Snorm = 0x0E6 => "X8B8_UNORM_G8R8_SNORM",
    A8X8UnormG8R8Snorm = 0x0E7 => "A8X8_UNORM_G8R8_SNORM",
    B8X8UnormG8R8Snorm = 0x0E8 => "B8X8_UNORM_G8R8_SNORM",
    B8G8R8X8Unorm = 0x0E9 => "B8G8R8X8_UNORM",
    B8G8R8X8UnormSrgb = 0x0EA => "B8G8R8X8_UNORM_SRGB",
    R8G8B8X8Unorm = 0x0EB => "R8G8B8X8_UNORM",
    R8G8B8X8UnormSrgb = 0x0EC => "R8G8B8X8_UNORM_SRGB",
    R9G9B9E5Sharedexp = 0x0ED => "R9G9B9E5_SHAREDEXP",
    B10G10R10X2Unorm = 0x0EE => "B10G10R10X2_UNORM",
    L16A16Float = 0x0F0 => "L16A16_FLOAT",
    R32Unorm = 0x0F1 => "R32_UNORM",
    R32Snorm = 0x0F2 => "R32_SNORM",
    R10G10B10X2Uscaled = 0x0F3 => "R10G10B10X2_USCALED",
    R8G8B8A8Sscaled = 0x0F4 => "R8G8B8A8_SSCALED",
    R8G8B8A8Uscaled = 0x0F5 => "R8G8B8A8_USCALED",
    R16G16Sscaled = 0x0F6 => "R16G16_SSCALED",
    R16G16Uscaled = 0x0F7 => "R16G16_USCALED",
    R32Sscaled = 0x0F8 => "R32_SSCALED",
    R32Uscaled = 0x0F9 => "R32_USCALED",
    B5G6R5Unorm = 0x100 => "B5G6R5_UNORM",
    B5G6R5UnormSrgb = 0x101 => "B5G6R5_UNORM_SRGB",
    B5G5R5A1Unorm = 0x102 => "B5G5R5A1_UNORM",
    B5G5R5A1UnormSrgb = 0x103 => "B5G5R5A1_UNORM_SRGB",
    B4G4R4A4Unorm = 0x104 => "B4G4R4A4_UNORM",
    B4G4R4A4UnormSrgb = 0x105 => "B4G4R4A4_UNORM_SRGB",
    R8G8Unorm = 0x106 => "R8G8_UNORM",
    R8G8Snorm = 0x107 => "R8G8_SNORM",
    R8G8Sint = 0x108 => "R8G8_SINT",
    R8G8Uint = 0x109 => "R8G8_UINT",
    R16Unorm = 0x10A => "R16_UNORM",
    R16Snorm = 0x10B => "R16_SNORM",
    R16Sint = 0x10C => "R16_SINT",
    R16Uint = 0x10D => "R16_UINT",
    R16Float = 0x10E => "R16_FLOAT",
    A8P8UnormPalette0 = 0x10F => "A8P8_UNORM_PALETTE0",
    A8P8UnormPalette1 = 0x110 => "A8P8_UNORM_PALETTE1",
    I16Unorm = 0x111 => "I16_UNORM",
    L16Unorm = 0x112 => "L16_UNORM",
    A16Unorm = 0x113 => "A16_UNORM",
    L8A8Unorm = 0x114 => "L8A8_UNORM",
    I16Float = 0x115 => "I16_FLOAT",
    L16Float = 0x116 => "L16_FLOAT",
    A16Float = 0x117 => "A16_FLOAT",
    L8A8UnormSrgb = 0x118 => "L8A8_UNORM_SRGB",
    R5G5SnormB6Unorm = 0x119 => "R5G5_SNORM_B6_UNORM",
    B5G5R5X1Unorm = 0x11A => "B5G5R5X1_UNORM",
    B5G5R5X1UnormSrgb = 0x11B => "B5G5R5X1_UNORM_SRGB",
    R8G8Sscaled = 0x11C => "R8G8_SSCALED",
    R8G8Uscaled = 0x11D => "R8G8_USCALED",
    R16Sscaled = 0x11E => "R16_SSCALED",
    R16Uscaled = 0x11F => "R16_USCALED",
    R8Unorm = 0x140 => "R8_UNORM",
    R8Snorm = 0x141 => "R8_SNORM",
    R8Sint = 0x142 => "R8_SINT",
    R8Uint = 0x143 => "R8_UINT",
    A8Unorm = 0x144 => "A8_UNORM",
    I8Unorm = 0x145 => "I8_UNORM",
    L8Unorm = 0x146 => "L8_UNORM",
    P4A4UnormPalette0 = 0x147 => "P4A4_UNORM_PALETTE0",
    A4P4UnormPalette0 = 0x148 => "A4P4_UNORM_PALETTE0",
    R8Sscaled = 0x149 => "R8_SSCALED",
    R8Uscaled = 0x14A => "R8_USCALED",
    P8UnormPalette0 = 0x14B => "P8_UNORM_PALETTE0",
    L8UnormSrgb = 0x14C => "L8_UNORM_SRGB",
    P8UnormPalette1 = 0x14D => "P8_UNORM_PALETTE1",
    P4A4UnormPalette1 = 0x14E => "P4A4_UNORM_PALETTE1",
    A4P4UnormPalette1 = 0x14F => "A4P4_UNORM_PALETTE1",
    Y8Unorm = 0x150 => "Y8_UNORM",
    Dxt1RgbSrgb = 0x180 => "DXT1_RGB_SRGB",
    R1Unorm = 0x181 => "R1_UNORM",
    YcrcbNormal = 0x182 => "YCRCB_NORMAL",
    YcrcbSwapuvy = 0x183 => "YCRCB_SWAPUVY",
    P2UnormPalette0 = 0x184 => "P2_UNORM_PALETTE0",
    P2UnormPalette1 = 0x185 => "P2_UNORM_PALETTE1",
    Bc1Unorm = 0x186 => "BC1_UNORM",
    Bc2Unorm = 0x187 => "BC2_UNORM",
    Bc3Unorm = 0x188 => "BC3_UNORM",
    Bc4Unorm = 0x189 => "BC4_UNORM",
    Bc5Unorm = 0x18A => "BC5_UNORM",
    Bc1UnormSrgb = 0x18B => "BC1_UNORM_SRGB",
    Bc2UnormSrgb = 0x18C => "BC2_UNORM_SRGB",
    Bc3UnormSrgb = 0x18D => "BC3_UNORM_SRGB",
    Mono8 = 0x18E => "MONO8",
    YcrcbSwapuv = 0x18F => "YCRCB_SWAPUV",
    YcrcbSwapy = 0x190 => "YCRCB_SWAPY",
    Dxt1Rgb = 0x191 => "DXT1_RGB",
    Fxt1 = 0x192 => "FXT1",
    R8G8B8Unorm = 0x193 => "R8G8B8_UNORM",
    R8G8B8Snorm = 0x194 => "R8G8B8_SNORM",
    R8G8B8Sscaled = 0x195 => "R8G8B8_SSCALED",
    R8G8B8Uscaled = 0x196 => "R8G8B8_USCALED",
    Bc4Snorm = 0x199 => "BC4_SNORM",
    Bc5Snorm = 0x19A => "BC5_SNORM",
    R16G16B16Float = 0x19B => "R16G16B16_FLOAT",
    R16G16B16Unorm = 0x19C => "R16G16B16_UNORM",
    R16G16B16Snorm = 0x19D => "R16G16B16_SNORM",
    R16G16B16Sscaled = 0x19E => "R16G16B16_SSCALED",
    R16G16B16Uscaled = 0x19F => "R16G16B16_USCALED",
    Planar420_8 = 0x1A5 => "PLANAR_420_8",
    Raw = 0x1FF => "RAW",
}

impl SurfaceFormat {
    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Bytes per pixel as used by media-block boundary math.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            SurfaceFormat::YcrcbNormal | SurfaceFormat::YcrcbSwapy => 2,
            SurfaceFormat::Planar420_8 => 1,
            _ => bytes_per_pixel_for_code(self.raw()),
        }
    }

    /// Packed 4:2:2 formats whose edge pixels need byte-lane replication instead of clamping.
    pub fn is_packed_yuv(self) -> bool {
        matches!(self, SurfaceFormat::YcrcbNormal | SurfaceFormat::YcrcbSwapy)
    }

    /// Planar 4:2:0 formats with a half-height interleaved chroma plane after the luma plane.
    pub fn is_planar_420(self) -> bool {
        matches!(self, SurfaceFormat::Planar420_8)
    }
}

/// Bytes per pixel for a raw format id.
///
/// Ids that do not decode to a known format report 4 bytes, which is what the hardware
/// tables fall back to for buffers registered without a meaningful format.
pub fn bytes_per_pixel_raw(raw: u32) -> u32 {
    match SurfaceFormat::from_raw(raw) {
        Some(format) => format.bytes_per_pixel(),
        None => 4,
    }
}

// Encodings are grouped by element size in 0x40-wide bands.
fn bytes_per_pixel_for_code(raw: u32) -> u32 {
    match raw {
        0x000..=0x03F => 16,
        0x040..=0x07F => 12,
        0x080..=0x0BF => 8,
        0x0C0..=0x0FF => 4,
        0x100..=0x13F => 2,
        0x140..=0x17F => 1,
        _ => 4,
    }
}

impl fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown surface format {0:?}")]
pub struct UnknownFormat(pub String);

impl FromStr for SurfaceFormat {
    type Err = UnknownFormat;

    /// Accepts the hardware name (`R32_UINT`, case-insensitive) or a raw id (`0xd7`, `215`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let raw = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u32::from_str_radix(hex, 16).ok()
        } else {
            s.parse::<u32>().ok()
        };
        if let Some(format) = raw.and_then(SurfaceFormat::from_raw) {
            return Ok(format);
        }
        SurfaceFormat::ALL
            .iter()
            .copied()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownFormat(s.to_string()))
    }
}
