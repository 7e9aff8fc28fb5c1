//! JSON replay scripts.
//!
//! A script is an array of steps, each tagged by `"step"`:
//!
//! ```json
//! [
//!   { "step": "register", "id": 7, "kind": "input_output", "width": 64, "format": "R32_UINT" },
//!   { "step": "write_block_1d", "id": 7, "offset": 0, "values": [1, 2, 3, 4] },
//!   { "step": "atomic", "id": 7, "opcode": "add", "offsets": [0, 1, 2, 3, 16, 16, 16, 16],
//!     "src0": [10, 10, 10, 10, 10, 10, 10, 10] },
//!   { "step": "dump", "id": 7 }
//! ]
//! ```
//!
//! Numbers are JSON numbers interpreted as the step's `element` type (`u32` unless given).

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use cm_dataport::{AtomicOp, BufferAttrib, BufferKind, Element, SurfaceFormat};
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    #[default]
    U32,
    I32,
    F32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Register {
        id: u32,
        kind: String,
        width: u32,
        #[serde(default = "one")]
        height: u32,
        #[serde(default = "one")]
        depth: u32,
        #[serde(default)]
        pitch: u32,
        #[serde(default)]
        format: Option<String>,
        /// Backing store size in bytes; defaults to what the geometry needs.
        #[serde(default)]
        size: Option<usize>,
        /// Initial contents, as elements from byte 0.
        #[serde(default)]
        init: Vec<f64>,
        #[serde(default)]
        element: ElementType,
    },
    Unregister {
        id: u32,
    },
    WriteBlock1d {
        id: u32,
        offset: u32,
        values: Vec<f64>,
        #[serde(default)]
        element: ElementType,
    },
    ReadBlock1d {
        id: u32,
        offset: u32,
        count: usize,
        #[serde(default)]
        attrib: Option<String>,
        #[serde(default)]
        element: ElementType,
    },
    ReadScattered {
        id: u32,
        #[serde(default)]
        global_offset: u32,
        offsets: Vec<u32>,
        #[serde(default)]
        attrib: Option<String>,
        #[serde(default)]
        mask: Option<Vec<bool>>,
        #[serde(default)]
        element: ElementType,
    },
    WriteScattered {
        id: u32,
        #[serde(default)]
        global_offset: u32,
        offsets: Vec<u32>,
        values: Vec<f64>,
        #[serde(default)]
        mask: Option<Vec<bool>>,
        #[serde(default)]
        element: ElementType,
    },
    Atomic {
        id: u32,
        opcode: String,
        #[serde(default)]
        global_offset: u32,
        offsets: Vec<u32>,
        #[serde(default)]
        src0: Option<Vec<f64>>,
        #[serde(default)]
        src1: Option<Vec<f64>>,
        #[serde(default)]
        mask: Option<Vec<bool>>,
        #[serde(default)]
        element: ElementType,
    },
    Dump {
        id: u32,
        #[serde(default)]
        element: ElementType,
    },
}

fn one() -> u32 {
    1
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Register { .. } => "register",
            Step::Unregister { .. } => "unregister",
            Step::WriteBlock1d { .. } => "write_block_1d",
            Step::ReadBlock1d { .. } => "read_block_1d",
            Step::ReadScattered { .. } => "read_scattered",
            Step::WriteScattered { .. } => "write_scattered",
            Step::Atomic { .. } => "atomic",
            Step::Dump { .. } => "dump",
        }
    }
}

pub fn parse_script(json: &str) -> Result<Vec<Step>> {
    serde_json::from_str(json).context("parse replay script")
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let json = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_script(&json).with_context(|| format!("in {}", path.display()))
}

/// Element types a script can carry.
pub trait ScriptElement: Element + fmt::Display {
    fn from_json(value: f64) -> Result<Self>;

    fn vec_from_json(values: &[f64]) -> Result<Vec<Self>> {
        values.iter().map(|&v| Self::from_json(v)).collect()
    }
}

impl ScriptElement for u32 {
    fn from_json(value: f64) -> Result<Self> {
        ensure!(
            value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value),
            "{value} is not a u32"
        );
        Ok(value as u32)
    }
}

impl ScriptElement for i32 {
    fn from_json(value: f64) -> Result<Self> {
        ensure!(
            value.fract() == 0.0 && (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&value),
            "{value} is not an i32"
        );
        Ok(value as i32)
    }
}

impl ScriptElement for f32 {
    fn from_json(value: f64) -> Result<Self> {
        Ok(value as f32)
    }
}

pub fn parse_kind(kind: &str) -> Result<BufferKind> {
    kind.parse::<BufferKind>()
        .map_err(|_| anyhow::anyhow!("unknown buffer kind {kind:?}"))
}

pub fn parse_format(format: Option<&str>) -> Result<Option<SurfaceFormat>> {
    format
        .map(|f| f.parse::<SurfaceFormat>().map_err(anyhow::Error::from))
        .transpose()
}

pub fn parse_opcode(name: &str) -> Result<AtomicOp> {
    if let Some(op) = AtomicOp::from_name(name) {
        return Ok(op);
    }
    let raw = match name.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => name.parse(),
    };
    match raw {
        Ok(raw) => Ok(AtomicOp::from_raw(raw)?),
        Err(_) => bail!("unknown atomic opcode {name:?}"),
    }
}

pub fn parse_attrib(attrib: Option<&str>) -> Result<BufferAttrib> {
    let Some(attrib) = attrib else {
        return Ok(BufferAttrib::None);
    };
    Ok(match attrib.to_ascii_lowercase().as_str() {
        "none" | "" => BufferAttrib::None,
        "top_field" => BufferAttrib::TopField,
        "bottom_field" => BufferAttrib::BottomField,
        "dw_aligned" => BufferAttrib::DwAligned,
        "modified" => BufferAttrib::Modified,
        "modified_top_field" => BufferAttrib::ModifiedTopField,
        "modified_bottom_field" => BufferAttrib::ModifiedBottomField,
        "modified_dw_aligned" => BufferAttrib::ModifiedDwAligned,
        "constant" => BufferAttrib::Constant,
        "constant_dw_aligned" => BufferAttrib::ConstantDwAligned,
        other => bail!("unknown buffer attribute {other:?}"),
    })
}
