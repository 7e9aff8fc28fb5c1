//! Replays JSON scripts of dataport operations against a fresh [`EmuContext`].

pub mod script;

use std::io::Write;

use anyhow::{Context, Result};
use cm_dataport::fatal::or_abort;
use cm_dataport::{
    AtomicOperands, DataportError, Element, EmuContext, LaneMask, Registration, SurfaceFormat, SurfaceId,
    SurfaceMemory,
};
use tracing::{debug, info};

use crate::script::{parse_attrib, parse_format, parse_kind, parse_opcode, ElementType, ScriptElement, Step};

/// Runs `$body` with `$t` bound to the Rust type of a script element type.
macro_rules! with_element {
    ($element:expr, |$t:ident| $body:expr) => {
        match $element {
            ElementType::U32 => {
                type $t = u32;
                $body
            }
            ElementType::I32 => {
                type $t = i32;
                $body
            }
            ElementType::F32 => {
                type $t = f32;
                $body
            }
        }
    };
}

/// Outcome of a replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub failed: usize,
}

/// Runs `steps` in order, printing one line per step that produces data.
///
/// A step rejected by the dataport is reported on `out` and the replay continues, unless
/// `abort_on_error` is set, in which case the process exits. Malformed steps (bad numbers, unknown
/// names) end the replay with an error.
pub fn replay(ctx: &EmuContext, steps: &[Step], out: &mut dyn Write, abort_on_error: bool) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (index, step) in steps.iter().enumerate() {
        summary.steps += 1;
        debug!(index, step = step.name(), "replaying step");
        match run_step(ctx, step) {
            Ok(Some(line)) => writeln!(out, "step {index} {}: {line}", step.name())?,
            Ok(None) => {}
            Err(err) => match err.downcast::<DataportError>() {
                Ok(err) => {
                    if abort_on_error {
                        or_abort::<(), _>(Err(err.clone()));
                    }
                    summary.failed += 1;
                    writeln!(out, "step {index} {}: error: {err}", step.name())?;
                }
                Err(err) => return Err(err.context(format!("step {index} ({})", step.name()))),
            },
        }
    }
    info!(steps = summary.steps, failed = summary.failed, "replay finished");
    Ok(summary)
}

fn run_step(ctx: &EmuContext, step: &Step) -> Result<Option<String>> {
    match *step {
        Step::Register {
            id,
            ref kind,
            width,
            height,
            depth,
            pitch,
            ref format,
            size,
            ref init,
            element,
        } => {
            let kind = parse_kind(kind)?;
            let format = parse_format(format.as_deref())?.unwrap_or(SurfaceFormat::Raw);
            let rows = u64::from(height) + if format.is_planar_420() { u64::from(height / 2) } else { 0 };
            let needed = u64::from(pitch.max(width)) * rows * u64::from(depth);
            let size = match size {
                Some(size) => size,
                None => usize::try_from(needed).context("surface too large")?,
            };
            let mut bytes = vec![0u8; size];
            let init = with_element!(element, |T| element_bytes::<T>(init)?);
            let len = init.len().min(bytes.len());
            bytes[..len].copy_from_slice(&init[..len]);

            let reg = Registration::surface_2d(
                SurfaceId::new(id),
                kind,
                SurfaceMemory::from_bytes(bytes),
                width,
                height,
                format,
            )
            .with_depth(depth)
            .with_pitch(pitch);
            ctx.register(reg)?;
            Ok(None)
        }
        Step::Unregister { id } => {
            ctx.unregister(SurfaceId::new(id))?;
            Ok(None)
        }
        Step::WriteBlock1d {
            id,
            offset,
            ref values,
            element,
        } => {
            with_element!(element, |T| {
                let values = T::vec_from_json(values)?;
                ctx.write_block_1d(SurfaceId::new(id), offset, &values)?;
            });
            Ok(None)
        }
        Step::ReadBlock1d {
            id,
            offset,
            count,
            ref attrib,
            element,
        } => {
            let attrib = parse_attrib(attrib.as_deref())?;
            let line = with_element!(element, |T| {
                let mut dst = vec![T::default(); count];
                ctx.read_block_1d(SurfaceId::new(id), attrib, offset, &mut dst)?;
                format_values(&dst)
            });
            Ok(Some(line))
        }
        Step::ReadScattered {
            id,
            global_offset,
            ref offsets,
            ref attrib,
            ref mask,
            element,
        } => {
            let attrib = parse_attrib(attrib.as_deref())?;
            let line = with_element!(element, |T| {
                let mut dst = vec![T::default(); offsets.len()];
                ctx.read_scattered(SurfaceId::new(id), attrib, global_offset, offsets, lane_mask(mask), &mut dst)?;
                format_values(&dst)
            });
            Ok(Some(line))
        }
        Step::WriteScattered {
            id,
            global_offset,
            ref offsets,
            ref values,
            ref mask,
            element,
        } => {
            with_element!(element, |T| {
                let values = T::vec_from_json(values)?;
                ctx.write_scattered(SurfaceId::new(id), global_offset, offsets, &values, lane_mask(mask))?;
            });
            Ok(None)
        }
        Step::Atomic {
            id,
            ref opcode,
            global_offset,
            ref offsets,
            ref src0,
            ref src1,
            ref mask,
            element,
        } => {
            let op = parse_opcode(opcode)?;
            let line = with_element!(element, |T| {
                let src0 = src0.as_deref().map(T::vec_from_json).transpose()?;
                let src1 = src1.as_deref().map(T::vec_from_json).transpose()?;
                let operands = AtomicOperands {
                    src0: src0.as_deref(),
                    src1: src1.as_deref(),
                };
                // The kernel-side offset is global + per-lane, in elements.
                let offsets: Vec<u32> = offsets
                    .iter()
                    .map(|&offset| global_offset.wrapping_add(offset))
                    .collect();
                let mut old = vec![T::default(); offsets.len()];
                ctx.write_atomic(op, SurfaceId::new(id), &offsets, operands, lane_mask(mask), Some(&mut old[..]))?;
                format_values(&old)
            });
            Ok(Some(line))
        }
        Step::Dump { id, element } => {
            let desc = ctx.lookup(SurfaceId::new(id))?;
            let bytes = desc.primary().to_vec();
            let line = with_element!(element, |T| {
                let values: Vec<T> = bytes
                    .chunks_exact(T::SIZE)
                    .map(bytemuck::pod_read_unaligned::<T>)
                    .collect();
                format_values(&values)
            });
            Ok(Some(line))
        }
    }
}

fn lane_mask(mask: &Option<Vec<bool>>) -> LaneMask<'_> {
    match mask {
        Some(flags) => LaneMask::from(flags.as_slice()),
        None => LaneMask::All,
    }
}

fn element_bytes<T: ScriptElement>(values: &[f64]) -> Result<Vec<u8>> {
    let values = T::vec_from_json(values)?;
    Ok(bytemuck::cast_slice(values.as_slice()).to_vec())
}

fn format_values<T: ScriptElement>(values: &[T]) -> String {
    let items: Vec<String> = values.iter().map(ToString::to_string).collect();
    format!("[{}]", items.join(", "))
}
