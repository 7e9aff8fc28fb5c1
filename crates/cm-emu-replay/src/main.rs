use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cm_dataport::{AtomicOpSet, DataportConfig, EmuContext};
use cm_emu_replay::replay;
use cm_emu_replay::script::load_script;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AtomicOpsArg {
    Legacy,
    Extended,
}

impl From<AtomicOpsArg> for AtomicOpSet {
    fn from(arg: AtomicOpsArg) -> Self {
        match arg {
            AtomicOpsArg::Legacy => AtomicOpSet::Legacy,
            AtomicOpsArg::Extended => AtomicOpSet::Extended,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Replay a JSON script of dataport operations against an emulated device.")]
struct Args {
    /// Script to replay.
    script: PathBuf,

    /// Exit on the first rejected dataport call (also enabled by CM_EMU_ABORT_ON_ERROR).
    #[arg(long)]
    abort_on_error: bool,

    /// Atomic opcode set; overrides CM_EMU_ATOMIC_OPS.
    #[arg(long, value_enum)]
    atomic_ops: Option<AtomicOpsArg>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns the number of rejected steps.
fn run(args: &Args) -> Result<usize> {
    let mut config = DataportConfig::from_env().context("read dataport config from env")?;
    if let Some(ops) = args.atomic_ops {
        config.atomic_ops = ops.into();
    }
    config.abort_on_error |= args.abort_on_error;

    let steps = load_script(&args.script)?;
    let ctx = EmuContext::new(config);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = replay(&ctx, &steps, &mut out, config.abort_on_error)?;
    out.flush()?;

    let stats = ctx.stats().snapshot();
    tracing::info!(?stats, "dataport counters");
    if summary.failed > 0 {
        eprintln!("{} of {} steps rejected", summary.failed, summary.steps);
    }
    Ok(summary.failed)
}
