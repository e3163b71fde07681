//! Mode, device and lifecycle commands

use netbridge_array::ExecutionMode;
use tracing::info;

use super::{nothing, single};
use crate::context::BridgeContext;
use crate::conversion::{Args, ToHost};
use crate::error::BridgeResult;
use crate::value::HostValue;

fn set_mode(ctx: &mut BridgeContext, args: Args<'_>, mode: ExecutionMode) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(0)?;
    ctx.mode().set(mode);
    info!(%mode, "execution mode set");
    nothing()
}

pub(super) fn set_mode_cpu(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    set_mode(ctx, args, ExecutionMode::Cpu)
}

pub(super) fn set_mode_gpu(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    set_mode(ctx, args, ExecutionMode::Gpu)
}

pub(super) fn set_device(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let id: usize = args.get(0)?;
    ctx.engine_mut().set_device(id)?;
    info!(device = id, "device selected");
    nothing()
}

pub(super) fn get_init_key(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(0)?;
    single(HostValue::scalar(ctx.epoch() as f64))
}

pub(super) fn reset(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(0)?;
    ctx.reset();
    nothing()
}

pub(super) fn version(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(0)?;
    single(ctx.engine().version().to_host())
}
