//! Tensor commands

use netbridge_array::{native_shape, DoubleArray, SingleArray, Which};
use netbridge_handle::Token;

use super::{nothing, single};
use crate::context::BridgeContext;
use crate::conversion::Args;
use crate::error::BridgeResult;
use crate::value::HostValue;

pub(super) fn blob_get_shape(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let blob = ctx.resolve_blob(args.get(0)?)?;
    let shape: Vec<f64> = blob.lock().shape().iter().rev().map(|&d| d as f64).collect();
    single(HostValue::double_row(shape))
}

pub(super) fn blob_reshape(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let requested: DoubleArray = args.get(1)?;

    let mut host = Vec::with_capacity(requested.numel());
    for &value in requested.as_slice() {
        if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
            return Err(args.usage_error(format!(
                "new_shape must hold non-negative integers, got {}",
                value
            )));
        }
        host.push(value as usize);
    }
    let blob = ctx.resolve_blob(token)?;

    blob.lock().reshape(&native_shape(&host))?;
    nothing()
}

fn get_buffer(ctx: &mut BridgeContext, args: Args<'_>, which: Which) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let blob = ctx.resolve_blob(args.get(0)?)?;
    let array = ctx.marshaler().to_host(&mut blob.lock(), which)?;
    single(HostValue::Single(array))
}

fn set_buffer(ctx: &mut BridgeContext, args: Args<'_>, which: Which) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let values: SingleArray = args.get(1)?;
    let blob = ctx.resolve_blob(token)?;
    ctx.marshaler().from_host(&values, &mut blob.lock(), which)?;
    nothing()
}

pub(super) fn blob_get_data(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    get_buffer(ctx, args, Which::Data)
}

pub(super) fn blob_set_data(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    set_buffer(ctx, args, Which::Data)
}

pub(super) fn blob_get_diff(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    get_buffer(ctx, args, Which::Diff)
}

pub(super) fn blob_set_diff(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    set_buffer(ctx, args, Which::Diff)
}
