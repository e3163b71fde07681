//! Mean file commands

use std::path::PathBuf;

use netbridge_array::{native_shape, Blob, SingleArray, Which};

use super::{nothing, require_file, single};
use crate::context::BridgeContext;
use crate::conversion::Args;
use crate::error::BridgeResult;
use crate::value::HostValue;

pub(super) fn read_mean(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let path: PathBuf = args.get(0)?;
    require_file(&path)?;

    let mut mean = ctx.engine().read_mean(&path)?;
    let array = ctx.marshaler().to_host(&mut mean, Which::Data)?;
    single(HostValue::Single(array))
}

/// Host `[width, height, channels]` becomes a `[1, channels, height, width]`
/// tensor; a two-dimensional array has one channel.
pub(super) fn write_mean(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let data: SingleArray = args.get(0)?;
    let path: PathBuf = args.get(1)?;

    let dims = data.dims();
    if !(2..=3).contains(&dims.len()) {
        return Err(args.usage_error(format!(
            "mean data must have 2 or 3 dimensions, got {}",
            dims.len()
        )));
    }
    let mut shape = vec![1];
    shape.extend(native_shape(dims));
    if shape.len() == 3 {
        shape.insert(1, 1);
    }

    let mut mean = Blob::new(&shape)?;
    ctx.marshaler().from_host(&data, &mut mean, Which::Data)?;
    ctx.engine().write_mean(&mut mean, &path)?;
    nothing()
}
