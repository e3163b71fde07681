//! Layer commands

use netbridge_handle::Token;

use super::single;
use crate::context::BridgeContext;
use crate::conversion::{Args, ToHost};
use crate::error::BridgeResult;
use crate::value::{HostStruct, HostValue};

pub(super) fn layer_get_attr(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let layer = ctx.resolve_layer(args.get(0)?)?;

    let params = layer.lock().params().to_vec();
    let blobs: Vec<Token> = params.iter().map(|b| ctx.mint_blob(b)).collect();

    let mut attrs = HostStruct::new();
    attrs.insert("hBlob_blobs".into(), blobs.to_host());
    single(HostValue::Struct(attrs))
}

pub(super) fn layer_get_type(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let layer = ctx.resolve_layer(args.get(0)?)?;
    let type_name = layer.lock().type_name();
    single(type_name.to_host())
}
