//! Network commands

use std::path::PathBuf;

use netbridge_array::{host_dims, SingleArray, Which};
use netbridge_engine::{EngineError, LayerKind, Phase};
use netbridge_handle::Token;
use tracing::info;

use super::{layer_at, nothing, require_file, single};
use crate::context::BridgeContext;
use crate::conversion::{Args, ToHost};
use crate::error::{BridgeError, BridgeResult};
use crate::value::{HostStruct, HostValue};

const MEMORY_DATA: &str = "MemoryData";
const EUCLIDEAN_LOSS: &str = "EuclideanLoss";

pub(super) fn get_net(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let path: PathBuf = args.get(0)?;
    let phase: Phase = args.get(1)?;
    require_file(&path)?;

    let net = ctx.engine_mut().load_net(&path, phase)?;
    let token = ctx.adopt_net(net);
    info!(path = %path.display(), %phase, %token, "acquired net");
    single(token.to_host())
}

pub(super) fn net_get_attr(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let net = ctx.resolve_net(args.get(0)?)?;

    let (layers, blobs, inputs, outputs, layer_names, blob_names) = {
        let net = net.lock();
        (
            net.layers().to_vec(),
            net.blobs().to_vec(),
            one_based(net.input_blob_indices()),
            one_based(net.output_blob_indices()),
            net.layer_names().to_vec(),
            net.blob_names().to_vec(),
        )
    };
    let layers: Vec<Token> = layers.iter().map(|l| ctx.mint_layer(l)).collect();
    let blobs: Vec<Token> = blobs.iter().map(|b| ctx.mint_blob(b)).collect();

    let mut attrs = HostStruct::new();
    attrs.insert("hLayer_layers".into(), layers.to_host());
    attrs.insert("hBlob_blobs".into(), blobs.to_host());
    attrs.insert("input_blob_indices".into(), inputs.to_host());
    attrs.insert("output_blob_indices".into(), outputs.to_host());
    attrs.insert("layer_names".into(), layer_names.to_host());
    attrs.insert("blob_names".into(), blob_names.to_host());
    single(HostValue::Struct(attrs))
}

fn one_based(indices: &[usize]) -> Vec<usize> {
    indices.iter().map(|&idx| idx + 1).collect()
}

pub(super) fn net_forward(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let net = ctx.resolve_net(args.get(0)?)?;
    net.lock().forward_prefilled()?;
    nothing()
}

pub(super) fn net_forward_from_to(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(3)?;
    let token: Token = args.get(0)?;
    let from: usize = args.get(1)?;
    let to: usize = args.get(2)?;
    let net = ctx.resolve_net(token)?;

    let mut net = net.lock();
    let count = net.layers().len();
    if from == 0 || from > to || to > count {
        return Err(args.usage_error(format!(
            "layer range {}..={} is not within 1..={}",
            from, to, count
        )));
    }
    net.forward_from_to(from - 1, to - 1)?;
    nothing()
}

pub(super) fn net_backward(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let net = ctx.resolve_net(args.get(0)?)?;
    net.lock().backward()?;
    nothing()
}

pub(super) fn net_forward_batch(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(3)?;
    let net_token: Token = args.get(0)?;
    let blob_token: Token = args.get(1)?;
    let n: usize = args.get(2)?;
    let net = ctx.resolve_net(net_token)?;
    let output = ctx.resolve_blob(blob_token)?;

    let marshaler = ctx.marshaler();
    let mut results = Vec::with_capacity(n);
    let mut net = net.lock();
    for _ in 0..n {
        net.forward_prefilled()?;
        let array = marshaler.to_host(&mut output.lock(), Which::Data)?;
        results.push(HostValue::Single(array));
    }
    single(HostValue::Cell(results))
}

pub(super) fn net_forward_backward_batch(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(4)?;
    let net_token: Token = args.get(0)?;
    let input_token: Token = args.get(1)?;
    let output_token: Token = args.get(2)?;
    let n: usize = args.get(3)?;
    let net = ctx.resolve_net(net_token)?;
    let input = ctx.resolve_blob(input_token)?;
    let output = ctx.resolve_blob(output_token)?;

    let marshaler = ctx.marshaler();
    let mut forward = Vec::with_capacity(n);
    let mut backward = Vec::with_capacity(n);
    let mut net = net.lock();
    for _ in 0..n {
        net.forward_prefilled()?;
        net.backward()?;
        forward.push(HostValue::Single(
            marshaler.to_host(&mut output.lock(), Which::Data)?,
        ));
        backward.push(HostValue::Single(
            marshaler.to_host(&mut input.lock(), Which::Diff)?,
        ));
    }
    Ok(vec![HostValue::Cell(forward), HostValue::Cell(backward)])
}

pub(super) fn net_set_input_arrays(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(4)?;
    let token: Token = args.get(0)?;
    let data: SingleArray = args.get(1)?;
    let labels: SingleArray = args.get(2)?;
    let index: usize = args.get(3)?;
    let net = ctx.resolve_net(token)?;
    let layer = layer_at(&args, &net, index)?;

    let mut layer = layer.lock();
    let name = layer.name().to_string();
    let actual = layer.type_name();
    let Some(md) = layer.kind_mut().as_memory_data_mut() else {
        return Err(BridgeError::wrong_layer_kind(
            "net_set_input_arrays",
            name,
            MEMORY_DATA,
            actual,
        ));
    };

    let sample = md.sample_size();
    let batch = md.batch_size();
    if data.numel() == 0 || data.numel() % sample != 0 {
        return Err(args.usage_error(format!(
            "data has {} elements, which is not a whole number of {}x{}x{} samples",
            data.numel(),
            md.width(),
            md.height(),
            md.channels()
        )));
    }
    let n = data.numel() / sample;
    if labels.numel() != n {
        return Err(args.usage_error(format!(
            "data holds {} samples but labels has {} elements",
            n,
            labels.numel()
        )));
    }
    if n % batch != 0 {
        return Err(args.usage_error(format!(
            "sample count {} is not a multiple of batch size {}",
            n, batch
        )));
    }

    md.reset(data.into_vec(), labels.into_vec(), n)?;
    nothing()
}

pub(super) fn net_get_input_arrays(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let index: usize = args.get(1)?;
    let net = ctx.resolve_net(token)?;
    let layer = layer_at(&args, &net, index)?;

    let layer = layer.lock();
    let md = match layer.kind() {
        LayerKind::MemoryData(md) => md,
        other => {
            return Err(BridgeError::wrong_layer_kind(
                "net_get_input_arrays",
                layer.name(),
                MEMORY_DATA,
                other.type_name(),
            ))
        }
    };
    let batch = md.first_batch().ok_or_else(|| EngineError::MissingInput {
        layer: layer.name().to_string(),
    })?;
    let array = SingleArray::new(host_dims(&md.data_shape()), batch.to_vec())?;
    single(HostValue::Single(array))
}

pub(super) fn net_get_loss_diff(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let index: usize = args.get(1)?;
    let net = ctx.resolve_net(token)?;
    let layer = layer_at(&args, &net, index)?;

    let mut difference = {
        let layer = layer.lock();
        match layer.kind().as_euclidean_loss() {
            Some(loss) => loss.difference().clone(),
            None => {
                return Err(BridgeError::wrong_layer_kind(
                    "net_get_loss_diff",
                    layer.name(),
                    EUCLIDEAN_LOSS,
                    layer.type_name(),
                ))
            }
        }
    };
    let array = ctx.marshaler().to_host(&mut difference, Which::Data)?;
    single(HostValue::Single(array))
}

pub(super) fn net_get_lr_mults(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let net = ctx.resolve_net(args.get(0)?)?;
    let mults = net.lock().params_lr();
    single(mults.to_host())
}

pub(super) fn net_set_lr_mults(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let mults: Vec<f32> = args.get(1)?;
    let net = ctx.resolve_net(token)?;

    let mut net = net.lock();
    let expected = net.params_lr().len();
    if mults.len() != expected {
        return Err(args.usage_error(format!(
            "the net has {} learnable parameters, got {} multipliers",
            expected,
            mults.len()
        )));
    }
    net.set_params_lr(&mults)?;
    nothing()
}

pub(super) fn net_copy_from(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let path: PathBuf = args.get(1)?;
    let net = ctx.resolve_net(token)?;
    require_file(&path)?;

    net.lock().copy_trained_layers_from(&path)?;
    nothing()
}

pub(super) fn net_reshape(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let net = ctx.resolve_net(args.get(0)?)?;
    net.lock().reshape()?;
    nothing()
}

pub(super) fn net_save(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let path: PathBuf = args.get(1)?;
    let net = ctx.resolve_net(token)?;

    net.lock().save(&path)?;
    info!(path = %path.display(), "saved net");
    nothing()
}
