//! Built-in Commands
//!
//! Every handler follows the same order: check arity, extract and
//! type-check every argument, resolve every handle, and only then call
//! into the engine or touch a buffer.
//!
//! Layer indices on the host side are 1-based.

mod blob;
mod layer;
mod mean;
mod net;
mod solver;
mod system;

use std::path::Path;

use netbridge_engine::{SharedLayer, SharedNet};

use crate::context::BridgeContext;
use crate::conversion::Args;
use crate::dispatcher::Command;
use crate::error::{BridgeError, BridgeResult};
use crate::value::HostValue;

/// The command table, in lookup order
pub static COMMANDS: &[Command] = &[
    // Solver
    Command::new("get_solver", "get_solver(solver_file)", solver::get_solver),
    Command::new("solver_get_attr", "solver_get_attr(hSolver)", solver::solver_get_attr),
    Command::new("solver_get_iter", "solver_get_iter(hSolver)", solver::solver_get_iter),
    Command::new(
        "solver_restore",
        "solver_restore(hSolver, snapshot_file)",
        solver::solver_restore,
    ),
    Command::new("solver_solve", "solver_solve(hSolver)", solver::solver_solve),
    Command::new("solver_step", "solver_step(hSolver, iters)", solver::solver_step),
    // Net
    Command::new("get_net", "get_net(model_file, phase_name)", net::get_net),
    Command::new("net_get_attr", "net_get_attr(hNet)", net::net_get_attr),
    Command::new("net_forward", "net_forward(hNet)", net::net_forward),
    Command::new(
        "net_forward_from_to",
        "net_forward_from_to(hNet, from_layer, to_layer)",
        net::net_forward_from_to,
    ),
    Command::new("net_backward", "net_backward(hNet)", net::net_backward),
    Command::new(
        "net_forward_batch",
        "net_forward_batch(hNet, hBlob, n_samps)",
        net::net_forward_batch,
    ),
    Command::new(
        "net_forward_backward_batch",
        "net_forward_backward_batch(hNet, hInBlob, hOutBlob, n_samps)",
        net::net_forward_backward_batch,
    ),
    Command::new(
        "net_get_input_arrays",
        "net_get_input_arrays(hNet, memory_data_layer_index)",
        net::net_get_input_arrays,
    ),
    Command::new(
        "net_set_input_arrays",
        "net_set_input_arrays(hNet, data, labels, memory_data_layer_index)",
        net::net_set_input_arrays,
    ),
    Command::new(
        "net_get_loss_diff",
        "net_get_loss_diff(hNet, loss_layer_index)",
        net::net_get_loss_diff,
    ),
    Command::new("net_get_lr_mults", "net_get_lr_mults(hNet)", net::net_get_lr_mults),
    Command::new(
        "net_set_lr_mults",
        "net_set_lr_mults(hNet, lr_mults)",
        net::net_set_lr_mults,
    ),
    Command::new("net_copy_from", "net_copy_from(hNet, weights_file)", net::net_copy_from),
    Command::new("net_reshape", "net_reshape(hNet)", net::net_reshape),
    Command::new("net_save", "net_save(hNet, save_file)", net::net_save),
    // Layer
    Command::new("layer_get_attr", "layer_get_attr(hLayer)", layer::layer_get_attr),
    Command::new("layer_get_type", "layer_get_type(hLayer)", layer::layer_get_type),
    // Blob
    Command::new("blob_get_shape", "blob_get_shape(hBlob)", blob::blob_get_shape),
    Command::new("blob_reshape", "blob_reshape(hBlob, new_shape)", blob::blob_reshape),
    Command::new("blob_get_data", "blob_get_data(hBlob)", blob::blob_get_data),
    Command::new("blob_set_data", "blob_set_data(hBlob, new_data)", blob::blob_set_data),
    Command::new("blob_get_diff", "blob_get_diff(hBlob)", blob::blob_get_diff),
    Command::new("blob_set_diff", "blob_set_diff(hBlob, new_diff)", blob::blob_set_diff),
    // System
    Command::new("set_mode_cpu", "set_mode_cpu()", system::set_mode_cpu),
    Command::new("set_mode_gpu", "set_mode_gpu()", system::set_mode_gpu),
    Command::new("set_device", "set_device(device_id)", system::set_device),
    Command::new("get_init_key", "get_init_key()", system::get_init_key),
    Command::new("reset", "reset()", system::reset),
    Command::new("version", "version()", system::version),
    // Mean files
    Command::new("read_mean", "read_mean(mean_file)", mean::read_mean),
    Command::new(
        "write_mean",
        "write_mean(mean_data, mean_file)",
        mean::write_mean,
    ),
];

/// No results
fn nothing() -> BridgeResult<Vec<HostValue>> {
    Ok(Vec::new())
}

/// One result
fn single(value: HostValue) -> BridgeResult<Vec<HostValue>> {
    Ok(vec![value])
}

/// Fail with FileNotFound unless `path` names a readable file
fn require_file(path: &Path) -> BridgeResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BridgeError::file_not_found(path))
    }
}

/// Layer at a 1-based host index
fn layer_at(args: &Args<'_>, net: &SharedNet, index: usize) -> BridgeResult<SharedLayer> {
    let net = net.lock();
    let count = net.layers().len();
    index
        .checked_sub(1)
        .and_then(|idx| net.layers().get(idx))
        .cloned()
        .ok_or_else(|| {
            args.usage_error(format!(
                "layer index {} is out of range, the net has {} layers",
                index, count
            ))
        })
}
