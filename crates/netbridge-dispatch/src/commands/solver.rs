//! Solver commands

use std::path::PathBuf;

use netbridge_handle::Token;
use tracing::info;

use super::{nothing, require_file, single};
use crate::context::BridgeContext;
use crate::conversion::{Args, ToHost};
use crate::error::BridgeResult;
use crate::value::{HostStruct, HostValue};

pub(super) fn get_solver(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let path: PathBuf = args.get(0)?;
    require_file(&path)?;

    let solver = ctx.engine_mut().load_solver(&path)?;
    let token = ctx.adopt_solver(solver);
    info!(path = %path.display(), %token, "acquired solver");
    single(token.to_host())
}

pub(super) fn solver_get_attr(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let solver = ctx.resolve_solver(args.get(0)?)?;

    let (net, test_nets) = {
        let solver = solver.lock();
        (solver.net(), solver.test_nets())
    };
    let net = ctx.mint_net(&net);
    let test_nets: Vec<Token> = test_nets.iter().map(|n| ctx.mint_net(n)).collect();

    let mut attrs = HostStruct::new();
    attrs.insert("hNet_net".into(), net.to_host());
    attrs.insert("hNet_test_nets".into(), test_nets.to_host());
    single(HostValue::Struct(attrs))
}

pub(super) fn solver_get_iter(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let solver = ctx.resolve_solver(args.get(0)?)?;
    let iter = solver.lock().iter();
    single(iter.to_host())
}

pub(super) fn solver_restore(
    ctx: &mut BridgeContext,
    args: Args<'_>,
) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let path: PathBuf = args.get(1)?;
    let solver = ctx.resolve_solver(token)?;
    require_file(&path)?;

    solver.lock().restore(&path)?;
    nothing()
}

pub(super) fn solver_solve(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(1)?;
    let solver = ctx.resolve_solver(args.get(0)?)?;
    solver.lock().solve()?;
    nothing()
}

pub(super) fn solver_step(ctx: &mut BridgeContext, args: Args<'_>) -> BridgeResult<Vec<HostValue>> {
    args.expect_len(2)?;
    let token: Token = args.get(0)?;
    let iters: usize = args.get(1)?;
    let solver = ctx.resolve_solver(token)?;
    solver.lock().step(iters)?;
    nothing()
}
