//! Bridge Context
//!
//! All state a bridge instance carries between calls lives in one
//! [`BridgeContext`]: the handle registry, the execution mode, the engine,
//! the solvers and networks the bridge owns, and the configuration.
//!
//! ## Ownership
//!
//! Solvers from `get_solver` and networks from `get_net` are owned here
//! until [`BridgeContext::reset`]. Everything reachable from them (their
//! networks, layers and tensors) is only ever registered weakly.

use netbridge_array::{Marshaler, ModeState};
use netbridge_engine::{CpuEngine, Engine, SharedBlob, SharedLayer, SharedNet, SharedSolver};
use netbridge_handle::{HandleRegistry, Token};
use tracing::info;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::object::{NativeObject, ObjectKind};

/// State shared by every command of one bridge instance.
pub struct BridgeContext {
    registry: HandleRegistry<NativeObject>,
    mode: ModeState,
    engine: Box<dyn Engine>,
    solvers: Vec<SharedSolver>,
    nets: Vec<SharedNet>,
    config: BridgeConfig,
}

impl BridgeContext {
    /// Create a context around an engine.
    ///
    /// Applies the configured mode and, if set, selects the configured
    /// device.
    pub fn new(mut engine: Box<dyn Engine>, config: BridgeConfig) -> BridgeResult<Self> {
        if let Some(id) = config.device_id {
            engine.set_device(id)?;
        }
        let registry = match config.epoch_seed {
            Some(seed) => HandleRegistry::with_seed(seed),
            None => HandleRegistry::new(),
        };
        Ok(Self {
            registry,
            mode: ModeState::new(config.mode),
            engine,
            solvers: Vec::new(),
            nets: Vec::new(),
            config,
        })
    }

    /// Create a context around the reference CPU engine
    pub fn with_cpu_engine(config: BridgeConfig) -> BridgeResult<Self> {
        Self::new(Box::new(CpuEngine::new()), config)
    }

    /// Active configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Execution-mode state
    pub fn mode(&self) -> &ModeState {
        &self.mode
    }

    /// Marshaler for the current mode and shape policy
    pub fn marshaler(&self) -> Marshaler<'_> {
        Marshaler::new(&self.mode).with_strict_shapes(self.config.strict_shapes)
    }

    /// The engine
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// The engine, mutably
    pub fn engine_mut(&mut self) -> &mut dyn Engine {
        self.engine.as_mut()
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.registry.epoch()
    }

    /// Number of live registered objects
    pub fn live_handles(&self) -> usize {
        self.registry.len()
    }

    /// Number of bridge-owned solvers
    pub fn owned_solvers(&self) -> usize {
        self.solvers.len()
    }

    /// Number of bridge-owned networks
    pub fn owned_nets(&self) -> usize {
        self.nets.len()
    }

    /// Take ownership of a solver and return its token
    pub fn adopt_solver(&mut self, solver: SharedSolver) -> Token {
        let token = self.mint_solver(&solver);
        self.solvers.push(solver);
        token
    }

    /// Take ownership of a network and return its token
    pub fn adopt_net(&mut self, net: SharedNet) -> Token {
        let token = self.mint_net(&net);
        self.nets.push(net);
        token
    }

    /// Token for a solver
    pub fn mint_solver(&mut self, solver: &SharedSolver) -> Token {
        let (key, entry) = NativeObject::solver(solver);
        self.registry.mint(key, entry)
    }

    /// Token for a network
    pub fn mint_net(&mut self, net: &SharedNet) -> Token {
        let (key, entry) = NativeObject::net(net);
        self.registry.mint(key, entry)
    }

    /// Token for a layer
    pub fn mint_layer(&mut self, layer: &SharedLayer) -> Token {
        let (key, entry) = NativeObject::layer(layer);
        self.registry.mint(key, entry)
    }

    /// Token for a tensor
    pub fn mint_blob(&mut self, blob: &SharedBlob) -> Token {
        let (key, entry) = NativeObject::blob(blob);
        self.registry.mint(key, entry)
    }

    fn resolve_kind<T>(
        &self,
        token: Token,
        kind: ObjectKind,
        upgrade: impl FnOnce(&NativeObject) -> Option<T>,
    ) -> BridgeResult<T> {
        let entry = self.registry.resolve_as(token, kind)?;
        upgrade(entry).ok_or(BridgeError::StaleHandle { token })
    }

    /// Resolve a solver token
    pub fn resolve_solver(&self, token: Token) -> BridgeResult<SharedSolver> {
        self.resolve_kind(token, ObjectKind::Solver, NativeObject::upgrade_solver)
    }

    /// Resolve a network token
    pub fn resolve_net(&self, token: Token) -> BridgeResult<SharedNet> {
        self.resolve_kind(token, ObjectKind::Net, NativeObject::upgrade_net)
    }

    /// Resolve a layer token
    pub fn resolve_layer(&self, token: Token) -> BridgeResult<SharedLayer> {
        self.resolve_kind(token, ObjectKind::Layer, NativeObject::upgrade_layer)
    }

    /// Resolve a tensor token
    pub fn resolve_blob(&self, token: Token) -> BridgeResult<SharedBlob> {
        self.resolve_kind(token, ObjectKind::Blob, NativeObject::upgrade_blob)
    }

    /// Release every bridge-owned object and invalidate every token.
    ///
    /// Returns the number of solvers and networks released.
    pub fn reset(&mut self) -> (usize, usize) {
        let released = (self.solvers.len(), self.nets.len());
        self.solvers.clear();
        self.nets.clear();
        let slots = self.registry.reset();
        info!(
            solvers = released.0,
            nets = released.1,
            slots,
            epoch = self.registry.epoch(),
            "cleared {} solvers and {} stand-alone nets",
            released.0,
            released.1
        );
        released
    }
}

impl std::fmt::Debug for BridgeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeContext")
            .field("epoch", &self.registry.epoch())
            .field("mode", &self.mode)
            .field("engine", &self.engine.version())
            .field("solvers", &self.solvers.len())
            .field("nets", &self.nets.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbridge_array::{Blob, ExecutionMode};
    use netbridge_engine::{shared, EngineError};
    use pretty_assertions::assert_eq;

    fn context() -> BridgeContext {
        let config = BridgeConfig {
            epoch_seed: Some(5),
            ..BridgeConfig::default()
        };
        BridgeContext::with_cpu_engine(config).unwrap()
    }

    #[test]
    fn test_blob_tokens_resolve_until_reset() {
        let mut ctx = context();
        let blob = shared(Blob::new(&[3]).unwrap());
        let token = ctx.mint_blob(&blob);
        assert_eq!(token.epoch(), ctx.epoch());
        assert_eq!(ctx.mint_blob(&blob), token);
        assert!(std::sync::Arc::ptr_eq(&ctx.resolve_blob(token).unwrap(), &blob));

        ctx.reset();
        assert_eq!(
            ctx.resolve_blob(token).unwrap_err(),
            BridgeError::StaleHandle { token }
        );
    }

    #[test]
    fn test_dropped_object_is_stale() {
        let mut ctx = context();
        let blob = shared(Blob::new(&[3]).unwrap());
        let token = ctx.mint_blob(&blob);
        drop(blob);
        assert_eq!(
            ctx.resolve_blob(token).unwrap_err(),
            BridgeError::StaleHandle { token }
        );
    }

    #[test]
    fn test_wrong_object_kind() {
        let mut ctx = context();
        let blob = shared(Blob::new(&[1]).unwrap());
        let token = ctx.mint_blob(&blob);
        let err = ctx.resolve_net(token).err().unwrap();
        assert_eq!(err.identifier(), "WrongObjectKind");
    }

    #[test]
    fn test_config_applied() {
        let config = BridgeConfig {
            mode: ExecutionMode::Gpu,
            device_id: Some(0),
            ..BridgeConfig::default()
        };
        let ctx = BridgeContext::with_cpu_engine(config).unwrap();
        assert_eq!(ctx.mode().current(), Ok(ExecutionMode::Gpu));
        assert_eq!(ctx.engine().device(), 0);

        let config = BridgeConfig {
            device_id: Some(3),
            ..BridgeConfig::default()
        };
        let err = BridgeContext::with_cpu_engine(config).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Engine(EngineError::InvalidDevice { id: 3, count: 1 })
        );
    }

    #[test]
    fn test_reset_counts_owned_objects() {
        let mut ctx = context();
        assert_eq!(ctx.reset(), (0, 0));
        let before = ctx.epoch();
        ctx.reset();
        assert_ne!(ctx.epoch(), before);
    }
}
