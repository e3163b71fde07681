//! Solvers
//!
//! [`SgdSolver`] trains one network with momentum SGD. Test networks are
//! built from their own definitions in the test phase and share parameter
//! storage with the training network layer by layer.
//!
//! Each iteration clears the parameter gradients, runs forward and
//! backward once, then applies
//!
//! ```text
//! diff    += weight_decay · data
//! history  = momentum · history + base_lr · lr_mult · diff
//! data    -= history
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::math;
use crate::net::{CpuNet, Network};
use crate::phase::Phase;
use crate::record::{read_json, read_toml, write_json, SolverState};
use crate::{shared, SharedNet};

/// Operations the bridge performs on a solver.
pub trait Solver: Send {
    /// Training network
    fn net(&self) -> SharedNet;

    /// Test networks
    fn test_nets(&self) -> Vec<SharedNet>;

    /// Completed iterations
    fn iter(&self) -> usize;

    /// Run `iters` training iterations
    fn step(&mut self, iters: usize) -> EngineResult<()>;

    /// Train until the configured iteration limit
    fn solve(&mut self) -> EngineResult<()>;

    /// Resume from a snapshot file
    fn restore(&mut self, path: &Path) -> EngineResult<()>;

    /// Write a snapshot and return its path
    fn snapshot(&mut self) -> EngineResult<PathBuf>;
}

/// Learning-rate schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LrPolicy {
    /// Constant `base_lr`
    #[default]
    Fixed,
}

/// Solver definition file.
///
/// Relative paths are resolved against the directory of the solver file.
#[derive(Debug, Clone, Deserialize)]
pub struct SolverSpec {
    /// Training network definition
    pub net: PathBuf,
    /// Test network definitions
    #[serde(default)]
    pub test_net: Vec<PathBuf>,
    /// Base learning rate
    pub base_lr: f32,
    /// Momentum coefficient
    #[serde(default)]
    pub momentum: f32,
    /// L2 weight decay
    #[serde(default)]
    pub weight_decay: f32,
    /// Iteration limit for [`Solver::solve`]
    pub max_iter: usize,
    /// Learning-rate schedule
    #[serde(default)]
    pub lr_policy: LrPolicy,
    /// Snapshot every this many iterations (0 disables)
    #[serde(default)]
    pub snapshot: usize,
    /// Snapshot path prefix
    #[serde(default)]
    pub snapshot_prefix: Option<PathBuf>,
}

/// Momentum SGD over a [`CpuNet`].
#[derive(Debug)]
pub struct SgdSolver {
    spec: SolverSpec,
    net: Arc<Mutex<CpuNet>>,
    test_nets: Vec<Arc<Mutex<CpuNet>>>,
    iter: usize,
    history: Vec<Vec<f32>>,
}

impl SgdSolver {
    /// Load a solver definition and build its networks
    pub fn load(path: &Path) -> EngineResult<Self> {
        let mut spec: SolverSpec = read_toml(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        spec.net = base.join(&spec.net);
        for test_net in &mut spec.test_net {
            *test_net = base.join(&*test_net);
        }
        if let Some(prefix) = spec.snapshot_prefix.as_mut() {
            *prefix = base.join(&*prefix);
        }
        Self::from_spec(spec)
    }

    /// Build a solver from a definition whose paths are already resolved
    pub fn from_spec(spec: SolverSpec) -> EngineResult<Self> {
        if spec.base_lr < 0.0 {
            return Err(EngineError::invalid_config("base_lr must not be negative"));
        }
        let net = CpuNet::load(&spec.net, Phase::Train)?;
        let history = net
            .learnable_params()
            .iter()
            .map(|p| vec![0.0; p.lock().count()])
            .collect();

        let mut test_nets = Vec::with_capacity(spec.test_net.len());
        for path in &spec.test_net {
            let mut test_net = CpuNet::load(path, Phase::Test)?;
            test_net.share_params_from(&net);
            test_nets.push(shared(test_net));
        }

        Ok(Self {
            spec,
            net: shared(net),
            test_nets,
            iter: 0,
            history,
        })
    }

    /// The solver definition
    pub fn spec(&self) -> &SolverSpec {
        &self.spec
    }

    fn learning_rate(&self) -> f32 {
        match self.spec.lr_policy {
            LrPolicy::Fixed => self.spec.base_lr,
        }
    }

    fn snapshot_path(&self) -> EngineResult<PathBuf> {
        let prefix = self.spec.snapshot_prefix.as_ref().ok_or_else(|| {
            EngineError::invalid_config("solver has no snapshot_prefix")
        })?;
        Ok(PathBuf::from(format!(
            "{}_iter_{}.solverstate.json",
            prefix.display(),
            self.iter
        )))
    }
}

fn apply_update(
    net: &CpuNet,
    history: &mut [Vec<f32>],
    rate: f32,
    momentum: f32,
    weight_decay: f32,
) {
    let params = net.learnable_params();
    let mults = net.params_lr();
    for ((param, mult), hist) in params.iter().zip(mults).zip(history.iter_mut()) {
        let mut blob = param.lock();
        let (data, diff) = blob.mutable_host_buffers();
        if weight_decay != 0.0 {
            math::axpy(weight_decay, data, diff);
        }
        let local_rate = rate * mult;
        for ((h, &d), w) in hist.iter_mut().zip(diff.iter()).zip(data.iter_mut()) {
            *h = momentum * *h + local_rate * d;
            *w -= *h;
        }
    }
}

impl Solver for SgdSolver {
    fn net(&self) -> SharedNet {
        self.net.clone()
    }

    fn test_nets(&self) -> Vec<SharedNet> {
        self.test_nets
            .iter()
            .map(|net| net.clone() as SharedNet)
            .collect()
    }

    fn iter(&self) -> usize {
        self.iter
    }

    fn step(&mut self, iters: usize) -> EngineResult<()> {
        let rate = self.learning_rate();
        for _ in 0..iters {
            let loss = {
                let mut net = self.net.lock();
                net.clear_param_diffs();
                let loss = net.forward_prefilled()?;
                net.backward()?;
                apply_update(
                    &net,
                    &mut self.history,
                    rate,
                    self.spec.momentum,
                    self.spec.weight_decay,
                );
                loss
            };
            self.iter += 1;
            debug!(iter = self.iter, loss, "solver step");

            if self.spec.snapshot > 0 && self.iter % self.spec.snapshot == 0 {
                self.snapshot()?;
            }
        }
        Ok(())
    }

    fn solve(&mut self) -> EngineResult<()> {
        let remaining = self.spec.max_iter.saturating_sub(self.iter);
        info!(from = self.iter, to = self.spec.max_iter, "solving");
        self.step(remaining)?;
        if self.spec.snapshot_prefix.is_some() {
            self.snapshot()?;
        }
        Ok(())
    }

    fn restore(&mut self, path: &Path) -> EngineResult<()> {
        let state: SolverState = read_json(path)?;
        let mut net = self.net.lock();
        let sizes: Vec<usize> = net
            .learnable_params()
            .iter()
            .map(|p| p.lock().count())
            .collect();
        let history_fits = state.history.len() == sizes.len()
            && state.history.iter().zip(&sizes).all(|(h, &n)| h.len() == n);
        if !history_fits {
            return Err(EngineError::invalid_config(format!(
                "snapshot {} does not match this solver's parameters",
                path.display()
            )));
        }
        net.load_weights(&state.weights)?;
        self.iter = state.iter;
        self.history = state.history;
        info!(iter = self.iter, path = %path.display(), "restored solver");
        Ok(())
    }

    fn snapshot(&mut self) -> EngineResult<PathBuf> {
        let path = self.snapshot_path()?;
        let state = SolverState {
            iter: self.iter,
            history: self.history.clone(),
            weights: self.net.lock().weights(),
        };
        write_json(&path, &state)?;
        info!(iter = self.iter, path = %path.display(), "wrote snapshot");
        Ok(path)
    }
}
