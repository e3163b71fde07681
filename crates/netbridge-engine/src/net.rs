//! Networks
//!
//! A network is an ordered list of layers over a shared pool of named
//! blobs. Each blob is produced once (by a declared input or a layer top)
//! and consumed by at most one layer; a layer never reads and writes the
//! same blob. Blobs that nothing consumes are the network outputs.

use std::path::Path;
use std::sync::Arc;

use netbridge_array::{ArrayError, Blob};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::layers::{Layer, LayerKind, LayerSpec};
use crate::phase::Phase;
use crate::record::{read_json, read_toml, write_json, BlobRecord, LayerWeights, NetWeights};
use crate::{shared, SharedBlob, SharedLayer};

/// Operations the bridge performs on a network.
pub trait Network: Send {
    /// Network name
    fn name(&self) -> &str;

    /// Phase the network was built for
    fn phase(&self) -> Phase;

    /// Layers in execution order
    fn layers(&self) -> &[SharedLayer];

    /// Layer names in execution order
    fn layer_names(&self) -> &[String];

    /// All blobs, inputs first, then layer tops in creation order
    fn blobs(&self) -> &[SharedBlob];

    /// Blob names, parallel to [`Network::blobs`]
    fn blob_names(&self) -> &[String];

    /// Indices of declared input blobs
    fn input_blob_indices(&self) -> &[usize];

    /// Indices of blobs no layer consumes
    fn output_blob_indices(&self) -> &[usize];

    /// Run every layer on the current input contents; returns the total loss
    fn forward_prefilled(&mut self) -> EngineResult<f32>;

    /// Run layers `from..=to` (0-based); returns their loss
    fn forward_from_to(&mut self, from: usize, to: usize) -> EngineResult<f32>;

    /// Back-propagate through every layer in reverse order
    fn backward(&mut self) -> EngineResult<()>;

    /// Re-derive every top shape from the current input shapes
    fn reshape(&mut self) -> EngineResult<()>;

    /// Load parameters for same-named layers from a weights file
    fn copy_trained_layers_from(&mut self, path: &Path) -> EngineResult<()>;

    /// Write all parameters to a weights file
    fn save(&self, path: &Path) -> EngineResult<()>;

    /// Learnable parameter blobs in layer order
    fn learnable_params(&self) -> Vec<SharedBlob>;

    /// Learning-rate multiplier of every learnable parameter
    fn params_lr(&self) -> Vec<f32>;

    /// Replace every learning-rate multiplier
    fn set_params_lr(&mut self, lr_mults: &[f32]) -> EngineResult<()>;
}

/// Declared network input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InputSpec {
    /// Blob name
    pub name: String,
    /// Native shape
    pub shape: Vec<usize>,
}

/// Network definition file.
#[derive(Debug, Clone, Deserialize)]
pub struct NetSpec {
    /// Network name
    #[serde(default = "default_net_name")]
    pub name: String,
    /// Seed for parameter initialization; entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Declared inputs
    #[serde(default)]
    pub input: Vec<InputSpec>,
    /// Layers in execution order
    #[serde(default)]
    pub layer: Vec<LayerSpec>,
}

fn default_net_name() -> String {
    "net".to_string()
}

impl NetSpec {
    /// Parse a definition from TOML text
    pub fn from_toml_str(text: &str) -> EngineResult<Self> {
        toml::from_str(text).map_err(|e| EngineError::parse("<inline>", e))
    }
}

/// Lock the listed blobs and hand them to `f` as bottom and top slices.
fn with_blobs<T>(
    blobs: &[SharedBlob],
    bottoms: &[usize],
    tops: &[usize],
    f: impl FnOnce(&mut [&mut Blob], &mut [&mut Blob]) -> EngineResult<T>,
) -> EngineResult<T> {
    let mut bottom_guards: Vec<_> = bottoms.iter().map(|&i| blobs[i].lock()).collect();
    let mut top_guards: Vec<_> = tops.iter().map(|&i| blobs[i].lock()).collect();
    let mut bottom: Vec<&mut Blob> = bottom_guards.iter_mut().map(|g| &mut **g).collect();
    let mut top: Vec<&mut Blob> = top_guards.iter_mut().map(|g| &mut **g).collect();
    f(&mut bottom, &mut top)
}

/// Network running on the host CPU.
#[derive(Debug)]
pub struct CpuNet {
    name: String,
    phase: Phase,
    layers: Vec<SharedLayer>,
    layer_names: Vec<String>,
    blobs: Vec<SharedBlob>,
    blob_names: Vec<String>,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

impl CpuNet {
    /// Build a network from a TOML definition file
    pub fn load(path: &Path, phase: Phase) -> EngineResult<Self> {
        let spec: NetSpec = read_toml(path)?;
        Self::from_spec(&spec, phase)
    }

    /// Build a network from a parsed definition
    pub fn from_spec(spec: &NetSpec, phase: Phase) -> EngineResult<Self> {
        let mut rng = match spec.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut blobs = Vec::new();
        let mut blob_names = Vec::new();
        let mut by_name: FxHashMap<String, usize> = FxHashMap::default();
        let mut consumed: FxHashSet<usize> = FxHashSet::default();
        let mut inputs = Vec::new();

        for input in &spec.input {
            if by_name.contains_key(&input.name) {
                return Err(EngineError::invalid_config(format!(
                    "blob '{}' is declared twice",
                    input.name
                )));
            }
            by_name.insert(input.name.clone(), blobs.len());
            inputs.push(blobs.len());
            blobs.push(shared(Blob::new(&input.shape)?));
            blob_names.push(input.name.clone());
        }

        let mut layers = Vec::new();
        let mut layer_names: Vec<String> = Vec::new();

        for layer_spec in &spec.layer {
            if layer_spec.phase.is_some_and(|p| p != phase) {
                continue;
            }
            if layer_names.contains(&layer_spec.name) {
                return Err(EngineError::invalid_config(format!(
                    "layer name '{}' is used twice",
                    layer_spec.name
                )));
            }

            let mut bottoms = Vec::with_capacity(layer_spec.bottom.len());
            for name in &layer_spec.bottom {
                let idx = *by_name.get(name).ok_or_else(|| {
                    EngineError::invalid_config(format!(
                        "layer '{}' reads unknown blob '{}'",
                        layer_spec.name, name
                    ))
                })?;
                if !consumed.insert(idx) {
                    return Err(EngineError::invalid_config(format!(
                        "blob '{}' feeds more than one layer",
                        name
                    )));
                }
                bottoms.push(idx);
            }

            let mut tops = Vec::with_capacity(layer_spec.top.len());
            for name in &layer_spec.top {
                if by_name.contains_key(name) {
                    return Err(EngineError::invalid_config(format!(
                        "layer '{}' writes blob '{}', which already exists",
                        layer_spec.name, name
                    )));
                }
                by_name.insert(name.clone(), blobs.len());
                tops.push(blobs.len());
                blobs.push(shared(Blob::empty()));
                blob_names.push(name.clone());
            }

            let kind = LayerKind::from_params(&layer_spec.params)?;
            let mut layer = Layer::new(
                layer_spec.name.clone(),
                kind,
                bottoms,
                tops,
                layer_spec.lr_mult.clone(),
            )?;
            let (b, t) = (layer.bottoms().to_vec(), layer.tops().to_vec());
            with_blobs(&blobs, &b, &t, |bottom, top| {
                layer.setup(bottom, top, &mut rng)
            })?;

            debug!(layer = %layer_spec.name, kind = layer.type_name(), "set up layer");
            layer_names.push(layer_spec.name.clone());
            layers.push(shared(layer));
        }

        if layers.is_empty() {
            return Err(EngineError::invalid_config(format!(
                "network '{}' has no layers in the {} phase",
                spec.name, phase
            )));
        }

        let outputs = (0..blobs.len()).filter(|i| !consumed.contains(i)).collect();

        Ok(Self {
            name: spec.name.clone(),
            phase,
            layers,
            layer_names,
            blobs,
            blob_names,
            inputs,
            outputs,
        })
    }

    /// Look up a blob by name
    pub fn blob_by_name(&self, name: &str) -> Option<&SharedBlob> {
        let idx = self.blob_names.iter().position(|n| n == name)?;
        self.blobs.get(idx)
    }

    /// Look up a layer by name
    pub fn layer_by_name(&self, name: &str) -> Option<&SharedLayer> {
        let idx = self.layer_names.iter().position(|n| n == name)?;
        self.layers.get(idx)
    }

    /// Snapshot every layer's parameters
    pub fn weights(&self) -> NetWeights {
        let layers = self
            .layers
            .iter()
            .filter_map(|layer| {
                let layer = layer.lock();
                if layer.params().is_empty() {
                    return None;
                }
                let blobs = layer
                    .params()
                    .iter()
                    .map(|p| BlobRecord::capture(&mut p.lock()))
                    .collect();
                Some(LayerWeights {
                    name: layer.name().to_string(),
                    blobs,
                })
            })
            .collect();
        NetWeights { layers }
    }

    /// Copy parameters into same-named layers.
    ///
    /// Every matched layer is checked before anything is written.
    /// Layers absent from this network are ignored.
    pub fn load_weights(&mut self, weights: &NetWeights) -> EngineResult<usize> {
        let mut matched = Vec::new();
        for record in &weights.layers {
            let Some(layer) = self.layer_by_name(&record.name) else {
                continue;
            };
            let layer = layer.lock();
            if layer.params().len() != record.blobs.len() {
                return Err(EngineError::invalid_config(format!(
                    "layer '{}' has {} parameter(s), weights provide {}",
                    record.name,
                    layer.params().len(),
                    record.blobs.len()
                )));
            }
            for (param, blob) in layer.params().iter().zip(&record.blobs) {
                let guard = param.lock();
                if guard.shape() != blob.shape.as_slice() || blob.data.len() != guard.count() {
                    return Err(ArrayError::shape_mismatch(format!(
                        "layer '{}' expects parameter shape {:?}, weights have {:?}",
                        record.name,
                        guard.shape(),
                        blob.shape
                    ))
                    .into());
                }
                matched.push((Arc::clone(param), blob));
            }
        }
        let count = matched.len();
        for (param, blob) in matched {
            param.lock().mutable_host_data().copy_from_slice(&blob.data);
        }
        Ok(count)
    }

    /// Share parameter storage with same-named, same-shaped layers of `other`.
    ///
    /// Returns the number of layers now sharing.
    pub fn share_params_from(&mut self, other: &CpuNet) -> usize {
        let mut shared_layers = 0;
        for layer in &self.layers {
            let mut layer = layer.lock();
            if layer.params().is_empty() {
                continue;
            }
            let Some(source) = other.layer_by_name(layer.name()) else {
                continue;
            };
            let source = source.lock();
            let compatible = source.type_name() == layer.type_name()
                && source.params().len() == layer.params().len()
                && source
                    .params()
                    .iter()
                    .zip(layer.params())
                    .all(|(a, b)| Arc::ptr_eq(a, b) || a.lock().shape() == b.lock().shape());
            if compatible {
                layer.share_params(source.params().to_vec());
                shared_layers += 1;
            }
        }
        shared_layers
    }

    /// Zero every parameter gradient
    pub fn clear_param_diffs(&self) {
        for param in self.learnable_params() {
            param.lock().mutable_host_diff().fill(0.0);
        }
    }

    fn run_layer<T>(
        &self,
        idx: usize,
        f: impl FnOnce(&mut Layer, &mut [&mut Blob], &mut [&mut Blob]) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut layer = self.layers[idx].lock();
        let (bottoms, tops) = (layer.bottoms().to_vec(), layer.tops().to_vec());
        with_blobs(&self.blobs, &bottoms, &tops, |bottom, top| {
            f(&mut *layer, bottom, top)
        })
    }
}

impl Network for CpuNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn layers(&self) -> &[SharedLayer] {
        &self.layers
    }

    fn layer_names(&self) -> &[String] {
        &self.layer_names
    }

    fn blobs(&self) -> &[SharedBlob] {
        &self.blobs
    }

    fn blob_names(&self) -> &[String] {
        &self.blob_names
    }

    fn input_blob_indices(&self) -> &[usize] {
        &self.inputs
    }

    fn output_blob_indices(&self) -> &[usize] {
        &self.outputs
    }

    fn forward_prefilled(&mut self) -> EngineResult<f32> {
        self.forward_from_to(0, self.layers.len() - 1)
    }

    fn forward_from_to(&mut self, from: usize, to: usize) -> EngineResult<f32> {
        let len = self.layers.len();
        if from > to || to >= len {
            return Err(EngineError::LayerRange { from, to, len });
        }
        let mut loss = 0.0;
        for idx in from..=to {
            loss += self.run_layer(idx, |layer, bottom, top| layer.forward(bottom, top))?;
        }
        Ok(loss)
    }

    fn backward(&mut self) -> EngineResult<()> {
        for idx in (0..self.layers.len()).rev() {
            self.run_layer(idx, |layer, bottom, top| layer.backward(top, bottom))?;
        }
        Ok(())
    }

    fn reshape(&mut self) -> EngineResult<()> {
        for idx in 0..self.layers.len() {
            self.run_layer(idx, |layer, bottom, top| layer.reshape(bottom, top))?;
        }
        Ok(())
    }

    fn copy_trained_layers_from(&mut self, path: &Path) -> EngineResult<()> {
        let weights: NetWeights = read_json(path)?;
        let copied = self.load_weights(&weights)?;
        debug!(net = %self.name, params = copied, "copied trained layers");
        Ok(())
    }

    fn save(&self, path: &Path) -> EngineResult<()> {
        write_json(path, &self.weights())
    }

    fn learnable_params(&self) -> Vec<SharedBlob> {
        self.layers
            .iter()
            .flat_map(|layer| layer.lock().params().to_vec())
            .collect()
    }

    fn params_lr(&self) -> Vec<f32> {
        self.layers
            .iter()
            .flat_map(|layer| layer.lock().lr_mults().to_vec())
            .collect()
    }

    fn set_params_lr(&mut self, lr_mults: &[f32]) -> EngineResult<()> {
        let expected: usize = self.layers.iter().map(|l| l.lock().params().len()).sum();
        if lr_mults.len() != expected {
            return Err(EngineError::invalid_config(format!(
                "network has {} learnable parameter(s), got {} lr multiplier(s)",
                expected,
                lr_mults.len()
            )));
        }
        let mut rest = lr_mults;
        for layer in &self.layers {
            let mut layer = layer.lock();
            let mults = layer.lr_mults_mut();
            let (mine, tail) = rest.split_at(mults.len());
            mults.copy_from_slice(mine);
            rest = tail;
        }
        Ok(())
    }
}
