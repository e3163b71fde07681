//! Reference Layers
//!
//! The layer set is closed: every layer is one of the [`LayerKind`]
//! variants, and code that needs a specific kind matches on it.
//!
//! # Layer Kinds
//!
//! - [`memory_data`]: batches supplied from host arrays
//! - [`inner_product`]: fully connected affine map
//! - [`relu`]: rectified linear activation
//! - [`euclidean_loss`]: least-squares loss

pub mod euclidean_loss;
pub mod inner_product;
pub mod memory_data;
pub mod relu;

use std::fmt;

use netbridge_array::Blob;
use rand::Rng;
use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::phase::Phase;
use crate::SharedBlob;

pub use euclidean_loss::EuclideanLoss;
pub use inner_product::InnerProduct;
pub use memory_data::MemoryData;
pub use relu::Relu;

/// One `[[layer]]` entry of a network definition.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerSpec {
    /// Unique layer name
    pub name: String,
    /// Input blob names
    #[serde(default)]
    pub bottom: Vec<String>,
    /// Output blob names
    #[serde(default)]
    pub top: Vec<String>,
    /// Only build this layer in the given phase
    #[serde(default)]
    pub phase: Option<Phase>,
    /// Learning-rate multipliers, one per parameter blob
    #[serde(default)]
    pub lr_mult: Vec<f32>,
    /// Kind-specific settings, tagged by `type`
    #[serde(flatten)]
    pub params: LayerParams,
}

/// Kind-specific layer settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerParams {
    /// `type = "memory_data"`
    MemoryData {
        /// Samples per batch
        batch_size: usize,
        /// Channels per sample
        channels: usize,
        /// Rows per channel
        #[serde(default = "one")]
        height: usize,
        /// Columns per row
        #[serde(default = "one")]
        width: usize,
    },
    /// `type = "inner_product"`
    InnerProduct {
        /// Outputs per row
        num_output: usize,
        /// Whether to learn a bias
        #[serde(default = "yes")]
        bias: bool,
        /// Half-width of the uniform weight initializer
        #[serde(default)]
        weight_scale: Option<f32>,
    },
    /// `type = "relu"`
    Relu {
        /// Slope for negative inputs
        #[serde(default)]
        negative_slope: f32,
    },
    /// `type = "euclidean_loss"`
    EuclideanLoss,
}

fn one() -> usize {
    1
}

fn yes() -> bool {
    true
}

/// A layer's kind together with its kind-specific state.
#[derive(Debug, Clone)]
pub enum LayerKind {
    /// Host-fed input
    MemoryData(MemoryData),
    /// Fully connected
    InnerProduct(InnerProduct),
    /// Rectified linear
    Relu(Relu),
    /// Least-squares loss
    EuclideanLoss(EuclideanLoss),
}

impl LayerKind {
    /// Build the kind from its definition
    pub fn from_params(params: &LayerParams) -> EngineResult<Self> {
        let kind = match *params {
            LayerParams::MemoryData {
                batch_size,
                channels,
                height,
                width,
            } => {
                if batch_size == 0 || channels * height * width == 0 {
                    return Err(EngineError::invalid_config(
                        "memory data dimensions must be positive",
                    ));
                }
                LayerKind::MemoryData(MemoryData::new(batch_size, channels, height, width))
            }
            LayerParams::InnerProduct {
                num_output,
                bias,
                weight_scale,
            } => {
                if num_output == 0 {
                    return Err(EngineError::invalid_config(
                        "inner product num_output must be positive",
                    ));
                }
                LayerKind::InnerProduct(InnerProduct::new(num_output, bias, weight_scale))
            }
            LayerParams::Relu { negative_slope } => LayerKind::Relu(Relu::new(negative_slope)),
            LayerParams::EuclideanLoss => LayerKind::EuclideanLoss(EuclideanLoss::new()),
        };
        Ok(kind)
    }

    /// Type name reported to the host
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::MemoryData(_) => "MemoryData",
            LayerKind::InnerProduct(_) => "InnerProduct",
            LayerKind::Relu(_) => "ReLU",
            LayerKind::EuclideanLoss(_) => "EuclideanLoss",
        }
    }

    /// Allowed `(bottom, top)` counts as inclusive ranges
    fn arity(&self) -> ((usize, usize), (usize, usize)) {
        match self {
            LayerKind::MemoryData(_) => ((0, 0), (1, 2)),
            LayerKind::InnerProduct(_) | LayerKind::Relu(_) => ((1, 1), (1, 1)),
            LayerKind::EuclideanLoss(_) => ((2, 2), (1, 1)),
        }
    }

    /// Memory-data state, if this is a memory-data layer
    pub fn as_memory_data(&self) -> Option<&MemoryData> {
        match self {
            LayerKind::MemoryData(layer) => Some(layer),
            _ => None,
        }
    }

    /// Mutable memory-data state, if this is a memory-data layer
    pub fn as_memory_data_mut(&mut self) -> Option<&mut MemoryData> {
        match self {
            LayerKind::MemoryData(layer) => Some(layer),
            _ => None,
        }
    }

    /// Loss state, if this is a least-squares loss layer
    pub fn as_euclidean_loss(&self) -> Option<&EuclideanLoss> {
        match self {
            LayerKind::EuclideanLoss(layer) => Some(layer),
            _ => None,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A layer instance wired into a network.
#[derive(Debug)]
pub struct Layer {
    name: String,
    kind: LayerKind,
    bottoms: Vec<usize>,
    tops: Vec<usize>,
    params: Vec<SharedBlob>,
    lr_mults: Vec<f32>,
}

impl Layer {
    /// Create a layer reading `bottoms` and writing `tops` (net blob indices)
    pub fn new(
        name: impl Into<String>,
        kind: LayerKind,
        bottoms: Vec<usize>,
        tops: Vec<usize>,
        lr_mults: Vec<f32>,
    ) -> EngineResult<Self> {
        let name = name.into();
        let ((min_bottom, max_bottom), (min_top, max_top)) = kind.arity();
        if !(min_bottom..=max_bottom).contains(&bottoms.len())
            || !(min_top..=max_top).contains(&tops.len())
        {
            return Err(EngineError::invalid_config(format!(
                "{} layer '{}' takes {}..={} bottoms and {}..={} tops, got {} and {}",
                kind.type_name(),
                name,
                min_bottom,
                max_bottom,
                min_top,
                max_top,
                bottoms.len(),
                tops.len()
            )));
        }
        Ok(Self {
            name,
            kind,
            bottoms,
            tops,
            params: Vec::new(),
            lr_mults,
        })
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer kind and state
    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    /// Mutable layer kind and state
    pub fn kind_mut(&mut self) -> &mut LayerKind {
        &mut self.kind
    }

    /// Type name reported to the host
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Indices of input blobs in the owning network
    pub fn bottoms(&self) -> &[usize] {
        &self.bottoms
    }

    /// Indices of output blobs in the owning network
    pub fn tops(&self) -> &[usize] {
        &self.tops
    }

    /// Learnable parameter blobs
    pub fn params(&self) -> &[SharedBlob] {
        &self.params
    }

    /// Learning-rate multipliers, one per parameter
    pub fn lr_mults(&self) -> &[f32] {
        &self.lr_mults
    }

    pub(crate) fn lr_mults_mut(&mut self) -> &mut [f32] {
        &mut self.lr_mults
    }

    /// Replace the parameter blobs with another layer's, sharing storage
    pub(crate) fn share_params(&mut self, params: Vec<SharedBlob>) {
        self.params = params;
    }

    /// Create parameters and size the tops for the current bottoms
    pub fn setup<R: Rng>(
        &mut self,
        bottom: &mut [&mut Blob],
        top: &mut [&mut Blob],
        rng: &mut R,
    ) -> EngineResult<()> {
        match &mut self.kind {
            LayerKind::MemoryData(layer) => layer.reshape(top)?,
            LayerKind::InnerProduct(layer) => layer.setup(&mut self.params, bottom, top, rng)?,
            LayerKind::Relu(layer) => layer.reshape(bottom, top)?,
            LayerKind::EuclideanLoss(layer) => layer.setup(bottom, top)?,
        }

        if self.lr_mults.len() > self.params.len() {
            return Err(EngineError::invalid_config(format!(
                "layer '{}' has {} parameter(s) but {} lr_mult value(s)",
                self.name,
                self.params.len(),
                self.lr_mults.len()
            )));
        }
        self.lr_mults.resize(self.params.len(), 1.0);
        Ok(())
    }

    /// Resize the tops after the bottoms changed shape
    pub fn reshape(&mut self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<()> {
        match &mut self.kind {
            LayerKind::MemoryData(layer) => layer.reshape(top),
            LayerKind::InnerProduct(layer) => layer.reshape(bottom, top),
            LayerKind::Relu(layer) => layer.reshape(bottom, top),
            LayerKind::EuclideanLoss(layer) => layer.reshape(bottom, top),
        }
    }

    /// Compute the tops; returns this layer's loss contribution.
    ///
    /// The tops are resized for the current bottoms first, so blobs
    /// reshaped from outside the net never reach the kernels mis-sized.
    pub fn forward(&mut self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<f32> {
        self.reshape(bottom, top)?;
        match &mut self.kind {
            LayerKind::MemoryData(layer) => layer.forward(&self.name, top),
            LayerKind::InnerProduct(layer) => layer.forward(&self.params, bottom, top),
            LayerKind::Relu(layer) => layer.forward(bottom, top),
            LayerKind::EuclideanLoss(layer) => layer.forward(bottom, top),
        }
    }

    /// Propagate top gradients to the bottoms and parameters
    pub fn backward(&mut self, top: &mut [&mut Blob], bottom: &mut [&mut Blob]) -> EngineResult<()> {
        match &mut self.kind {
            LayerKind::MemoryData(_) => Ok(()),
            LayerKind::InnerProduct(layer) => layer.backward(&self.params, top, bottom),
            LayerKind::Relu(layer) => layer.backward(top, bottom),
            LayerKind::EuclideanLoss(layer) => layer.backward(top, bottom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Deserialize)]
    struct Doc {
        layer: Vec<LayerSpec>,
    }

    #[test]
    fn test_parse_layer_specs() {
        let doc: Doc = toml::from_str(
            r#"
            [[layer]]
            name = "input"
            type = "memory_data"
            top = ["data", "label"]
            batch_size = 4
            channels = 3

            [[layer]]
            name = "fc"
            type = "inner_product"
            bottom = ["data"]
            top = ["fc"]
            num_output = 2
            lr_mult = [1.0, 2.0]

            [[layer]]
            name = "act"
            type = "relu"
            bottom = ["fc"]
            top = ["act"]
            phase = "test"

            [[layer]]
            name = "loss"
            type = "euclidean_loss"
            bottom = ["act", "label"]
            top = ["loss"]
            "#,
        )
        .unwrap();

        assert_eq!(doc.layer.len(), 4);
        assert_eq!(
            doc.layer[0].params,
            LayerParams::MemoryData {
                batch_size: 4,
                channels: 3,
                height: 1,
                width: 1
            }
        );
        assert_eq!(
            doc.layer[1].params,
            LayerParams::InnerProduct {
                num_output: 2,
                bias: true,
                weight_scale: None
            }
        );
        assert_eq!(doc.layer[1].lr_mult, vec![1.0, 2.0]);
        assert_eq!(doc.layer[2].phase, Some(Phase::Test));
        assert_eq!(doc.layer[3].params, LayerParams::EuclideanLoss);
    }

    #[test]
    fn test_kind_names_and_accessors() {
        let kind = LayerKind::from_params(&LayerParams::Relu {
            negative_slope: 0.0,
        })
        .unwrap();
        assert_eq!(kind.type_name(), "ReLU");
        assert!(kind.as_memory_data().is_none());
        assert!(kind.as_euclidean_loss().is_none());

        let kind = LayerKind::from_params(&LayerParams::EuclideanLoss).unwrap();
        assert_eq!(kind.to_string(), "EuclideanLoss");
        assert!(kind.as_euclidean_loss().is_some());
    }

    #[test]
    fn test_invalid_dimensions() {
        let params = LayerParams::InnerProduct {
            num_output: 0,
            bias: true,
            weight_scale: None,
        };
        assert!(LayerKind::from_params(&params).is_err());
    }

    #[test]
    fn test_arity_check() {
        let kind = LayerKind::from_params(&LayerParams::EuclideanLoss).unwrap();
        let err = Layer::new("loss", kind, vec![0], vec![1], Vec::new()).unwrap_err();
        assert!(err.to_string().contains("loss"));
    }

    #[test]
    fn test_lr_mults_default_to_one() {
        let kind = LayerKind::from_params(&LayerParams::InnerProduct {
            num_output: 1,
            bias: true,
            weight_scale: None,
        })
        .unwrap();
        let mut layer = Layer::new("fc", kind, vec![0], vec![1], vec![0.5]).unwrap();
        let mut bottom = Blob::new(&[1, 2]).unwrap();
        let mut top = Blob::empty();
        let mut rng = rand::thread_rng();
        layer
            .setup(&mut [&mut bottom], &mut [&mut top], &mut rng)
            .unwrap();
        assert_eq!(layer.lr_mults(), &[0.5, 1.0]);
    }
}
