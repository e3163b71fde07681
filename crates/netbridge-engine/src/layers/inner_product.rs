//! Fully Connected Layer
//!
//! Treats the bottom as `M` rows of `K = count_from(1)` features and
//! produces `[M, N]`. Parameters are the weight `[N, K]` and an optional
//! bias `[N]`; parameter gradients accumulate across backward passes.

use netbridge_array::Blob;
use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::math;
use crate::{shared, SharedBlob};

/// Affine map `y = x·Wᵀ + b`.
#[derive(Debug, Clone)]
pub struct InnerProduct {
    num_output: usize,
    bias_term: bool,
    weight_scale: Option<f32>,
    fan_in: usize,
}

impl InnerProduct {
    /// Create a layer with `num_output` outputs.
    ///
    /// Weights are drawn from `U(-s, s)`; `s` defaults to `sqrt(3 / K)`.
    pub fn new(num_output: usize, bias_term: bool, weight_scale: Option<f32>) -> Self {
        Self {
            num_output,
            bias_term,
            weight_scale,
            fan_in: 0,
        }
    }

    /// Number of outputs per row
    pub fn num_output(&self) -> usize {
        self.num_output
    }

    /// Check if the layer adds a bias
    pub fn bias_term(&self) -> bool {
        self.bias_term
    }

    /// Expected parameter shapes for a bottom of `fan_in` features
    pub fn param_shapes(&self, fan_in: usize) -> Vec<Vec<usize>> {
        let mut shapes = vec![vec![self.num_output, fan_in]];
        if self.bias_term {
            shapes.push(vec![self.num_output]);
        }
        shapes
    }

    pub(crate) fn setup<R: Rng>(
        &mut self,
        params: &mut Vec<SharedBlob>,
        bottom: &mut [&mut Blob],
        top: &mut [&mut Blob],
        rng: &mut R,
    ) -> EngineResult<()> {
        let fan_in = bottom[0].count_from(1);
        if fan_in == 0 {
            return Err(EngineError::invalid_config(
                "inner product input has no features",
            ));
        }
        self.fan_in = fan_in;

        let mut weight = Blob::new(&[self.num_output, fan_in])?;
        let scale = self
            .weight_scale
            .unwrap_or_else(|| (3.0 / fan_in as f32).sqrt());
        math::uniform_fill(rng, scale, weight.mutable_host_data());
        params.clear();
        params.push(shared(weight));
        if self.bias_term {
            params.push(shared(Blob::new(&[self.num_output])?));
        }

        self.reshape(bottom, top)
    }

    pub(crate) fn reshape(&self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<()> {
        let fan_in = bottom[0].count_from(1);
        if fan_in != self.fan_in {
            return Err(EngineError::invalid_config(format!(
                "inner product input size changed from {} to {}",
                self.fan_in, fan_in
            )));
        }
        top[0].reshape(&[bottom[0].num(), self.num_output])?;
        Ok(())
    }

    pub(crate) fn forward(
        &self,
        params: &[SharedBlob],
        bottom: &mut [&mut Blob],
        top: &mut [&mut Blob],
    ) -> EngineResult<f32> {
        let (m, n, k) = (bottom[0].num(), self.num_output, self.fan_in);
        let mut weight = params[0].lock();
        let output = top[0].mutable_host_data();
        math::matmul_nt(m, n, k, bottom[0].host_data(), weight.host_data(), output);

        if let Some(bias) = params.get(1) {
            let mut bias = bias.lock();
            let bias = bias.host_data();
            for row in output.chunks_mut(n) {
                math::axpy(1.0, bias, row);
            }
        }
        Ok(0.0)
    }

    pub(crate) fn backward(
        &self,
        params: &[SharedBlob],
        top: &mut [&mut Blob],
        bottom: &mut [&mut Blob],
    ) -> EngineResult<()> {
        let (m, n, k) = (bottom[0].num(), self.num_output, self.fan_in);
        let top_diff = top[0].host_diff();

        let mut weight = params[0].lock();
        let (weight_data, weight_diff) = weight.mutable_host_buffers();
        math::matmul_tn_acc(m, n, k, top_diff, bottom[0].host_data(), weight_diff);

        if let Some(bias) = params.get(1) {
            let mut bias = bias.lock();
            let bias_diff = bias.mutable_host_diff();
            for row in top_diff.chunks(n) {
                math::axpy(1.0, row, bias_diff);
            }
        }

        math::matmul_nn(m, n, k, top_diff, weight_data, bottom[0].mutable_host_diff());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn set(blob: &SharedBlob, values: &[f32]) {
        blob.lock().mutable_host_data().copy_from_slice(values);
    }

    #[test]
    fn test_setup_creates_params() {
        let mut layer = InnerProduct::new(3, true, None);
        let mut params = Vec::new();
        let mut bottom = Blob::new(&[2, 2, 2]).unwrap();
        let mut top = Blob::empty();
        let mut rng = StdRng::seed_from_u64(0);
        layer
            .setup(&mut params, &mut [&mut bottom], &mut [&mut top], &mut rng)
            .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].lock().shape(), &[3, 4]);
        assert_eq!(params[1].lock().shape(), &[3]);
        assert_eq!(top.shape(), &[2, 3]);
        assert_eq!(layer.param_shapes(4), vec![vec![3, 4], vec![3]]);
    }

    #[test]
    fn test_forward_backward() {
        let mut layer = InnerProduct::new(2, true, Some(0.0));
        let mut params = Vec::new();
        let mut bottom = Blob::from_data(&[1, 2], &[1.0, 2.0]).unwrap();
        let mut top = Blob::empty();
        let mut rng = StdRng::seed_from_u64(0);
        layer
            .setup(&mut params, &mut [&mut bottom], &mut [&mut top], &mut rng)
            .unwrap();
        // W = [[1, 0], [1, 1]], b = [0.5, -0.5]
        set(&params[0], &[1.0, 0.0, 1.0, 1.0]);
        set(&params[1], &[0.5, -0.5]);

        layer
            .forward(&params, &mut [&mut bottom], &mut [&mut top])
            .unwrap();
        assert_eq!(top.host_data(), &[1.5, 2.5]);

        top.mutable_host_diff().copy_from_slice(&[1.0, 2.0]);
        layer
            .backward(&params, &mut [&mut top], &mut [&mut bottom])
            .unwrap();
        assert_eq!(params[0].lock().host_diff(), &[1.0, 2.0, 2.0, 4.0]);
        assert_eq!(params[1].lock().host_diff(), &[1.0, 2.0]);
        assert_eq!(bottom.host_diff(), &[3.0, 2.0]);

        // parameter gradients accumulate
        layer
            .backward(&params, &mut [&mut top], &mut [&mut bottom])
            .unwrap();
        assert_eq!(params[1].lock().host_diff(), &[2.0, 4.0]);
    }

    #[test]
    fn test_reshape_rejects_new_fan_in() {
        let mut layer = InnerProduct::new(1, false, None);
        let mut params = Vec::new();
        let mut bottom = Blob::new(&[2, 3]).unwrap();
        let mut top = Blob::empty();
        let mut rng = StdRng::seed_from_u64(0);
        layer
            .setup(&mut params, &mut [&mut bottom], &mut [&mut top], &mut rng)
            .unwrap();

        bottom.reshape(&[4, 3]).unwrap();
        layer.reshape(&mut [&mut bottom], &mut [&mut top]).unwrap();
        assert_eq!(top.shape(), &[4, 1]);

        bottom.reshape(&[2, 5]).unwrap();
        assert!(layer.reshape(&mut [&mut bottom], &mut [&mut top]).is_err());
    }
}
