//! Least-Squares Loss
//!
//! `loss = ‖a − b‖² / (2·num)` over two bottoms of equal count, where
//! `num` is the leading dimension of the first bottom. The top is a
//! zero-axis scalar whose gradient is the loss weight (1 after setup).
//! The elementwise difference `a − b` of the last forward pass stays
//! readable through [`EuclideanLoss::difference`].

use netbridge_array::{ArrayError, Blob};

use crate::error::EngineResult;
use crate::math;

/// Sum-of-squares loss between a prediction and a target.
#[derive(Debug, Clone, Default)]
pub struct EuclideanLoss {
    diff: Blob,
}

impl EuclideanLoss {
    /// Create the loss layer
    pub fn new() -> Self {
        Self::default()
    }

    /// `a − b` from the most recent forward pass
    pub fn difference(&self) -> &Blob {
        &self.diff
    }

    pub(crate) fn setup(&mut self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<()> {
        self.reshape(bottom, top)?;
        top[0].mutable_host_diff()[0] = 1.0;
        Ok(())
    }

    pub(crate) fn reshape(&mut self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<()> {
        if bottom[0].count() != bottom[1].count() {
            return Err(ArrayError::shape_mismatch(format!(
                "euclidean loss inputs have {} and {} elements",
                bottom[0].count(),
                bottom[1].count()
            ))
            .into());
        }
        self.diff.reshape_like(bottom[0])?;
        top[0].reshape(&[])?;
        Ok(())
    }

    pub(crate) fn forward(&mut self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<f32> {
        let num = bottom[0].num().max(1) as f32;
        {
            let diff = self.diff.mutable_host_data();
            diff.copy_from_slice(bottom[0].host_data());
            math::axpy(-1.0, bottom[1].host_data(), diff);
        }
        let diff = self.diff.host_data();
        let loss = math::dot(diff, diff) / num / 2.0;
        top[0].mutable_host_data()[0] = loss;
        Ok(loss)
    }

    pub(crate) fn backward(&mut self, top: &mut [&mut Blob], bottom: &mut [&mut Blob]) -> EngineResult<()> {
        let num = bottom[0].num().max(1) as f32;
        let weight = top[0].host_diff()[0];
        let diff = self.diff.host_data();
        for (i, blob) in bottom.iter_mut().enumerate() {
            let sign = if i == 0 { 1.0 } else { -1.0 };
            math::scale_into(sign * weight / num, diff, blob.mutable_host_diff());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_loss_and_gradient() {
        let mut loss = EuclideanLoss::new();
        let mut pred = Blob::from_data(&[2, 1], &[1.0, 3.0]).unwrap();
        let mut target = Blob::from_data(&[2], &[0.0, 1.0]).unwrap();
        let mut top = Blob::empty();

        loss.setup(&mut [&mut pred, &mut target], &mut [&mut top])
            .unwrap();
        assert_eq!(top.num_axes(), 0);
        assert_eq!(top.host_diff(), &[1.0]);

        let value = loss
            .forward(&mut [&mut pred, &mut target], &mut [&mut top])
            .unwrap();
        // (1 + 4) / 2 / 2
        assert_eq!(value, 1.25);
        assert_eq!(top.host_data(), &[1.25]);
        assert_eq!(loss.difference().clone().host_data(), &[1.0, 2.0]);

        loss.backward(&mut [&mut top], &mut [&mut pred, &mut target])
            .unwrap();
        assert_eq!(pred.host_diff(), &[0.5, 1.0]);
        assert_eq!(target.host_diff(), &[-0.5, -1.0]);
    }

    #[test]
    fn test_count_mismatch() {
        let mut loss = EuclideanLoss::new();
        let mut a = Blob::new(&[3]).unwrap();
        let mut b = Blob::new(&[4]).unwrap();
        let mut top = Blob::empty();
        let err = loss
            .setup(&mut [&mut a, &mut b], &mut [&mut top])
            .unwrap_err();
        assert!(matches!(err, EngineError::Array(ArrayError::ShapeMismatch { .. })));
    }
}
