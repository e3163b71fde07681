//! Rectified Linear Unit

use netbridge_array::Blob;

use crate::error::EngineResult;

/// `max(0, x)`, with an optional slope for negative inputs.
#[derive(Debug, Clone, Default)]
pub struct Relu {
    negative_slope: f32,
}

impl Relu {
    /// Create a ReLU with the given negative-side slope
    pub fn new(negative_slope: f32) -> Self {
        Self { negative_slope }
    }

    /// Slope applied to negative inputs
    pub fn negative_slope(&self) -> f32 {
        self.negative_slope
    }

    pub(crate) fn reshape(&self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<()> {
        top[0].reshape_like(bottom[0])?;
        Ok(())
    }

    pub(crate) fn forward(&self, bottom: &mut [&mut Blob], top: &mut [&mut Blob]) -> EngineResult<f32> {
        let input = bottom[0].host_data();
        let output = top[0].mutable_host_data();
        for (y, &x) in output.iter_mut().zip(input) {
            *y = if x > 0.0 { x } else { x * self.negative_slope };
        }
        Ok(0.0)
    }

    pub(crate) fn backward(&self, top: &mut [&mut Blob], bottom: &mut [&mut Blob]) -> EngineResult<()> {
        let top_diff = top[0].host_diff();
        let (input, bottom_diff) = bottom[0].mutable_host_buffers();
        for ((dx, &x), &dy) in bottom_diff.iter_mut().zip(input.iter()).zip(top_diff) {
            *dx = if x > 0.0 { dy } else { dy * self.negative_slope };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_forward_and_backward() {
        let relu = Relu::new(0.1);
        let mut bottom = Blob::from_data(&[4], &[-2.0, -1.0, 0.5, 3.0]).unwrap();
        let mut top = Blob::empty();

        relu.reshape(&mut [&mut bottom], &mut [&mut top]).unwrap();
        relu.forward(&mut [&mut bottom], &mut [&mut top]).unwrap();
        assert_eq!(top.host_data(), &[-0.2, -0.1, 0.5, 3.0]);

        top.mutable_host_diff().copy_from_slice(&[1.0, 1.0, 2.0, 2.0]);
        relu.backward(&mut [&mut top], &mut [&mut bottom]).unwrap();
        assert_eq!(bottom.host_diff(), &[0.1, 0.1, 2.0, 2.0]);
        assert_eq!(bottom.host_data(), &[-2.0, -1.0, 0.5, 3.0]);
    }
}
