//! Memory-Data Input Layer
//!
//! Holds host-supplied samples and labels and emits them one batch at a
//! time, wrapping around at the end.

use netbridge_array::Blob;

use crate::error::{EngineError, EngineResult};

/// Batches fed from host arrays.
#[derive(Debug, Clone)]
pub struct MemoryData {
    batch_size: usize,
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
    labels: Vec<f32>,
    len: usize,
    pos: usize,
}

impl MemoryData {
    /// Create an empty layer producing `[batch_size, channels, height, width]`
    pub fn new(batch_size: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch_size,
            channels,
            height,
            width,
            data: Vec::new(),
            labels: Vec::new(),
            len: 0,
            pos: 0,
        }
    }

    /// Samples per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Channels per sample
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Rows per channel
    pub fn height(&self) -> usize {
        self.height
    }

    /// Columns per row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Elements in one sample
    pub fn sample_size(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no samples are held
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the next sample to emit
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Native shape of the data top
    pub fn data_shape(&self) -> [usize; 4] {
        [self.batch_size, self.channels, self.height, self.width]
    }

    /// Replace the held samples; `len` must be a positive multiple of the batch size
    pub fn reset(&mut self, data: Vec<f32>, labels: Vec<f32>, len: usize) -> EngineResult<()> {
        if len == 0 || len % self.batch_size != 0 {
            return Err(EngineError::invalid_config(format!(
                "sample count {} must be a positive multiple of batch size {}",
                len, self.batch_size
            )));
        }
        if data.len() != len * self.sample_size() || labels.len() != len {
            return Err(EngineError::invalid_config(format!(
                "{} samples need {} data values and {} labels, got {} and {}",
                len,
                len * self.sample_size(),
                len,
                data.len(),
                labels.len()
            )));
        }
        self.data = data;
        self.labels = labels;
        self.len = len;
        self.pos = 0;
        Ok(())
    }

    /// Values of the first batch, if any samples are held
    pub fn first_batch(&self) -> Option<&[f32]> {
        if self.is_empty() {
            return None;
        }
        Some(&self.data[..self.batch_size * self.sample_size()])
    }

    pub(crate) fn reshape(&self, top: &mut [&mut Blob]) -> EngineResult<()> {
        top[0].reshape(&self.data_shape())?;
        if let Some(label) = top.get_mut(1) {
            label.reshape(&[self.batch_size])?;
        }
        Ok(())
    }

    pub(crate) fn forward(&mut self, name: &str, top: &mut [&mut Blob]) -> EngineResult<f32> {
        if self.is_empty() {
            return Err(EngineError::MissingInput {
                layer: name.to_string(),
            });
        }
        let sample = self.sample_size();
        let start = self.pos;
        let end = start + self.batch_size;

        top[0]
            .mutable_host_data()
            .copy_from_slice(&self.data[start * sample..end * sample]);
        if let Some(label) = top.get_mut(1) {
            label
                .mutable_host_data()
                .copy_from_slice(&self.labels[start..end]);
        }

        self.pos = if end >= self.len { 0 } else { end };
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reset_requires_whole_batches() {
        let mut layer = MemoryData::new(2, 1, 1, 1);
        assert!(layer.reset(vec![0.0; 3], vec![0.0; 3], 3).is_err());
        assert!(layer.reset(vec![], vec![], 0).is_err());
        assert!(layer.reset(vec![0.0; 4], vec![0.0; 3], 4).is_err());
        layer.reset(vec![0.0; 4], vec![0.0; 4], 4).unwrap();
        assert_eq!(layer.len(), 4);
    }

    #[test]
    fn test_forward_cycles_through_batches() {
        let mut layer = MemoryData::new(2, 1, 1, 2);
        layer
            .reset(
                vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0],
                vec![10.0, 20.0, 30.0, 40.0],
                4,
            )
            .unwrap();

        let mut data = Blob::empty();
        let mut label = Blob::empty();
        {
            let mut tops = [&mut data, &mut label];
            layer.reshape(&mut tops).unwrap();
            layer.forward("input", &mut tops).unwrap();
        }
        assert_eq!(data.shape(), &[2, 1, 1, 2]);
        assert_eq!(data.host_data(), &[1.0, 1.0, 2.0, 2.0]);
        assert_eq!(label.host_data(), &[10.0, 20.0]);

        layer.forward("input", &mut [&mut data, &mut label]).unwrap();
        assert_eq!(label.host_data(), &[30.0, 40.0]);

        layer.forward("input", &mut [&mut data, &mut label]).unwrap();
        assert_eq!(label.host_data(), &[10.0, 20.0]);
    }

    #[test]
    fn test_forward_without_data_fails() {
        let mut layer = MemoryData::new(1, 1, 1, 1);
        let mut data = Blob::empty();
        let err = layer.forward("input", &mut [&mut data]).unwrap_err();
        assert_eq!(
            err,
            EngineError::MissingInput {
                layer: "input".into()
            }
        );
        assert!(layer.first_batch().is_none());
    }
}
