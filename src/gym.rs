//! Tensor-facing environment interface used by training loops.
//!
//! Environments expose a native, strongly typed API as well; this module is the
//! thin boundary where observations become `candle` tensors and actions arrive
//! as `u32` scalars.

use candle_core::{Device, Tensor};

/// Result of a single environment step at the tensor boundary.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub state: Tensor,
    pub reward: f32,
    pub done: bool,
    pub truncated: bool,
}

pub trait Gym {
    type Error;

    fn get_name(&self) -> &str;

    /// Starts a new episode and returns the first observation.
    fn reset(&mut self) -> Result<Tensor, Self::Error>;

    /// Advances the episode with a rank-0 `u32` action tensor.
    fn step(&mut self, action: Tensor) -> Result<StepInfo, Self::Error>;

    fn observation_space(&self) -> Box<dyn Space>;

    fn action_space(&self) -> Box<dyn Space>;
}

pub trait Space {
    fn contains(&self, value: &Tensor) -> bool;

    fn shape(&self) -> Vec<usize>;
}

/// `n` discrete actions encoded as a `u32` scalar in `0..n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrete {
    n: u32,
}

impl Discrete {
    pub fn new(n: u32) -> Self {
        Self { n }
    }

    pub fn n(&self) -> u32 {
        self.n
    }
}

impl Space for Discrete {
    fn contains(&self, value: &Tensor) -> bool {
        if value.rank() != 0 {
            return false;
        }
        match value.to_vec0::<u32>() {
            Ok(v) => v < self.n,
            Err(_) => false,
        }
    }

    fn shape(&self) -> Vec<usize> {
        Vec::new()
    }
}

/// Axis-aligned box of `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl BoxSpace {
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Self {
        debug_assert_eq!(low.len(), high.len());
        Self { low, high }
    }

    pub fn low(&self) -> &[f32] {
        &self.low
    }

    pub fn high(&self) -> &[f32] {
        &self.high
    }

    pub fn contains_slice(&self, values: &[f32]) -> bool {
        values.len() == self.low.len()
            && values
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }

    pub fn low_tensor(&self, device: &Device) -> Result<Tensor, candle_core::Error> {
        Tensor::from_vec(self.low.clone(), vec![self.low.len()], device)
    }

    pub fn high_tensor(&self, device: &Device) -> Result<Tensor, candle_core::Error> {
        Tensor::from_vec(self.high.clone(), vec![self.high.len()], device)
    }
}

impl Space for BoxSpace {
    fn contains(&self, value: &Tensor) -> bool {
        match value.to_vec1::<f32>() {
            Ok(values) => self.contains_slice(&values),
            Err(_) => false,
        }
    }

    fn shape(&self) -> Vec<usize> {
        vec![self.low.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_accepts_only_in_range_scalars() {
        let space = Discrete::new(4);
        let ok = Tensor::from_vec(vec![3u32], vec![], &Device::Cpu).unwrap();
        let too_big = Tensor::from_vec(vec![4u32], vec![], &Device::Cpu).unwrap();
        let wrong_rank = Tensor::from_vec(vec![1u32], vec![1], &Device::Cpu).unwrap();
        assert!(space.contains(&ok));
        assert!(!space.contains(&too_big));
        assert!(!space.contains(&wrong_rank));
    }

    #[test]
    fn box_space_checks_bounds_and_length() {
        let space = BoxSpace::new(vec![-1.0, 0.0], vec![1.0, 1.0]);
        assert!(space.contains_slice(&[0.5, 1.0]));
        assert!(!space.contains_slice(&[1.5, 0.0]));
        assert!(!space.contains_slice(&[0.0]));

        let t = Tensor::from_vec(vec![0.0f32, 0.5], vec![2], &Device::Cpu).unwrap();
        assert!(space.contains(&t));
        assert_eq!(space.shape(), vec![2]);
    }
}
