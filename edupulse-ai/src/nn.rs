//! Dense-network inference runtime
//!
//! The affect models run small fully-connected networks over fixed-width
//! feature vectors. Weights are stored as JSON files (serde) so pretrained
//! artifacts can ship with a deployment; when a weight file is missing or
//! unreadable the network falls back to a freshly-initialized equivalent
//! instead of failing startup, since development and test environments have
//! no pretrained artifacts.
//!
//! Fresh initialization is deterministic (seeded `StdRng`, Glorot-scaled
//! uniform) so tests see reproducible outputs.

use edupulse_common::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Layer activation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Tanh,
    Sigmoid,
    /// Normalized distribution over the layer's outputs; inference-only
    Softmax,
}

impl Activation {
    fn apply(&self, values: &mut [f32]) {
        match self {
            Activation::Linear => {}
            Activation::Relu => {
                for v in values.iter_mut() {
                    *v = v.max(0.0);
                }
            }
            Activation::Tanh => {
                for v in values.iter_mut() {
                    *v = v.tanh();
                }
            }
            Activation::Sigmoid => {
                for v in values.iter_mut() {
                    *v = 1.0 / (1.0 + (-*v).exp());
                }
            }
            Activation::Softmax => {
                let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for v in values.iter_mut() {
                    *v = (*v - max).exp();
                    sum += *v;
                }
                if sum > 0.0 {
                    for v in values.iter_mut() {
                        *v /= sum;
                    }
                }
            }
        }
    }

    /// Derivative with respect to the pre-activation, expressed through the
    /// activated output (the usual shortcut for these functions)
    fn derivative_from_output(&self, output: f32) -> Result<f32> {
        match self {
            Activation::Linear => Ok(1.0),
            Activation::Relu => Ok(if output > 0.0 { 1.0 } else { 0.0 }),
            Activation::Tanh => Ok(1.0 - output * output),
            Activation::Sigmoid => Ok(output * (1.0 - output)),
            Activation::Softmax => Err(Error::InvalidInput(
                "softmax layers are inference-only".to_string(),
            )),
        }
    }
}

/// One fully-connected layer: `output = activation(weights * input + bias)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Row-major weights, one row per output unit
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
    pub activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut output: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, &b)| row.iter().zip(input).map(|(&w, &x)| w * x).sum::<f32>() + b)
            .collect();
        self.activation.apply(&mut output);
        output
    }

    fn input_dim(&self) -> usize {
        self.weights.first().map(|row| row.len()).unwrap_or(0)
    }

    fn output_dim(&self) -> usize {
        self.weights.len()
    }
}

/// Specification for building a fresh network
#[derive(Debug, Clone)]
pub struct NetworkSpec {
    pub input_dim: usize,
    pub layers: Vec<(usize, Activation)>,
}

impl NetworkSpec {
    pub fn new(input_dim: usize, layers: Vec<(usize, Activation)>) -> Self {
        Self { input_dim, layers }
    }
}

/// Small fully-connected network with JSON weight persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseNetwork {
    pub layers: Vec<DenseLayer>,
}

impl DenseNetwork {
    /// Build a freshly-initialized network from a spec.
    ///
    /// Glorot-scaled uniform weights from a seeded RNG; biases start at zero.
    pub fn fresh(spec: &NetworkSpec, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::with_capacity(spec.layers.len());
        let mut fan_in = spec.input_dim;

        for &(units, activation) in &spec.layers {
            let scale = (6.0 / (fan_in + units) as f32).sqrt();
            let weights = (0..units)
                .map(|_| (0..fan_in).map(|_| rng.gen_range(-scale..scale)).collect())
                .collect();
            layers.push(DenseLayer {
                weights,
                bias: vec![0.0; units],
                activation,
            });
            fan_in = units;
        }

        Self { layers }
    }

    /// Load pretrained weights, falling back to a fresh network on any
    /// failure. The fallback is mandatory behavior: environments without
    /// pretrained artifacts must still start.
    pub fn load_or_fresh(path: &Path, spec: &NetworkSpec, seed: u64) -> Self {
        match Self::load(path) {
            Ok(network) if network.input_dim() == spec.input_dim => {
                debug!("Loaded pretrained weights from {}", path.display());
                network
            }
            Ok(_) => {
                warn!(
                    "Weight file {} has wrong input width, using fresh weights",
                    path.display()
                );
                Self::fresh(spec, seed)
            }
            Err(e) => {
                warn!(
                    "No pretrained weights at {} ({}), using fresh weights",
                    path.display(),
                    e
                );
                Self::fresh(spec, seed)
            }
        }
    }

    /// Load a network from a JSON weight file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let network: DenseNetwork = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse weight file failed: {}", e)))?;
        if network.layers.is_empty() {
            return Err(Error::Config("Weight file has no layers".to_string()));
        }
        Ok(network)
    }

    /// Persist weights as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)
            .map_err(|e| Error::Internal(format!("Serialize weights failed: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(|l| l.input_dim()).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|l| l.output_dim()).unwrap_or(0)
    }

    /// Run a forward pass.
    ///
    /// The input width must match the network's declared width exactly;
    /// callers zero-pad missing modalities rather than sending short vectors.
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_dim() {
            return Err(Error::InvalidInput(format!(
                "Input width {} does not match network width {}",
                input.len(),
                self.input_dim()
            )));
        }
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        Ok(current)
    }

    /// One backpropagation pass over a batch (mean squared error).
    ///
    /// Used by model training entry points, which hold exclusive access to
    /// the network while this mutates it. Softmax layers reject training.
    pub fn train_batch(
        &mut self,
        samples: &[Vec<f32>],
        targets: &[Vec<f32>],
        learning_rate: f32,
    ) -> Result<f32> {
        if samples.len() != targets.len() {
            return Err(Error::InvalidInput(format!(
                "Sample/target count mismatch: {} vs {}",
                samples.len(),
                targets.len()
            )));
        }
        if samples.is_empty() {
            return Err(Error::InvalidInput("Empty training batch".to_string()));
        }

        let mut total_loss = 0.0;
        for (sample, target) in samples.iter().zip(targets) {
            total_loss += self.train_single(sample, target, learning_rate)?;
        }
        Ok(total_loss / samples.len() as f32)
    }

    fn train_single(&mut self, input: &[f32], target: &[f32], learning_rate: f32) -> Result<f32> {
        if target.len() != self.output_dim() {
            return Err(Error::InvalidInput(format!(
                "Target width {} does not match output width {}",
                target.len(),
                self.output_dim()
            )));
        }

        // Forward pass, keeping every layer's activated output
        let mut activations: Vec<Vec<f32>> = vec![input.to_vec()];
        for layer in &self.layers {
            let next = layer.forward(activations.last().expect("nonempty"));
            activations.push(next);
        }

        let output = activations.last().expect("nonempty");
        let loss: f32 = output
            .iter()
            .zip(target)
            .map(|(&o, &t)| (o - t) * (o - t))
            .sum::<f32>()
            / output.len() as f32;

        // Backward pass
        let mut delta: Vec<f32> = output
            .iter()
            .zip(target)
            .map(|(&o, &t)| o - t)
            .collect();

        for i in (0..self.layers.len()).rev() {
            let layer_input = activations[i].clone();
            let layer_output = &activations[i + 1];
            let activation = self.layers[i].activation;

            let mut pre_delta = Vec::with_capacity(delta.len());
            for (j, &d) in delta.iter().enumerate() {
                pre_delta.push(d * activation.derivative_from_output(layer_output[j])?);
            }

            // Delta for the layer below, computed before the weights move
            let mut next_delta = vec![0.0f32; layer_input.len()];
            for (j, row) in self.layers[i].weights.iter().enumerate() {
                for (k, &w) in row.iter().enumerate() {
                    next_delta[k] += w * pre_delta[j];
                }
            }

            let layer = &mut self.layers[i];
            for (j, row) in layer.weights.iter_mut().enumerate() {
                for (k, w) in row.iter_mut().enumerate() {
                    *w -= learning_rate * pre_delta[j] * layer_input[k];
                }
                layer.bias[j] -= learning_rate * pre_delta[j];
            }

            delta = next_delta;
        }

        Ok(loss)
    }
}
