//! Dense Denoising Autoencoder
//!
//! A fully connected autoencoder mapping one normalized mains window to the
//! corresponding appliance window. The aggregate signal plays the role of
//! the noisy input and the appliance signal the clean target, so no
//! artificial corruption is added during training.

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::SequenceModel;
use crate::{DisaggError, Result};

/// Activation functions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// ReLU: max(0, x)
    ReLU,
    /// Identity
    Linear,
}

impl Activation {
    /// Apply the activation function
    fn forward(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::Linear => x,
        }
    }

    /// Derivative for backpropagation
    fn derivative(&self, x: f64) -> f64 {
        match self {
            Activation::ReLU => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Linear => 1.0,
        }
    }
}

/// A fully connected layer
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DenseLayer {
    /// Weight matrix (input_size x output_size)
    weights: Array2<f64>,
    /// Bias vector
    biases: Array1<f64>,
    /// Activation function
    activation: Activation,
}

impl DenseLayer {
    /// Create a new layer with Xavier initialization
    fn new(input_size: usize, output_size: usize, activation: Activation) -> Self {
        let scale = (2.0 / (input_size + output_size) as f64).sqrt();
        let normal = Normal::new(0.0, scale).expect("finite std dev");
        let mut rng = rand::thread_rng();

        let weights = Array2::from_shape_fn((input_size, output_size), |_| normal.sample(&mut rng));
        let biases = Array1::zeros(output_size);

        Self {
            weights,
            biases,
            activation,
        }
    }

    /// Pre-activation output: z = W^T x + b
    fn affine(&self, input: &Array1<f64>) -> Array1<f64> {
        input.dot(&self.weights) + &self.biases
    }

    /// Forward pass through the layer
    fn forward(&self, input: &Array1<f64>) -> Array1<f64> {
        self.affine(input).mapv(|x| self.activation.forward(x))
    }

    /// Backward pass; updates weights in place and returns the input gradient
    fn backward(
        &mut self,
        input: &Array1<f64>,
        z: &Array1<f64>,
        grad_output: &Array1<f64>,
        learning_rate: f64,
    ) -> Array1<f64> {
        let activation_grad = z.mapv(|x| self.activation.derivative(x));
        let delta = grad_output * &activation_grad;

        // dL/dW = x^T * delta
        let grad_weights = outer_product(input, &delta);
        // dL/dx = W * delta
        let grad_input = self.weights.dot(&delta);

        self.weights = &self.weights - learning_rate * &grad_weights;
        self.biases = &self.biases - learning_rate * &delta;

        grad_input
    }
}

/// Outer product of two vectors
fn outer_product(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j])
}

/// Autoencoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaeConfig {
    /// Window size the network operates on
    pub sequence_length: usize,
    /// Hidden layer widths between the input and output windows
    pub hidden_units: Vec<usize>,
    /// SGD learning rate
    pub learning_rate: f64,
}

impl DaeConfig {
    /// Default architecture for a given window size: s -> 8s -> 128 -> 8s -> s
    pub fn new(sequence_length: usize) -> Self {
        Self {
            sequence_length,
            hidden_units: vec![sequence_length * 8, 128, sequence_length * 8],
            learning_rate: 0.001,
        }
    }

    /// Override the hidden layer widths
    pub fn with_hidden_units(mut self, hidden_units: Vec<usize>) -> Self {
        self.hidden_units = hidden_units;
        self
    }

    /// Override the learning rate
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }
}

/// Denoising autoencoder over fixed-size power windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoisingAutoencoder {
    config: DaeConfig,
    layers: Vec<DenseLayer>,
    /// Mean training loss per epoch, most recent fit calls appended
    #[serde(skip)]
    loss_history: Vec<f64>,
}

impl DenoisingAutoencoder {
    /// Create a new autoencoder for the configured window size
    pub fn new(config: DaeConfig) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_units.len() + 1);
        let mut prev_size = config.sequence_length;

        for &size in &config.hidden_units {
            layers.push(DenseLayer::new(prev_size, size, Activation::ReLU));
            prev_size = size;
        }
        layers.push(DenseLayer::new(
            prev_size,
            config.sequence_length,
            Activation::Linear,
        ));

        Self {
            config,
            layers,
            loss_history: Vec::new(),
        }
    }

    /// Configuration this network was built with
    pub fn config(&self) -> &DaeConfig {
        &self.config
    }

    /// Total number of trainable parameters
    pub fn num_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }

    /// Mean training loss per epoch across fit calls
    pub fn loss_history(&self) -> &[f64] {
        &self.loss_history
    }

    /// Forward pass for one window
    fn forward(&self, input: &Array1<f64>) -> Array1<f64> {
        let mut x = input.clone();
        for layer in &self.layers {
            x = layer.forward(&x);
        }
        x
    }

    /// One SGD step on a single (mains, appliance) window pair
    fn train_step(&mut self, x: &Array1<f64>, y: &Array1<f64>) -> f64 {
        // Forward pass, caching per-layer inputs and pre-activations
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut zs = Vec::with_capacity(self.layers.len());
        let mut a = x.clone();
        for layer in &self.layers {
            let z = layer.affine(&a);
            inputs.push(a);
            a = z.mapv(|v| layer.activation.forward(v));
            zs.push(z);
        }

        let diff = &a - y;
        let loss = diff.mapv(|d| d * d).sum() / y.len() as f64;

        // Backward pass
        let lr = self.config.learning_rate;
        let mut grad = diff * (2.0 / y.len() as f64);
        for ((layer, input), z) in self
            .layers
            .iter_mut()
            .zip(inputs.iter())
            .zip(zs.iter())
            .rev()
        {
            grad = layer.backward(input, z, &grad, lr);
        }

        loss
    }

    fn check_batch(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.config.sequence_length {
            return Err(DisaggError::Model(format!(
                "expected windows of {} samples, got {}",
                self.config.sequence_length,
                x.ncols()
            )));
        }
        Ok(())
    }
}

impl SequenceModel for DenoisingAutoencoder {
    fn sequence_length(&self) -> usize {
        self.config.sequence_length
    }

    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        epochs: usize,
        batch_size: usize,
    ) -> Result<()> {
        self.check_batch(x)?;
        self.check_batch(y)?;
        if x.nrows() != y.nrows() {
            return Err(DisaggError::Model(format!(
                "batch size mismatch: {} input windows vs {} target windows",
                x.nrows(),
                y.nrows()
            )));
        }

        let mut rng = rand::thread_rng();
        let mut indices: Vec<usize> = (0..x.nrows()).collect();
        let batch_size = batch_size.max(1);

        for epoch in 0..epochs {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in indices.chunks(batch_size) {
                for &i in batch {
                    let loss = self.train_step(&x.row(i).to_owned(), &y.row(i).to_owned());
                    epoch_loss += loss;
                }
            }

            epoch_loss /= x.nrows().max(1) as f64;
            self.loss_history.push(epoch_loss);
            log::debug!("epoch {}/{}: loss = {:.6}", epoch + 1, epochs, epoch_loss);
        }

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_batch(x)?;

        let mut output = Array2::zeros((x.nrows(), self.config.sequence_length));
        for (i, row) in x.outer_iter().enumerate() {
            output.row_mut(i).assign(&self.forward(&row.to_owned()));
        }
        Ok(output)
    }
}
