//! CNN Model Architecture for CIFAR-10 Classification
//!
//! Three convolutional stages followed by a small dense head:
//!
//! ```text
//! conv 16 3x3 -> maxpool -> dropout 0.2
//! conv 32 3x3 -> maxpool -> dropout 0.2
//! conv 64 2x2 -> dropout 0.3 -> maxpool
//! flatten -> dense 100 -> dropout 0.4 -> dense 10
//! ```
//!
//! All convolutions use "same" padding. For an even kernel the odd padding
//! row/column goes after the input (bottom and right).

use std::fmt;

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

/// Configuration for the CIFAR-10 CNN
#[derive(Config, Debug)]
pub struct Cifar10CnnConfig {
    /// Number of output classes
    #[config(default = "10")]
    pub num_classes: usize,

    /// Input image size (assumes square images)
    #[config(default = "32")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Filters per convolutional stage
    #[config(default = "[16, 32, 64]")]
    pub filters: [usize; 3],

    /// Square kernel size per convolutional stage
    #[config(default = "[3, 3, 2]")]
    pub kernel_sizes: [usize; 3],

    #[config(default = "100")]
    pub hidden_units: usize,

    /// Dropout after each convolutional stage
    #[config(default = "[0.2, 0.2, 0.3]")]
    pub conv_dropout: [f64; 3],

    /// Dropout between the dense layers
    #[config(default = "0.4")]
    pub dense_dropout: f64,
}

impl Cifar10CnnConfig {
    /// Spatial size after the three 2x2 pools
    pub fn feature_size(&self) -> usize {
        self.input_size / 8
    }

    /// Width of the flattened feature vector
    pub fn flatten_dim(&self) -> usize {
        self.filters[2] * self.feature_size() * self.feature_size()
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Cifar10Cnn<B> {
        Cifar10Cnn::new(self, device)
    }
}

/// Conv2d + ReLU with Keras-style "same" padding
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pad_before: usize,
    pad_after: usize,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        let total = kernel_size.saturating_sub(1);
        let pad_before = total / 2;

        Self {
            conv,
            relu: Relu::new(),
            pad_before,
            pad_after: total - pad_before,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = if self.pad_before + self.pad_after > 0 {
            // (left, right, top, bottom)
            x.pad(
                (self.pad_before, self.pad_after, self.pad_before, self.pad_after),
                0.0,
            )
        } else {
            x
        };
        self.relu.forward(self.conv.forward(x))
    }
}

/// CIFAR-10 classifier CNN
#[derive(Module, Debug)]
pub struct Cifar10Cnn<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub pool: MaxPool2d,
    pub dropout1: Dropout,
    pub dropout2: Dropout,
    pub dropout3: Dropout,

    // Classifier head
    pub fc1: Linear<B>,
    pub dropout4: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> Cifar10Cnn<B> {
    pub fn new(config: &Cifar10CnnConfig, device: &B::Device) -> Self {
        let [f1, f2, f3] = config.filters;
        let [k1, k2, k3] = config.kernel_sizes;
        let [d1, d2, d3] = config.conv_dropout;

        Self {
            conv1: ConvBlock::new(config.in_channels, f1, k1, device), // 32 -> pool 16
            conv2: ConvBlock::new(f1, f2, k2, device),                 // 16 -> pool 8
            conv3: ConvBlock::new(f2, f3, k3, device),                 // 8 -> pool 4
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout1: DropoutConfig::new(d1).init(),
            dropout2: DropoutConfig::new(d2).init(),
            dropout3: DropoutConfig::new(d3).init(),
            fc1: LinearConfig::new(config.flatten_dim(), config.hidden_units).init(device),
            dropout4: DropoutConfig::new(config.dense_dropout).init(),
            fc2: LinearConfig::new(config.hidden_units, config.num_classes).init(device),
            num_classes: config.num_classes,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, 32, 32] with values in [0, 1]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(x);
        let x = self.pool.forward(x);
        let x = self.dropout1.forward(x);

        let x = self.conv2.forward(x);
        let x = self.pool.forward(x);
        let x = self.dropout2.forward(x);

        // Dropout before pooling in the last stage
        let x = self.conv3.forward(x);
        let x = self.dropout3.forward(x);
        let x = self.pool.forward(x);

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = Relu::new().forward(x);
        let x = self.dropout4.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax, as the output layer's activation
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        burn::tensor::activation::softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// One row of the model summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    pub kind: &'static str,
    /// Output shape without the batch dimension (H, W, C for spatial layers)
    pub output_shape: Vec<usize>,
    pub params: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSummary {
    pub layers: Vec<LayerSummary>,
}

impl ModelSummary {
    pub fn total_params(&self) -> usize {
        self.layers.iter().map(|l| l.params).sum()
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:<10} {:<16} {:>10}", "Layer", "Type", "Output Shape", "Param #")?;
        writeln!(f, "{}", "=".repeat(53))?;
        for layer in &self.layers {
            let shape = layer
                .output_shape
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                f,
                "{:<14} {:<10} {:<16} {:>10}",
                layer.name,
                layer.kind,
                format!("(None, {})", shape),
                layer.params
            )?;
        }
        writeln!(f, "{}", "=".repeat(53))?;
        write!(f, "Total params: {}", self.total_params())
    }
}

impl Cifar10CnnConfig {
    /// Per-layer output shapes and parameter counts
    pub fn summary(&self) -> ModelSummary {
        let mut layers = Vec::new();
        let mut size = self.input_size;
        let mut channels = self.in_channels;

        let mut push = |name: String, kind: &'static str, output_shape: Vec<usize>, params: usize| {
            layers.push(LayerSummary { name, kind, output_shape, params })
        };

        for stage in 0..3 {
            let k = self.kernel_sizes[stage];
            let out = self.filters[stage];
            let params = (k * k * channels + 1) * out;
            channels = out;
            push(format!("conv2d_{}", stage + 1), "Conv2D", vec![size, size, channels], params);

            let pooled = size / 2;
            let dropout = format!("dropout_{}", stage + 1);
            let pool = format!("max_pool_{}", stage + 1);
            if stage < 2 {
                push(pool, "MaxPool2D", vec![pooled, pooled, channels], 0);
                push(dropout, "Dropout", vec![pooled, pooled, channels], 0);
            } else {
                push(dropout, "Dropout", vec![size, size, channels], 0);
                push(pool, "MaxPool2D", vec![pooled, pooled, channels], 0);
            }
            size = pooled;
        }

        let flat = channels * size * size;
        push("flatten".to_string(), "Flatten", vec![flat], 0);
        push(
            "dense_1".to_string(),
            "Dense",
            vec![self.hidden_units],
            (flat + 1) * self.hidden_units,
        );
        push("dropout_4".to_string(), "Dropout", vec![self.hidden_units], 0);
        push(
            "dense_2".to_string(),
            "Dense",
            vec![self.num_classes],
            (self.hidden_units + 1) * self.num_classes,
        );

        ModelSummary { layers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_model_output_shape() {
        let device = Default::default();
        let model: Cifar10Cnn<TestBackend> = Cifar10CnnConfig::new().init(&device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 10]);
        assert_eq!(model.num_classes(), 10);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let model: Cifar10Cnn<TestBackend> = Cifar10CnnConfig::new().init(&device);

        let input = Tensor::<TestBackend, 4>::ones([3, 3, 32, 32], &device) * 0.5;
        let probs = model.forward_softmax(input);
        let sums: Vec<f32> = probs.sum_dim(1).to_data().to_vec().unwrap();

        for s in sums {
            assert!((s - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_parameter_count() {
        let device = Default::default();
        let config = Cifar10CnnConfig::new();
        let model: Cifar10Cnn<TestBackend> = config.init(&device);

        assert_eq!(model.num_params(), 116_854);
        assert_eq!(config.summary().total_params(), model.num_params());
    }

    #[test]
    fn test_summary_shapes() {
        let summary = Cifar10CnnConfig::new().summary();
        let shape = |name: &str| {
            summary
                .layers
                .iter()
                .find(|l| l.name == name)
                .map(|l| l.output_shape.clone())
                .unwrap()
        };

        assert_eq!(shape("conv2d_1"), vec![32, 32, 16]);
        assert_eq!(shape("max_pool_2"), vec![8, 8, 32]);
        assert_eq!(shape("conv2d_3"), vec![8, 8, 64]);
        assert_eq!(shape("flatten"), vec![1024]);
        assert_eq!(shape("dense_2"), vec![10]);

        let rendered = summary.to_string();
        assert!(rendered.contains("Total params: 116854"));
    }

    #[test]
    fn test_even_kernel_keeps_spatial_size() {
        let device = Default::default();
        let block = ConvBlock::<TestBackend>::new(4, 8, 2, &device);
        let out = block.forward(Tensor::zeros([1, 4, 8, 8], &device));
        assert_eq!(out.dims(), [1, 8, 8, 8]);
    }
}
