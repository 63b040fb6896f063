//! ResNet-50 backbone for spectrogram classification
//!
//! Standard torchvision ResNet-50 with two changes made at training time:
//! the stem convolution takes a single channel (spectrograms, not RGB) and
//! the final fully-connected layer is sized to the species label set.
//! Weight names follow the torchvision state dict (`conv1.weight`,
//! `layer3.2.bn1.running_var`, ...) so exported checkpoints load directly.
//!
//! Inference only. Batch norm always uses running statistics.

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Linear, Module, VarBuilder};

use crate::error::Result;

/// Channels out of the final bottleneck stage, into the classifier head.
pub const FEATURE_DIM: usize = 2048;

const EXPANSION: usize = 4;
const STEM_CHANNELS: usize = 64;
/// Bottleneck counts per stage for the 50-layer variant.
const STAGE_BLOCKS: [usize; 4] = [3, 4, 6, 3];
const STAGE_PLANES: [usize; 4] = [64, 128, 256, 512];

/// 2D convolution over raw weights. All ResNet convolutions are bias-free.
struct Conv2d {
    weight: Tensor,
    stride: usize,
    padding: usize,
}

impl Conv2d {
    fn load(
        vb: VarBuilder,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let weight = vb.get(
            (out_channels, in_channels, kernel_size, kernel_size),
            "weight",
        )?;
        Ok(Self {
            weight,
            stride,
            padding,
        })
    }

    fn random(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        device: &Device,
    ) -> Result<Self> {
        // Xavier/Glorot initialization
        let bound = (6.0 / (in_channels + out_channels) as f64).sqrt() as f32;
        let weight = Tensor::rand(
            -bound,
            bound,
            (out_channels, in_channels, kernel_size, kernel_size),
            device,
        )?;
        Ok(Self {
            weight,
            stride,
            padding,
        })
    }

    /// Input: (batch, in_channels, height, width)
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(x.conv2d(&self.weight, self.padding, self.stride, 1, 1)?)
    }
}

/// Batch normalization over channel maps, inference mode only.
struct BatchNorm2d {
    running_mean: Tensor,
    running_var: Tensor,
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl BatchNorm2d {
    fn load(vb: VarBuilder, num_features: usize) -> Result<Self> {
        Ok(Self {
            running_mean: vb.get((num_features,), "running_mean")?,
            running_var: vb.get((num_features,), "running_var")?,
            weight: vb.get((num_features,), "weight")?,
            bias: vb.get((num_features,), "bias")?,
            eps: 1e-5,
        })
    }

    /// Identity transform, for randomly initialized networks.
    fn identity(num_features: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            running_mean: Tensor::zeros((num_features,), DType::F32, device)?,
            running_var: Tensor::ones((num_features,), DType::F32, device)?,
            weight: Tensor::ones((num_features,), DType::F32, device)?,
            bias: Tensor::zeros((num_features,), DType::F32, device)?,
            eps: 1e-5,
        })
    }

    /// Input: (batch, channels, height, width)
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mean = self.running_mean.unsqueeze(0)?.unsqueeze(2)?.unsqueeze(3)?;
        let var = self.running_var.unsqueeze(0)?.unsqueeze(2)?.unsqueeze(3)?;
        let weight = self.weight.unsqueeze(0)?.unsqueeze(2)?.unsqueeze(3)?;
        let bias = self.bias.unsqueeze(0)?.unsqueeze(2)?.unsqueeze(3)?;

        let x_norm = x.broadcast_sub(&mean)?;
        let std = (var + self.eps)?.sqrt()?;
        let x_norm = x_norm.broadcast_div(&std)?;

        let out = x_norm.broadcast_mul(&weight)?;
        Ok(out.broadcast_add(&bias)?)
    }
}

/// Bottleneck residual block: 1x1 reduce, 3x3, 1x1 expand.
///
/// The stride, when present, sits on the 3x3 convolution as in torchvision.
/// `downsample` projects the identity path when shape or stride changes.
struct Bottleneck {
    conv1: Conv2d,
    bn1: BatchNorm2d,
    conv2: Conv2d,
    bn2: BatchNorm2d,
    conv3: Conv2d,
    bn3: BatchNorm2d,
    downsample: Option<(Conv2d, BatchNorm2d)>,
}

impl Bottleneck {
    fn load(
        vb: VarBuilder,
        in_planes: usize,
        planes: usize,
        stride: usize,
        has_downsample: bool,
    ) -> Result<Self> {
        let out_planes = planes * EXPANSION;

        let conv1 = Conv2d::load(vb.pp("conv1"), in_planes, planes, 1, 1, 0)?;
        let bn1 = BatchNorm2d::load(vb.pp("bn1"), planes)?;
        let conv2 = Conv2d::load(vb.pp("conv2"), planes, planes, 3, stride, 1)?;
        let bn2 = BatchNorm2d::load(vb.pp("bn2"), planes)?;
        let conv3 = Conv2d::load(vb.pp("conv3"), planes, out_planes, 1, 1, 0)?;
        let bn3 = BatchNorm2d::load(vb.pp("bn3"), out_planes)?;

        let downsample = if has_downsample {
            let ds = vb.pp("downsample");
            let conv = Conv2d::load(ds.pp("0"), in_planes, out_planes, 1, stride, 0)?;
            let bn = BatchNorm2d::load(ds.pp("1"), out_planes)?;
            Some((conv, bn))
        } else {
            None
        };

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            downsample,
        })
    }

    fn random(
        in_planes: usize,
        planes: usize,
        stride: usize,
        has_downsample: bool,
        device: &Device,
    ) -> Result<Self> {
        let out_planes = planes * EXPANSION;

        let conv1 = Conv2d::random(in_planes, planes, 1, 1, 0, device)?;
        let bn1 = BatchNorm2d::identity(planes, device)?;
        let conv2 = Conv2d::random(planes, planes, 3, stride, 1, device)?;
        let bn2 = BatchNorm2d::identity(planes, device)?;
        let conv3 = Conv2d::random(planes, out_planes, 1, 1, 0, device)?;
        let bn3 = BatchNorm2d::identity(out_planes, device)?;

        let downsample = if has_downsample {
            let conv = Conv2d::random(in_planes, out_planes, 1, stride, 0, device)?;
            let bn = BatchNorm2d::identity(out_planes, device)?;
            Some((conv, bn))
        } else {
            None
        };

        Ok(Self {
            conv1,
            bn1,
            conv2,
            bn2,
            conv3,
            bn3,
            downsample,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let identity = match &self.downsample {
            Some((conv, bn)) => bn.forward(&conv.forward(x)?)?,
            None => x.clone(),
        };

        let out = self.bn1.forward(&self.conv1.forward(x)?)?.relu()?;
        let out = self.bn2.forward(&self.conv2.forward(&out)?)?.relu()?;
        let out = self.bn3.forward(&self.conv3.forward(&out)?)?;

        let out = (out + identity)?;
        Ok(out.relu()?)
    }
}

/// ResNet-50 with a single-channel stem and a specifiable class count.
pub struct ResNet {
    conv1: Conv2d,
    bn1: BatchNorm2d,
    layer1: Vec<Bottleneck>,
    layer2: Vec<Bottleneck>,
    layer3: Vec<Bottleneck>,
    layer4: Vec<Bottleneck>,
    fc: Linear,
    num_classes: usize,
}

/// First block of a stage carries the stride and the identity projection,
/// the rest run at stride 1 on the expanded width.
fn load_stage(
    vb: VarBuilder,
    in_planes: usize,
    planes: usize,
    blocks: usize,
    stride: usize,
) -> Result<Vec<Bottleneck>> {
    let mut stage = Vec::with_capacity(blocks);
    stage.push(Bottleneck::load(vb.pp("0"), in_planes, planes, stride, true)?);
    for b in 1..blocks {
        stage.push(Bottleneck::load(vb.pp(b), planes * EXPANSION, planes, 1, false)?);
    }
    Ok(stage)
}

fn random_stage(
    in_planes: usize,
    planes: usize,
    blocks: usize,
    stride: usize,
    device: &Device,
) -> Result<Vec<Bottleneck>> {
    let mut stage = Vec::with_capacity(blocks);
    stage.push(Bottleneck::random(in_planes, planes, stride, true, device)?);
    for _ in 1..blocks {
        stage.push(Bottleneck::random(planes * EXPANSION, planes, 1, false, device)?);
    }
    Ok(stage)
}

impl ResNet {
    /// Build from a checkpoint exposed through a `VarBuilder`.
    pub fn load(vb: VarBuilder, num_classes: usize) -> Result<Self> {
        let conv1 = Conv2d::load(vb.pp("conv1"), 1, STEM_CHANNELS, 7, 2, 3)?;
        let bn1 = BatchNorm2d::load(vb.pp("bn1"), STEM_CHANNELS)?;

        let layer1 = load_stage(vb.pp("layer1"), STEM_CHANNELS, STAGE_PLANES[0], STAGE_BLOCKS[0], 1)?;
        let layer2 = load_stage(vb.pp("layer2"), STAGE_PLANES[0] * EXPANSION, STAGE_PLANES[1], STAGE_BLOCKS[1], 2)?;
        let layer3 = load_stage(vb.pp("layer3"), STAGE_PLANES[1] * EXPANSION, STAGE_PLANES[2], STAGE_BLOCKS[2], 2)?;
        let layer4 = load_stage(vb.pp("layer4"), STAGE_PLANES[2] * EXPANSION, STAGE_PLANES[3], STAGE_BLOCKS[3], 2)?;

        let fc_vb = vb.pp("fc");
        let fc_weight = fc_vb.get((num_classes, FEATURE_DIM), "weight")?;
        let fc_bias = fc_vb.get((num_classes,), "bias")?;
        let fc = Linear::new(fc_weight, Some(fc_bias));

        Ok(Self {
            conv1,
            bn1,
            layer1,
            layer2,
            layer3,
            layer4,
            fc,
            num_classes,
        })
    }

    /// Build with random weights. Predictions are meaningless but shapes,
    /// determinism and the serving path all behave normally.
    pub fn random(num_classes: usize, device: &Device) -> Result<Self> {
        let conv1 = Conv2d::random(1, STEM_CHANNELS, 7, 2, 3, device)?;
        let bn1 = BatchNorm2d::identity(STEM_CHANNELS, device)?;

        let layer1 = random_stage(STEM_CHANNELS, STAGE_PLANES[0], STAGE_BLOCKS[0], 1, device)?;
        let layer2 = random_stage(STAGE_PLANES[0] * EXPANSION, STAGE_PLANES[1], STAGE_BLOCKS[1], 2, device)?;
        let layer3 = random_stage(STAGE_PLANES[1] * EXPANSION, STAGE_PLANES[2], STAGE_BLOCKS[2], 2, device)?;
        let layer4 = random_stage(STAGE_PLANES[2] * EXPANSION, STAGE_PLANES[3], STAGE_BLOCKS[3], 2, device)?;

        let bound = (6.0 / (FEATURE_DIM + num_classes) as f64).sqrt() as f32;
        let fc_weight = Tensor::rand(-bound, bound, (num_classes, FEATURE_DIM), device)?;
        let fc_bias = Tensor::zeros((num_classes,), DType::F32, device)?;
        let fc = Linear::new(fc_weight, Some(fc_bias));

        Ok(Self {
            conv1,
            bn1,
            layer1,
            layer2,
            layer3,
            layer4,
            fc,
            num_classes,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Forward pass.
    ///
    /// Input: (batch, 1, height, width). Output: logits (batch, num_classes).
    /// Global average pooling makes the network tolerant of input geometry,
    /// as long as five stride-2 reductions leave at least one cell.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = self.conv1.forward(x)?;
        let x = self.bn1.forward(&x)?.relu()?;

        // Max pool 3x3 stride 2 pad 1. Activations are non-negative after
        // ReLU, so zero padding is equivalent to edge-value padding here.
        let x = x.pad_with_zeros(2, 1, 1)?.pad_with_zeros(3, 1, 1)?;
        let mut x = x.max_pool2d_with_stride((3, 3), (2, 2))?;

        for block in self
            .layer1
            .iter()
            .chain(&self.layer2)
            .chain(&self.layer3)
            .chain(&self.layer4)
        {
            x = block.forward(&x)?;
        }

        // Global average pool over both spatial dimensions
        let x = x.mean(D::Minus1)?.mean(D::Minus1)?;
        Ok(self.fc.forward(&x)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_output_shape() {
        let device = Device::Cpu;
        let net = ResNet::random(23, &device).unwrap();
        let input = Tensor::zeros((1, 1, 64, 100), DType::F32, &device).unwrap();

        let logits = net.forward(&input).unwrap();
        assert_eq!(logits.dims(), &[1, 23]);
    }

    #[test]
    fn test_forward_deterministic() {
        let device = Device::Cpu;
        let net = ResNet::random(5, &device).unwrap();
        let input = Tensor::rand(-1.0f32, 1.0, (1, 1, 64, 100), &device).unwrap();

        let a = net.forward(&input).unwrap().to_vec2::<f32>().unwrap();
        let b = net.forward(&input).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stage_geometry() {
        assert_eq!(STAGE_BLOCKS.iter().sum::<usize>() * 3 + 2, 50);
        assert_eq!(STAGE_PLANES[3] * EXPANSION, FEATURE_DIM);
    }
}
