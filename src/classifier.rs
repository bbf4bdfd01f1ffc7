//! Snake-species classifier: a pretrained ResNet-50 backbone with a small
//! dropout + linear head, loaded from a saved state dict and run in pure
//! evaluation mode.

use thiserror::Error;

use tch::nn::{self, ModuleT};
use tch::vision::resnet;
use tch::{no_grad, Device, Kind, Tensor};
use tracing::{info, warn};

/// The fixed, ordered class labels. The index of a label is the index of the
/// corresponding output of the classification head.
pub const CLASS_NAMES: [&str; 3] = ["No venenosa", "Coral", "Víbora"];

pub const NUM_CLASSES: usize = CLASS_NAMES.len();

/// Width of the ResNet-50 feature vector feeding the head.
const RESNET50_FEATURES: i64 = 2048;

/// Model input resolution. Images are resized directly to this square shape,
/// without preserving aspect ratio; the training pipeline did the same.
const INPUT_SIZE: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to decode image bytes: {0}")]
    Decode(#[from] image::ImageError),

    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),
}

/// A class prediction: one of [`CLASS_NAMES`] plus the softmax probability
/// of that class, scaled to a percentage.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

/// The classifier topology. All variables live under the `model` path
/// segment, with the linear layer at `model/fc/1`, so their names line up
/// with the keys of the state dict produced at training time
/// (`model.conv1.weight`, ..., `model.fc.1.weight`).
#[derive(Debug)]
struct SnakeNet {
    backbone: Box<dyn ModuleT>,
    head: nn::Linear,
}

impl SnakeNet {
    fn new(p: &nn::Path) -> Self {
        let backbone = Box::new(resnet::resnet50_no_final_layer(&(p / "model")));
        let head = nn::linear(
            p / "model" / "fc" / "1",
            RESNET50_FEATURES,
            NUM_CLASSES as i64,
            Default::default(),
        );
        SnakeNet { backbone, head }
    }
}

impl ModuleT for SnakeNet {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        self.backbone
            .forward_t(xs, train)
            .dropout(0.5, train)
            .apply(&self.head)
    }
}

/// Decode raw image bytes into the normalized CHW float tensor the network
/// expects: RGB, resized to 224x224 (triangle filter, no crop), scaled to
/// [0, 1], then normalized with the ImageNet channel statistics.
pub fn preprocess(bytes: &[u8]) -> Result<Tensor, ClassifierError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let resized = image::imageops::resize(
        &rgb,
        INPUT_SIZE,
        INPUT_SIZE,
        image::imageops::FilterType::Triangle,
    );
    let pixels = Tensor::from_slice(resized.as_raw())
        .view([INPUT_SIZE as i64, INPUT_SIZE as i64, 3])
        .permute([2, 0, 1])
        .to_kind(Kind::Float)
        / 255.0;
    let mean = Tensor::from_slice(&IMAGENET_MEAN).view([3, 1, 1]);
    let std = Tensor::from_slice(&IMAGENET_STD).view([3, 1, 1]);
    Ok((pixels - mean) / std)
}

/// A loaded classifier bound to a device. Read-only after construction;
/// every prediction is a pure forward pass.
pub struct Model {
    vs: nn::VarStore,
    net: SnakeNet,
    device: Device,
}

impl Model {
    /// Build the topology with freshly initialized variables. Only useful on
    /// its own for tests; [`Model::load`] is the real entry point.
    pub fn new(device: Device) -> Self {
        let vs = nn::VarStore::new(device);
        let net = SnakeNet::new(&vs.root());
        Model { vs, net, device }
    }

    /// Build the topology and populate it from a saved state dict
    /// (SafeTensors or `.ot`; both are plain tensor containers).
    ///
    /// Loading is non-strict: variables the file does not provide are logged
    /// and left at their initialized values, and file entries with no
    /// matching variable are skipped. A hard failure (missing file, shape
    /// mismatch, corrupt container) is an error.
    pub fn load<P: AsRef<std::path::Path>>(
        weights: P,
        device: Device,
    ) -> Result<Self, ClassifierError> {
        let mut model = Self::new(device);
        let missing = model.vs.load_partial(weights.as_ref())?;
        if !missing.is_empty() {
            warn!("weights file did not provide {} variables: {missing:?}", missing.len());
        }
        info!("loaded weights from {:?}", weights.as_ref());
        Ok(model)
    }

    /// Classify one image, given its raw encoded bytes.
    pub fn predict(&self, bytes: &[u8]) -> Result<Prediction, ClassifierError> {
        let probs = self.forward(bytes)?;
        let (confidence, index) = probs.max_dim(1, false);
        let index = index.int64_value(&[0]) as usize;
        Ok(Prediction {
            label: CLASS_NAMES[index].to_string(),
            confidence: confidence.double_value(&[0]) * 100.0,
        })
    }

    /// The full per-class distribution for one image, as (label, percentage)
    /// pairs in class order. Debug surface backing the total-probability
    /// tests; `/predict` only ever reports the arg-max entry.
    pub fn probabilities(&self, bytes: &[u8]) -> Result<Vec<(String, f64)>, ClassifierError> {
        let probs = self.forward(bytes)?;
        Ok(CLASS_NAMES
            .iter()
            .enumerate()
            .map(|(i, label)| (label.to_string(), probs.double_value(&[0, i as i64]) * 100.0))
            .collect())
    }

    fn forward(&self, bytes: &[u8]) -> Result<Tensor, ClassifierError> {
        let input = preprocess(bytes)?.unsqueeze(0).to_device(self.device);
        Ok(no_grad(|| {
            self.net
                .forward_t(&input, false)
                .softmax(-1, Some(Kind::Float))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, px: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(px));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn preprocess_outputs_a_normalized_chw_tensor() {
        let tensor = preprocess(&png_bytes(64, 48, [128, 128, 128])).unwrap();
        assert_eq!(tensor.size(), vec![3, 224, 224]);
        // solid-color input, so every pixel of channel 0 has the same value
        let expected = (128.0 / 255.0 - 0.485) / 0.229;
        let got = tensor.double_value(&[0, 112, 112]);
        assert!((got - expected).abs() < 1e-3, "got {got}, expected {expected}");
    }

    #[test]
    fn preprocess_rejects_non_image_bytes() {
        let err = preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ClassifierError::Decode(_)));
    }

    #[test]
    fn class_names_match_head_width() {
        assert_eq!(CLASS_NAMES.len(), NUM_CLASSES);
    }

    #[test]
    fn probabilities_sum_to_one_hundred() {
        let model = Model::new(Device::Cpu);
        let probs = model.probabilities(&png_bytes(32, 32, [40, 180, 90])).unwrap();
        assert_eq!(probs.len(), NUM_CLASSES);
        let total: f64 = probs.iter().map(|(_, pct)| pct).sum();
        assert!((total - 100.0).abs() < 1e-3, "total {total}");
    }

    #[test]
    fn prediction_is_deterministic() {
        let model = Model::new(Device::Cpu);
        let bytes = png_bytes(80, 60, [200, 30, 60]);
        let first = model.predict(&bytes).unwrap();
        let second = model.predict(&bytes).unwrap();
        assert_eq!(first, second);
        assert!(CLASS_NAMES.contains(&first.label.as_str()));
        assert!((0.0..=100.0).contains(&first.confidence));
    }

    #[test]
    fn load_tolerates_missing_variables() {
        // a file holding only the head: the backbone variables come back in
        // the missing list and loading still succeeds
        let path = std::env::temp_dir().join("snakeserve-partial-head.safetensors");
        let vs = nn::VarStore::new(Device::Cpu);
        let _head = nn::linear(
            vs.root() / "model" / "fc" / "1",
            RESNET50_FEATURES,
            NUM_CLASSES as i64,
            Default::default(),
        );
        vs.save(&path).unwrap();
        let loaded = Model::load(&path, Device::Cpu);
        std::fs::remove_file(&path).ok();
        assert!(loaded.is_ok());
    }

    #[test]
    fn load_fails_cleanly_when_weights_file_is_absent() {
        let result = Model::load("no/such/file.safetensors", Device::Cpu);
        assert!(matches!(result, Err(ClassifierError::Torch(_))));
    }
}
