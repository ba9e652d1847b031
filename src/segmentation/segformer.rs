//! SegFormer-B0 (ADE20K, 150 classes) through ONNX Runtime.

use super::{ExecutionDevice, Segment, Segmenter};
use crate::error::SegmentationError;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage, RgbaImage};
use ndarray::Array4;
use ort::execution_providers as ep;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;

const INPUT_SIZE: u32 = 512;
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ADE20K class names, indexed by model output channel.
pub const ADE20K_LABELS: [&str; 150] = [
    "wall", "building", "sky", "floor", "tree", "ceiling", "road", "bed", "windowpane", "grass",
    "cabinet", "sidewalk", "person", "earth", "door", "table", "mountain", "plant", "curtain",
    "chair", "car", "water", "painting", "sofa", "shelf", "house", "sea", "mirror", "rug",
    "field", "armchair", "seat", "fence", "desk", "rock", "wardrobe", "lamp", "bathtub",
    "railing", "cushion", "base", "box", "column", "signboard", "chest of drawers", "counter",
    "sand", "sink", "skyscraper", "fireplace", "refrigerator", "grandstand", "path", "stairs",
    "runway", "case", "pool table", "pillow", "screen door", "stairway", "river", "bridge",
    "bookcase", "blind", "coffee table", "toilet", "flower", "book", "hill", "bench",
    "countertop", "stove", "palm", "kitchen island", "computer", "swivel chair", "boat", "bar",
    "arcade machine", "hovel", "bus", "towel", "light", "truck", "tower", "chandelier",
    "awning", "streetlight", "booth", "television receiver", "airplane", "dirt track",
    "apparel", "pole", "land", "bannister", "escalator", "ottoman", "bottle", "buffet",
    "poster", "stage", "van", "ship", "fountain", "conveyer belt", "canopy", "washer",
    "plaything", "swimming pool", "stool", "barrel", "basket", "waterfall", "tent", "bag",
    "minibike", "cradle", "oven", "ball", "food", "step", "tank", "trade name", "microwave",
    "pot", "animal", "bicycle", "lake", "dishwasher", "screen", "blanket", "sculpture", "hood",
    "sconce", "vase", "traffic light", "tray", "ashcan", "fan", "pier", "crt screen", "plate",
    "monitor", "bulletin board", "shower", "radiator", "glass", "clock", "flag",
];

pub struct SegformerSegmenter {
    session: Session,
    input_name: String,
    device: ExecutionDevice,
}

impl SegformerSegmenter {
    /// Load the model, registering CUDA first when `prefer_gpu` is set. ONNX
    /// Runtime falls back to the CPU when CUDA cannot be registered.
    pub fn load(model_path: &Path, prefer_gpu: bool) -> Result<Self, SegmentationError> {
        let model_err = |e: ort::Error| SegmentationError::Model(e.to_string());
        if !model_path.exists() {
            return Err(SegmentationError::Model(format!(
                "{} not found",
                model_path.display()
            )));
        }
        log::info!("Loading SegFormer from {}", model_path.display());

        let mut builder = Session::builder().map_err(model_err)?;
        let device = if prefer_gpu {
            builder = builder
                .with_execution_providers([
                    ep::CUDAExecutionProvider::default().build(),
                    ep::CPUExecutionProvider::default().build(),
                ])
                .map_err(model_err)?;
            ExecutionDevice::Gpu
        } else {
            ExecutionDevice::Cpu
        };
        let session = builder.commit_from_file(model_path).map_err(model_err)?;
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "pixel_values".into());

        Ok(Self {
            session,
            input_name,
            device,
        })
    }
}

fn to_tensor(image: &RgbaImage) -> Array4<f32> {
    let rgb = RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y);
        Rgb([p[0], p[1], p[2]])
    });
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    let side = INPUT_SIZE as usize;
    let mut input = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, p) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (p[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }
    input
}

impl Segmenter for SegformerSegmenter {
    fn device(&self) -> ExecutionDevice {
        self.device
    }

    fn segment(&mut self, image: &RgbaImage) -> Result<Vec<Segment>, SegmentationError> {
        let infer_err = |e: ort::Error| SegmentationError::Inference(e.to_string());

        let input = Value::from_array(to_tensor(image)).map_err(infer_err)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(infer_err)?;
        let logits = outputs[0].try_extract_array::<f32>().map_err(infer_err)?;

        // (1, classes, h, w) logits at a quarter of the input resolution.
        let shape = logits.shape().to_vec();
        let (classes, oh, ow) = match shape.as_slice() {
            [1, c, h, w] => (*c, *h, *w),
            [c, h, w] => (*c, *h, *w),
            _ => {
                return Err(SegmentationError::Inference(format!(
                    "unexpected output shape {shape:?}"
                )))
            }
        };
        let flat: Vec<f32> = logits.iter().copied().collect();

        let mut label_map = vec![0usize; oh * ow];
        for (i, slot) in label_map.iter_mut().enumerate() {
            let mut best = f32::MIN;
            for c in 0..classes {
                let v = flat[c * oh * ow + i];
                if v > best {
                    best = v;
                    *slot = c;
                }
            }
        }

        let mut present: Vec<usize> = label_map.clone();
        present.sort_unstable();
        present.dedup();

        let (w, h) = image.dimensions();
        let segments = present
            .into_iter()
            .map(|class| {
                let low = GrayImage::from_fn(ow as u32, oh as u32, |x, y| {
                    let hit = label_map[y as usize * ow + x as usize] == class;
                    Luma([if hit { 255 } else { 0 }])
                });
                Segment {
                    label: ADE20K_LABELS
                        .get(class)
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("class {class}")),
                    mask: imageops::resize(&low, w, h, FilterType::Nearest),
                }
            })
            .collect();
        Ok(segments)
    }
}
