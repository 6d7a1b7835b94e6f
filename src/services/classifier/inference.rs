use crate::error::ImageProcessingError;
use crate::models::classify_types::{ClassificationRecord, OutputActivation, TensorLayout};
use crate::services::classifier::labels::LabelSet;
use crate::services::classifier::model_manager::Classifier;
use image::imageops::FilterType;
use image::{ImageReader, RgbImage};
use ndarray::{Array4, ShapeError};
use std::path::Path;

fn nhwc_tensor(data: Vec<f32>, side: usize) -> Result<Array4<f32>, ShapeError> {
    Array4::from_shape_vec((1, side, side, 3), data)
}

/// Resize to `size`×`size` and scale channels to [0, 1], with a leading
/// batch dimension of one.
pub fn preprocess_image(
    rgb: &RgbImage,
    size: u32,
    layout: TensorLayout,
) -> Result<Array4<f32>, ShapeError> {
    let resized = image::imageops::resize(rgb, size, size, FilterType::CatmullRom);
    let side = size as usize;

    match layout {
        TensorLayout::Nhwc => {
            let data: Vec<f32> = resized.into_raw().iter().map(|&v| v as f32 / 255.0).collect();
            nhwc_tensor(data, side)
        }
        TensorLayout::Nchw => {
            let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
            for (x, y, pixel) in resized.enumerate_pixels() {
                for c in 0..3 {
                    tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
                }
            }
            Ok(tensor)
        }
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits.iter().map(|&x| (x - max_logit).exp() / exp_sum).collect()
}

/// Index and value of the largest entry. The first one wins on ties.
pub fn arg_max(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

/// Classify one image and write the original into its class folder under
/// `output_root`. The class folder must already exist.
pub fn classify_image(
    path: &Path,
    model: &dyn Classifier,
    labels: &LabelSet,
    activation: OutputActivation,
    output_root: &Path,
) -> Result<ClassificationRecord, ImageProcessingError> {
    let fail = |message: String| ImageProcessingError::new(path, message);

    let rgb = ImageReader::open(path)
        .map_err(|e| fail(format!("Failed to open image: {}", e)))?
        .with_guessed_format()
        .map_err(|e| fail(format!("Failed to read image format: {}", e)))?
        .decode()
        .map_err(|e| fail(format!("Failed to decode image: {}", e)))?
        .to_rgb8();

    let tensor = preprocess_image(&rgb, model.input_size(), model.layout())
        .map_err(|e| fail(format!("Failed to build input tensor: {}", e)))?;
    let output = model.predict(tensor).map_err(|e| fail(e.to_string()))?;
    let scores = match activation {
        OutputActivation::Probabilities => output,
        OutputActivation::Logits => softmax(&output),
    };

    let (index, confidence) =
        arg_max(&scores).ok_or_else(|| fail("Model produced an empty prediction".to_string()))?;
    let class_name = labels.get(index).ok_or_else(|| {
        fail(format!(
            "Predicted class index {} is outside the {} known labels",
            index,
            labels.len()
        ))
    })?;

    let file_name = path
        .file_name()
        .ok_or_else(|| fail("Path has no file name".to_string()))?;
    let output_path = output_root.join(class_name).join(file_name);

    rgb.save(&output_path)
        .map_err(|e| fail(format!("Failed to write {}: {}", output_path.display(), e)))?;

    Ok(ClassificationRecord {
        source_path: path.to_path_buf(),
        class_name: class_name.to_string(),
        confidence,
        output_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use image::Rgb;
    use tempfile::tempdir;

    struct Fixed(Vec<f32>);

    impl Classifier for Fixed {
        fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
            assert_eq!(input.shape(), &[1, 224, 224, 3]);
            Ok(self.0.clone())
        }
    }

    fn labels(names: &[&str]) -> LabelSet {
        LabelSet::new(names.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn write_image(path: &Path, w: u32, h: u32) {
        RgbImage::from_pixel(w, h, Rgb([200, 10, 30])).save(path).unwrap();
    }

    #[test]
    fn writes_original_size_image_to_class_folder() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("holiday.png");
        write_image(&src, 40, 30);
        let out = dir.path().join("out");
        std::fs::create_dir_all(out.join("dog")).unwrap();

        let model = Fixed(vec![0.1, 0.8675, 0.0325]);
        let record = classify_image(
            &src,
            &model,
            &labels(&["cat", "dog", "bird"]),
            OutputActivation::Probabilities,
            &out,
        )
        .unwrap();

        assert_eq!(record.class_name, "dog");
        assert_eq!(record.confidence_label(), "0.87");
        assert_eq!(record.output_path, out.join("dog").join("holiday.png"));
        assert_eq!(image::image_dimensions(&record.output_path).unwrap(), (40, 30));
    }

    #[test]
    fn corrupt_image_is_an_image_error() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("broken.jpg");
        std::fs::write(&src, b"not really a jpeg").unwrap();

        let err = classify_image(
            &src,
            &Fixed(vec![1.0]),
            &labels(&["only"]),
            OutputActivation::Probabilities,
            dir.path(),
        )
        .unwrap_err();
        assert_eq!(err.path, src);
    }

    #[test]
    fn index_beyond_labels_is_an_image_error() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.png");
        write_image(&src, 4, 4);

        let err = classify_image(
            &src,
            &Fixed(vec![0.1, 0.9]),
            &labels(&["only"]),
            OutputActivation::Probabilities,
            dir.path(),
        )
        .unwrap_err();
        assert!(err.message.contains("outside"));
    }

    #[test]
    fn missing_class_folder_is_a_write_error() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.png");
        write_image(&src, 4, 4);

        let err = classify_image(
            &src,
            &Fixed(vec![1.0]),
            &labels(&["cat"]),
            OutputActivation::Probabilities,
            &dir.path().join("out"),
        )
        .unwrap_err();
        assert!(err.message.contains("Failed to write"));
    }

    #[test]
    fn logits_are_softmaxed() {
        let probs = softmax(&[1.0, 1.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn arg_max_prefers_first_of_equal_scores() {
        assert_eq!(arg_max(&[0.2, 0.7, 0.7]), Some((1, 0.7)));
        assert_eq!(arg_max(&[]), None);
    }

    #[test]
    fn preprocess_scales_and_shapes() {
        let img = RgbImage::from_pixel(10, 20, Rgb([255, 0, 51]));
        let nhwc = preprocess_image(&img, 8, TensorLayout::Nhwc).unwrap();
        assert_eq!(nhwc.shape(), &[1, 8, 8, 3]);
        assert!((nhwc[[0, 3, 3, 0]] - 1.0).abs() < 1e-6);
        assert!((nhwc[[0, 3, 3, 2]] - 0.2).abs() < 1e-6);

        let nchw = preprocess_image(&img, 8, TensorLayout::Nchw).unwrap();
        assert_eq!(nchw.shape(), &[1, 3, 8, 8]);
        assert!((nchw[[0, 0, 5, 5]] - 1.0).abs() < 1e-6);
        assert!(nchw[[0, 1, 5, 5]].abs() < 1e-6);
    }

    #[test]
    fn pixel_buffer_of_the_wrong_length_is_rejected() {
        assert!(nhwc_tensor(vec![0.0; 2 * 2 * 3], 2).is_ok());
        assert!(nhwc_tensor(vec![0.0; 2 * 2 * 3 - 1], 2).is_err());
    }
}
