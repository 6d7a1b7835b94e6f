use crate::error::AppError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Extension match with the same case rules a shell glob has on this platform.
pub fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };
    if cfg!(windows) {
        IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
    } else {
        IMAGE_EXTENSIONS.contains(&ext)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Every image directly inside or below each folder, de-duplicated and sorted.
pub fn discover_images(folders: &[PathBuf]) -> Result<Vec<PathBuf>, AppError> {
    let mut images = BTreeSet::new();

    for folder in folders {
        std::fs::read_dir(folder).map_err(|e| AppError::Discovery {
            path: folder.clone(),
            message: e.to_string(),
        })?;

        let before = images.len();
        let walker = WalkDir::new(folder)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", folder.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && is_image_file(entry.path()) {
                images.insert(entry.into_path());
            }
        }

        debug!(
            "Discovered {} new images in {}",
            images.len() - before,
            folder.display()
        );
    }

    Ok(images.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn finds_direct_and_nested_images() {
        let dir = tempdir().expect("Failed to create temp dir");
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("b.png"));
        touch(&dir.path().join("nested/deeper/c.bmp"));
        touch(&dir.path().join("nested/d.jpeg"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("e.gif"));

        let found = discover_images(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(found.len(), 4);
        for name in ["a.jpg", "b.png", "c.bmp", "d.jpeg"] {
            assert!(names.contains(&name.to_string()), "missing {name}");
        }
    }

    #[test]
    fn overlapping_folders_yield_each_file_once() {
        let dir = tempdir().expect("Failed to create temp dir");
        touch(&dir.path().join("top.jpg"));
        touch(&dir.path().join("sub/inner.png"));

        let folders = vec![
            dir.path().to_path_buf(),
            dir.path().join("sub"),
            dir.path().to_path_buf(),
        ];
        let found = discover_images(&folders).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn hidden_entries_are_skipped() {
        let dir = tempdir().expect("Failed to create temp dir");
        touch(&dir.path().join(".hidden.jpg"));
        touch(&dir.path().join(".cache/thumb.jpg"));
        touch(&dir.path().join("visible.jpg"));

        let found = discover_images(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(found, vec![dir.path().join("visible.jpg")]);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let result = discover_images(&[dir.path().join("does-not-exist")]);
        assert!(matches!(result, Err(AppError::Discovery { .. })));
    }

    #[test]
    fn result_order_is_stable() {
        let dir = tempdir().expect("Failed to create temp dir");
        for name in ["z.jpg", "m.jpg", "a.jpg"] {
            touch(&dir.path().join(name));
        }
        let first = discover_images(&[dir.path().to_path_buf()]).unwrap();
        let second = discover_images(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] < w[1]));
    }

    #[cfg(not(windows))]
    #[test]
    fn extension_match_is_case_sensitive() {
        assert!(is_image_file(Path::new("photo.jpg")));
        assert!(!is_image_file(Path::new("photo.JPG")));
        assert!(!is_image_file(Path::new("photo")));
    }
}
