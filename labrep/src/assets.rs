use anyhow::{anyhow, bail, Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use indexmap::IndexSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::config::{ReportConfig, LOGO_FILENAME};
use crate::models::{MainSection, ProjectMetadata};
use crate::slug::ensure_path_component;

/// File extensions accepted by [`upload_image`].
pub const ALLOWED_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "svg", "pdf", "webp", "bmp"];

/// Extensions carried over when a project is saved under a new identifier.
const COPIED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "svg"];

/// Folder used when an upload names no project.
pub const DEFAULT_UPLOAD_FOLDER: &str = "temp";

/// URL prefix under which uploaded files are served.
const PUBLIC_PREFIX: &str = "/static/uploads";

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

pub fn is_allowed_image(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

/// Returns the last `/`-separated component of an image reference.
///
/// Image references are stored as public paths (`/static/uploads/<project>/<file>`),
/// while the generated document and the image archive only use the file name.
pub fn image_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// An uploaded image after it has been written into a project folder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredImage {
    pub filename: String,
    pub public_path: String,
}

/// Stores `source` in the project folder `folder` under a fresh unique name.
///
/// Decodable images are downscaled so that neither side exceeds
/// `config.max_image_dimension`, flattened to RGB and re-encoded as PNG. Files the
/// decoder rejects (SVG, PDF, corrupt data) are copied unchanged and keep their
/// extension.
///
/// # Arguments
///
/// * `config` - Supplies the upload root and the size limit.
/// * `folder` - Project folder; empty means [`DEFAULT_UPLOAD_FOLDER`].
/// * `source` - The file to store.
///
/// # Errors
///
/// Returns an error when the extension is not allowed, `folder` is not a single path
/// component, or the file cannot be read or written.
pub fn upload_image(config: &ReportConfig, folder: &str, source: &Path) -> Result<StoredImage> {
    let source_name = source
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("No file selected"))?;
    if !is_allowed_image(&source_name) {
        bail!("File type not allowed: {}", source_name);
    }

    let folder = if folder.trim().is_empty() {
        DEFAULT_UPLOAD_FOLDER
    } else {
        folder.trim()
    };
    ensure_path_component("upload folder", folder)?;
    let target_dir = config.project_dir(folder);
    std::fs::create_dir_all(&target_dir)
        .with_context(|| format!("Failed to create {}", target_dir.display()))?;

    let bytes =
        std::fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;
    let stem = format!(
        "img_{}_{:06x}",
        chrono::Local::now().format("%Y%m%d%H%M%S"),
        rand::random::<u32>() & 0xFF_FFFF
    );

    let filename = match image::load_from_memory(&bytes) {
        Ok(img) => {
            let img = prepare_image(img, config.max_image_dimension);
            let filename = format!("{}.png", stem);
            let path = target_dir.join(&filename);
            img.save_with_format(&path, ImageFormat::Png)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Image saved to {}", path.display());
            filename
        }
        Err(e) => {
            tracing::warn!("Error processing image {}: {}; storing it unchanged", source_name, e);
            let ext = extension_of(&source_name).unwrap_or_else(|| "png".to_string());
            let filename = format!("{}.{}", stem, ext);
            let path = target_dir.join(&filename);
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            filename
        }
    };

    Ok(StoredImage {
        public_path: format!("{}/{}/{}", PUBLIC_PREFIX, folder, filename),
        filename,
    })
}

fn prepare_image(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let img = if width.max(height) > max_dimension {
        tracing::debug!("Resizing {}x{} image to fit {}", width, height, max_dimension);
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };
    if img.color().has_alpha() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img
    }
}

/// Lists the image files a project's document references, deduplicated in
/// document order, followed by the cover logo when the project folder has one.
pub fn collect_images(metadata: &ProjectMetadata, project_dir: &Path) -> Vec<String> {
    let theory = metadata
        .dasar_teori_sections
        .values()
        .map(|section| section.image.as_str());
    let results = metadata.main_sections.values().filter_map(|record| match record {
        MainSection::Subsection { image, .. } => Some(image.as_str()),
        _ => None,
    });

    let mut images: IndexSet<String> = theory
        .chain(results)
        .filter(|image| !image.trim().is_empty())
        .map(|image| image_basename(image).to_string())
        .collect();
    if project_dir.join(LOGO_FILENAME).exists() {
        images.insert(LOGO_FILENAME.to_string());
    }
    images.into_iter().collect()
}

/// Packs the named files of `project_dir` into an in-memory ZIP archive.
///
/// Names whose file is missing are skipped with a warning.
///
/// # Errors
///
/// Returns an error when `images` is empty or a file cannot be read.
pub fn write_image_zip(project_dir: &Path, images: &[String]) -> Result<Vec<u8>> {
    if images.is_empty() {
        bail!("No images found to download");
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for image in images {
        let name = image_basename(image);
        let path = project_dir.join(name);
        if !path.is_file() {
            tracing::warn!("Image {} listed but missing, skipping", path.display());
            continue;
        }
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        zip.start_file(name, options)?;
        zip.write_all(&bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Locates an image by file name: first directly under the upload root, then in
/// each project folder. Names that are not a plain file name never match.
pub fn find_image(upload_dir: &Path, name: &str) -> Option<PathBuf> {
    ensure_path_component("image name", name).ok()?;
    let direct = upload_dir.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    std::fs::read_dir(upload_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Copies image files and the cover logo from `old_dir` into `new_dir`.
///
/// # Returns
///
/// The number of files copied; zero when `old_dir` does not exist.
pub fn copy_project_images(old_dir: &Path, new_dir: &Path) -> Result<usize> {
    if !old_dir.is_dir() {
        return Ok(0);
    }
    std::fs::create_dir_all(new_dir)
        .with_context(|| format!("Failed to create {}", new_dir.display()))?;

    let mut copied = 0;
    for entry in std::fs::read_dir(old_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let is_image = extension_of(&name)
            .is_some_and(|ext| COPIED_EXTENSIONS.contains(&ext.as_str()));
        if !entry.path().is_file() || !(is_image || name.to_lowercase().contains("lambang")) {
            continue;
        }
        std::fs::copy(entry.path(), new_dir.join(&name))
            .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        copied += 1;
    }
    tracing::info!("Copied {} images from {} to {}", copied, old_dir.display(), new_dir.display());
    Ok(copied)
}

/// Makes sure the cover logo sits in `project_dir`, copying the configured default
/// logo when it is missing.
///
/// # Returns
///
/// Whether the project folder holds a logo afterwards.
pub fn ensure_logo(config: &ReportConfig, project_dir: &Path) -> Result<bool> {
    let target = project_dir.join(LOGO_FILENAME);
    if target.exists() {
        return Ok(true);
    }
    match config.logo_path() {
        Some(logo) if logo.is_file() => {
            std::fs::create_dir_all(project_dir)?;
            std::fs::copy(logo, &target)
                .with_context(|| format!("Failed to copy logo {}", logo.display()))?;
            Ok(true)
        }
        _ => {
            tracing::debug!("No cover logo available for {}", project_dir.display());
            Ok(false)
        }
    }
}
