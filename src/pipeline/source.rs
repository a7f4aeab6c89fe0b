//! Source reading: turn a catalog PDF or an image folder into a lazy,
//! ordered stream of extraction units.
//!
//! ## Why a blocking producer thread?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. A `spawn_blocking` producer renders pages on a dedicated thread
//! and feeds them over a capacity-1 channel, so at most one rendered page
//! sits in memory while the consumer is busy with a model call. The stream
//! is finite and not restartable — a fresh open starts again from unit 1.
//!
//! PDF magic bytes (`%PDF`) are validated before pdfium touches the file so
//! callers get a meaningful error rather than a pdfium crash.

use crate::config::ExtractionConfig;
use crate::error::{CatalogError, UnitError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// File extensions accepted by the image-folder source.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// One page of a paginated source, or one standalone image.
///
/// `text` is the page text layer (empty for image sources); `image` is the
/// always-available rasterized fallback payload.
#[derive(Debug)]
pub struct SourceUnit {
    /// 1-based position in the source.
    pub index: usize,
    /// Human label: "page 3" or the image file name.
    pub label: String,
    /// Text layer, trimmed; empty when the source has none.
    pub text: String,
    /// Rasterized unit image.
    pub image: DynamicImage,
}

/// A finite, ordered stream of units from one source.
pub struct UnitStream {
    total: usize,
    rx: mpsc::Receiver<Result<SourceUnit, UnitError>>,
}

impl UnitStream {
    /// Number of units the source will produce (failed units included).
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next unit in source order; `None` when the source is exhausted.
    ///
    /// A `Err(UnitError)` item is a per-unit read/render failure — the
    /// stream continues with the following unit.
    pub async fn next_unit(&mut self) -> Option<Result<SourceUnit, UnitError>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
impl UnitStream {
    /// Build a stream from pre-made units, so batch tests can exercise the
    /// unit loop without a real PDF or folder on disk.
    pub(crate) fn from_units(units: Vec<Result<SourceUnit, UnitError>>) -> Self {
        let total = units.len();
        let (tx, rx) = mpsc::channel(total.max(1));
        for unit in units {
            tx.try_send(unit).expect("channel sized for all units");
        }
        Self { total, rx }
    }
}

// ── PDF source ───────────────────────────────────────────────────────────

/// Open a catalog PDF as a unit stream, one unit per page.
pub async fn open_pdf(path: &Path, config: &ExtractionConfig) -> Result<UnitStream, CatalogError> {
    validate_pdf_file(path)?;

    let (ready_tx, ready_rx) = oneshot::channel();
    let (unit_tx, unit_rx) = mpsc::channel(1);
    let path_buf = path.to_path_buf();
    let max_edge = config.max_image_edge;

    tokio::task::spawn_blocking(move || {
        stream_pdf_blocking(&path_buf, max_edge, ready_tx, unit_tx)
    });

    let total = ready_rx
        .await
        .map_err(|_| CatalogError::Internal("PDF reader thread exited before opening".into()))??;

    info!("PDF opened: {} pages", total);
    Ok(UnitStream {
        total,
        rx: unit_rx,
    })
}

/// Validate existence, readability, and PDF magic bytes.
fn validate_pdf_file(path: &Path) -> Result<(), CatalogError> {
    if !path.exists() {
        return Err(CatalogError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(CatalogError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(CatalogError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(CatalogError::SourceNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Blocking producer: open the document, report the page count, then render
/// and send one page at a time.
fn stream_pdf_blocking(
    path: &Path,
    max_edge: u32,
    ready: oneshot::Sender<Result<usize, CatalogError>>,
    tx: mpsc::Sender<Result<SourceUnit, UnitError>>,
) {
    let pdfium = Pdfium::default();

    let document = match pdfium.load_pdf_from_file(path, None) {
        Ok(doc) => doc,
        Err(e) => {
            let _ = ready.send(Err(CatalogError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("{e:?}"),
            }));
            return;
        }
    };

    let pages = document.pages();
    let total = pages.len() as usize;
    if ready.send(Ok(total)).is_err() {
        return;
    }

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_edge as i32)
        .set_maximum_height(max_edge as i32);

    for (idx, page) in pages.iter().enumerate() {
        let index = idx + 1;
        let text = page
            .text()
            .map(|t| t.all().trim().to_string())
            .unwrap_or_default();

        let unit = match page.render_with_config(&render_config) {
            Ok(bitmap) => {
                let image = bitmap.as_image();
                debug!(
                    "Rendered page {} → {}x{} px, {} text chars",
                    index,
                    image.width(),
                    image.height(),
                    text.len()
                );
                Ok(SourceUnit {
                    index,
                    label: format!("page {index}"),
                    text,
                    image,
                })
            }
            Err(e) => Err(UnitError::Render {
                unit: index,
                detail: format!("{e:?}"),
            }),
        };

        // Consumer dropped the stream; stop producing.
        if tx.blocking_send(unit).is_err() {
            return;
        }
    }
}

// ── Image-folder source ──────────────────────────────────────────────────

/// Open a folder of price screenshots as a unit stream, one unit per image
/// file in sorted name order. Every unit has an empty text layer.
pub async fn open_image_folder(path: &Path) -> Result<UnitStream, CatalogError> {
    let files = list_image_files(path)?;
    let total = files.len();
    info!("Image folder opened: {} files", total);

    let (unit_tx, unit_rx) = mpsc::channel(1);
    tokio::task::spawn_blocking(move || {
        for (idx, file) in files.into_iter().enumerate() {
            let index = idx + 1;
            let label = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("image {index}"));

            let unit = match image::open(&file) {
                Ok(image) => Ok(SourceUnit {
                    index,
                    label,
                    text: String::new(),
                    image,
                }),
                Err(e) => Err(UnitError::Render {
                    unit: index,
                    detail: format!("failed to decode '{}': {e}", file.display()),
                }),
            };

            if unit_tx.blocking_send(unit).is_err() {
                return;
            }
        }
    });

    Ok(UnitStream {
        total,
        rx: unit_rx,
    })
}

/// Enumerate accepted image files in sorted name order.
fn list_image_files(path: &Path) -> Result<Vec<PathBuf>, CatalogError> {
    if !path.is_dir() {
        return Err(CatalogError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            CatalogError::PermissionDenied {
                path: path.to_path_buf(),
            }
        } else {
            CatalogError::SourceNotFound {
                path: path.to_path_buf(),
            }
        }
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
        })
        .collect();

    if files.is_empty() {
        return Err(CatalogError::EmptyFolder {
            path: path.to_path_buf(),
        });
    }

    files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str) {
        let img = RgbImage::from_pixel(4, 4, Rgb([200, 200, 200]));
        img.save(dir.join(name)).unwrap();
    }

    #[tokio::test]
    async fn folder_units_arrive_in_sorted_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png");
        write_png(dir.path(), "a.png");
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut stream = open_image_folder(dir.path()).await.unwrap();
        assert_eq!(stream.total(), 2);

        let first = stream.next_unit().await.unwrap().unwrap();
        assert_eq!(first.label, "a.png");
        assert_eq!(first.index, 1);
        assert!(first.text.is_empty());

        let second = stream.next_unit().await.unwrap().unwrap();
        assert_eq!(second.label, "b.png");
        assert!(stream.next_unit().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_image_is_a_unit_error_not_a_fatal_one() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "1-good.png");
        std::fs::write(dir.path().join("2-bad.jpg"), b"not an image").unwrap();

        let mut stream = open_image_folder(dir.path()).await.unwrap();
        assert!(stream.next_unit().await.unwrap().is_ok());
        let err = stream.next_unit().await.unwrap().unwrap_err();
        assert!(matches!(err, UnitError::Render { unit: 2, .. }));
    }

    #[tokio::test]
    async fn missing_and_empty_folders_are_fatal() {
        let missing = open_image_folder(Path::new("/no/such/folder")).await;
        assert!(matches!(missing, Err(CatalogError::SourceNotFound { .. })));

        let dir = tempfile::tempdir().unwrap();
        let empty = open_image_folder(dir.path()).await;
        assert!(matches!(empty, Err(CatalogError::EmptyFolder { .. })));
    }

    #[tokio::test]
    async fn non_pdf_file_is_rejected_by_magic_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake.pdf");
        std::fs::write(&fake, b"GIF8 not a pdf").unwrap();
        let config = ExtractionConfig::default();
        let err = open_pdf(&fake, &config).await;
        assert!(matches!(err, Err(CatalogError::NotAPdf { .. })));
    }
}
