use std::path::{Path, PathBuf};

use arranger_transport::AudioArc;

use crate::decode_file;

#[derive(Debug, Clone)]
pub struct DecodedSound {
    pub path: PathBuf,
    /// File stem, used as the clip's display name.
    pub name: String,
    pub audio: AudioArc,
}

#[derive(Debug, Clone)]
pub struct ImportFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of decoding a batch of dropped or opened files.
#[derive(Debug, Default)]
pub struct BatchImport {
    pub sounds: Vec<DecodedSound>,
    pub failures: Vec<ImportFailure>,
}

/// Decode every file independently, in order.
///
/// A file that fails is logged and skipped; the batch only fails when every
/// file in a non-empty batch fails.
pub fn decode_batch<P: AsRef<Path>>(paths: &[P]) -> anyhow::Result<BatchImport> {
    let mut batch = BatchImport::default();

    for path in paths {
        let path = path.as_ref();
        match decode_file(path) {
            Ok(audio) => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                batch.sounds.push(DecodedSound {
                    path: path.to_path_buf(),
                    name,
                    audio,
                });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "skipping file: {e:#}");
                batch.failures.push(ImportFailure {
                    path: path.to_path_buf(),
                    error: format!("{e:#}"),
                });
            }
        }
    }

    if batch.sounds.is_empty() && !batch.failures.is_empty() {
        anyhow::bail!("none of the {} files could be decoded", batch.failures.len());
    }

    Ok(batch)
}
