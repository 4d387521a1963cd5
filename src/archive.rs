use crate::error::{EngineError, EngineResult};
use std::{fs, io, path::Path};

pub trait ArchiveExtractor: Send + Sync {
    /// Unpacks `archive` into `dest`, overwriting files that already exist.
    fn extract(&self, archive: &Path, dest: &Path) -> EngineResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> EngineResult<()> {
        let name = archive.display().to_string();
        let extraction = |message: String| EngineError::Extraction {
            name: name.clone(),
            message,
        };

        let file = fs::File::open(archive).map_err(|err| EngineError::fs(archive, err))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|err| extraction(err.to_string()))?;
        fs::create_dir_all(dest).map_err(|err| EngineError::fs(dest, err))?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|err| extraction(err.to_string()))?;
            // Entries escaping the destination are skipped.
            let Some(rel) = entry.enclosed_name() else {
                continue;
            };
            let out_path = dest.join(rel);
            if entry.is_dir() {
                fs::create_dir_all(&out_path).map_err(|err| EngineError::fs(&out_path, err))?;
                continue;
            }
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|err| EngineError::fs(parent, err))?;
            }
            let mut out_file =
                fs::File::create(&out_path).map_err(|err| EngineError::fs(&out_path, err))?;
            io::copy(&mut entry, &mut out_file).map_err(|err| extraction(err.to_string()))?;
        }
        Ok(())
    }
}
