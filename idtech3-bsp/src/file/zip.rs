use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{Context, Result};
use zip::ZipArchive;

use crate::file::path::AssetPath;
use crate::file::FileLoader;

/// Serves files out of a `.pk3` archive. Lookups ignore case and slash orientation.
pub struct ZipArchiveLoader<R> {
    archive: RefCell<ZipArchive<R>>,
    names: Vec<String>,
}

impl ZipArchiveLoader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening {}", path.display()))?;
        let archive = ZipArchive::new(BufReader::new(file))
            .with_context(|| format!("Reading archive {}", path.display()))?;
        Ok(Self::new(archive))
    }
}

impl<R: Read + Seek> ZipArchiveLoader<R> {
    pub fn new(archive: ZipArchive<R>) -> Self {
        let names = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(ToString::to_string)
            .collect();
        Self {
            archive: RefCell::new(archive),
            names,
        }
    }

    fn find(&self, path: &AssetPath) -> Option<&str> {
        self.names
            .iter()
            .map(String::as_str)
            .find(|name| AssetPath::new(name).eq_ignore_case(path))
    }
}

impl<R: Read + Seek> FileLoader for ZipArchiveLoader<R> {
    fn load_file(&self, path: &AssetPath) -> Result<Option<Vec<u8>>> {
        let name = match self.find(path) {
            Some(name) => name,
            None => return Ok(None),
        };
        let mut archive = self.archive.borrow_mut();
        let mut file = archive.by_name(name)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    fn list_files(&self, dir: &AssetPath, extension: &str) -> Result<Vec<AssetPath>> {
        Ok(self
            .names
            .iter()
            .map(|name| AssetPath::new(name))
            .filter(|path| {
                path.parent().eq_ignore_ascii_case(dir.as_str())
                    && path.extension().eq_ignore_ascii_case(extension)
            })
            .collect())
    }
}
