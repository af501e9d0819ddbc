use std::fs::read_dir;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use log::debug;

use crate::file::directory::DirectoryLoader;
use crate::file::path::AssetPath;
use crate::file::zip::ZipArchiveLoader;

pub mod directory;
pub mod path;
pub mod zip;

pub trait FileLoader {
    fn load_file(&self, path: &AssetPath) -> Result<Option<Vec<u8>>>;

    /// Lists the files directly inside `dir` whose extension matches `extension`
    /// (case-insensitively).
    fn list_files(&self, dir: &AssetPath, extension: &str) -> Result<Vec<AssetPath>>;
}

/// Searches its loaders in order; the first loader that has a file wins.
pub struct FallbackFileLoader<'a> {
    loaders: Vec<Rc<dyn FileLoader + 'a>>,
}

impl<'a> FallbackFileLoader<'a> {
    pub fn new(loaders: Vec<Rc<dyn FileLoader + 'a>>) -> Self {
        Self { loaders }
    }
}

impl<'a> FileLoader for FallbackFileLoader<'a> {
    fn load_file(&self, path: &AssetPath) -> Result<Option<Vec<u8>>> {
        for loader in &self.loaders {
            if let Some(data) = loader.load_file(path)? {
                return Ok(Some(data));
            }
        }
        Ok(None)
    }

    fn list_files(&self, dir: &AssetPath, extension: &str) -> Result<Vec<AssetPath>> {
        let mut paths: Vec<AssetPath> = Vec::new();
        for loader in &self.loaders {
            for path in loader.list_files(dir, extension)? {
                if !paths.iter().any(|existing| existing.eq_ignore_case(&path)) {
                    paths.push(path);
                }
            }
        }
        paths.sort_by_key(|path| path.as_str().to_ascii_lowercase());
        Ok(paths)
    }
}

/// Builds the search order for a set of game base directories. Later bases override earlier
/// ones. Within a base, loose files override `.pk3` archives, and archives later in name order
/// override earlier ones.
pub fn open_base_dirs(bases: &[PathBuf]) -> Result<FallbackFileLoader<'static>> {
    let mut loaders: Vec<Rc<dyn FileLoader>> = Vec::new();
    for base in bases.iter().rev() {
        loaders.push(Rc::new(DirectoryLoader::new(base.clone())));
        for archive in pk3_archives(base)?.into_iter().rev() {
            debug!("indexing {}", archive.display());
            loaders.push(Rc::new(ZipArchiveLoader::open(&archive)?));
        }
    }
    Ok(FallbackFileLoader::new(loaders))
}

fn pk3_archives(base: &Path) -> Result<Vec<PathBuf>> {
    if !base.is_dir() {
        return Ok(Vec::new());
    }
    let mut archives = Vec::new();
    for entry in read_dir(base).with_context(|| format!("Listing {}", base.display()))? {
        let path = entry?.path();
        let is_pk3 = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("pk3"));
        if is_pk3 && path.is_file() {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}
