use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Result;

use crate::file::path::AssetPath;
use crate::file::FileLoader;

pub struct DirectoryLoader {
    path: PathBuf,
}

impl DirectoryLoader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Maps a logical path onto the disk, matching each component case-insensitively when the
    /// exact name is absent.
    fn resolve(&self, path: &AssetPath) -> Result<Option<PathBuf>> {
        let mut resolved = self.path.clone();
        for component in path.as_str().split('/').filter(|c| !c.is_empty()) {
            let exact = resolved.join(component);
            if exact.exists() {
                resolved = exact;
                continue;
            }
            if !resolved.is_dir() {
                return Ok(None);
            }
            let mut found = None;
            for entry in std::fs::read_dir(&resolved)? {
                let entry = entry?;
                if entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.eq_ignore_ascii_case(component))
                {
                    found = Some(entry.path());
                    break;
                }
            }
            match found {
                Some(found) => resolved = found,
                None => return Ok(None),
            }
        }
        Ok(Some(resolved))
    }
}

impl FileLoader for DirectoryLoader {
    fn load_file(&self, path: &AssetPath) -> Result<Option<Vec<u8>>> {
        let combined_path = match self.resolve(path)? {
            Some(combined_path) => combined_path,
            None => return Ok(None),
        };
        match std::fs::read(&combined_path) {
            Ok(data) => Ok(Some(data)),
            Err(e) => match e.kind() {
                ErrorKind::NotFound => Ok(None),
                _ => Err(e.into()),
            },
        }
    }

    fn list_files(&self, dir: &AssetPath, extension: &str) -> Result<Vec<AssetPath>> {
        let combined_path = match self.resolve(dir)? {
            Some(combined_path) if combined_path.is_dir() => combined_path,
            _ => return Ok(Vec::new()),
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(combined_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = match file_name.to_str() {
                Some(file_name) => file_name,
                None => continue,
            };
            let path = dir.join(file_name);
            if path.extension().eq_ignore_ascii_case(extension) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}
