use std::fmt::{self, Display, Formatter};

/// A logical asset path relative to a game base directory, such as `maps/q3dm1/lm_0000.tga`.
/// Slashes are normalized to `/`; letter case is preserved but ignored by comparisons that go
/// through [`AssetPath::eq_ignore_case`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetPath {
    path: String,
}

impl AssetPath {
    pub fn new(path: &str) -> Self {
        let path = path.replace('\\', "/");
        Self {
            path: path.trim_start_matches('/').to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn join(&self, name: &str) -> Self {
        if self.path.is_empty() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{}", self.path.trim_end_matches('/'), name))
        }
    }

    pub fn parent(&self) -> &str {
        match self.path.rfind('/') {
            Some(index) => &self.path[..index],
            None => "",
        }
    }

    pub fn file_name(&self) -> &str {
        match self.path.rfind('/') {
            Some(index) => &self.path[index + 1..],
            None => &self.path,
        }
    }

    pub fn extension(&self) -> &str {
        let file_name = self.file_name();
        match file_name.rfind('.') {
            Some(index) => &file_name[index + 1..],
            None => "",
        }
    }

    pub fn eq_ignore_case(&self, other: &AssetPath) -> bool {
        self.path.eq_ignore_ascii_case(&other.path)
    }
}

impl Display for AssetPath {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
