use std::fmt::{self, Display, Formatter};

/// Failures the command line distinguishes from generic I/O or parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The input is not the format an operation converts from.
    FormatMismatch { expected: String, found: String },
    /// A generated shader name does not fit the shader record's name field.
    NameTooLong { name: String, max: usize },
}

impl Display for PatchError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            PatchError::FormatMismatch { expected, found } => {
                write!(f, "expected a {} BSP, found {}", expected, found)
            }
            PatchError::NameTooLong { name, max } => write!(
                f,
                "shader name {:?} is {} bytes long, the limit is {}",
                name,
                name.len(),
                max,
            ),
        }
    }
}

impl std::error::Error for PatchError {}
