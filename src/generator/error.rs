use std::fmt;

#[derive(Debug)]
pub enum GenerateError {
    /// Creating a directory or writing a generated file failed
    Io { path: String, source: std::io::Error },
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Io { path, source } => {
                write!(f, "Failed to write {}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerateError::Io { source, .. } => Some(source),
        }
    }
}
