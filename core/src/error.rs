/// Errors surfaced at the launcher and layer boundary.
///
/// Numerical degeneracy is NOT an error: backward zero-fills the instance's
/// gradients and reports it through `BackwardStatus`. Non-convergence is
/// reported through the sweep count. Only caller-side mistakes that can be
/// checked cheaply up front end up here.
#[derive(Debug, Clone, PartialEq)]
pub enum MixError {
    /// One of batch, n, m, k is zero.
    ZeroDimension { name: &'static str },
    /// A buffer length does not match the stride implied by the dimensions.
    ShapeMismatch {
        buffer: &'static str,
        expected: usize,
        found: usize,
    },
    /// A configuration value is out of range.
    InvalidConfig(String),
    /// Checkpoint read/write or (de)serialization failure.
    Io(String),
}

impl std::fmt::Display for MixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixError::ZeroDimension { name } => write!(f, "dimension {name} must be non-zero"),
            MixError::ShapeMismatch { buffer, expected, found } => {
                write!(f, "buffer {buffer}: expected {expected} elements, found {found}")
            }
            MixError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            MixError::Io(msg) => write!(f, "checkpoint i/o: {msg}"),
        }
    }
}

impl std::error::Error for MixError {}

impl From<std::io::Error> for MixError {
    fn from(e: std::io::Error) -> Self {
        MixError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for MixError {
    fn from(e: serde_json::Error) -> Self {
        MixError::Io(e.to_string())
    }
}

/// Length check used by every boundary validator.
pub(crate) fn check_len(buffer: &'static str, found: usize, expected: usize) -> Result<(), MixError> {
    if found != expected {
        return Err(MixError::ShapeMismatch { buffer, expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_shape_mismatch() {
        let e = MixError::ShapeMismatch { buffer: "v", expected: 12, found: 10 };
        assert_eq!(e.to_string(), "buffer v: expected 12 elements, found 10");
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("z", 4, 4).is_ok());
        assert_eq!(
            check_len("z", 3, 4),
            Err(MixError::ShapeMismatch { buffer: "z", expected: 4, found: 3 })
        );
    }

    #[test]
    fn test_io_conversion() {
        let e: MixError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(e, MixError::Io(ref msg) if msg.contains("gone")));
    }
}
