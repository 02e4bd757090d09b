/// The beamsign error type.
#[derive(Debug, thiserror::Error)]
pub enum BsError {
    #[error("Internal error: [{0}]")]
    InternalError(String),

    #[error("Malformed container")]
    MalformedContainer,

    #[error("I/O error")]
    IOError(#[from] std::io::Error),

    #[error("EOF")]
    Eof,

    #[error("UTF-8 error")]
    UTF8Error(#[from] std::str::Utf8Error),

    #[error("Ed25519 signature function error")]
    CryptoError(#[from] ed25519_compact::Error),

    #[error("No code chunk in module")]
    MissingCodeChunk,

    #[error("Chunk sequence cannot be reassembled into a valid container")]
    Reconstruction,

    #[error("Unsupported key type")]
    UnsupportedKeyType,

    #[error("Module rejected: signature missing or invalid")]
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BsError::MalformedContainer;
        assert_eq!(err.to_string(), "Malformed container");

        let err = BsError::Eof;
        assert_eq!(err.to_string(), "EOF");

        let err = BsError::MissingCodeChunk;
        assert_eq!(err.to_string(), "No code chunk in module");

        let err = BsError::UnsupportedKeyType;
        assert_eq!(err.to_string(), "Unsupported key type");

        let err = BsError::Rejected;
        assert_eq!(err.to_string(), "Module rejected: signature missing or invalid");
    }

    #[test]
    fn test_error_with_params() {
        let err = BsError::InternalError("test error".to_string());
        assert_eq!(err.to_string(), "Internal error: [test error]");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BsError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_from_utf8_error() {
        let invalid_utf8 = vec![0, 159, 146, 150];
        let utf8_err = std::str::from_utf8(&invalid_utf8).unwrap_err();
        let err: BsError = utf8_err.into();
        assert!(err.to_string().contains("UTF-8 error"));
    }

    #[test]
    fn test_error_debug() {
        let err = BsError::Reconstruction;
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Reconstruction"));
    }
}
