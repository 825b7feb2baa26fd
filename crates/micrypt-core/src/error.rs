use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Stable error classification shared by every vault operation.
///
/// Individual [`VaultError`] variants carry more detail (for example the
/// three keyfile failure modes), but callers that only need to branch on
/// broad outcome should use [`VaultError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed caller input: empty path, short password, directory where a
    /// file was expected.
    InvalidInput,
    /// Password mismatch, or keyfiles missing/unexpected/wrong.
    InvalidCredentials,
    /// An authenticator tag or MAC did not verify.
    IntegrityFailure,
    /// The container is structurally damaged: length guards tripped, JSON
    /// blobs unparseable, index/blob count mismatch.
    Corruption,
    /// I/O or RNG failure.
    ResourceFailure,
    /// Operation attempted against the wrong vault state.
    StateError,
    /// PIM out of range or iteration-count overflow.
    Overflow,
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid keyfiles")]
    InvalidKeyfiles,

    #[error("missing keyfiles")]
    MissingKeyfiles,

    #[error("unexpected keyfiles")]
    UnexpectedKeyfiles,

    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    #[error("corrupted vault: {0}")]
    Corruption(String),

    #[error("vault state error: {0}")]
    State(String),

    #[error("iteration overflow: {0}")]
    Overflow(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RNG failure: {0}")]
    Rng(String),
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidInput(_) => ErrorKind::InvalidInput,
            VaultError::InvalidPassword
            | VaultError::InvalidKeyfiles
            | VaultError::MissingKeyfiles
            | VaultError::UnexpectedKeyfiles => ErrorKind::InvalidCredentials,
            VaultError::IntegrityFailure(_) => ErrorKind::IntegrityFailure,
            VaultError::Corruption(_) => ErrorKind::Corruption,
            VaultError::State(_) => ErrorKind::StateError,
            VaultError::Overflow(_) => ErrorKind::Overflow,
            VaultError::Io(_) | VaultError::Rng(_) => ErrorKind::ResourceFailure,
        }
    }
}

/// Convenience constructors used across the workspace.
impl VaultError {
    pub fn input(msg: impl Into<String>) -> Self {
        VaultError::InvalidInput(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        VaultError::IntegrityFailure(msg.into())
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        VaultError::Corruption(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        VaultError::State(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_variants_share_a_kind() {
        for err in [
            VaultError::InvalidPassword,
            VaultError::InvalidKeyfiles,
            VaultError::MissingKeyfiles,
            VaultError::UnexpectedKeyfiles,
        ] {
            assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
        }
    }

    #[test]
    fn test_io_maps_to_resource_failure() {
        let err = VaultError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(err.kind(), ErrorKind::ResourceFailure);
    }

    #[test]
    fn test_display_carries_context() {
        let err = VaultError::corruption("blob too large");
        assert_eq!(err.to_string(), "corrupted vault: blob too large");
    }
}
