use thiserror::Error;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents a code that does not match the `ZA-80G-YY-NNNNN`
    /// layout.
    #[error("invalid ISRC: {code}")]
    InvalidIsrc { code: String },

    /// Represents a generation request without a track title.
    #[error("track title is required")]
    MissingTrackTitle,

    /// Represents an allocation attempt past the end of the caller's
    /// designation range.
    #[error("ISRC limit reached. Maximum {capacity} codes per year.")]
    RangeExhausted { capacity: u32 },

    /// Represents a freshly built code failing the format self-check.
    /// This is an internal invariant violation, not a user error.
    #[error("generated ISRC failed validation: {code}")]
    CodeInvariant { code: String },

    /// Represents an I/O failure in the backing store.
    #[error("storage I/O error")]
    StorageIo { source: std::io::Error },

    /// Represents a stored document that could not be decoded.
    #[error("storage decoding error")]
    StorageDecoding { source: serde_json::Error },

    /// Represents a failure to resolve the calling user.
    #[error("identity unavailable: {message}")]
    IdentityUnavailable { message: String },
}
