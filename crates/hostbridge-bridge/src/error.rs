use hostbridge_codec::CodecError;

/// Errors surfaced by bridge adapters and their registries.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Encoding the request or decoding the reply failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The underlying channel failed to carry the request.
    #[error("transport failure: {0}")]
    Transport(String),

    /// HTTP client error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The host reported an error for this request.
    #[error("host error: {0}")]
    Host(String),

    /// The request id is already held by a pending request.
    #[error("request id {0} is already pending")]
    IdInUse(u32),

    /// The pending-request cap has been reached.
    #[error("too many pending requests (max {0})")]
    TooManyPending(usize),

    /// The pending request was released before its reply arrived.
    #[error("request {0} was abandoned before a reply arrived")]
    Abandoned(u32),

    /// A push envelope could not be parsed.
    #[error("invalid push envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    /// A text-encoded reply is not valid base64.
    #[error("invalid base64 reply: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A per-call reply transform rejected the decoded values.
    #[error("reply transform failed: {0}")]
    Transform(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
