use thiserror::Error;

/// Errors surfaced to callers of the directory.
///
/// The `Display` text is user-facing and kept stable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Initial population from the server failed; nothing was cached.
    #[error("Request failed. {0}")]
    RequestFailed(String),

    #[error("Restaurant does not exist")]
    NotFound,
}
