// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache operations.

/// An error from a cache tier operation.
///
/// This is an opaque error type that can wrap any underlying error from a tier
/// implementation - a network failure, a timeout, a serialization problem. Use
/// [`std::error::Error::source()`] or `ohno::ErrorExt::find_source` to access
/// the underlying cause if needed.
///
/// # Example
///
/// ```
/// use estrato_tier::Error;
///
/// let error = Error::from_message("operation failed");
/// ```
#[ohno::error]
#[derive(Clone)]
pub struct Error {}

impl Error {
    /// Creates a new error from any type that can be converted to an error.
    ///
    /// This is the public API for creating tier errors from external crates.
    ///
    /// # Examples
    ///
    /// ```
    /// use estrato_tier::Error;
    ///
    /// let error = Error::from_message("operation failed");
    /// ```
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// A specialized [`Result`] type for cache tier operations.
pub type Result<T> = std::result::Result<T, Error>;
