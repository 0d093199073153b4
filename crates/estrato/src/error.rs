// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error taxonomy for the cache facade.
//!
//! Tier-level failures are absorbed by the orchestrator: they feed health
//! tracking and statistics, but an operation only returns an error when every
//! tier failed, when a value cannot be serialized (a caller bug), or when a
//! caller-supplied load function fails. Callers therefore never need
//! tier-aware error handling.

use ohno::ErrorExt as _;

use estrato_tier::Error;
use estrato_tier::codec::SerializationError;

/// Every tier failed for one operation.
///
/// This should be effectively impossible while a memory tier is configured,
/// since the memory tier has no external dependency. When it does occur, it
/// is the cause chained into the [`Error`] the operation returns; use
/// `ohno::ErrorExt::find_source::<AllTiersUnavailable>()` to detect it.
#[ohno::error]
#[display("all cache tiers are unavailable")]
pub struct AllTiersUnavailable {}

/// Builds the error returned when no tier could serve an operation.
pub(crate) fn all_tiers_unavailable() -> Error {
    Error::from_message(AllTiersUnavailable::new())
}

/// True when the error chain contains a serialization failure.
///
/// Serialization failures are caller bugs and must fail loudly instead of
/// being absorbed as tier unavailability.
pub(crate) fn is_serialization_error(error: &Error) -> bool {
    error.find_source::<SerializationError>().is_some()
}
