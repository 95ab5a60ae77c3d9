//! Retryability verdicts for capture-service error codes.
//!
//! The Save Page Now API reports failed captures with a `status_ext` code such
//! as `error:blocked-url`. A handful of codes mean the request itself can never
//! succeed (malformed or blocked URLs); everything else is assumed transient.

/// Codes for failures caused by the request itself. Redelivery cannot help.
pub const NON_RETRYABLE_CODES: [&str; 5] = [
    "error:bad-request",
    "error:blocked",
    "error:blocked-client-ip",
    "error:blocked-url",
    "error:invalid-url-syntax",
];

/// Returns false for the fixed set of terminal codes, true for anything else.
///
/// Unknown and empty codes are retryable.
pub fn is_retryable(code: &str) -> bool {
    !NON_RETRYABLE_CODES.contains(&code)
}
