//! Retry/rate-limit failure classification
//!
//! Turns an arbitrary failure into a human-readable message plus an
//! actionable hint. Classification is pure: it never retries anything, it
//! only informs the user (or a caller-side retry loop).
//!
//! Precedence: a rate-limited failure wins over everything else, because
//! waiting is more specific remediation than any other hint; then missing
//! credentials, timeout, forbidden, unauthorized, and finally the raw
//! message with no hint.

use crate::client::{ApiError, RateLimitQuota};
use crate::upload::UploadError;
use std::time::Duration;

/// Derived per failure, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub message: String,
    /// Empty when no actionable remediation applies.
    pub hint: String,
}

/// Classify any failure by walking its error chain.
///
/// The message is the top-level error; the hint comes from the first
/// classifiable cause found in the chain ([`ApiError`] or the upload
/// pipeline's deadline variant).
pub fn classify(err: &anyhow::Error) -> ClassifiedError {
    for cause in err.chain() {
        if let Some(api) = cause.downcast_ref::<ApiError>() {
            return ClassifiedError {
                message: err.to_string(),
                hint: classify_api(api).hint,
            };
        }
        if let Some(upload) = cause.downcast_ref::<UploadError>() {
            if let Some(hint) = upload_hint(upload) {
                return ClassifiedError {
                    message: err.to_string(),
                    hint,
                };
            }
        }
    }

    ClassifiedError {
        message: err.to_string(),
        hint: String::new(),
    }
}

/// Classify one API failure.
pub fn classify_api(err: &ApiError) -> ClassifiedError {
    let message = err.to_string();
    let hint = match err {
        ApiError::RateLimited {
            retry_after, quota, ..
        } => rate_limit_hint(*retry_after, *quota),
        ApiError::MissingCredentials => {
            "Set api.token in the configuration file or the COURIER_API_TOKEN \
             environment variable, then run `appcourier doctor` to verify the setup."
                .to_string()
        }
        ApiError::Timeout => {
            "The request exceeded the configured timeout. Increase \
             api.request_timeout_secs and try again."
                .to_string()
        }
        ApiError::Forbidden { .. } => {
            "The credentials are valid but lack permission for this operation. \
             Check the API key's role and granted access."
                .to_string()
        }
        ApiError::Unauthorized { .. } => {
            "The API credentials were rejected. Re-authenticate or issue a new \
             API token."
                .to_string()
        }
        _ => String::new(),
    };

    ClassifiedError { message, hint }
}

fn upload_hint(err: &UploadError) -> Option<String> {
    match err {
        // The transparent Api variant never shows its inner error as a
        // separate chain element, so unwrap it here.
        UploadError::Api(inner) | UploadError::Transport { source: inner, .. } => {
            let hint = classify_api(inner).hint;
            (!hint.is_empty()).then_some(hint)
        }
        UploadError::DeadlineExceeded => Some(
            "The upload deadline elapsed before the server finished processing. \
             Increase upload.deadline_secs (or --deadline-secs) and try again."
                .to_string(),
        ),
        _ => None,
    }
}

fn rate_limit_hint(retry_after: Option<Duration>, quota: Option<RateLimitQuota>) -> String {
    let mut hint = String::new();

    if let Some(wait) = retry_after {
        hint.push_str(&format!("Retry after {}s.", wait.as_secs()));
    }

    if let Some(quota) = quota {
        let summary = match (quota.remaining, quota.limit) {
            (Some(remaining), Some(limit)) => {
                Some(format!("{remaining} of {limit} requests remaining this hour."))
            }
            (Some(remaining), None) => Some(format!("{remaining} requests remaining this hour.")),
            (None, Some(limit)) => Some(format!("Hourly request limit is {limit}.")),
            (None, None) => None,
        };
        if let Some(summary) = summary {
            if !hint.is_empty() {
                hint.push(' ');
            }
            hint.push_str(&summary);
        }
    }

    if hint.is_empty() {
        hint.push_str("Reduce request volume and try again later.");
    }
    hint
}
