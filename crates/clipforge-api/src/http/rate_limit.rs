//! Rate-limit header helpers for HTTP responses.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, header::RETRY_AFTER};

use crate::facade::RateLimitDecision;
use crate::http::constants::{HEADER_RATE_LIMIT_LIMIT, HEADER_RATE_LIMIT_REMAINING, HEADER_RATE_LIMIT_RESET};

/// Insert the `X-RateLimit-*` headers, and `Retry-After` when `retry_after` is set.
pub(crate) fn insert_rate_limit_headers(
    headers: &mut HeaderMap,
    limit: u32,
    remaining: u32,
    retry_after: Option<Duration>,
) {
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert(HEADER_RATE_LIMIT_LIMIT, value);
    }
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        headers.insert(HEADER_RATE_LIMIT_REMAINING, value);
    }
    if let Some(wait) = retry_after {
        let secs = wait.as_secs();
        let seconds = if secs == 0 && wait.subsec_nanos() > 0 {
            1
        } else {
            secs.max(1)
        };
        let text = seconds.to_string();
        if let Ok(value) = HeaderValue::from_str(&text) {
            headers.insert(RETRY_AFTER, value.clone());
            headers.insert(HEADER_RATE_LIMIT_RESET, value);
        }
    }
}

/// Insert rate-limit headers for an admitted request, from the gate's decision.
pub(crate) fn insert_admitted_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    insert_rate_limit_headers(headers, decision.limit, decision.remaining, None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_retry_rounds_up_to_one_second() {
        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, 10, 0, Some(Duration::from_millis(250)));
        assert_eq!(headers.get(RETRY_AFTER).unwrap(), "1");
        assert_eq!(headers.get(HEADER_RATE_LIMIT_RESET).unwrap(), "1");
    }

    #[test]
    fn no_retry_after_omits_reset_headers() {
        let mut headers = HeaderMap::new();
        insert_rate_limit_headers(&mut headers, 10, 9, None);
        assert!(headers.get(RETRY_AFTER).is_none());
        assert!(headers.get(HEADER_RATE_LIMIT_RESET).is_none());
    }
}
