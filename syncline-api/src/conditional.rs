//! Conditional Response Support
//!
//! Every cacheable route computes a weak ETag over its response payload and
//! honors `If-None-Match`: a match short-circuits to `304 Not Modified`
//! with an empty body, otherwise the full body is served. The `ETag`
//! header is set on both outcomes so clients can always refresh their
//! stored validator.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use syncline_core::ETag;

/// True when the request's `If-None-Match` matches the computed token.
///
/// Handles the `*` wildcard and comma-separated validator lists.
pub fn if_none_match_satisfied(headers: &HeaderMap, etag: &ETag) -> bool {
    let Some(raw) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    if raw.trim() == "*" {
        return true;
    }

    raw.split(',').any(|candidate| etag.matches(candidate))
}

/// Build the conditional response for a payload and its precomputed token:
/// `304` with an empty body on a validator match, `200` with the JSON body
/// otherwise. The `ETag` header is attached either way.
pub fn conditional_json<T: Serialize>(
    request_headers: &HeaderMap,
    etag: &ETag,
    payload: &T,
) -> Response {
    let mut response = if if_none_match_satisfied(request_headers, etag) {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (StatusCode::OK, Json(payload)).into_response()
    };

    if let Ok(value) = HeaderValue::from_str(etag.as_str()) {
        response.headers_mut().insert(header::ETAG, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncline_core::weak_etag_from;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_str(value).expect("header value"),
        );
        headers
    }

    #[test]
    fn test_no_header_never_matches() {
        let etag = weak_etag_from(&json!({"a": 1}));
        assert!(!if_none_match_satisfied(&HeaderMap::new(), &etag));
    }

    #[test]
    fn test_exact_match() {
        let etag = weak_etag_from(&json!({"a": 1}));
        assert!(if_none_match_satisfied(
            &headers_with(etag.as_str()),
            &etag
        ));
    }

    #[test]
    fn test_wildcard_matches() {
        let etag = weak_etag_from(&json!({"a": 1}));
        assert!(if_none_match_satisfied(&headers_with("*"), &etag));
    }

    #[test]
    fn test_list_match() {
        let etag = weak_etag_from(&json!({"a": 1}));
        let value = format!("W/\"dead-beef\", {}", etag);
        assert!(if_none_match_satisfied(&headers_with(&value), &etag));
    }

    #[test]
    fn test_stale_validator_does_not_match() {
        let etag = weak_etag_from(&json!({"a": 1}));
        assert!(!if_none_match_satisfied(
            &headers_with("W/\"dead-beef\""),
            &etag
        ));
    }

    #[test]
    fn test_conditional_json_status_codes() {
        let payload = json!({"id": "t1"});
        let etag = weak_etag_from(&payload);

        let fresh = conditional_json(&HeaderMap::new(), &etag, &payload);
        assert_eq!(fresh.status(), StatusCode::OK);
        assert_eq!(
            fresh.headers().get(header::ETAG).expect("etag header"),
            etag.as_str()
        );

        let revalidated = conditional_json(&headers_with(etag.as_str()), &etag, &payload);
        assert_eq!(revalidated.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(
            revalidated.headers().get(header::ETAG).expect("etag header"),
            etag.as_str()
        );
    }
}
