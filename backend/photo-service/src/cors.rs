/// CORS preflight handling shared by every endpoint.
///
/// Disallowed origins get a 204 with no `Access-Control-Allow-Origin` header
/// at all; the browser rejects the cross-origin call on its own.
use actix_web::http::{header, Method};
use actix_web::{HttpRequest, HttpResponse};

const ALLOW_METHODS: &str = "GET, POST, HEAD, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, X-Upload-Token, X-Access-Assertion";
const MAX_AGE: &str = "86400";

/// Answer a CORS preflight. Returns `None` for non-OPTIONS requests
/// (pass-through; the caller handles them normally).
pub fn preflight(req: &HttpRequest, allowed_origins: &[String]) -> Option<HttpResponse> {
    if req.method() != Method::OPTIONS {
        return None;
    }

    let mut builder = HttpResponse::NoContent();

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if let Some(value) = origin.and_then(|o| allow_origin_value(o, allowed_origins)) {
        builder
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, value))
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS))
            .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS))
            .insert_header((header::ACCESS_CONTROL_MAX_AGE, MAX_AGE));
    }

    Some(builder.finish())
}

/// The `Access-Control-Allow-Origin` value to grant a request origin, if any.
pub fn allow_origin_value(origin: &str, allowed_origins: &[String]) -> Option<String> {
    if allowed_origins.iter().any(|a| a == "*") {
        Some("*".to_string())
    } else if allowed_origins.iter().any(|a| a == origin) {
        Some(origin.to_string())
    } else {
        None
    }
}

/// Allow-origin value for a plain (non-preflight) response. With a wildcard
/// policy the header is emitted even when the request carries no Origin.
pub fn response_allow_origin(req: &HttpRequest, allowed_origins: &[String]) -> Option<String> {
    if allowed_origins.iter().any(|a| a == "*") {
        return Some("*".to_string());
    }
    req.headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .and_then(|o| allow_origin_value(o, allowed_origins))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn origins(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preflight_allows_listed_origin() {
        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .insert_header((header::ORIGIN, "https://photos.example.com"))
            .to_http_request();
        let resp = preflight(&req, &origins(&["https://photos.example.com"])).unwrap();
        assert_eq!(resp.status().as_u16(), 204);
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "https://photos.example.com"
        );
    }

    #[test]
    fn test_preflight_omits_header_for_disallowed_origin() {
        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .insert_header((header::ORIGIN, "https://evil.example.com"))
            .to_http_request();
        let resp = preflight(&req, &origins(&["https://photos.example.com"])).unwrap();
        assert_eq!(resp.status().as_u16(), 204);
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[test]
    fn test_wildcard_policy() {
        let req = TestRequest::default()
            .method(Method::OPTIONS)
            .insert_header((header::ORIGIN, "https://anywhere.example.com"))
            .to_http_request();
        let resp = preflight(&req, &origins(&["*"])).unwrap();
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "*"
        );
    }

    #[test]
    fn test_non_options_passes_through() {
        let req = TestRequest::default().method(Method::GET).to_http_request();
        assert!(preflight(&req, &origins(&["*"])).is_none());
    }
}
