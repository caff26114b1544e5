use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::Response;
use serde::Serialize;

use turnstile_auth::IncomingRequest;

use crate::app::errors::json_error;

/// An empty 200 response for the authorizer to write cookies onto.
pub fn blank() -> Response {
    Response::new(Body::empty())
}

pub fn incoming<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> IncomingRequest<'a> {
    IncomingRequest::new(headers, uri.path())
}

/// Turn `res` into a 303, keeping any cookies already set on it.
pub fn see_other(mut res: Response, location: &'static str) -> Response {
    *res.status_mut() = StatusCode::SEE_OTHER;
    res.headers_mut()
        .insert(header::LOCATION, HeaderValue::from_static(location));
    res
}

/// Put `body` on `res` as JSON, keeping any cookies already set on it.
pub fn render<T: Serialize>(mut res: Response, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            res.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            *res.body_mut() = Body::from(bytes);
            res
        }
        Err(err) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "serialize_error",
            err.to_string(),
        ),
    }
}
