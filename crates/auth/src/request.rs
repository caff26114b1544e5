use http::{HeaderMap, request};

/// The parts of an inbound request the authorizer reads: its cookies and, for
/// redirect capture, its path.
#[derive(Debug, Clone, Copy)]
pub struct IncomingRequest<'a> {
    headers: &'a HeaderMap,
    path: &'a str,
}

impl<'a> IncomingRequest<'a> {
    pub fn new(headers: &'a HeaderMap, path: &'a str) -> Self {
        Self { headers, path }
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    pub fn path(&self) -> &'a str {
        self.path
    }
}

impl<'a, B> From<&'a http::Request<B>> for IncomingRequest<'a> {
    fn from(req: &'a http::Request<B>) -> Self {
        Self::new(req.headers(), req.uri().path())
    }
}

impl<'a> From<&'a request::Parts> for IncomingRequest<'a> {
    fn from(parts: &'a request::Parts) -> Self {
        Self::new(&parts.headers, parts.uri.path())
    }
}
