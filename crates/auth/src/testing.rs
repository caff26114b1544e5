//! Test-only cookie client.

use std::collections::BTreeMap;

use cookie::Cookie;
use cookie::time::Duration;
use http::{HeaderMap, Response, header};

/// Remembers the cookies a server sets and sends them back, the way a
/// browser would.
#[derive(Debug, Default)]
pub(crate) struct Browser {
    cookies: BTreeMap<String, String>,
}

impl Browser {
    pub(crate) fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !self.cookies.is_empty() {
            let joined: Vec<String> = self
                .cookies
                .iter()
                .map(|(name, value)| {
                    Cookie::new(name.clone(), value.clone())
                        .encoded()
                        .to_string()
                })
                .collect();
            headers.insert(header::COOKIE, joined.join("; ").parse().unwrap());
        }
        headers
    }

    pub(crate) fn absorb<B>(&mut self, res: &Response<B>) {
        for cookie in set_cookies(res.headers()) {
            if cookie.max_age() == Some(Duration::ZERO) {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies
                    .insert(cookie.name().to_owned(), cookie.value().to_owned());
            }
        }
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub(crate) fn set_raw(&mut self, name: &str, value: &str) {
        self.cookies.insert(name.to_owned(), value.to_owned());
    }
}

pub(crate) fn set_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| Cookie::parse_encoded(v.to_str().unwrap().to_owned()).unwrap())
        .collect()
}
