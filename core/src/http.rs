//! HTTP request/response types exchanged with the transport.
//!
//! # Design
//! Requests and responses are plain data. `TableClient` builds `HttpRequest`
//! values and interprets `HttpResponse` values; the `Transport` implementation
//! is the only piece that touches the network. Query parameters are kept as
//! ordered pairs so repeated keys (`fields[]`, `records[]`) survive untouched
//! and the transport does the URL encoding.

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL without the query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All values of the query parameter `name`, in order.
    pub fn query_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.query
            .iter()
            .filter(move |(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// An HTTP response described as plain data.
///
/// Any status is a valid response; interpreting it is up to the client.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/v0/app/Table".to_string(),
            query: Vec::new(),
            headers: vec![("Authorization".to_string(), "Bearer key".to_string())],
            body: None,
        };
        assert_eq!(req.header("authorization"), Some("Bearer key"));
        assert_eq!(req.header("content-type"), None);
    }

    #[test]
    fn response_header_lookup_ignores_case() {
        let mut resp = HttpResponse::new(502, "<html></html>");
        resp.headers
            .push(("Content-Type".to_string(), "text/html".to_string()));
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(HttpResponse::new(200, "{}").header("content-type"), None);
    }

    #[test]
    fn query_values_keep_repeated_keys_in_order() {
        let req = HttpRequest {
            method: HttpMethod::Delete,
            url: "http://localhost/v0/app/Table".to_string(),
            query: vec![
                ("records[]".to_string(), "rec1".to_string()),
                ("view".to_string(), "Grid".to_string()),
                ("records[]".to_string(), "rec2".to_string()),
            ],
            headers: Vec::new(),
            body: None,
        };
        let ids: Vec<&str> = req.query_values("records[]").collect();
        assert_eq!(ids, vec!["rec1", "rec2"]);
    }
}
