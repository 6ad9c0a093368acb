//! The network seam of the client.
//!
//! `TableClient` only knows how to build `HttpRequest` values and read
//! `HttpResponse` values. A `Transport` carries one across the wire and hands
//! the other back. Non-2xx statuses are responses, not errors: the upstream
//! API reports problems in the body and the client decides what they mean.

use crate::http::{HttpRequest, HttpResponse};

/// Executes a single HTTP round-trip.
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &T {
    type Error = T::Error;

    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Self::Error> {
        (**self).execute(request)
    }
}

#[cfg(feature = "ureq")]
pub use self::blocking::UreqTransport;

#[cfg(feature = "ureq")]
mod blocking {
    use ureq::{Agent, RequestBuilder};

    use super::Transport;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};

    /// Blocking transport on a shared `ureq` agent.
    #[derive(Debug, Clone)]
    pub struct UreqTransport {
        agent: Agent,
    }

    impl UreqTransport {
        pub fn new() -> Self {
            let agent = Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent();
            Self { agent }
        }

        pub fn with_agent(agent: Agent) -> Self {
            Self { agent }
        }
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    fn prepare<B>(
        mut builder: RequestBuilder<B>,
        query: &[(String, String)],
        headers: &[(String, String)],
    ) -> RequestBuilder<B> {
        builder = builder.query_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    impl Transport for UreqTransport {
        type Error = ureq::Error;

        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ureq::Error> {
            let HttpRequest {
                method,
                url,
                query,
                headers,
                body,
            } = request;

            let mut response = match (method, body) {
                (HttpMethod::Get, _) => prepare(self.agent.get(&url), &query, &headers).call()?,
                (HttpMethod::Delete, _) => {
                    prepare(self.agent.delete(&url), &query, &headers).call()?
                }
                (HttpMethod::Post, Some(body)) => {
                    prepare(self.agent.post(&url), &query, &headers).send(body.as_bytes())?
                }
                (HttpMethod::Post, None) => {
                    prepare(self.agent.post(&url), &query, &headers).send_empty()?
                }
                (HttpMethod::Patch, Some(body)) => {
                    prepare(self.agent.patch(&url), &query, &headers).send(body.as_bytes())?
                }
                (HttpMethod::Patch, None) => {
                    prepare(self.agent.patch(&url), &query, &headers).send_empty()?
                }
            };

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let body = response.body_mut().read_to_string()?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
