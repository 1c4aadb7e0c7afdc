//! Network access for the cache worker.

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};

use super::{FetchRequest, HttpResponse, without_query};

/// Largest body the proxy will buffer.
const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

/// Request headers that describe the hop, not the resource.
const HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "keep-alive",
    "upgrade",
    "accept-encoding",
];

/// The network. `Err` means no response at all; error statuses are `Ok`.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse>;
}

#[derive(Debug, Clone)]
pub struct UreqFetcher {
    agent: ureq::Agent,
}

impl UreqFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Fetcher for UreqFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse> {
        let mut call = self.agent.request(&request.method, &request.url);
        for (name, value) in &request.headers {
            if !is_hop_header(name) {
                call = call.set(name, value);
            }
        }

        let result = if request.body.is_empty() {
            call.call()
        } else {
            call.send_bytes(&request.body)
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                anyhow::bail!(
                    "{} {} failed: {}",
                    request.method,
                    without_query(&request.url),
                    transport.kind()
                );
            }
        };

        let status = response.status();
        let headers = response
            .headers_names()
            .into_iter()
            .filter(|name| !is_hop_header(name))
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name, value))
            })
            .collect();

        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut body)
            .with_context(|| format!("failed reading body of {}", without_query(&request.url)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

pub(crate) fn is_hop_header(name: &str) -> bool {
    HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}
