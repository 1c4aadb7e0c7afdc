//! Local caching proxy.
//!
//! A `tiny_http` server that installs and activates the cache worker, then
//! answers every request through [`CacheWorker::handle`]. Point a browser
//! at it instead of the PassForge server to get the offline-first client.
//!
//! Launched via `passforge serve` (default: `http://127.0.0.1:8094`).

use std::io::{self, Cursor, Read};

use anyhow::Result;
use tiny_http::{Header, Request, Response, Server, StatusCode};

use super::fetch::is_hop_header;
use super::{CacheWorker, FetchRequest, Fetcher, HttpResponse, resolve_url, without_query};

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Bind, run the install/activate lifecycle and serve until killed.
pub fn serve<F: Fetcher>(worker: &CacheWorker<F>, addr: &str) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    match worker.install() {
        Ok(report) => {
            println!(
                "cache {} installed: {} assets, {} skipped",
                worker.version(),
                report.cached.len(),
                report.skipped.len()
            );
            for (url, reason) in &report.skipped {
                println!("  skipped {url}: {reason}");
            }
        }
        // Keep serving from whatever is already cached.
        Err(e) => eprintln!("passforge: {e:#}"),
    }
    let deleted = worker.activate()?;
    if !deleted.is_empty() {
        println!("removed old caches: {}", deleted.join(", "));
    }

    println!("passforge cache proxy running at http://{addr}");
    println!("Proxying {}", worker.origin());
    println!("Press Ctrl+C to stop.\n");

    run(&server, worker);
    Ok(())
}

/// Answer requests sequentially until the server shuts down.
pub fn run<F: Fetcher>(server: &Server, worker: &CacheWorker<F>) {
    for mut request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = resolve_url(worker.origin(), request.url());
        let response = match to_fetch_request(&mut request, worker.origin()) {
            Ok(fetch) => worker.handle(&fetch),
            Err(_) => HttpResponse::text(400, "text/plain; charset=utf-8", "Bad request body"),
        };
        let status = response.status;

        let _ = request.respond(to_tiny_response(response));
        println!("{}", access_line(&method, &url, status));
    }
}

/// One access log line. The query is left out; it can hold a password.
fn access_line(method: &str, url: &str, status: u16) -> String {
    format!(
        "{} {} {} {}",
        method,
        without_query(url),
        status,
        chrono::Local::now().format("%H:%M:%S")
    )
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn to_fetch_request(request: &mut Request, origin: &str) -> io::Result<FetchRequest> {
    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .map(|h| (h.field.to_string(), h.value.to_string()))
        .collect();

    let mut body = Vec::new();
    request.as_reader().read_to_end(&mut body)?;

    let method = request.method().to_string();
    let navigate = method.eq_ignore_ascii_case("GET") && is_navigation(&headers);

    Ok(FetchRequest {
        method,
        url: resolve_url(origin, request.url()),
        headers,
        body,
        navigate,
    })
}

/// Browsers mark page loads with `Sec-Fetch-Mode: navigate`; older clients
/// are recognised by asking for HTML.
fn is_navigation(headers: &[(String, String)]) -> bool {
    let header = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };
    if let Some(mode) = header("Sec-Fetch-Mode") {
        return mode.eq_ignore_ascii_case("navigate");
    }
    header("Accept").is_some_and(|accept| accept.contains("text/html"))
}

fn to_tiny_response(response: HttpResponse) -> Response<Cursor<Vec<u8>>> {
    let mut out = Response::from_data(response.body).with_status_code(StatusCode(response.status));
    for (name, value) in &response.headers {
        if is_hop_header(name) {
            continue;
        }
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            out.add_header(header);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn fetch_mode_decides_navigation() {
        assert!(is_navigation(&headers(&[("sec-fetch-mode", "navigate")])));
        assert!(!is_navigation(&headers(&[
            ("Sec-Fetch-Mode", "cors"),
            ("Accept", "text/html")
        ])));
    }

    #[test]
    fn accept_html_is_navigation_without_fetch_mode() {
        assert!(is_navigation(&headers(&[("Accept", "text/html,*/*")])));
        assert!(!is_navigation(&headers(&[("Accept", "application/json")])));
        assert!(!is_navigation(&[]));
    }

    #[test]
    fn synthesized_error_converts() {
        let response = to_tiny_response(HttpResponse::network_error());
        assert_eq!(response.status_code(), StatusCode(408));
    }

    #[test]
    fn access_line_hides_query() {
        let line = access_line("GET", "http://app.test/api/analyze?password=hunter2", 200);
        assert!(line.starts_with("GET http://app.test/api/analyze 200 "), "{line}");
        assert!(!line.contains("hunter2"));
    }
}
