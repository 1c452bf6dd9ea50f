//! Minimal HTTP/1.1 request framing and response building (§4.6).
//!
//! Grounded on the original project's `HttpHandler::parse_request` /
//! `get_header_value` / `send_http_response` (`src/transport/http_handler.cpp`):
//! a hand-rolled request-line + header-block parser keyed off `Content-Length`,
//! translated from `std::istringstream` line-splitting to byte-slice scanning
//! over the accumulated read buffer, and returning `Result`/an incomplete
//! marker instead of an `std::optional` the caller re-derives byte counts from.

use std::collections::HashMap;

use crate::error::TransportError;

/// A fully parsed HTTP/1.1 request (request line, headers, body).
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// `GET`, `POST`, `DELETE`, …
    pub method: String,
    /// Request target, e.g. `/mcp`.
    pub target: String,
    /// HTTP version token, e.g. `HTTP/1.1`.
    pub version: String,
    /// Header names lower-cased, values whitespace-trimmed.
    headers: HashMap<String, String>,
    /// Raw request body, exactly `Content-Length` bytes (or empty).
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Every header, names already lower-cased. Exposed for capabilities
    /// (such as an `AuthManager`) that need the full set rather than one
    /// name at a time.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// `Mcp-Session-Id`, if present.
    #[must_use]
    pub fn session_id_header(&self) -> Option<&str> {
        self.header("mcp-session-id")
    }

    /// `Last-Event-ID`, parsed as `u64` if present and well-formed.
    #[must_use]
    pub fn last_event_id(&self) -> Option<u64> {
        self.header("last-event-id")?.trim().parse().ok()
    }

    /// Whether the `Accept` header's value contains `text/event-stream`.
    #[must_use]
    pub fn accepts_event_stream(&self) -> bool {
        self.header("accept")
            .is_some_and(|v| v.to_ascii_lowercase().contains("text/event-stream"))
    }

    /// The request body decoded as UTF-8 text, or an empty string if absent
    /// or not valid UTF-8.
    #[must_use]
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Outcome of attempting to parse a request out of an accumulated read
/// buffer (§4.6 steps 1-4).
pub enum ParseOutcome {
    /// Not enough bytes yet; the caller should read more and retry.
    Incomplete,
    /// A full request was parsed. `consumed` is the number of leading bytes
    /// of `buf` that made up this request — the caller drains exactly that
    /// many bytes before re-entering parsing for the next pipelined request.
    Complete { request: HttpRequest, consumed: usize },
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse one HTTP/1.1 request out of `buf` (§4.6 steps 2-4). Returns
/// [`ParseOutcome::Incomplete`] when the header block or body hasn't fully
/// arrived yet, or a [`TransportError::MalformedRequest`] if the header block
/// that *has* arrived cannot be parsed as HTTP.
pub fn try_parse_request(buf: &[u8]) -> Result<ParseOutcome, TransportError> {
    let Some(header_end) = find_subslice(buf, b"\r\n\r\n") else {
        return Ok(ParseOutcome::Incomplete);
    };

    let head = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| TransportError::MalformedRequest(format!("non-utf8 header block: {e}")))?;
    let mut lines = head.split("\r\n");

    let request_line = lines
        .next()
        .ok_or_else(|| TransportError::MalformedRequest("empty request".into()))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| TransportError::MalformedRequest("missing request method".into()))?
        .to_string();
    let target = parts
        .next()
        .ok_or_else(|| TransportError::MalformedRequest("missing request target".into()))?
        .to_string();
    let version = parts.next().unwrap_or("HTTP/1.1").to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(TransportError::MalformedRequest(format!("malformed header line: {line}")));
        };
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length = match headers.get("content-length") {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| TransportError::MalformedRequest(format!("invalid Content-Length: {v}")))?,
        None => 0,
    };

    let body_start = header_end + 4;
    let total_required = body_start + content_length;
    if buf.len() < total_required {
        return Ok(ParseOutcome::Incomplete);
    }

    let body = buf[body_start..total_required].to_vec();
    Ok(ParseOutcome::Complete {
        request: HttpRequest { method, target, version, headers, body },
        consumed: total_required,
    })
}

/// Human-readable reason phrase for the status codes this server emits.
#[must_use]
pub const fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Build a complete `Content-Length`-framed HTTP/1.1 response with a JSON
/// body, matching `HttpHandler::send_http_response`'s byte layout.
#[must_use]
pub fn json_response(status: u16, body: &str) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n",
        reason_phrase(status),
        body.len(),
    )
    .into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}

/// Build a status-line-only response with no body (used for `204 No
/// Content` on `DELETE`).
#[must_use]
pub fn empty_response(status: u16) -> Vec<u8> {
    format!("HTTP/1.1 {status} {}\r\n\r\n", reason_phrase(status)).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_simple_post_with_body() {
        let raw = b"POST /mcp HTTP/1.1\r\nContent-Length: 5\r\nAccept: text/event-stream\r\n\r\nhello";
        let ParseOutcome::Complete { request, consumed } = try_parse_request(raw).unwrap() else {
            panic!("expected complete parse");
        };
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/mcp");
        assert_eq!(request.body, b"hello");
        assert_eq!(consumed, raw.len());
        assert!(request.accepts_event_stream());
    }

    #[test]
    fn incomplete_headers_reports_incomplete() {
        let raw = b"POST /mcp HTTP/1.1\r\nContent-Length: 5\r\n";
        assert!(matches!(try_parse_request(raw).unwrap(), ParseOutcome::Incomplete));
    }

    #[test]
    fn incomplete_body_reports_incomplete() {
        let raw = b"POST /mcp HTTP/1.1\r\nContent-Length: 10\r\n\r\nhi";
        assert!(matches!(try_parse_request(raw).unwrap(), ParseOutcome::Incomplete));
    }

    #[test]
    fn empty_body_post_is_complete() {
        let raw = b"POST /mcp HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let ParseOutcome::Complete { request, consumed } = try_parse_request(raw).unwrap() else {
            panic!("expected complete parse");
        };
        assert!(request.body.is_empty());
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn malformed_request_line_is_an_error() {
        let raw = b"bogus\r\n\r\n";
        assert!(try_parse_request(raw).is_err());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let raw = b"GET /mcp HTTP/1.1\r\nMcp-Session-Id: abc123\r\n\r\n";
        let ParseOutcome::Complete { request, .. } = try_parse_request(raw).unwrap() else {
            panic!("expected complete parse");
        };
        assert_eq!(request.session_id_header(), Some("abc123"));
        assert_eq!(request.header("MCP-SESSION-ID"), Some("abc123"));
    }

    #[test]
    fn pipelined_requests_consume_exactly_one() {
        let raw = b"POST /mcp HTTP/1.1\r\nContent-Length: 2\r\n\r\nhiPOST /mcp HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let ParseOutcome::Complete { consumed, .. } = try_parse_request(raw).unwrap() else {
            panic!("expected complete parse");
        };
        assert_eq!(&raw[consumed..], b"POST /mcp HTTP/1.1\r\nContent-Length: 0\r\n\r\n");
    }
}
