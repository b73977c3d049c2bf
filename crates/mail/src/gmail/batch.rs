//! Multipart framing for the Gmail batch endpoint
//!
//! The batch endpoint takes a multipart/mixed POST where each part is an
//! embedded HTTP request, and answers with a multipart body of embedded
//! HTTP responses. Parts are correlated by Content-ID: a request sent
//! with `<ID>` comes back tagged `<response-ID>`, so per-item outcomes
//! never depend on part order.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::transport::BatchResults;

/// An assembled multipart batch request body
pub struct BatchRequest {
    pub boundary: String,
    pub body: String,
}

/// Build a batch request fetching every ID of `kind` ("threads" or "messages")
pub fn build_batch_request(kind: &str, ids: &[String]) -> BatchRequest {
    let boundary = format!("batch_{}", uuid::Uuid::new_v4().simple());

    let mut body = String::new();
    for id in ids {
        body.push_str(&format!("--{}\r\n", boundary));
        body.push_str("Content-Type: application/http\r\n");
        body.push_str(&format!("Content-ID: <{}>\r\n", id));
        body.push_str("\r\n");
        body.push_str(&format!(
            "GET /gmail/v1/users/me/{}/{}?format=full\r\n",
            kind,
            urlencoding::encode(id)
        ));
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{}--\r\n", boundary));

    BatchRequest { boundary, body }
}

/// Pull the part boundary out of a multipart Content-Type header value
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let param = param.trim();
        param
            .strip_prefix("boundary=")
            .map(|b| b.trim_matches('"').to_string())
    })
}

/// Parse a multipart batch response into per-ID results
///
/// Each part that carries a Content-ID is decoded; 2xx parts parse their
/// JSON body into `T`, anything else becomes that item's error. Parts
/// without a recognizable Content-ID are skipped (the fetch layer treats
/// the missing entry as unresolved).
pub fn parse_batch_response<T: DeserializeOwned>(
    body: &str,
    boundary: &str,
) -> Result<BatchResults<T>> {
    let mut results = BatchResults::new();

    // CRLF sequences carry no information once parts are split; JSON
    // bodies cannot contain a literal CRLF, so normalizing is safe.
    let normalized = body.replace("\r\n", "\n");
    let delimiter = format!("--{}", boundary);

    for part in normalized.split(&delimiter) {
        let part = part.trim_start_matches('\n');
        // The preamble before the first boundary and the final "--" are not parts
        if part.is_empty() || part == "--" || part.starts_with("--\n") {
            continue;
        }
        if let Some((id, result)) = parse_part(part) {
            results.insert(id, result);
        }
    }

    if results.is_empty() {
        anyhow::bail!("Batch response contained no parts");
    }
    Ok(results)
}

/// Decode one response part into its item ID and outcome
fn parse_part<T: DeserializeOwned>(part: &str) -> Option<(String, Result<T>)> {
    // Part headers end at the first blank line; the embedded HTTP
    // response follows
    let (part_headers, embedded) = part.split_once("\n\n")?;
    let id = content_id(part_headers)?;

    let Some((status_line, rest)) = embedded.split_once('\n') else {
        return Some((id, Err(anyhow::anyhow!("Malformed embedded response"))));
    };
    let Some(status) = parse_status(status_line) else {
        return Some((
            id,
            Err(anyhow::anyhow!("Malformed status line: {}", status_line.trim())),
        ));
    };

    // Embedded response headers, then the JSON payload
    let payload = match rest.split_once("\n\n") {
        Some((_headers, payload)) => payload,
        None => rest,
    };

    if !(200..300).contains(&status) {
        return Some((id, Err(anyhow::anyhow!("HTTP {} for batched item", status))));
    }

    let parsed = serde_json::from_str(payload.trim())
        .with_context(|| format!("Failed to parse batched item {}", id));
    Some((id, parsed))
}

/// Extract the item ID from a part's Content-ID header
///
/// Accepts `<response-ID>` (what the server sends) and `<ID>` alike.
fn content_id(headers: &str) -> Option<String> {
    headers.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("content-id") {
            return None;
        }
        let value = value.trim().trim_start_matches('<').trim_end_matches('>');
        let value = value.strip_prefix("response-").unwrap_or(value);
        Some(value.to_string())
    })
}

/// Parse "HTTP/1.1 200 OK" into 200
fn parse_status(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    fn make_response_part(boundary: &str, id: &str, status: &str, body: &str) -> String {
        format!(
            "--{boundary}\r\nContent-Type: application/http\r\nContent-ID: <response-{id}>\r\n\r\nHTTP/1.1 {status}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{body}\r\n"
        )
    }

    #[test]
    fn test_build_batch_request_shape() {
        let request = build_batch_request("messages", &["m1".to_string(), "m2".to_string()]);

        assert!(request.body.contains("Content-ID: <m1>"));
        assert!(request.body.contains("Content-ID: <m2>"));
        assert!(request.body.contains("GET /gmail/v1/users/me/messages/m1?format=full"));
        assert!(
            request
                .body
                .ends_with(&format!("--{}--\r\n", request.boundary))
        );
        // One opening delimiter per part plus the closing one
        let delimiter = format!("--{}", request.boundary);
        assert_eq!(request.body.matches(&delimiter).count(), 3);
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(
            extract_boundary("multipart/mixed; boundary=batch_abc123"),
            Some("batch_abc123".to_string())
        );
        assert_eq!(
            extract_boundary("multipart/mixed; boundary=\"quoted\""),
            Some("quoted".to_string())
        );
        assert_eq!(extract_boundary("application/json"), None);
    }

    #[test]
    fn test_parse_mixed_outcomes() {
        let boundary = "batch_xyz";
        let mut body = String::new();
        body.push_str(&make_response_part(boundary, "m1", "200 OK", r#"{"id": "m1"}"#));
        body.push_str(&make_response_part(
            boundary,
            "m2",
            "404 Not Found",
            r#"{"error": {"code": 404}}"#,
        ));
        body.push_str(&format!("--{}--\r\n", boundary));

        let results: BatchResults<Item> = parse_batch_response(&body, boundary).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results.get("m1").unwrap().as_ref().unwrap(),
            &Item {
                id: "m1".to_string()
            }
        );
        assert!(results.get("m2").unwrap().is_err());
    }

    #[test]
    fn test_parse_accepts_bare_newlines() {
        let boundary = "b";
        let body = "--b\nContent-Type: application/http\nContent-ID: <response-m1>\n\nHTTP/1.1 200 OK\nContent-Type: application/json\n\n{\"id\": \"m1\"}\n--b--\n";

        let results: BatchResults<Item> = parse_batch_response(body, boundary).unwrap();
        assert_eq!(
            results.get("m1").unwrap().as_ref().unwrap(),
            &Item {
                id: "m1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_empty_response_is_error() {
        let result: Result<BatchResults<Item>> = parse_batch_response("\r\n", "batch_x");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_part_body_is_item_error() {
        let boundary = "batch_xyz";
        let mut body = String::new();
        body.push_str(&make_response_part(boundary, "m1", "200 OK", "this is not json"));
        body.push_str(&format!("--{}--\r\n", boundary));

        let results: BatchResults<Item> = parse_batch_response(&body, boundary).unwrap();
        assert!(results.get("m1").unwrap().is_err());
    }

    #[test]
    fn test_round_trip_ids_survive_encoding() {
        let request = build_batch_request("threads", &["t 1".to_string()]);
        assert!(request.body.contains("GET /gmail/v1/users/me/threads/t%201?format=full"));
        // Content-ID carries the raw ID for correlation
        assert!(request.body.contains("Content-ID: <t 1>"));
    }
}
