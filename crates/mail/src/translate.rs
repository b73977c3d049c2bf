//! Gmail API response translation
//!
//! Converts raw Gmail API payloads to view models. Translation never
//! fails: absent fields fall back to placeholders so one malformed
//! message cannot sink a whole page of results.

use base64::prelude::*;
use chrono::{TimeZone, Utc};

use crate::gmail::api::{GmailLabel, GmailMessage, GmailThread, MessagePart, MessagePayload};
use crate::models::{EmailAddress, Label, Message, MessageId, ThreadId};

/// Translate a raw Gmail message to a view Message
pub fn message(raw: &GmailMessage) -> Message {
    let id = MessageId::new(&raw.id);
    let thread_id = ThreadId::new(&raw.thread_id);

    let empty_payload = MessagePayload {
        headers: None,
        body: None,
        parts: None,
        mime_type: None,
    };
    let payload = raw.payload.as_ref().unwrap_or(&empty_payload);

    // Extract headers
    let from = extract_header(payload, "From")
        .map(|s| EmailAddress::parse(&s))
        .unwrap_or_else(|| EmailAddress::new("unknown@unknown.com"));

    let to = extract_header(payload, "To")
        .map(|s| parse_address_list(&s))
        .unwrap_or_default();

    let cc = extract_header(payload, "Cc")
        .map(|s| parse_address_list(&s))
        .unwrap_or_default();

    let subject = extract_header(payload, "Subject")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "(no subject)".to_string());

    // Parse internal date (milliseconds since epoch)
    let internal_date: i64 = raw.internal_date.parse().unwrap_or(0);
    let received_at = Utc
        .timestamp_millis_opt(internal_date)
        .single()
        .unwrap_or_else(Utc::now);

    // Extract full body content (both text and HTML)
    let body_text = extract_plain_text_body(payload);
    let body_html = extract_html_body(payload);

    // Extract body preview - prefer the snippet, fall back to extracting from body
    let body_preview = if !raw.snippet.is_empty() {
        decode_html_entities(&raw.snippet)
    } else {
        body_text.clone().unwrap_or_default()
    };

    let label_ids = raw.label_ids.clone().unwrap_or_default();

    Message::builder(id, thread_id)
        .from(from)
        .to(to)
        .cc(cc)
        .subject(subject)
        .body_preview(body_preview)
        .body_text(body_text)
        .body_html(body_html)
        .received_at(received_at)
        .internal_date(internal_date)
        .label_ids(label_ids)
        .build()
}

/// Translate every message of a raw thread, in conversation order
pub fn thread_messages(raw: &GmailThread) -> Vec<Message> {
    raw.messages
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(message)
        .collect()
}

/// Translate a raw Gmail label to a view Label
pub fn label(raw: &GmailLabel) -> Label {
    let is_system = raw.label_type.as_deref() == Some("system");
    let base = if is_system {
        Label::system(raw.id.as_str(), raw.name.as_str())
    } else {
        Label::new(raw.id.as_str(), raw.name.as_str())
    };
    base.with_message_count(raw.messages_total.unwrap_or(0))
        .with_unread_count(raw.messages_unread.unwrap_or(0))
}

/// Extract a header value by name
fn extract_header(payload: &MessagePayload, name: &str) -> Option<String> {
    payload.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Parse a comma-separated list of email addresses
fn parse_address_list(s: &str) -> Vec<EmailAddress> {
    s.split(',')
        .map(|addr| EmailAddress::parse(addr.trim()))
        .collect()
}

/// Extract plain text body from message payload
fn extract_plain_text_body(payload: &MessagePayload) -> Option<String> {
    // Check if this is a simple message with body data
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && payload
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
    {
        return decode_base64_body(data);
    }

    // Check parts for text/plain
    if let Some(parts) = &payload.parts
        && let Some(text) = find_plain_text_in_parts(parts)
    {
        return Some(text);
    }

    // Fall back to any text content
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
    {
        return decode_base64_body(data);
    }

    None
}

/// Recursively search message parts for text/plain content
fn find_plain_text_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        // Check if this part is text/plain
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/plain"))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(text) = decode_base64_body(data)
        {
            return Some(text);
        }

        // Recursively check nested parts
        if let Some(nested) = &part.parts
            && let Some(text) = find_plain_text_in_parts(nested)
        {
            return Some(text);
        }
    }

    None
}

/// Extract HTML body from message payload
fn extract_html_body(payload: &MessagePayload) -> Option<String> {
    // Check if this is a simple message with HTML body
    if let Some(body) = &payload.body
        && let Some(data) = &body.data
        && payload
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/html"))
    {
        return decode_base64_body(data);
    }

    // Check parts for text/html
    if let Some(parts) = &payload.parts
        && let Some(html) = find_html_in_parts(parts)
    {
        return Some(html);
    }

    None
}

/// Recursively search message parts for text/html content
fn find_html_in_parts(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        // Check if this part is text/html
        if part
            .mime_type
            .as_ref()
            .is_some_and(|m| m.starts_with("text/html"))
            && let Some(body) = &part.body
            && let Some(data) = &body.data
            && let Some(html) = decode_base64_body(data)
        {
            return Some(html);
        }

        // Recursively check nested parts
        if let Some(nested) = &part.parts
            && let Some(html) = find_html_in_parts(nested)
        {
            return Some(html);
        }
    }

    None
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
fn decode_base64_body(data: &str) -> Option<String> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    for decoder in decoders {
        if let Ok(decoded) = decoder.decode(data) {
            if let Ok(s) = String::from_utf8(decoded) {
                return Some(s);
            }
        }
    }

    None
}

/// Decode HTML entities in snippet text
fn decode_html_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{Header, MessageBody};

    fn make_test_payload(headers: Vec<(&str, &str)>) -> MessagePayload {
        MessagePayload {
            headers: Some(
                headers
                    .into_iter()
                    .map(|(n, v)| Header {
                        name: n.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
            ),
            body: Some(MessageBody {
                size: Some(0),
                data: None,
            }),
            parts: None,
            mime_type: Some("text/plain".to_string()),
        }
    }

    fn make_test_raw(id: &str, thread_id: &str, payload: Option<MessagePayload>) -> GmailMessage {
        GmailMessage {
            id: id.to_string(),
            thread_id: thread_id.to_string(),
            label_ids: Some(vec!["INBOX".to_string()]),
            snippet: "snippet".to_string(),
            internal_date: "1700000000000".to_string(),
            payload,
        }
    }

    #[test]
    fn test_extract_header() {
        let payload = make_test_payload(vec![
            ("From", "test@example.com"),
            ("Subject", "Test Subject"),
        ]);

        assert_eq!(
            extract_header(&payload, "From"),
            Some("test@example.com".to_string())
        );
        assert_eq!(
            extract_header(&payload, "Subject"),
            Some("Test Subject".to_string())
        );
        assert_eq!(extract_header(&payload, "Cc"), None);
    }

    #[test]
    fn test_extract_header_case_insensitive() {
        let payload = make_test_payload(vec![("FROM", "test@example.com")]);
        assert_eq!(
            extract_header(&payload, "from"),
            Some("test@example.com".to_string())
        );
    }

    #[test]
    fn test_parse_address_list() {
        let addrs = parse_address_list("alice@example.com, Bob <bob@example.com>");
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[0].email, "alice@example.com");
        assert_eq!(addrs[1].email, "bob@example.com");
        assert_eq!(addrs[1].name, Some("Bob".to_string()));
    }

    #[test]
    fn test_decode_html_entities() {
        let input = "Hello &amp; welcome &lt;user&gt;";
        let output = decode_html_entities(input);
        assert_eq!(output, "Hello & welcome <user>");
    }

    #[test]
    fn test_decode_base64_body() {
        // "Hello, World!" in base64url
        let encoded = "SGVsbG8sIFdvcmxkIQ";
        let decoded = decode_base64_body(encoded);
        assert_eq!(decoded, Some("Hello, World!".to_string()));
    }

    #[test]
    fn test_message_with_headers() {
        let payload = make_test_payload(vec![
            ("From", "Alice <alice@example.com>"),
            ("To", "bob@example.com"),
            ("Subject", "Hello"),
        ]);
        let raw = make_test_raw("m1", "t1", Some(payload));

        let msg = message(&raw);
        assert_eq!(msg.id.as_str(), "m1");
        assert_eq!(msg.thread_id.as_str(), "t1");
        assert_eq!(msg.from.email, "alice@example.com");
        assert_eq!(msg.subject, "Hello");
        assert_eq!(msg.internal_date, 1_700_000_000_000);
        assert_eq!(msg.received_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_message_without_payload_uses_fallbacks() {
        let mut raw = make_test_raw("m1", "t1", None);
        raw.internal_date = "not-a-number".to_string();

        let msg = message(&raw);
        assert_eq!(msg.from.email, "unknown@unknown.com");
        assert_eq!(msg.subject, "(no subject)");
        assert_eq!(msg.internal_date, 0);
        assert_eq!(msg.body_preview, "snippet");
    }

    #[test]
    fn test_thread_messages_in_order() {
        let thread = GmailThread {
            id: "t1".to_string(),
            history_id: None,
            messages: Some(vec![
                make_test_raw("m1", "t1", None),
                make_test_raw("m2", "t1", None),
            ]),
        };

        let messages = thread_messages(&thread);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id.as_str(), "m1");
        assert_eq!(messages[1].id.as_str(), "m2");
    }

    #[test]
    fn test_thread_without_messages() {
        let thread = GmailThread {
            id: "t1".to_string(),
            history_id: None,
            messages: None,
        };

        assert!(thread_messages(&thread).is_empty());
    }

    #[test]
    fn test_label_system() {
        let raw = GmailLabel {
            id: "INBOX".to_string(),
            name: "INBOX".to_string(),
            label_type: Some("system".to_string()),
            messages_total: Some(12),
            messages_unread: Some(3),
        };

        let label = label(&raw);
        assert!(label.is_system);
        assert_eq!(label.message_count, 12);
        assert_eq!(label.unread_count, 3);
    }

    #[test]
    fn test_label_user() {
        let raw = GmailLabel {
            id: "Label_7".to_string(),
            name: "Receipts".to_string(),
            label_type: Some("user".to_string()),
            messages_total: None,
            messages_unread: None,
        };

        let label = label(&raw);
        assert!(!label.is_system);
        assert_eq!(label.name, "Receipts");
        assert_eq!(label.message_count, 0);
    }
}
