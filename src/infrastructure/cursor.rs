// Opaque cursor codec for keyset pagination. A cursor is the URL-safe
// base64 of a tiny JSON payload carrying the last-seen comment id.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct CursorPayload {
    id: i64,
}

/// Encode a comment id into an opaque pagination token.
pub fn encode_cursor(comment_id: i64) -> String {
    let payload = CursorPayload { id: comment_id };
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a pagination token back into a comment id. Any malformed or
/// non-positive input decodes to `None`, which listing treats the same as
/// "no cursor supplied".
pub fn decode_cursor(cursor: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let payload: CursorPayload = serde_json::from_slice(&bytes).ok()?;
    if payload.id > 0 {
        Some(payload.id)
    } else {
        None
    }
}
