use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::sse::FrameBuffer;

/// Explicit end-of-stream marker. Optional: a response that simply closes
/// the connection terminates the same way.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded chat-stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// An incremental piece of assistant text. Deltas concatenate in
    /// arrival order.
    Content { content: String },
    /// The set of source citations backing the answer so far. Carries the
    /// raw list; see [`dedupe_citations`] for reconciliation.
    Citations { citations: Vec<Citation> },
}

/// A source-document reference attached to a streamed answer.
///
/// Citations are not unique within a stream: the same document may be
/// cited again with a different score as retrieval refines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub document_id: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_path: Option<Vec<String>>,
    pub snippet: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

/// Wire shapes. The tagged form is current; the untagged `{content}` form
/// predates the `type` field and must keep decoding as a content delta.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TaggedPayload {
    Content { content: String },
    Citations { citations: Vec<Citation> },
}

#[derive(Deserialize)]
struct LegacyPayload {
    content: String,
}

/// Decode one `data:` payload into an event.
///
/// Resolution order: tagged JSON, then the legacy untagged form, then a
/// best-effort fallback that yields the raw payload as a content delta.
pub fn decode_payload(payload: &str) -> ChatStreamEvent {
    if let Ok(tagged) = serde_json::from_str::<TaggedPayload>(payload) {
        return match tagged {
            TaggedPayload::Content { content } => ChatStreamEvent::Content { content },
            TaggedPayload::Citations { citations } => ChatStreamEvent::Citations { citations },
        };
    }

    if let Ok(legacy) = serde_json::from_str::<LegacyPayload>(payload) {
        return ChatStreamEvent::Content {
            content: legacy.content,
        };
    }

    ChatStreamEvent::Content {
        content: payload.to_string(),
    }
}

/// Incremental decoder for an SSE-framed chat response body.
///
/// Feed raw chunks as they arrive; events come back as soon as their frame
/// completes. Once the end sentinel is seen the decoder is finished and
/// ignores further input.
#[derive(Debug, Default)]
pub struct ChatDecoder {
    frames: FrameBuffer,
    finished: bool,
}

impl ChatDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ChatStreamEvent> {
        if self.finished {
            return Vec::new();
        }

        let mut events = Vec::new();

        for frame in self.frames.feed(chunk) {
            if frame.data == DONE_SENTINEL {
                self.finished = true;
                break;
            }
            if frame.data.is_empty() {
                continue;
            }
            events.push(decode_payload(&frame.data));
        }

        events
    }
}

/// Reconcile duplicate citations: keep the highest score per document,
/// ordered by descending score (document id breaks ties).
pub fn dedupe_citations(citations: &[Citation]) -> Vec<Citation> {
    let mut best: HashMap<&str, &Citation> = HashMap::new();

    for citation in citations {
        match best.get(citation.document_id.as_str()) {
            Some(current) if current.score >= citation.score => {}
            _ => {
                best.insert(citation.document_id.as_str(), citation);
            }
        }
    }

    let mut deduped: Vec<Citation> = best.into_values().cloned().collect();
    deduped.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.document_id.cmp(&b.document_id))
    });
    deduped
}
