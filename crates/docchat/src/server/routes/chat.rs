//! Streaming chat over a WebSocket
//!
//! Each inbound text frame is `{"query": "..."}`. Answers go out as a run of
//! `{"chunk": ...}` frames closed by `{"done": true}`, or a single
//! `{"error": ...}`. Queries on one connection are answered one at a time, in
//! arrival order.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;

use crate::server::state::AppState;
use crate::sessions::{Session, SessionRegistry};
use crate::types::{ChatEvent, ChatRequest};

const INVALID_SESSION: &str = "Invalid session ID";
const EMPTY_QUERY: &str = "Empty query";

/// GET /chat/:session_id - Upgrade to a chat socket
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (sender, receiver) = socket.split();

    let inbound = receiver
        .take_while(|message| future::ready(matches!(message, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(text),
                _ => None,
            })
        });
    let outbound = sender.with(|event: ChatEvent| {
        future::ready(Ok::<_, axum::Error>(Message::Text(event.to_json())))
    });

    serve_chat(state.sessions(), &session_id, inbound, outbound).await;
    tracing::debug!("Chat connection for session {} closed", session_id);
}

/// Drive one chat connection until the client goes away
///
/// An unknown session gets one error event and the sink is closed. Other
/// failures are reported in-band and the loop keeps reading.
pub async fn serve_chat<I, O>(registry: &SessionRegistry, session_id: &str, inbound: I, outbound: O)
where
    I: Stream<Item = String>,
    O: Sink<ChatEvent>,
    O::Error: Display,
{
    futures::pin_mut!(inbound);
    futures::pin_mut!(outbound);

    if registry.get(session_id).is_err() {
        tracing::warn!("Chat requested for unknown session {}", session_id);
        reject(&mut outbound).await;
        return;
    }

    while let Some(text) = inbound.next().await {
        let request: ChatRequest = match serde_json::from_str(&text) {
            Ok(request) => request,
            Err(e) => {
                if send(&mut outbound, ChatEvent::Error(format!("Invalid message: {}", e))).await {
                    continue;
                }
                return;
            }
        };

        if request.query.trim().is_empty() {
            if send(&mut outbound, ChatEvent::Error(EMPTY_QUERY.to_string())).await {
                continue;
            }
            return;
        }

        // Looked up per query so idle expiry and access times stay current
        let session = match registry.get(session_id) {
            Ok(session) => session,
            Err(_) => {
                reject(&mut outbound).await;
                return;
            }
        };

        if !answer(&session, &request.query, &mut outbound).await {
            tracing::warn!("Client on session {} disconnected mid-answer", session_id);
            return;
        }
    }
}

/// Stream one answer; returns `false` once the client is gone
///
/// Returning early drops the fragment stream, which cancels generation.
async fn answer<O>(session: &Session, query: &str, outbound: &mut O) -> bool
where
    O: Sink<ChatEvent> + Unpin,
    O::Error: Display,
{
    let _guard = session.lock_queries().await;

    let mut output = match session.pipeline().run(query).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Query on session {} failed: {}", session.id(), e);
            return send(outbound, processing_error(&e)).await;
        }
    };

    while let Some(fragment) = output.response.next().await {
        let event = match fragment {
            Ok(text) => ChatEvent::Chunk(text),
            Err(e) => {
                tracing::error!("Generation on session {} failed mid-stream: {}", session.id(), e);
                return send(outbound, processing_error(&e)).await;
            }
        };
        if !send(outbound, event).await {
            return false;
        }
    }

    send(outbound, ChatEvent::done()).await
}

fn processing_error(error: &crate::error::Error) -> ChatEvent {
    ChatEvent::Error(format!("Error processing query: {}", error))
}

async fn send<O>(outbound: &mut O, event: ChatEvent) -> bool
where
    O: Sink<ChatEvent> + Unpin,
    O::Error: Display,
{
    match outbound.send(event).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Failed to send chat event: {}", e);
            false
        }
    }
}

async fn reject<O>(outbound: &mut O)
where
    O: Sink<ChatEvent> + Unpin,
    O::Error: Display,
{
    if send(outbound, ChatEvent::Error(INVALID_SESSION.to_string())).await {
        let _ = outbound.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RetrievalPipeline;
    use crate::retrieval::VectorIndex;
    use crate::test_support::{keyword_embedder, ScriptedLlm};
    use futures::channel::mpsc;
    use futures::stream;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn registry_with(llm: ScriptedLlm) -> (SessionRegistry, String) {
        registry_sharing(Arc::new(llm))
    }

    fn registry_sharing(llm: Arc<ScriptedLlm>) -> (SessionRegistry, String) {
        let mut index = VectorIndex::new(keyword_embedder(&["tea"]));
        index.insert("tea is brewed", vec![1.0, 0.1]).unwrap();
        let pipeline = RetrievalPipeline::new(index, llm);

        let registry = SessionRegistry::new();
        let id = registry.create(Arc::new(pipeline), "tea.txt", 1);
        (registry, id)
    }

    async fn run(registry: &SessionRegistry, session_id: &str, messages: &[&str]) -> Vec<ChatEvent> {
        let inbound = stream::iter(messages.iter().map(|m| m.to_string()).collect::<Vec<_>>());
        let (tx, rx) = mpsc::unbounded();
        serve_chat(registry, session_id, inbound, tx).await;
        rx.collect().await
    }

    #[tokio::test]
    async fn test_streams_chunks_then_done() {
        let (registry, id) = registry_with(ScriptedLlm::new(&["Tea ", "is brewed."]));

        let events = run(&registry, &id, &[r#"{"query":"How is tea made?"}"#]).await;

        assert_eq!(
            events,
            vec![
                ChatEvent::Chunk("Tea ".into()),
                ChatEvent::Chunk("is brewed.".into()),
                ChatEvent::done(),
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_session_closes_after_one_error() {
        let (registry, _) = registry_with(ScriptedLlm::new(&["unused"]));

        let events = run(&registry, "missing", &[r#"{"query":"hello"}"#]).await;

        assert_eq!(events, vec![ChatEvent::Error(INVALID_SESSION.into())]);
    }

    #[tokio::test]
    async fn test_empty_query_keeps_connection_open() {
        let (registry, id) = registry_with(ScriptedLlm::new(&["ok"]));

        let events = run(
            &registry,
            &id,
            &[r#"{"query":""}"#, r#"{}"#, r#"{"query":"tea?"}"#],
        )
        .await;

        assert_eq!(
            events,
            vec![
                ChatEvent::Error(EMPTY_QUERY.into()),
                ChatEvent::Error(EMPTY_QUERY.into()),
                ChatEvent::Chunk("ok".into()),
                ChatEvent::done(),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_reported() {
        let (registry, id) = registry_with(ScriptedLlm::new(&["ok"]));

        let events = run(&registry, &id, &["not json", r#"{"query":"tea"}"#]).await;

        assert!(matches!(&events[0], ChatEvent::Error(msg) if msg.starts_with("Invalid message")));
        assert_eq!(&events[1..], &[ChatEvent::Chunk("ok".into()), ChatEvent::done()]);
    }

    #[tokio::test]
    async fn test_generation_failure_is_terminal_for_that_query_only() {
        let (registry, id) = registry_with(ScriptedLlm::failing_after(&["part", "never"], 1));

        let events = run(&registry, &id, &[r#"{"query":"tea"}"#, r#"{"query":"tea"}"#]).await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], ChatEvent::Chunk("part".into()));
        assert!(matches!(&events[1], ChatEvent::Error(msg) if msg.starts_with("Error processing query:")));
        assert_eq!(events[2], ChatEvent::Chunk("part".into()));
        assert!(events[3].is_terminal());
    }

    #[tokio::test]
    async fn test_disconnect_stops_streaming() {
        let llm = Arc::new(ScriptedLlm::new(&["a", "b", "c"]));
        let (registry, id) = registry_sharing(Arc::clone(&llm));

        let (tx, rx) = mpsc::unbounded::<ChatEvent>();
        drop(rx);
        let inbound = stream::iter(vec![
            r#"{"query":"tea"}"#.to_string(),
            r#"{"query":"more tea"}"#.to_string(),
        ]);

        serve_chat(&registry, &id, inbound, tx).await;

        // The first fragment fails to send; nothing after it is generated
        assert_eq!(llm.pulled.load(Ordering::SeqCst), 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
