// ABOUTME: Podman's native libpod pull endpoint over a raw hyper connection.
// ABOUTME: Streams the response body and splits it into one JSON report per line.

use super::transport::{FrameStream, TransportError};
use crate::pull::PullFrame;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt, stream};
use http_body_util::{BodyExt, BodyStream};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::pin::Pin;
use tokio::net::UnixStream;

/// Start a libpod pull. Nothing is sent until the stream is polled.
pub(super) fn pull(socket_path: String, reference: String, auth: Option<String>) -> FrameStream {
    let chunks = stream::once(open(socket_path, reference, auth)).try_flatten();
    let frames = json_lines(chunks).map(|line| line.and_then(|line| decode_report(&line)));
    Box::pin(frames)
}

async fn open(
    socket_path: String,
    reference: String,
    auth: Option<String>,
) -> Result<impl Stream<Item = Result<Bytes, TransportError>> + Send + 'static, TransportError> {
    let stream = UnixStream::connect(&socket_path).await.map_err(|e| {
        TransportError::Connection(format!("failed to connect to {}: {}", socket_path, e))
    })?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| TransportError::Connection(format!("HTTP handshake failed: {}", e)))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::warn!("libpod connection error: {}", e);
        }
    });

    let uri = format!(
        "/v4.0.0/libpod/images/pull?reference={}&tlsVerify=false",
        urlencoding::encode(&reference)
    );
    let mut request = hyper::Request::builder()
        .method("POST")
        .uri(&uri)
        .header("Host", "localhost");
    if let Some(auth) = auth {
        request = request.header("X-Registry-Auth", auth);
    }
    let request = request
        .body(http_body_util::Empty::<Bytes>::new())
        .map_err(|e| TransportError::Connection(format!("failed to build request: {}", e)))?;

    tracing::debug!(image = %reference, "libpod pull request sent");
    let response = sender
        .send_request(request)
        .await
        .map_err(|e| TransportError::Connection(format!("request failed: {}", e)))?;

    if !response.status().is_success() {
        let status_code = response.status().as_u16();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Connection(format!("failed to read error response: {}", e)))?
            .to_bytes();
        return Err(TransportError::Status {
            status_code,
            message: error_message(&body),
        });
    }

    // The sender rides along with the body so the connection lives as long as the stream.
    let body = BodyStream::new(response.into_body());
    Ok(stream::unfold((sender, body), |(sender, mut body)| async move {
        loop {
            match body.next().await? {
                Ok(frame) => {
                    if let Ok(data) = frame.into_data() {
                        return Some((Ok(data), (sender, body)));
                    }
                }
                Err(e) => {
                    let err =
                        TransportError::Connection(format!("failed to read pull response: {}", e));
                    return Some((Err(err), (sender, body)));
                }
            }
        }
    }))
}

/// libpod error bodies are `{"cause": .., "message": .., "response": ..}`.
fn error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string())
}

/// One line of the libpod pull stream.
#[derive(Debug, Deserialize)]
struct PullReport {
    #[serde(default)]
    stream: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

fn decode_report(line: &[u8]) -> Result<PullFrame, TransportError> {
    let report: PullReport = serde_json::from_slice(line)
        .map_err(|e| TransportError::Decode(format!("invalid libpod pull report: {}", e)))?;

    if let Some(error) = report.error.filter(|e| !e.is_empty()) {
        return Ok(PullFrame::error(error));
    }
    if let Some(text) = report.stream {
        return Ok(PullFrame::status(text.trim_end()));
    }
    Ok(match report.id {
        Some(id) => PullFrame::status(format!("Pulled {}", id)),
        None => PullFrame::default(),
    })
}

struct Lines<S> {
    chunks: Pin<Box<S>>,
    buffer: BytesMut,
    done: bool,
}

/// Split a chunked byte stream into newline-terminated records.
///
/// Blank lines are skipped. A trailing record without a newline is still
/// yielded. After an upstream error the stream ends.
pub(super) fn json_lines<S>(chunks: S) -> impl Stream<Item = Result<Bytes, TransportError>> + Send
where
    S: Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
{
    let state = Lines {
        chunks: Box::pin(chunks),
        buffer: BytesMut::new(),
        done: false,
    };
    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line = state.buffer.split_to(pos + 1).freeze();
                let trimmed = line.slice_ref(line.trim_ascii());
                if trimmed.is_empty() {
                    continue;
                }
                return Some((Ok(trimmed), state));
            }
            if state.done {
                let rest = state.buffer.split().freeze();
                let trimmed = rest.slice_ref(rest.trim_ascii());
                if trimmed.is_empty() {
                    return None;
                }
                return Some((Ok(trimmed), state));
            }
            match state.chunks.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    return Some((Err(e), state));
                }
                None => state.done = true,
            }
        }
    })
}
