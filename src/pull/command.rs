// ABOUTME: Pull command builder and the decoded event stream it starts.
// ABOUTME: Closing the stream drops the engine connection exactly once.

use super::event::PullEvent;
use crate::engine::{FrameStream, Transport, TransportError};
use crate::types::{ImageRef, RegistryCredentials};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

/// A request to pull one image, optionally with registry credentials.
///
/// Starting a command consumes it, so one command yields one stream:
///
/// ```compile_fail
/// # use hoist::pull::PullCommand;
/// # use hoist::engine::Transport;
/// # fn demo(transport: &dyn Transport) {
/// let command = PullCommand::new("busybox".parse().unwrap());
/// let _first = command.start(transport);
/// let _second = command.start(transport);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PullCommand {
    reference: ImageRef,
    credentials: Option<RegistryCredentials>,
}

impl PullCommand {
    pub fn new(reference: ImageRef) -> Self {
        Self {
            reference,
            credentials: None,
        }
    }

    pub fn with_credentials(self, credentials: RegistryCredentials) -> Self {
        Self {
            credentials: Some(credentials),
            ..self
        }
    }

    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    pub fn credentials(&self) -> Option<&RegistryCredentials> {
        self.credentials.as_ref()
    }

    /// Open the pull on `transport`.
    pub fn start(self, transport: &dyn Transport) -> PullStream {
        tracing::debug!(
            image = %self.reference,
            authenticated = self.credentials.is_some(),
            "opening pull stream"
        );
        let frames = transport.open_pull(&self.reference, self.credentials.as_ref());
        PullStream::new(self.reference, frames)
    }
}

/// Progress events of one pull, in engine order.
///
/// Yields `None` once the engine ends the response or after [`close`](Self::close).
pub struct PullStream {
    reference: ImageRef,
    frames: Option<FrameStream>,
}

impl PullStream {
    pub fn new(reference: ImageRef, frames: FrameStream) -> Self {
        Self {
            reference,
            frames: Some(frames),
        }
    }

    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    pub fn is_closed(&self) -> bool {
        self.frames.is_none()
    }

    /// Drop the underlying connection. Later calls do nothing.
    pub fn close(&mut self) {
        if self.frames.take().is_some() {
            tracing::debug!(image = %self.reference, "pull stream closed");
        }
    }
}

impl Stream for PullStream {
    type Item = Result<PullEvent, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(frames) = this.frames.as_mut() else {
            return Poll::Ready(None);
        };
        match frames.poll_next_unpin(cx) {
            Poll::Ready(Some(frame)) => Poll::Ready(Some(frame.map(PullEvent::from))),
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for PullStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullStream")
            .field("reference", &self.reference)
            .field("closed", &self.is_closed())
            .finish()
    }
}
