// ABOUTME: Image pull protocol: commands, decoded progress streams, and completion handles.
// ABOUTME: Independent of how frames reach us; see engine::Transport for that seam.

mod command;
mod error;
mod event;
mod frame;
mod handle;

pub use command::{PullCommand, PullStream};
pub use error::{PullError, PullErrorKind, RemoteErrorKind};
pub use event::{ErrorMarker, ProgressDetail, ProgressEvent, PullEvent};
pub use frame::{FrameErrorDetail, FrameProgressDetail, PullFrame};
pub use handle::{EmptyStreamPolicy, PullHandle, PullOptions, PullState, PullSummary};
