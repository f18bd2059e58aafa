//! Live event buffers.
//!
//! Every subscribed channel gets a bounded, newest-first buffer of the
//! messages received on it:
//! - `push` prepends and silently evicts past [`BUFFER_CAPACITY`]
//! - `patch` swaps in an updated entry, matched by event id
//!
//! Eviction doesn't wait for persistence. An event evicted before its
//! record id arrives simply never gets patched.

mod event;
mod live;

pub use event::{ChangeEventHeader, EnvelopeFields, EventPatch, LiveEvent};
pub use live::{EventBuffers, LiveBuffer, BUFFER_CAPACITY};
