//! Detached hook execution
//!
//! Hooks are user code and may be slow, may block or may call back into the
//! accumulator. None of that is allowed to stall the sensor's update path, so
//! every hook invocation is handed off to run on its own and is never joined.
//! Inside a tokio runtime the blocking pool runs it, outside of one a named OS
//! thread does.

use std::thread;

use tokio::runtime::Handle;
use tracing::warn;

/// Run `hook` detached from the caller. The caller never learns whether, or
/// when, it completed.
pub(crate) fn detach<F>(name: &'static str, hook: F)
where
    F: FnOnce() + Send + 'static,
{
    if let Ok(handle) = Handle::try_current() {
        // The JoinHandle is dropped on purpose. A panic in `hook` is captured
        // by the task and goes no further.
        drop(handle.spawn_blocking(hook));
        return;
    }

    if let Err(err) = thread::Builder::new().name(name.to_string()).spawn(hook) {
        warn!("failed to spawn {name} hook thread, notification dropped: {err}");
    }
}
