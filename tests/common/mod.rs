//! Shared integration-test helpers.

#![allow(dead_code, unused_imports)]

pub use hybi::test_logging::init_test_logging;
pub use hybi::{test_complete, test_phase, test_section};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

/// Waker that does nothing; for manual polling.
pub fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWaker))
}

/// Poll a pinned future once.
pub fn poll_once<F: Future>(fut: &mut Pin<&mut F>) -> Poll<F::Output> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    fut.as_mut().poll(&mut cx)
}
