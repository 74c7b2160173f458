//! Out-of-band control of a throttled flow.
//!
//! A [`ThrottleHandle`] lets glue code reach a flow from anywhere: deliver an
//! upstream error that arrived between polls, or close the flow and abandon
//! any chunk waiting for its release time. The first control message wins;
//! once the flow has ended every later message is refused.

use std::future::poll_fn;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub(crate) enum Control<E> {
    Fail(E),
    Close,
}

/// Cloneable handle to a running throttled flow.
pub struct ThrottleHandle<E> {
    tx: mpsc::UnboundedSender<Control<E>>,
}

impl<E> Clone for ThrottleHandle<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E> std::fmt::Debug for ThrottleHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleHandle").field("closed", &self.tx.is_closed()).finish()
    }
}

impl<E> ThrottleHandle<E> {
    /// Forward `err` downstream ahead of any further data, ending the flow.
    ///
    /// Returns `false` if the flow had already ended.
    pub fn fail(&self, err: E) -> bool {
        self.tx.send(Control::Fail(err)).is_ok()
    }

    /// End the flow cleanly, dropping any chunk still waiting to be released.
    ///
    /// Returns `false` if the flow had already ended.
    pub fn close(&self) -> bool {
        self.tx.send(Control::Close).is_ok()
    }

    /// Whether the flow has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side, owned by the flow.
pub(crate) struct ControlReceiver<E> {
    rx: Option<mpsc::UnboundedReceiver<Control<E>>>,
}

pub(crate) fn channel<E>() -> (ThrottleHandle<E>, ControlReceiver<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ThrottleHandle { tx }, ControlReceiver { rx: Some(rx) })
}

impl<E> ControlReceiver<E> {
    /// Ready only when a control message is waiting; registers the waker otherwise.
    pub(crate) fn poll(&mut self, cx: &mut Context<'_>) -> Poll<Control<E>> {
        let Some(rx) = self.rx.as_mut() else {
            return Poll::Pending;
        };
        match rx.poll_recv(cx) {
            Poll::Ready(Some(control)) => Poll::Ready(control),
            Poll::Ready(None) => {
                self.rx = None;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }

    pub(crate) async fn recv(&mut self) -> Control<E> {
        poll_fn(|cx| self.poll(cx)).await
    }

    pub(crate) fn try_recv(&mut self) -> Option<Control<E>> {
        self.rx.as_mut().and_then(|rx| rx.try_recv().ok())
    }

    /// Stop listening; handles see the flow as closed from now on.
    pub(crate) fn shutdown(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_is_received() {
        let (handle, mut rx) = channel::<&'static str>();
        assert!(rx.try_recv().is_none());
        assert!(handle.fail("boom"));
        assert!(handle.close());
        assert!(matches!(rx.try_recv(), Some(Control::Fail("boom"))));
    }

    #[test]
    fn shutdown_refuses_later_messages() {
        let (handle, mut rx) = channel::<()>();
        let other = handle.clone();
        assert!(!handle.is_closed());
        rx.shutdown();
        assert!(handle.is_closed());
        assert!(!other.fail(()));
        assert!(!other.close());
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn recv_waits_for_a_message() {
        let (handle, mut rx) = channel::<u32>();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            handle.fail(7);
        });
        assert!(matches!(rx.recv().await, Control::Fail(7)));
    }

    #[test]
    fn debug_does_not_require_debug_errors() {
        struct Opaque;
        let (handle, _rx) = channel::<Opaque>();
        assert!(format!("{:?}", handle).contains("ThrottleHandle"));
        assert!(handle.fail(Opaque));
    }
}
