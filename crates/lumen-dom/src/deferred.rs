//! Deferred completion
//!
//! A one-shot completion that many waiters can await, resolved from the
//! outside. Dropping an unresolved [`Deferred`] settles its waiters as well.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

/// Resolving side of a [`Promise`]
pub struct Deferred {
    sender: RefCell<Option<oneshot::Sender<()>>>,
    promise: Promise,
}

/// Cloneable future settled by a [`Deferred`]
#[derive(Clone)]
pub struct Promise {
    inner: Shared<oneshot::Receiver<()>>,
    settled: Rc<Cell<bool>>,
}

impl Deferred {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender: RefCell::new(Some(sender)),
            promise: Promise {
                inner: receiver.shared(),
                settled: Rc::new(Cell::new(false)),
            },
        }
    }

    /// A future that completes once this deferred is resolved
    pub fn promise(&self) -> Promise {
        self.promise.clone()
    }

    /// Resolve all waiters. Later calls are no-ops.
    pub fn resolve(&self) {
        if let Some(sender) = self.sender.borrow_mut().take() {
            self.promise.settled.set(true);
            let _ = sender.send(());
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.promise.is_settled()
    }
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Deferred {
    fn drop(&mut self) {
        self.promise.settled.set(true);
    }
}

impl Promise {
    /// An already settled promise
    pub fn resolved() -> Self {
        let deferred = Deferred::new();
        deferred.resolve();
        deferred.promise()
    }

    /// Whether the owning deferred was resolved or dropped
    pub fn is_settled(&self) -> bool {
        self.settled.get()
    }
}

impl Future for Promise {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.get_mut().inner).poll(cx).map(|_| ())
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}
