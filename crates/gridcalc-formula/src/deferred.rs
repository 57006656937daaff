//! Deferred results of asynchronous functions
//!
//! An async function returns a [`Deferred`] and hands the matching
//! [`Resolver`] to whatever produces the value. The engine polls deferreds
//! without blocking, so no runtime is needed to drive them.

use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::CellResult;
use tokio::sync::oneshot;

/// Create a connected resolver/deferred pair
pub fn deferred() -> (Resolver, Deferred) {
    let (sender, receiver) = oneshot::channel();
    (Resolver { sender }, Deferred { receiver })
}

/// Producer side of a deferred result
#[derive(Debug)]
pub struct Resolver {
    sender: oneshot::Sender<FormulaResult<CellResult>>,
}

impl Resolver {
    /// Fulfil the deferred with a value
    ///
    /// Returns `false` when nobody is waiting anymore.
    pub fn resolve<V: Into<CellResult>>(self, value: V) -> bool {
        self.sender.send(Ok(value.into())).is_ok()
    }

    /// Reject the deferred; the failure becomes an error value on the cell
    pub fn reject<S: Into<String>>(self, message: S) -> bool {
        self.sender
            .send(Err(FormulaError::evaluation(message)))
            .is_ok()
    }
}

/// State of a deferred after polling
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredState {
    /// Still running
    Pending,
    /// Fulfilled or rejected
    Settled(FormulaResult<CellResult>),
}

/// Consumer side of a deferred result
#[derive(Debug)]
pub struct Deferred {
    receiver: oneshot::Receiver<FormulaResult<CellResult>>,
}

impl Deferred {
    /// An already fulfilled deferred
    pub fn ready<V: Into<CellResult>>(value: V) -> Self {
        let (resolver, deferred) = deferred();
        resolver.resolve(value);
        deferred
    }

    /// Poll without blocking
    ///
    /// A resolver dropped without settling rejects the deferred.
    pub fn poll(&mut self) -> DeferredState {
        match self.receiver.try_recv() {
            Ok(result) => DeferredState::Settled(result),
            Err(oneshot::error::TryRecvError::Empty) => DeferredState::Pending,
            Err(oneshot::error::TryRecvError::Closed) => DeferredState::Settled(Err(
                FormulaError::evaluation("The asynchronous computation was abandoned"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::Value;

    #[test]
    fn test_resolve_after_pending() {
        let (resolver, mut deferred) = deferred();
        assert_eq!(deferred.poll(), DeferredState::Pending);
        assert!(resolver.resolve(42.0));
        assert_eq!(deferred.poll(), DeferredState::Settled(Ok(CellResult::new(42.0))));
    }

    #[test]
    fn test_ready_and_reject() {
        let mut ready = Deferred::ready("done");
        assert_eq!(
            ready.poll(),
            DeferredState::Settled(Ok(CellResult::new(Value::text("done"))))
        );

        let (resolver, mut deferred) = deferred();
        resolver.reject("boom");
        assert_eq!(
            deferred.poll(),
            DeferredState::Settled(Err(FormulaError::evaluation("boom")))
        );
    }

    #[test]
    fn test_dropped_resolver_rejects() {
        let (resolver, mut deferred) = deferred();
        drop(resolver);
        assert!(matches!(deferred.poll(), DeferredState::Settled(Err(_))));
    }
}
