//! Results of calls and invocations, delivered through the gateway.

use super::error::{fatal, GatewayError};
use super::stack::StackGateway;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// The eventual result of a call or invocation.
///
/// A promise is created when the call is made and refreshed by the caller,
/// typically once per ringlet, until it is fulfilled.
#[derive(Debug)]
pub struct Promise<R> {
    call_id: Uuid,
    is_fulfilled: bool,
    result: Option<R>,
}

impl<R: DeserializeOwned> Promise<R> {
    pub(crate) fn pending(call_id: Uuid) -> Self {
        Self {
            call_id,
            is_fulfilled: false,
            result: None,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.call_id
    }

    pub fn is_fulfilled(&self) -> bool {
        self.is_fulfilled
    }

    /// The callee's result. `None` until fulfilled, or when the callee
    /// finished without producing one.
    pub fn result(&self) -> Option<&R> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<R> {
        self.result.take()
    }

    /// Collect the result if the callee has finished.
    pub fn refresh(&mut self, gateway: &StackGateway) {
        if self.is_fulfilled {
            return;
        }
        if let Some(result) = gateway.take_fulfilled(self.call_id) {
            self.is_fulfilled = true;
            self.result = result.map(|value| decode(self.call_id, value));
        }
    }
}

/// A promise whose callee exposes intermediate results while it runs.
#[derive(Debug)]
pub struct PartialPromise<P, R> {
    promise: Promise<R>,
    has_partial_result: bool,
    partial_result: Option<P>,
}

impl<P: DeserializeOwned, R: DeserializeOwned> PartialPromise<P, R> {
    pub(crate) fn pending(call_id: Uuid) -> Self {
        Self {
            promise: Promise::pending(call_id),
            has_partial_result: false,
            partial_result: None,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.promise.call_id()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.promise.is_fulfilled()
    }

    pub fn result(&self) -> Option<&R> {
        self.promise.result()
    }

    pub fn has_partial_result(&self) -> bool {
        self.has_partial_result
    }

    /// The most recent intermediate result observed by [`refresh`](Self::refresh).
    pub fn partial_result(&self) -> Option<&P> {
        self.partial_result.as_ref()
    }

    pub fn refresh(&mut self, gateway: &StackGateway) {
        self.promise.refresh(gateway);
        if self.promise.is_fulfilled() {
            return;
        }
        if let Some(value) = gateway.partial_result(self.call_id()) {
            self.partial_result = Some(decode(self.call_id(), value));
            self.has_partial_result = true;
        }
    }
}

fn decode<T: DeserializeOwned>(call_id: Uuid, value: Value) -> T {
    serde_json::from_value(value).unwrap_or_else(|source| fatal(GatewayError::InvalidResult { call_id, source }))
}
