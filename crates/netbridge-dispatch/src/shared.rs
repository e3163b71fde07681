//! Thread-safe bridge for hosts that call from several native threads.
//!
//! Every dispatch holds the lock for its whole duration, so a command
//! never observes an epoch or mode change halfway through.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::context::BridgeContext;
use crate::dispatcher::Dispatcher;
use crate::error::BridgeResult;
use crate::value::HostValue;

#[derive(Debug)]
struct Inner {
    dispatcher: Dispatcher,
    context: BridgeContext,
}

/// Cloneable handle to one dispatcher and its context.
#[derive(Debug, Clone)]
pub struct SharedBridge {
    inner: Arc<Mutex<Inner>>,
}

impl SharedBridge {
    /// Wrap an existing dispatcher and context
    pub fn new(dispatcher: Dispatcher, context: BridgeContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                dispatcher,
                context,
            })),
        }
    }

    /// Bridge over the built-in commands and the CPU engine
    pub fn with_cpu_engine(config: BridgeConfig) -> BridgeResult<Self> {
        Ok(Self::new(
            Dispatcher::new()?,
            BridgeContext::with_cpu_engine(config)?,
        ))
    }

    /// Run a command under the lock
    pub fn dispatch(&self, name: &str, args: &[HostValue]) -> BridgeResult<Vec<HostValue>> {
        let mut inner = self.inner.lock();
        let Inner {
            dispatcher,
            context,
        } = &mut *inner;
        dispatcher.dispatch(context, name, args)
    }

    /// Run `f` with exclusive access to the context
    pub fn with_context<R>(&self, f: impl FnOnce(&mut BridgeContext) -> R) -> R {
        f(&mut self.inner.lock().context)
    }
}
