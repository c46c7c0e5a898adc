//! Periodic timers on a tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ddlkit_codec::{ResultCode, Status};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::environment::PeriodicListener;

type TimerKey = (Duration, usize);

/// Drives [`PeriodicListener`]s with `tokio::time::interval`.
///
/// Hosts implementing [`MappingEnvironment`](crate::MappingEnvironment)
/// can forward their timer registrations here.
pub struct TokioTimer {
    runtime: Handle,
    timers: Mutex<HashMap<TimerKey, JoinHandle<()>>>,
}

impl TokioTimer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Timer on the runtime of the calling task.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    pub fn len(&self) -> usize {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn register(&self, period: Duration, listener: Arc<dyn PeriodicListener>) -> Status {
        if period.is_zero() {
            return Status::with_detail(ResultCode::InvalidArg, "timer period must not be zero");
        }
        let key = (period, listener_id(&listener));
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        if timers.contains_key(&key) {
            return Status::with_detail(ResultCode::InvalidState, "listener already registered");
        }
        let task = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                listener.on_timer();
            }
        });
        timers.insert(key, task);
        debug!(?period, timers = timers.len(), "periodic timer registered");
        Status::OK
    }

    pub fn unregister(&self, period: Duration, listener: &Arc<dyn PeriodicListener>) -> Status {
        let key = (period, listener_id(listener));
        let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        match timers.remove(&key) {
            Some(task) => {
                task.abort();
                debug!(?period, timers = timers.len(), "periodic timer unregistered");
                Status::OK
            }
            None => Status::with_detail(ResultCode::NotFound, "listener is not registered"),
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in timers.drain() {
            task.abort();
        }
    }
}

fn listener_id(listener: &Arc<dyn PeriodicListener>) -> usize {
    Arc::as_ptr(listener).cast::<()>() as usize
}
