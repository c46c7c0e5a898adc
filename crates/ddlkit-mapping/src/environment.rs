use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ddlkit_codec::Status;
use serde::Serialize;

/// Identifies a mapped target for the lifetime of its mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetHandle(pub u64);

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Receives callbacks of a periodic host timer.
pub trait PeriodicListener: Send + Sync {
    fn on_timer(&self);
}

/// Services the embedding application provides to a
/// [`MappingEngine`](crate::MappingEngine).
///
/// Registration calls report failures through a non-ok [`Status`]; the
/// engine then unwinds whatever it registered during the same call.
pub trait MappingEnvironment: Send + Sync {
    /// Schema document text describing `type_name` and everything it uses.
    fn resolve_type(&self, type_name: &str) -> Option<String>;

    /// The engine wants samples of `source` through
    /// [`on_sample_received`](crate::MappingEngine::on_sample_received).
    fn register_source(&self, source: &str, type_name: &str) -> Status;

    fn unregister_source(&self, source: &str) -> Status;

    /// A triggered target transmits its current buffer.
    fn send_target(&self, target: TargetHandle, data: &[u8]) -> Status;

    fn target_mapped(&self, target: &str, type_name: &str, handle: TargetHandle) -> Status;

    fn target_unmapped(&self, target: &str, handle: TargetHandle) -> Status;

    /// Current simulation time.
    fn time(&self) -> Duration;

    fn register_periodic_timer(&self, period: Duration, listener: Arc<dyn PeriodicListener>) -> Status;

    fn unregister_periodic_timer(
        &self,
        period: Duration,
        listener: &Arc<dyn PeriodicListener>,
    ) -> Status;
}
