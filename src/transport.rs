use crate::Telemetry;
use std::sync::Arc;

/// Receives validated telemetry from a [`TelemetryClient`](crate::TelemetryClient).
///
/// Implementations own buffering, batching, retries and network I/O. They are called from any
/// thread that tracks telemetry and must not block on I/O in [`track`](Transport::track).
pub trait Transport: Send + Sync {
    /// Accept one telemetry item for delivery.
    fn track(&self, telemetry: Telemetry);

    /// Deliver everything accepted so far before returning.
    fn flush(&self) {}
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn track(&self, telemetry: Telemetry) {
        (**self).track(telemetry)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn track(&self, telemetry: Telemetry) {
        (**self).track(telemetry)
    }

    fn flush(&self) {
        (**self).flush()
    }
}
