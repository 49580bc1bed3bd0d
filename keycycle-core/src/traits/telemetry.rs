//! Host-bound reports

use keycycle_protocol::Report;

/// Sink for reports to the host
///
/// Delivery is best effort; implementations drop reports they cannot
/// forward.
pub trait Telemetry {
    /// Queue one report
    fn send(&mut self, report: Report);
}

impl<T: Telemetry + ?Sized> Telemetry for &mut T {
    fn send(&mut self, report: Report) {
        (**self).send(report)
    }
}
