//! Event/audit sink port

/// Fire-and-forget audit log
///
/// Implementations must swallow their own failures: writing an audit
/// event never fails or blocks the operation that produced it.
pub trait AuditSink: Send + Sync {
    fn log_event(&self, message: &str);
}
