use meridian_instrument::ids::BrokerId;

/// Structured log sink (`spec.md` §4.H). The core only emits through this trait for
/// user/operator-facing categories; internal diagnostics independent of this port always go
/// through `tracing` (see `spec.md` §4.H's ambient note), never this port and never `println!`.
pub trait LoggingPort: Send + Sync {
    fn debug(&self, category: &str, message: &str, broker_id: Option<&BrokerId>);
    fn info(&self, category: &str, message: &str, broker_id: Option<&BrokerId>);
    fn warn(&self, category: &str, message: &str, broker_id: Option<&BrokerId>);
    fn error(&self, category: &str, message: &str, broker_id: Option<&BrokerId>);
}

/// Discards every entry. Default collaborator for callers that haven't wired a real structured
/// log sink yet; internal diagnostics keep going through `tracing` regardless.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoggingPort;

impl LoggingPort for NoopLoggingPort {
    fn debug(&self, _category: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
    fn info(&self, _category: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
    fn warn(&self, _category: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
    fn error(&self, _category: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
}
