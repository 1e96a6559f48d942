use meridian_instrument::ids::BrokerId;

/// User-notification sink (`spec.md` §4.H). Implementations (toast, console, file) are external
/// collaborators; the core only calls this trait.
pub trait NotificationPort: Send + Sync {
    fn info(&self, title: &str, message: &str, broker_id: Option<&BrokerId>);
    fn success(&self, title: &str, message: &str, broker_id: Option<&BrokerId>);
    fn warning(&self, title: &str, message: &str, broker_id: Option<&BrokerId>);
    fn error(&self, title: &str, message: &str, broker_id: Option<&BrokerId>);
}

/// Discards every notification. Default collaborator for callers that haven't wired a real
/// presentation layer (toast/console/file) yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationPort;

impl NotificationPort for NoopNotificationPort {
    fn info(&self, _title: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
    fn success(&self, _title: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
    fn warning(&self, _title: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
    fn error(&self, _title: &str, _message: &str, _broker_id: Option<&BrokerId>) {}
}
