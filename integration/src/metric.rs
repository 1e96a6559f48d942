/// Generic real-time metric, used by [`RestClient`](crate::protocol::http::rest::client::RestClient)
/// to report HTTP request latency (`spec.md` §6's `elapsed_ms` on the HTTP transport port).
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    pub time: u64,
    pub tags: Vec<Tag>,
    pub fields: Vec<Field>,
}

impl Metric {
    /// Millisecond duration recorded under the `"duration"` [`Field`], if present.
    pub fn duration_ms(&self) -> Option<u64> {
        self.fields
            .iter()
            .find(|field| field.key == "duration")
            .map(|field| field.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: &'static str,
    pub value: TagValue,
}

impl Tag {
    pub fn new(key: &'static str, value: impl Into<TagValue>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Interned tag value - either a static str or a borrowed-at-push-time owned string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Str(String),
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Str(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub key: &'static str,
    pub value: u64,
}

impl Field {
    pub fn new(key: &'static str, value: u64) -> Self {
        Self { key, value }
    }
}
