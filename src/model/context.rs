use std::collections::HashMap;

/// Immutable per-request snapshot (spec.md §3). All optional fields may be
/// absent. Lives only for the duration of one request — never serialized,
/// never cached.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub client_ip: String,
    pub user_id: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: String,
    pub method: String,
    pub attributes: HashMap<String, serde_json::Value>,
}

impl RequestContext {
    pub fn new(client_ip: impl Into<String>, endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            client_ip: client_ip.into(),
            user_id: None,
            api_key: None,
            endpoint: endpoint.into(),
            method: method.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
