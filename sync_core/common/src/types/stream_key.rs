use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identity of a stream across discoveries: `(namespace, name)`.
///
/// Ordering is namespace first (streams without a namespace sort first), then
/// name, which is the canonical order used for diffs and configured catalogs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl StreamKey {
    pub fn new(namespace: Option<impl Into<String>>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(Into::into),
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }
}

impl Display for StreamKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_namespace_when_present() {
        assert_eq!(StreamKey::namespaced("public", "users").to_string(), "public.users");
        assert_eq!(StreamKey::unqualified("events").to_string(), "events");
    }

    #[test]
    fn keys_order_by_namespace_then_name() {
        let mut keys = vec![
            StreamKey::namespaced("public", "users"),
            StreamKey::unqualified("zeta"),
            StreamKey::namespaced("audit", "users"),
            StreamKey::namespaced("public", "accounts"),
        ];
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["zeta", "audit.users", "public.accounts", "public.users"]
        );
    }
}
