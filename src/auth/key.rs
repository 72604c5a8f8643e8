//! SDK key normalization and classification.

/// Prefix of the current key scheme (`dvc_<type>_<secret>`).
const DVC_PREFIX: &str = "dvc";

/// The only key type accepted by the evaluation API.
pub const SERVER_KEY_TYPE: &str = "server";

/// Strip every `Bearer ` marker from a raw credential.
pub fn normalize(raw: &str) -> String {
    raw.replace("Bearer ", "")
}

/// Extract the key type.
///
/// `dvc_server_abc` → `server` (underscore scheme, second segment);
/// `server-abc-123` → `server` (historical dash scheme, first segment).
pub fn key_type(key: &str) -> Option<&str> {
    if key.starts_with(DVC_PREFIX) {
        key.split('_').nth(1)
    } else {
        key.split('-').next()
    }
}

pub fn is_server_key(key: &str) -> bool {
    key_type(key) == Some(SERVER_KEY_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_underscore_scheme() {
        assert_eq!(key_type("dvc_server_abc"), Some("server"));
        assert_eq!(key_type("dvc_client_abc"), Some("client"));
        assert_eq!(key_type("dvc_mobile_abc"), Some("mobile"));
        assert_eq!(key_type("dvc"), None);
    }

    #[test]
    fn classifies_historical_dash_scheme() {
        assert_eq!(key_type("server-1234-abcd"), Some("server"));
        assert_eq!(key_type("client-1234"), Some("client"));
        assert_eq!(key_type("opaque"), Some("opaque"));
    }

    #[test]
    fn dvc_prefixed_keys_never_use_dash_scheme() {
        assert!(!is_server_key("dvc-server-abc"));
        assert!(is_server_key("dvc_server_abc"));
    }

    #[test]
    fn strips_bearer_prefix() {
        assert_eq!(normalize("Bearer dvc_server_abc"), "dvc_server_abc");
        assert_eq!(normalize("dvc_server_abc"), "dvc_server_abc");
        assert!(is_server_key(&normalize("Bearer server-abc")));
    }
}
