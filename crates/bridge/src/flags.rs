use hlmcp_core::*;
use serde_json::Value;

/// Call-specific bridge fields in emission order, keyed by camelCase name.
///
/// A `Value::Null` entry marks an absent optional field and is never emitted.
pub type BridgeFields = Vec<(&'static str, Value)>;

/// Convert a field name to its flag form (`startTime` → `start-time`).
///
/// Uppercase letters start a new lowercase word; underscores and hyphens
/// become a single hyphen.
pub fn flag_name(field: &str) -> String {
    let mut flag = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch == '_' || ch == '-' {
            if !flag.is_empty() && !flag.ends_with('-') {
                flag.push('-');
            }
        } else if ch.is_ascii_uppercase() {
            if !flag.is_empty() && !flag.ends_with('-') {
                flag.push('-');
            }
            flag.push(ch.to_ascii_lowercase());
        } else {
            flag.push(ch);
        }
    }
    flag
}

/// Render a value the way the bridge expects it on the command line.
///
/// Returns `None` for null, which the caller drops.
pub fn flag_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                // f64 Display never uses exponent notation.
                n.as_f64().map(|f| f.to_string())
            }
        }
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Convert call fields to ordered `(flag, value)` pairs, dropping absent ones.
pub fn to_flags(fields: &[(&str, Value)]) -> Vec<(String, String)> {
    fields
        .iter()
        .filter_map(|(name, value)| flag_value(value).map(|v| (flag_name(name), v)))
        .collect()
}

/// Credential and network flags that lead every invocation.
///
/// `account_override` replaces the configured account address when a call
/// targets a specific account.
pub fn credential_flags(config: &Config, account_override: Option<&str>) -> Vec<(String, String)> {
    let mut flags = vec![
        (SECRET_KEY_FLAG.to_string(), config.secret_key().to_string()),
        (NETWORK_FLAG.to_string(), config.network().to_string()),
    ];
    if let Some(address) = account_override.or(config.account_address()) {
        flags.push((ACCOUNT_ADDRESS_FLAG.to_string(), address.to_string()));
    }
    flags
}

/// Build a complete invocation: credentials first, then call fields.
pub fn build_invocation(
    command: BridgeCommand,
    config: &Config,
    account_override: Option<&str>,
    fields: &[(&str, Value)],
) -> BridgeInvocation {
    let mut invocation = BridgeInvocation::new(command);
    invocation.flags = credential_flags(config, account_override);
    invocation.flags.extend(to_flags(fields));
    invocation
}
