use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// MIME type of every payload the bridge produces.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Flag carrying the signing key. Its value never appears in logs.
pub const SECRET_KEY_FLAG: &str = "secret-key";
pub const NETWORK_FLAG: &str = "network";
pub const ACCOUNT_ADDRESS_FLAG: &str = "account-address";

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A concrete, non-parametrized resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub name: &'static str,
    pub mime_type: &'static str,
    pub description: &'static str,
}

/// A resource family addressed by a URI with `{param}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub mime_type: &'static str,
    pub description: &'static str,
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// JSON Schema primitive type of a tool argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
}

/// One property of a tool's input schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    #[serde(skip)]
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<&'static str>>,
    pub description: &'static str,
}

impl SchemaField {
    fn new(name: &'static str, field_type: FieldType, description: &'static str) -> Self {
        Self {
            name,
            field_type,
            enum_values: None,
            description,
        }
    }

    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::String, description)
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Number, description)
    }

    pub fn integer(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Integer, description)
    }

    pub fn boolean(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Boolean, description)
    }

    pub fn object(name: &'static str, description: &'static str) -> Self {
        Self::new(name, FieldType::Object, description)
    }

    /// Restrict the field to a fixed set of legal values.
    pub fn one_of(mut self, values: &[&'static str]) -> Self {
        self.enum_values = Some(values.to_vec());
        self
    }
}

/// Structural input schema of a tool: its properties and required set.
///
/// Serializes as a JSON Schema object
/// (`{"type": "object", "properties": {...}, "required": [...]}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSchema {
    pub fields: Vec<SchemaField>,
    pub required: Vec<&'static str>,
}

impl InputSchema {
    pub fn new(fields: Vec<SchemaField>, required: &[&'static str]) -> Self {
        Self {
            fields,
            required: required.to_vec(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &Properties(&self.fields))?;
        map.serialize_entry("required", &self.required)?;
        map.end()
    }
}

struct Properties<'a>(&'a [SchemaField]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(field.name, field)?;
        }
        map.end()
    }
}

/// A self-describing invocable tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: InputSchema,
}

// ---------------------------------------------------------------------------
// Bridge contract
// ---------------------------------------------------------------------------

/// The fixed command vocabulary of the SDK bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum BridgeCommand {
    MarketData,
    UserData,
    PlaceOrder,
    MarketOrder,
    CancelOrder,
    UpdateLeverage,
}

/// One call of the bridge subprocess: a command plus ordered flags.
///
/// Flag names are stored without the leading `--`.
#[derive(Clone, PartialEq, Eq)]
pub struct BridgeInvocation {
    pub command: BridgeCommand,
    pub flags: Vec<(String, String)>,
}

impl BridgeInvocation {
    pub fn new(command: BridgeCommand) -> Self {
        Self {
            command,
            flags: Vec::new(),
        }
    }

    /// Value of the first flag with this name.
    pub fn flag(&self, name: &str) -> Option<&str> {
        self.flags
            .iter()
            .find(|(flag, _)| flag == name)
            .map(|(_, value)| value.as_str())
    }

    /// Render as process arguments: `<command> --flag value ...`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(1 + self.flags.len() * 2);
        args.push(self.command.to_string());
        for (flag, value) in &self.flags {
            args.push(format!("--{}", flag));
            args.push(value.clone());
        }
        args
    }
}

impl fmt::Debug for BridgeInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags: Vec<(&str, &str)> = self
            .flags
            .iter()
            .map(|(flag, value)| {
                if flag == SECRET_KEY_FLAG {
                    (flag.as_str(), "<redacted>")
                } else {
                    (flag.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("BridgeInvocation")
            .field("command", &self.command)
            .field("flags", &flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_command_names() {
        let names: Vec<String> = BridgeCommand::iter().map(|c| c.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "market-data",
                "user-data",
                "place-order",
                "market-order",
                "cancel-order",
                "update-leverage"
            ]
        );
        assert_eq!(
            "cancel-order".parse::<BridgeCommand>().unwrap(),
            BridgeCommand::CancelOrder
        );
    }

    #[test]
    fn test_invocation_args() {
        let mut invocation = BridgeInvocation::new(BridgeCommand::UpdateLeverage);
        invocation.flags.push(("coin".to_string(), "ETH".to_string()));
        invocation.flags.push(("leverage".to_string(), "5".to_string()));

        assert_eq!(
            invocation.to_args(),
            vec!["update-leverage", "--coin", "ETH", "--leverage", "5"]
        );
        assert_eq!(invocation.flag("leverage"), Some("5"));
        assert_eq!(invocation.flag("is-cross"), None);
    }

    #[test]
    fn test_invocation_debug_redacts_secret() {
        let mut invocation = BridgeInvocation::new(BridgeCommand::MarketData);
        invocation
            .flags
            .push((SECRET_KEY_FLAG.to_string(), "0xdeadbeef".to_string()));
        let rendered = format!("{:?}", invocation);
        assert!(!rendered.contains("0xdeadbeef"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_input_schema_serialization() {
        let schema = InputSchema::new(
            vec![
                SchemaField::string("coin", "Coin symbol"),
                SchemaField::string("timeInForce", "Time in force").one_of(&["Gtc", "Ioc"]),
            ],
            &["coin"],
        );
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "object");
        assert_eq!(json["properties"]["coin"]["type"], "string");
        assert!(json["properties"]["coin"].get("enum").is_none());
        assert_eq!(json["properties"]["timeInForce"]["enum"][1], "Ioc");
        assert_eq!(json["required"], serde_json::json!(["coin"]));
        assert!(schema.required.contains(&"coin"));
        assert!(!schema.required.contains(&"timeInForce"));
    }

    #[test]
    fn test_resource_template_serialization() {
        let template = ResourceTemplate {
            uri_template: "hyperliquid://market/l2-book/{coin}",
            name: "L2 Book",
            mime_type: JSON_MIME_TYPE,
            description: "Order book",
        };
        let json = serde_json::to_value(&template).unwrap();
        assert_eq!(json["uriTemplate"], "hyperliquid://market/l2-book/{coin}");
        assert_eq!(json["mimeType"], "application/json");
    }
}
