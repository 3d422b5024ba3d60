//! Resource catalog and URI matcher.
//!
//! Concrete resources are matched by exact URI. Templates are compiled to
//! anchored patterns where each `{param}` matches a single path segment;
//! the first template that matches, in declaration order, wins.

use hlmcp_bridge::{build_invocation, BridgeFields};
use hlmcp_core::*;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Errors building the catalog. Only reachable through a malformed template.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid URI template {template}: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("Invalid URI template {template}: {source}")]
    Pattern {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors from `resources/read`.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Invalid resource URI: {0}")]
    InvalidUri(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

/// Every resource family the adapter can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    AllMids,
    Meta,
    MetaAndAssetCtxs,
    SpotMeta,
    AccountState,
    AccountOpenOrders,
    AccountFills,
    L2Book,
    UserState,
    UserOpenOrders,
    UserFills,
}

/// The bridge call backing one resource read.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRequest {
    pub command: BridgeCommand,
    /// Account to query instead of the configured one.
    pub account: Option<String>,
    pub fields: BridgeFields,
}

impl ResourceKind {
    /// Project matched URI parameters onto a bridge call.
    pub fn bridge_request(self, params: &HashMap<String, String>) -> ResourceRequest {
        let param = |name: &str| params.get(name).cloned();

        let market = |data_type: &str| ResourceRequest {
            command: BridgeCommand::MarketData,
            account: None,
            fields: vec![("dataType", json!(data_type))],
        };
        let user = |data_type: &str, account: Option<String>| ResourceRequest {
            command: BridgeCommand::UserData,
            account,
            fields: vec![("dataType", json!(data_type))],
        };

        match self {
            ResourceKind::AllMids => market("all_mids"),
            ResourceKind::Meta => market("meta"),
            ResourceKind::MetaAndAssetCtxs => market("meta_and_asset_ctxs"),
            ResourceKind::SpotMeta => market("spot_meta"),
            ResourceKind::AccountState => user("user_state", None),
            ResourceKind::AccountOpenOrders => user("open_orders", None),
            ResourceKind::AccountFills => user("user_fills", None),
            ResourceKind::L2Book => {
                let mut request = market("l2_snapshot");
                request
                    .fields
                    .push(("coin", param("coin").map_or(Value::Null, Value::String)));
                request
            }
            ResourceKind::UserState => user("user_state", param("address")),
            ResourceKind::UserOpenOrders => user("open_orders", param("address")),
            ResourceKind::UserFills => user("user_fills", param("address")),
        }
    }
}

/// A successful URI match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMatch {
    pub kind: ResourceKind,
    /// Percent-decoded template parameters; empty for concrete resources.
    pub params: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Template compilation
// ---------------------------------------------------------------------------

struct CompiledTemplate {
    template: ResourceTemplate,
    kind: ResourceKind,
    pattern: Regex,
    param_names: Vec<String>,
}

/// Compile a URI template into an anchored pattern and its parameter names.
pub fn compile_template(uri_template: &str) -> Result<(Regex, Vec<String>), CatalogError> {
    let invalid = |reason: &str| CatalogError::InvalidTemplate {
        template: uri_template.to_string(),
        reason: reason.to_string(),
    };

    let mut pattern = String::from("^");
    let mut param_names = Vec::new();
    let mut rest = uri_template;

    while let Some(open) = rest.find('{') {
        pattern.push_str(&regex::escape(&rest[..open]));
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| invalid("unclosed placeholder"))?;
        let name = &after[..close];
        if name.is_empty() || name.contains(['/', '{']) {
            return Err(invalid("placeholder must name a single path segment"));
        }
        if param_names.iter().any(|n| n == name) {
            return Err(invalid("duplicate placeholder"));
        }
        param_names.push(name.to_string());
        pattern.push_str("([^/]+)");
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(invalid("unmatched '}'"));
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|source| CatalogError::Pattern {
        template: uri_template.to_string(),
        source,
    })?;
    Ok((regex, param_names))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// The fixed set of resources and templates plus the matcher over them.
pub struct ResourceCatalog {
    resources: Vec<(ResourceDescriptor, ResourceKind)>,
    templates: Vec<CompiledTemplate>,
}

impl ResourceCatalog {
    /// Build the standard Hyperliquid catalog.
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_entries(standard_resources(), standard_templates())
    }

    /// Build a catalog from explicit entries. Template order is match order.
    pub fn with_entries(
        resources: Vec<(ResourceDescriptor, ResourceKind)>,
        templates: Vec<(ResourceTemplate, ResourceKind)>,
    ) -> Result<Self, CatalogError> {
        let templates = templates
            .into_iter()
            .map(|(template, kind)| {
                let (pattern, param_names) = compile_template(template.uri_template)?;
                Ok(CompiledTemplate {
                    template,
                    kind,
                    pattern,
                    param_names,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        Ok(Self {
            resources,
            templates,
        })
    }

    pub fn list_resources(&self) -> Vec<ResourceDescriptor> {
        self.resources.iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn list_resource_templates(&self) -> Vec<ResourceTemplate> {
        self.templates.iter().map(|t| t.template.clone()).collect()
    }

    /// Match a URI: concrete resources first, then templates in order.
    pub fn resolve(&self, uri: &str) -> Option<ResourceMatch> {
        if let Some((_, kind)) = self.resources.iter().find(|(d, _)| d.uri == uri) {
            return Some(ResourceMatch {
                kind: *kind,
                params: HashMap::new(),
            });
        }

        self.templates.iter().find_map(|t| {
            let captures = t.pattern.captures(uri)?;
            let params = t
                .param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    let raw = captures.get(i + 1)?.as_str();
                    let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
                    Some((name.clone(), decoded))
                })
                .collect();
            Some(ResourceMatch {
                kind: t.kind,
                params,
            })
        })
    }

    /// Read a resource through the bridge.
    pub async fn read(
        &self,
        config: &Config,
        executor: &dyn BridgeExecutor,
        uri: &str,
    ) -> Result<Value, ResourceError> {
        let matched = self
            .resolve(uri)
            .ok_or_else(|| ResourceError::InvalidUri(uri.to_string()))?;
        debug!(uri, kind = ?matched.kind, "Resolved resource");

        let request = matched.kind.bridge_request(&matched.params);
        let invocation = build_invocation(
            request.command,
            config,
            request.account.as_deref(),
            &request.fields,
        );
        Ok(executor.run(&invocation).await?)
    }
}

fn resource(uri: &'static str, name: &'static str, description: &'static str) -> ResourceDescriptor {
    ResourceDescriptor {
        uri,
        name,
        mime_type: JSON_MIME_TYPE,
        description,
    }
}

fn template(
    uri_template: &'static str,
    name: &'static str,
    description: &'static str,
) -> ResourceTemplate {
    ResourceTemplate {
        uri_template,
        name,
        mime_type: JSON_MIME_TYPE,
        description,
    }
}

fn standard_resources() -> Vec<(ResourceDescriptor, ResourceKind)> {
    vec![
        (
            resource(
                "hyperliquid://market/all-mids",
                "All Mid Prices",
                "Current mid prices for all listed coins",
            ),
            ResourceKind::AllMids,
        ),
        (
            resource(
                "hyperliquid://market/meta",
                "Perpetuals Metadata",
                "Universe of perpetual contracts with size decimals and max leverage",
            ),
            ResourceKind::Meta,
        ),
        (
            resource(
                "hyperliquid://market/meta-and-asset-ctxs",
                "Perpetuals Metadata and Asset Contexts",
                "Perpetuals metadata together with funding, open interest and mark prices",
            ),
            ResourceKind::MetaAndAssetCtxs,
        ),
        (
            resource(
                "hyperliquid://market/spot-meta",
                "Spot Metadata",
                "Spot tokens and trading pairs",
            ),
            ResourceKind::SpotMeta,
        ),
        (
            resource(
                "hyperliquid://user/state",
                "Account State",
                "Margin summary and open positions of the configured account",
            ),
            ResourceKind::AccountState,
        ),
        (
            resource(
                "hyperliquid://user/open-orders",
                "Account Open Orders",
                "Resting orders of the configured account",
            ),
            ResourceKind::AccountOpenOrders,
        ),
        (
            resource(
                "hyperliquid://user/fills",
                "Account Fills",
                "Recent fills of the configured account",
            ),
            ResourceKind::AccountFills,
        ),
    ]
}

fn standard_templates() -> Vec<(ResourceTemplate, ResourceKind)> {
    vec![
        (
            template(
                "hyperliquid://market/l2-book/{coin}",
                "L2 Order Book",
                "Level 2 order book snapshot for a coin",
            ),
            ResourceKind::L2Book,
        ),
        (
            template(
                "hyperliquid://user/{address}/state",
                "User State",
                "Margin summary and open positions of any account",
            ),
            ResourceKind::UserState,
        ),
        (
            template(
                "hyperliquid://user/{address}/open-orders",
                "User Open Orders",
                "Resting orders of any account",
            ),
            ResourceKind::UserOpenOrders,
        ),
        (
            template(
                "hyperliquid://user/{address}/fills",
                "User Fills",
                "Recent fills of any account",
            ),
            ResourceKind::UserFills,
        ),
    ]
}
