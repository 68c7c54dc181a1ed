//! Plan scanning and input normalization
//!
//! The scanner boundary: everything upstream of raw assets. One
//! concrete scanner consumes a Terraform-plan-shaped JSON document;
//! anything else that can produce [`RawAsset`]s plugs in through the
//! [`Scanner`] trait. Canonical JSON (recursively sorted object keys)
//! makes the input hash insertion-order independent, which is what
//! lets identical inputs produce identical audit metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

/// Scanner failures
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{context}: missing required field {field}")]
    MissingField { context: String, field: &'static str },

    #[error("{context}: field {field} must be {expected}")]
    WrongType {
        context: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("duplicate resource address: {0}")]
    DuplicateAddress(String),

    #[error("source could not be scanned: {0}")]
    Unresolvable(String),
}

/// A `count`/`for_each` value as the plan saw it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpansionValue {
    /// Statically known instance count
    Resolved(u64),

    /// Unresolved expression, optionally with a static ceiling
    Unresolved {
        expression: String,
        upper_bound: Option<u64>,
    },
}

/// One resource as produced by the scanner, before graph construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAsset {
    pub address: String,
    pub resource_type: String,
    pub provider_id: String,
    pub provider_alias: String,
    pub region: String,
    pub account_id: Option<String>,
    pub attributes: Value,
    pub count: Option<ExpansionValue>,
    pub for_each: Option<ExpansionValue>,
    pub depends_on: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

/// The scanner boundary. Implementations turn a declarative source
/// document into raw assets; they never price and never guess.
pub trait Scanner: Send + Sync {
    fn scan(&self, source: &Value) -> Result<Vec<RawAsset>, ScanError>;
}

/// Scanner for Terraform-plan-shaped JSON documents.
///
/// Expected shape: a top-level `resources` array where each entry
/// carries `address`, `type`, `provider`, `values` and optionally
/// `provider_alias`, `region`, `account_id`, `count`, `for_each`,
/// `depends_on` and `tags`. A document-level `region` acts as the
/// fallback for resources without one.
#[derive(Debug, Default, Clone)]
pub struct PlanScanner;

impl PlanScanner {
    pub fn new() -> Self {
        Self
    }

    fn parse_expansion(
        context: &str,
        field: &'static str,
        value: &Value,
    ) -> Result<ExpansionValue, ScanError> {
        match value {
            Value::Number(n) => match n.as_u64() {
                Some(count) => Ok(ExpansionValue::Resolved(count)),
                None => Err(ScanError::WrongType {
                    context: context.to_string(),
                    field,
                    expected: "a non-negative integer",
                }),
            },
            Value::String(expr) => Ok(ExpansionValue::Unresolved {
                expression: format!("{field} = \"{expr}\""),
                upper_bound: None,
            }),
            Value::Array(items) => Ok(ExpansionValue::Resolved(items.len() as u64)),
            Value::Object(map) => {
                // for_each over a static map is resolved; an object
                // with an `expression` key is an annotated unknown
                if let Some(expr) = map.get("expression").and_then(Value::as_str) {
                    let upper_bound = map.get("max").and_then(Value::as_u64);
                    Ok(ExpansionValue::Unresolved {
                        expression: format!("{field} = \"{expr}\""),
                        upper_bound,
                    })
                } else {
                    Ok(ExpansionValue::Resolved(map.len() as u64))
                }
            }
            _ => Err(ScanError::WrongType {
                context: context.to_string(),
                field,
                expected: "a number, string, array or object",
            }),
        }
    }

    fn parse_resource(resource: &Value, doc_region: Option<&str>) -> Result<RawAsset, ScanError> {
        let obj = resource.as_object().ok_or_else(|| ScanError::WrongType {
            context: "resources".to_string(),
            field: "resources[]",
            expected: "an object",
        })?;

        let address = obj
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| ScanError::MissingField {
                context: "resource".to_string(),
                field: "address",
            })?
            .to_string();

        let context = address.clone();
        let require_str = |field: &'static str| -> Result<String, ScanError> {
            obj.get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ScanError::MissingField {
                    context: context.clone(),
                    field,
                })
        };

        let resource_type = require_str("type")?.to_lowercase();
        let provider_id = require_str("provider")?.to_lowercase();
        let provider_alias = obj
            .get("provider_alias")
            .and_then(Value::as_str)
            .unwrap_or(&provider_id)
            .to_string();

        let region = obj
            .get("region")
            .and_then(Value::as_str)
            .or(doc_region)
            .ok_or_else(|| ScanError::MissingField {
                context: context.clone(),
                field: "region",
            })?
            .to_string();

        let account_id = obj
            .get("account_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let attributes = obj.get("values").cloned().unwrap_or(Value::Null);

        let count = obj
            .get("count")
            .map(|v| Self::parse_expansion(&context, "count", v))
            .transpose()?;
        let for_each = obj
            .get("for_each")
            .map(|v| Self::parse_expansion(&context, "for_each", v))
            .transpose()?;

        let depends_on = obj
            .get("depends_on")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let tags = obj
            .get("tags")
            .or_else(|| attributes.get("tags"))
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(RawAsset {
            address,
            resource_type,
            provider_id,
            provider_alias,
            region,
            account_id,
            attributes,
            count,
            for_each,
            depends_on,
            tags,
        })
    }
}

impl Scanner for PlanScanner {
    fn scan(&self, source: &Value) -> Result<Vec<RawAsset>, ScanError> {
        let resources = source
            .get("resources")
            .and_then(Value::as_array)
            .ok_or_else(|| ScanError::MissingField {
                context: "source".to_string(),
                field: "resources",
            })?;
        let doc_region = source.get("region").and_then(Value::as_str);

        let mut assets = Vec::with_capacity(resources.len());
        let mut seen = std::collections::BTreeSet::new();
        for resource in resources {
            let asset = Self::parse_resource(resource, doc_region)?;
            if !seen.insert(asset.address.clone()) {
                return Err(ScanError::DuplicateAddress(asset.address));
            }
            assets.push(asset);
        }
        assets.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(assets)
    }
}

/// Render a JSON value with every object's keys sorted, recursively.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            out.push_str(&value.to_string());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (i, (key, item)) in sorted.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
    }
}

/// SHA-256 of the canonical JSON form, hex encoded.
pub fn input_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan() -> Value {
        json!({
            "region": "us-east-1",
            "resources": [
                {
                    "address": "aws_instance.web",
                    "type": "AWS_Instance",
                    "provider": "aws",
                    "values": {"instance_type": "m5.large"},
                    "depends_on": ["aws_vpc.main"],
                    "tags": {"Env": "prod"}
                },
                {
                    "address": "aws_vpc.main",
                    "type": "aws_vpc",
                    "provider": "aws",
                    "values": {}
                }
            ]
        })
    }

    #[test]
    fn test_scan_normalizes_and_sorts() {
        let assets = PlanScanner::new().scan(&plan()).unwrap();
        assert_eq!(assets.len(), 2);
        // sorted by address
        assert_eq!(assets[0].address, "aws_instance.web");
        // type lowercased, doc region applied
        assert_eq!(assets[0].resource_type, "aws_instance");
        assert_eq!(assets[0].region, "us-east-1");
        assert_eq!(assets[0].depends_on, vec!["aws_vpc.main"]);
        assert_eq!(assets[0].tags.get("Env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_duplicate_address_is_an_error() {
        let source = json!({
            "region": "us-east-1",
            "resources": [
                {"address": "aws_vpc.main", "type": "aws_vpc", "provider": "aws", "values": {}},
                {"address": "aws_vpc.main", "type": "aws_vpc", "provider": "aws", "values": {}}
            ]
        });
        assert!(matches!(
            PlanScanner::new().scan(&source),
            Err(ScanError::DuplicateAddress(_))
        ));
    }

    #[test]
    fn test_missing_required_fields() {
        let source = json!({"resources": [{"type": "aws_vpc", "provider": "aws"}]});
        assert!(matches!(
            PlanScanner::new().scan(&source),
            Err(ScanError::MissingField { field: "address", .. })
        ));

        let source = json!({"resources": [
            {"address": "aws_vpc.main", "type": "aws_vpc", "provider": "aws", "values": {}}
        ]});
        // no region anywhere
        assert!(matches!(
            PlanScanner::new().scan(&source),
            Err(ScanError::MissingField { field: "region", .. })
        ));
    }

    #[test]
    fn test_expansion_parsing() {
        let ctx = "aws_instance.workers";
        assert_eq!(
            PlanScanner::parse_expansion(ctx, "count", &json!(3)).unwrap(),
            ExpansionValue::Resolved(3)
        );
        assert_eq!(
            PlanScanner::parse_expansion(ctx, "count", &json!("${var.n}")).unwrap(),
            ExpansionValue::Unresolved {
                expression: "count = \"${var.n}\"".to_string(),
                upper_bound: None,
            }
        );
        assert_eq!(
            PlanScanner::parse_expansion(
                ctx,
                "count",
                &json!({"expression": "${var.n}", "max": 4})
            )
            .unwrap(),
            ExpansionValue::Unresolved {
                expression: "count = \"${var.n}\"".to_string(),
                upper_bound: Some(4),
            }
        );
        assert_eq!(
            PlanScanner::parse_expansion(ctx, "for_each", &json!(["a", "b"])).unwrap(),
            ExpansionValue::Resolved(2)
        );
    }

    #[test]
    fn test_canonical_json_sorts_keys_recursively() {
        let a = json!({"b": 1, "a": {"z": true, "y": [1, 2]}});
        let b = json!({"a": {"y": [1, 2], "z": true}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&a), r#"{"a":{"y":[1,2],"z":true},"b":1}"#);
    }

    #[test]
    fn test_input_hash_is_order_independent_and_stable() {
        let a = json!({"mode": "strict", "source": {"x": 1, "y": 2}});
        let b = json!({"source": {"y": 2, "x": 1}, "mode": "strict"});
        assert_eq!(input_hash(&a), input_hash(&b));
        assert_eq!(input_hash(&a).len(), 64);

        let c = json!({"mode": "permissive", "source": {"x": 1, "y": 2}});
        assert_ne!(input_hash(&a), input_hash(&c));
    }
}
