//! Parsing of the semi-structured policy inputs accepted on the command
//! line: resource policies, managed policy lists, and inline policies.
//!
//! Resource policies are parsed structurally (serde_json) against a minimal
//! schema: one principal clause plus up to three recognized condition keys.
//! The parser deliberately ignores everything else in the document — it does
//! not validate statement structure or reject extraneous fields.

use std::fmt;

use serde_json::Value;

/// Namespace prefix used to expand bare managed policy names.
pub const MANAGED_POLICY_NAMESPACE: &str = "arn:aws:iam::aws:policy/";

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("no principal found in resource policy")]
    MissingPrincipal,

    #[error("resource policy is not valid JSON")]
    MalformedResourcePolicy(#[source] serde_json::Error),

    #[error("inline policy is empty")]
    EmptyInlinePolicy,

    #[error("inline policy is not valid JSON")]
    InvalidInlinePolicy(#[source] serde_json::Error),
}

/// Who outside the function's own role may invoke it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A list of AWS account identifiers, order preserved as given.
    AwsAccounts(Vec<String>),
    /// A single named AWS service, e.g. `s3.amazonaws.com`.
    Service(String),
}

impl Principal {
    /// The value sent in an AddPermission grant. Service principals go out
    /// bare; account lists keep the rendered list form.
    pub fn grant_value(&self) -> String {
        match self {
            Principal::Service(name) => name.clone(),
            Principal::AwsAccounts(_) => self.to_string(),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::AwsAccounts(accounts) => {
                let rendered = accounts
                    .iter()
                    .map(|a| format!("\"{a}\""))
                    .collect::<Vec<_>>()
                    .join(",");
                write!(f, "{{AWS:[{rendered}]}}")
            }
            Principal::Service(name) => write!(f, "{{Service:{name}}}"),
        }
    }
}

/// An invoke grant extracted from a resource policy document. A policy with
/// no principal grants nothing and must not produce a remote call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePolicy {
    pub principal: Option<Principal>,
    pub source_arn: Option<String>,
    pub source_account: Option<String>,
    pub principal_org_id: Option<String>,
}

/// Parse a resource policy document into a [`ResourcePolicy`].
///
/// Exactly one principal clause is required; each condition clause is
/// optional and extracted independently of the others.
pub fn parse_resource_policy(document: &str) -> Result<ResourcePolicy, PolicyError> {
    let root: Value =
        serde_json::from_str(document).map_err(PolicyError::MalformedResourcePolicy)?;

    let principal = find_key(&root, "Principal")
        .into_iter()
        .find_map(principal_from_value)
        .ok_or(PolicyError::MissingPrincipal)?;

    Ok(ResourcePolicy {
        principal: Some(principal),
        source_arn: condition_value(&root, "ArnLike", "AWS:SourceArn"),
        source_account: condition_value(&root, "StringEquals", "AWS:SourceAccount"),
        principal_org_id: condition_value(&root, "StringEquals", "aws:PrincipalOrgID"),
    })
}

/// Expand a comma-separated managed policy list into fully qualified ARNs.
///
/// Entries already carrying an `arn:` prefix pass through unchanged; bare
/// names are expanded against [`MANAGED_POLICY_NAMESPACE`]. Expansion is
/// idempotent. Empty input yields an empty list.
pub fn expand_managed_policies(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|entry| entry.trim().trim_matches(|c| c == '"' || c == '\''))
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            if entry.starts_with("arn:") {
                entry.to_string()
            } else {
                format!("{MANAGED_POLICY_NAMESPACE}{entry}")
            }
        })
        .collect()
}

/// Validate that an inline policy is syntactically parseable JSON and return
/// it in compact form. This catches obvious mistakes only; it does not check
/// that the policy is semantically valid.
pub fn parse_inline_policy(document: &str) -> Result<String, PolicyError> {
    if document.trim().is_empty() {
        return Err(PolicyError::EmptyInlinePolicy);
    }
    let value: Value =
        serde_json::from_str(document).map_err(PolicyError::InvalidInlinePolicy)?;
    serde_json::to_string(&value).map_err(PolicyError::InvalidInlinePolicy)
}

fn principal_from_value(value: &Value) -> Option<Principal> {
    let map = value.as_object()?;
    if let Some(aws) = map.get("AWS") {
        match aws {
            Value::String(account) => {
                return Some(Principal::AwsAccounts(vec![account.clone()]));
            }
            Value::Array(items) => {
                let accounts: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect();
                if !accounts.is_empty() {
                    return Some(Principal::AwsAccounts(accounts));
                }
            }
            _ => {}
        }
    }
    if let Some(Value::String(service)) = map.get("Service") {
        return Some(Principal::Service(service.clone()));
    }
    None
}

fn condition_value(root: &Value, operator: &str, condition_key: &str) -> Option<String> {
    find_key(root, operator).into_iter().find_map(|value| {
        value.as_object()?.iter().find_map(|(key, value)| {
            if key.eq_ignore_ascii_case(condition_key) {
                value.as_str().map(String::from)
            } else {
                None
            }
        })
    })
}

/// Collect every value stored under `key` anywhere in the document.
fn find_key<'a>(value: &'a Value, key: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    collect_key(value, key, &mut found);
    found
}

fn collect_key<'a>(value: &'a Value, key: &str, found: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == key {
                    found.push(v);
                }
                collect_key(v, key, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_key(item, key, found);
            }
        }
        _ => {}
    }
}
