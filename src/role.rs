//! Execution role provisioning: decide whether the role must be created or
//! only topped up with policies, and stage the work as a [`RoleAction`].

use std::sync::Arc;

use crate::{
    action::{AttachPolicyCommand, CreateRoleCommand, PutInlinePolicyCommand, RoleAction},
    provider::{IamCapability, ProviderError},
    tokens::TokenSource,
};

/// Trust document allowing the Lambda service to assume the role.
pub const DEFAULT_TRUST_DOCUMENT: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"Service":"lambda.amazonaws.com"},"Action":"sts:AssumeRole"}]}"#;

/// Baseline policy attached to every execution role regardless of what the
/// caller supplies; without it the function cannot write logs.
pub const BASIC_EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

const ROLE_NAME_PREFIX: &str = "shipper_exec_role_";
const INLINE_POLICY_PREFIX: &str = "shipper_inline_policy_";

/// The permission identity a deployed function runs as.
#[derive(Debug, Clone)]
pub struct ExecutionRole {
    pub role_name: String,
    pub role_arn: String,
    pub trust_document: String,
    /// User-supplied managed policy ARNs, already fully qualified.
    pub managed_policies: Vec<String>,
    pub inline_policy: Option<String>,
}

impl ExecutionRole {
    pub fn for_function(function_name: &str, account_id: &str) -> Self {
        let role_name = format!("{ROLE_NAME_PREFIX}{}", function_name.to_lowercase());
        let role_arn = format!("arn:aws:iam::{account_id}:role/{role_name}");
        ExecutionRole {
            role_name,
            role_arn,
            trust_document: DEFAULT_TRUST_DOCUMENT.to_string(),
            managed_policies: Vec::new(),
            inline_policy: None,
        }
    }
}

/// Stage the role work: create if the role does not exist, attach the
/// baseline policy plus every user-supplied managed policy, and put the
/// inline policy under a generated name if one is present.
///
/// A lookup failure other than not-found is fatal; no partial action is
/// returned.
pub async fn prepare_role_action(
    role: &ExecutionRole,
    iam: Arc<dyn IamCapability>,
    tokens: &dyn TokenSource,
) -> Result<RoleAction, ProviderError> {
    let existing = iam.get_role(&role.role_name).await?;
    let create = existing.is_none().then(|| CreateRoleCommand {
        role_name: role.role_name.clone(),
        trust_document: role.trust_document.clone(),
    });

    let mut managed_policies = vec![AttachPolicyCommand {
        role_name: role.role_name.clone(),
        policy_arn: BASIC_EXECUTION_POLICY_ARN.to_string(),
    }];
    for policy_arn in &role.managed_policies {
        managed_policies.push(AttachPolicyCommand {
            role_name: role.role_name.clone(),
            policy_arn: policy_arn.clone(),
        });
    }

    let inline_policy = role.inline_policy.as_ref().map(|document| {
        PutInlinePolicyCommand {
            role_name: role.role_name.clone(),
            policy_name: format!("{INLINE_POLICY_PREFIX}{}", tokens.short_token()),
            document: document.clone(),
        }
    });

    Ok(RoleAction::new(iam, create, managed_policies, inline_policy))
}
