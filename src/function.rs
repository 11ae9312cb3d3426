//! Function provisioning: decide create vs. update for the function resource
//! and compose the packaged artifact, role, and invoke grant into a
//! [`DeploymentAction`].

use std::{path::PathBuf, sync::Arc};

use bytes::Bytes;

use crate::{
    action::{CreateFunctionAction, DeploymentAction, UpdateFunctionAction},
    config::ShipperConfig,
    package::ARCHIVE_ENTRY_NAME,
    policy::{
        expand_managed_policies,
        parse_inline_policy,
        parse_resource_policy,
        PolicyError,
        ResourcePolicy,
    },
    provider::{CreateFunctionRequest, FunctionCapability, InvokeGrant, ProviderError},
    retry::Sleeper,
    role::ExecutionRole,
    tokens::TokenSource,
};

const STATEMENT_ID_PREFIX: &str = "shipper_invoke_permission_";

/// The deployable unit: one function, its execution role, and its invoke
/// grant. Immutable once the policy options have been applied.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    pub handler_path: PathBuf,
    pub role: ExecutionRole,
    pub resource_policy: ResourcePolicy,
}

impl FunctionSpec {
    /// The caller account id only shapes the role ARN; it is not kept
    /// separately.
    pub fn new(name: &str, handler_path: impl Into<PathBuf>, account_id: &str) -> Self {
        FunctionSpec {
            name: name.to_string(),
            handler_path: handler_path.into(),
            role: ExecutionRole::for_function(name, account_id),
            resource_policy: ResourcePolicy::default(),
        }
    }

    /// Replace the role's managed policy list. Empty input is a no-op.
    pub fn with_managed_policies(mut self, input: &str) -> Self {
        if !input.is_empty() {
            self.role.managed_policies = expand_managed_policies(input);
        }
        self
    }

    /// Attach an inline policy to the role. Empty input is a no-op; invalid
    /// JSON is rejected here, before any remote call.
    pub fn with_inline_policy(mut self, input: &str) -> Result<Self, PolicyError> {
        if !input.is_empty() {
            self.role.inline_policy = Some(parse_inline_policy(input)?);
        }
        Ok(self)
    }

    /// Parse and attach a resource policy. Empty input is a no-op.
    pub fn with_resource_policy(mut self, input: &str) -> Result<Self, PolicyError> {
        if !input.is_empty() {
            self.resource_policy = parse_resource_policy(input)?;
        }
        Ok(self)
    }

    /// Build the invoke grant for this deployment, or `None` when the
    /// resource policy has no principal. The statement id carries a fresh
    /// token to avoid colliding with grants from earlier deploys.
    pub fn invoke_grant(&self, tokens: &dyn TokenSource) -> Option<InvokeGrant> {
        let principal = self.resource_policy.principal.as_ref()?;
        Some(InvokeGrant {
            function_name: self.name.clone(),
            statement_id: format!("{STATEMENT_ID_PREFIX}{}", tokens.short_token()),
            principal: principal.grant_value(),
            source_arn: self.resource_policy.source_arn.clone(),
            source_account: self.resource_policy.source_account.clone(),
            principal_org_id: self.resource_policy.principal_org_id.clone(),
        })
    }
}

/// Stage the function work: create when the function is absent, update when
/// it exists. The artifact is already built by the time this runs — it is
/// needed on both branches. Lookup failures other than not-found are fatal.
pub async fn prepare_function_action(
    spec: &FunctionSpec,
    archive: Bytes,
    functions: Arc<dyn FunctionCapability>,
    tokens: &dyn TokenSource,
    config: &ShipperConfig,
    sleeper: Arc<dyn Sleeper>,
) -> Result<DeploymentAction, ProviderError> {
    let existing = functions.get_function(&spec.name).await?;
    let grant = spec.invoke_grant(tokens);
    let action = match existing {
        Some(_) => DeploymentAction::UpdateFunctionCode(UpdateFunctionAction::new(
            functions,
            spec.name.clone(),
            archive,
            grant,
        )),
        None => DeploymentAction::CreateFunction(CreateFunctionAction::new(
            functions,
            sleeper,
            config.create_retry_policy(),
            CreateFunctionRequest {
                name: spec.name.clone(),
                role_arn: spec.role.role_arn.clone(),
                handler: ARCHIVE_ENTRY_NAME.to_string(),
                runtime: config.runtime.clone(),
                architecture: config.architecture.clone(),
                archive,
            },
            grant,
        )),
    };
    Ok(action)
}
