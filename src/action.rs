//! Not-yet-executed units of deployment work.
//!
//! An action is built from already-resolved data — no remote calls happen
//! during construction — and executed exactly once. Keeping the create vs.
//! update decision in a closed sum type makes the branch exhaustively
//! checkable and testable without side effects.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::info;

use crate::{
    provider::{
        CreateFunctionRequest,
        FunctionCapability,
        IamCapability,
        InvokeGrant,
        ProviderError,
    },
    retry::{retry_fixed, RetryPolicy, Sleeper},
};

#[derive(Debug, Clone)]
pub struct CreateRoleCommand {
    pub role_name: String,
    pub trust_document: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachPolicyCommand {
    pub role_name: String,
    pub policy_arn: String,
}

#[derive(Debug, Clone)]
pub struct PutInlinePolicyCommand {
    pub role_name: String,
    pub policy_name: String,
    pub document: String,
}

/// Create the execution role if staged, then attach every managed policy in
/// order, then put the inline policy if staged. A failure at any step aborts
/// immediately; earlier steps are not rolled back.
pub struct RoleAction {
    iam: Arc<dyn IamCapability>,
    pub create: Option<CreateRoleCommand>,
    pub managed_policies: Vec<AttachPolicyCommand>,
    pub inline_policy: Option<PutInlinePolicyCommand>,
}

impl RoleAction {
    pub fn new(
        iam: Arc<dyn IamCapability>,
        create: Option<CreateRoleCommand>,
        managed_policies: Vec<AttachPolicyCommand>,
        inline_policy: Option<PutInlinePolicyCommand>,
    ) -> Self {
        Self {
            iam,
            create,
            managed_policies,
            inline_policy,
        }
    }

    async fn execute(&self) -> Result<()> {
        if let Some(create) = &self.create {
            self.iam
                .create_role(&create.role_name, &create.trust_document)
                .await
                .context("creating execution role")?;
            info!(role = %create.role_name, "created execution role");
        }
        for attach in &self.managed_policies {
            self.iam
                .attach_managed_policy(&attach.role_name, &attach.policy_arn)
                .await
                .with_context(|| format!("attaching managed policy {}", attach.policy_arn))?;
        }
        if let Some(inline) = &self.inline_policy {
            self.iam
                .put_inline_policy(&inline.role_name, &inline.policy_name, &inline.document)
                .await
                .context("putting inline policy")?;
        }
        Ok(())
    }
}

/// Register a new function, retrying the create call while the freshly
/// created role propagates, then apply the invoke grant if one is bundled.
pub struct CreateFunctionAction {
    functions: Arc<dyn FunctionCapability>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
    pub request: CreateFunctionRequest,
    pub grant: Option<InvokeGrant>,
}

impl CreateFunctionAction {
    pub fn new(
        functions: Arc<dyn FunctionCapability>,
        sleeper: Arc<dyn Sleeper>,
        retry: RetryPolicy,
        request: CreateFunctionRequest,
        grant: Option<InvokeGrant>,
    ) -> Self {
        Self {
            functions,
            sleeper,
            retry,
            request,
            grant,
        }
    }

    async fn execute(&self) -> Result<()> {
        retry_fixed(
            self.retry,
            self.sleeper.as_ref(),
            "create function",
            || self.functions.create_function(&self.request),
            |err| matches!(err, ProviderError::RoleNotAssumable(_)),
        )
        .await
        .context("creating function")?;
        info!(function = %self.request.name, "created function");

        if let Some(grant) = &self.grant {
            self.functions
                .add_permission(grant)
                .await
                .context("granting invoke permission")?;
            info!(
                function = %grant.function_name,
                principal = %grant.principal,
                "granted invoke permission"
            );
        }
        Ok(())
    }
}

/// Replace an existing function's code (publishing a new version in the same
/// call) and re-apply the invoke grant. The grant is re-applied on every
/// deploy so drifted or missing permissions heal themselves.
pub struct UpdateFunctionAction {
    functions: Arc<dyn FunctionCapability>,
    pub name: String,
    pub archive: Bytes,
    pub grant: Option<InvokeGrant>,
}

impl UpdateFunctionAction {
    pub fn new(
        functions: Arc<dyn FunctionCapability>,
        name: String,
        archive: Bytes,
        grant: Option<InvokeGrant>,
    ) -> Self {
        Self {
            functions,
            name,
            archive,
            grant,
        }
    }

    async fn execute(&self) -> Result<()> {
        self.functions
            .update_function_code(&self.name, &self.archive)
            .await
            .context("updating function code")?;
        info!(function = %self.name, "updated function code");

        if let Some(grant) = &self.grant {
            self.functions
                .add_permission(grant)
                .await
                .context("granting invoke permission")?;
        }
        Ok(())
    }
}

/// A deployment action, decided but not yet performed.
pub enum DeploymentAction {
    CreateOrUpdateRole(RoleAction),
    CreateFunction(CreateFunctionAction),
    UpdateFunctionCode(UpdateFunctionAction),
}

impl DeploymentAction {
    pub async fn execute(&self) -> Result<()> {
        match self {
            DeploymentAction::CreateOrUpdateRole(action) => action.execute().await,
            DeploymentAction::CreateFunction(action) => action.execute().await,
            DeploymentAction::UpdateFunctionCode(action) => action.execute().await,
        }
    }
}
