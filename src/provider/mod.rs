//! Narrow capability interfaces over the AWS services the deployer touches.
//!
//! Each trait exposes only the operations the orchestration needs. The real
//! implementations in [`aws`] wrap the AWS SDK clients; tests use the
//! canonical in-memory fakes in `crate::testing`.

pub mod aws;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The execution role exists but has not yet propagated to the function
    /// service. The only remote error class retried on function creation.
    #[error("execution role not yet assumable: {0}")]
    RoleNotAssumable(String),

    /// Any other remote call failure. Fatal, never retried outside the
    /// consistency gate.
    #[error("{0}")]
    Api(String),
}

/// An existing IAM role, as much of it as the deployer cares about.
#[derive(Debug, Clone)]
pub struct RoleRecord {
    pub arn: String,
}

/// An existing Lambda function, as much of it as the deployer cares about.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub role_arn: String,
}

/// Everything needed to register a new function.
#[derive(Debug, Clone)]
pub struct CreateFunctionRequest {
    pub name: String,
    pub role_arn: String,
    pub handler: String,
    pub runtime: String,
    pub architecture: String,
    pub archive: Bytes,
}

/// A single invoke-permission statement added to a function's resource
/// policy. Optional fields absent from the source policy stay unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeGrant {
    pub function_name: String,
    pub statement_id: String,
    pub principal: String,
    pub source_arn: Option<String>,
    pub source_account: Option<String>,
    pub principal_org_id: Option<String>,
}

#[async_trait]
pub trait IamCapability: Send + Sync {
    /// Look up a role by name. Absence is `Ok(None)`, not an error — it is
    /// the signal that selects the create branch.
    async fn get_role(&self, name: &str) -> Result<Option<RoleRecord>, ProviderError>;
    async fn create_role(&self, name: &str, trust_document: &str) -> Result<(), ProviderError>;
    async fn attach_managed_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError>;
    async fn put_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<(), ProviderError>;
    async fn list_attached_policies(&self, role_name: &str)
        -> Result<Vec<String>, ProviderError>;
    async fn detach_managed_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError>;
    async fn delete_role(&self, name: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait FunctionCapability: Send + Sync {
    /// Look up a function by name. Absence is `Ok(None)`, not an error.
    async fn get_function(&self, name: &str) -> Result<Option<FunctionRecord>, ProviderError>;
    async fn create_function(&self, request: &CreateFunctionRequest)
        -> Result<(), ProviderError>;
    /// Replace the function's code and publish a new version in one call.
    async fn update_function_code(
        &self,
        name: &str,
        archive: &Bytes,
    ) -> Result<(), ProviderError>;
    async fn publish_version(&self, name: &str) -> Result<String, ProviderError>;
    /// Dry-run invocation: the provider checks permissions and parameters
    /// without executing the handler body.
    async fn invoke_dry_run(&self, name: &str, version: &str) -> Result<(), ProviderError>;
    async fn add_permission(&self, grant: &InvokeGrant) -> Result<(), ProviderError>;
    async fn delete_function(&self, name: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait StsCapability: Send + Sync {
    async fn caller_account_id(&self) -> Result<String, ProviderError>;
}
