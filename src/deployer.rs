//! Top-level deployment orchestration.
//!
//! One deployment runs a strictly sequential pipeline: resolve the caller
//! account, provision the execution role, package the handler, provision the
//! function (grant folded into the function action), wait for the function
//! to become consistent, then verify with a dry-run invocation. Any failure
//! aborts the run; a re-run relies on the idempotent existence checks in
//! each phase. There is no resume and no rollback of earlier phases.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use tracing::info;

use crate::{
    action::DeploymentAction,
    config::ShipperConfig,
    function::{prepare_function_action, FunctionSpec},
    package::{CargoPackager, Packager},
    provider::{
        aws::{AwsFunctions, AwsIam, AwsSts},
        FunctionCapability,
        IamCapability,
        ProviderError,
        StsCapability,
    },
    retry::{retry_fixed, Sleeper, TokioSleeper},
    role::prepare_role_action,
    tokens::{NanoidTokens, TokenSource},
};

/// The function did not become invocable within the consistency budget.
#[derive(Debug, thiserror::Error)]
#[error("function did not become consistent after {attempts} publish attempts: {source}")]
pub struct ConsistencyTimeout {
    pub attempts: u32,
    #[source]
    pub source: ProviderError,
}

/// Raw policy inputs from the command line, parsed before any remote call.
#[derive(Debug, Default, Clone)]
pub struct DeployOptions {
    pub managed_policies: Option<String>,
    pub inline_policy: Option<String>,
    pub resource_policy: Option<String>,
}

pub struct Deployer {
    config: ShipperConfig,
    iam: Arc<dyn IamCapability>,
    functions: Arc<dyn FunctionCapability>,
    sts: Arc<dyn StsCapability>,
    packager: Arc<dyn Packager>,
    sleeper: Arc<dyn Sleeper>,
    tokens: Arc<dyn TokenSource>,
}

impl Deployer {
    /// Build a deployer against the real AWS services, with credentials and
    /// region resolved from the environment. A missing region is fatal here,
    /// before any remote call is made.
    pub async fn from_env(config: ShipperConfig) -> Result<Self> {
        let aws = aws_config::defaults(BehaviorVersion::latest()).load().await;
        if aws.region().is_none() {
            anyhow::bail!(
                "unable to determine AWS region; set AWS_REGION or configure a default profile"
            );
        }
        let packager = CargoPackager::new(config.build_target.clone());
        Ok(Self::new(
            config,
            Arc::new(AwsIam::new(&aws)),
            Arc::new(AwsFunctions::new(&aws)),
            Arc::new(AwsSts::new(&aws)),
            Arc::new(packager),
            Arc::new(TokioSleeper),
            Arc::new(NanoidTokens),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ShipperConfig,
        iam: Arc<dyn IamCapability>,
        functions: Arc<dyn FunctionCapability>,
        sts: Arc<dyn StsCapability>,
        packager: Arc<dyn Packager>,
        sleeper: Arc<dyn Sleeper>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            config,
            iam,
            functions,
            sts,
            packager,
            sleeper,
            tokens,
        }
    }

    /// Deploy `source` as the function `name`, then verify the deployment.
    pub async fn deploy(&self, name: &str, source: &Path, options: &DeployOptions) -> Result<()> {
        let account_id = self
            .sts
            .caller_account_id()
            .await
            .context("resolving caller account id")?;
        let spec = FunctionSpec::new(name, source, &account_id)
            .with_managed_policies(options.managed_policies.as_deref().unwrap_or_default())
            .with_inline_policy(options.inline_policy.as_deref().unwrap_or_default())
            .context("parsing inline policy")?
            .with_resource_policy(options.resource_policy.as_deref().unwrap_or_default())
            .context("parsing resource policy")?;

        let role_action = prepare_role_action(&spec.role, self.iam.clone(), self.tokens.as_ref())
            .await
            .context("preparing execution role")?;
        DeploymentAction::CreateOrUpdateRole(role_action)
            .execute()
            .await
            .context("provisioning execution role")?;

        let archive = self
            .packager
            .package(source)
            .await
            .context("packaging handler")?;

        let function_action = prepare_function_action(
            &spec,
            archive,
            self.functions.clone(),
            self.tokens.as_ref(),
            &self.config,
            self.sleeper.clone(),
        )
        .await
        .context("preparing function")?;
        function_action
            .execute()
            .await
            .context("provisioning function")?;

        let version = self.await_consistency(name).await?;
        self.functions
            .invoke_dry_run(name, &version)
            .await
            .context("verifying deployment with dry-run invocation")?;
        info!(function = name, version = %version, "deployment verified");
        Ok(())
    }

    /// Poll PublishVersion until the function is queryable. Every failure is
    /// treated as "not yet consistent"; exhausting the budget surfaces a
    /// [`ConsistencyTimeout`] wrapping the last underlying error.
    pub async fn await_consistency(&self, name: &str) -> Result<String> {
        let policy = self.config.consistency_retry_policy();
        let version = retry_fixed(
            policy,
            self.sleeper.as_ref(),
            "publish version",
            || self.functions.publish_version(name),
            |_| true,
        )
        .await
        .map_err(|source| ConsistencyTimeout {
            attempts: policy.attempts.max(1),
            source,
        })?;
        Ok(version)
    }

    /// Delete the function and tear down its execution role: detach every
    /// attached policy, then delete the role itself.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let record = self
            .functions
            .get_function(name)
            .await
            .context("looking up function")?
            .ok_or_else(|| anyhow::anyhow!("function {name} does not exist"))?;

        self.functions
            .delete_function(name)
            .await
            .context("deleting function")?;
        info!(function = name, "deleted function");

        let role_name = record
            .role_arn
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "cannot determine execution role from arn {}",
                    record.role_arn
                )
            })?
            .to_string();

        let attached = self
            .iam
            .list_attached_policies(&role_name)
            .await
            .context("listing attached policies")?;
        for policy_arn in attached {
            self.iam
                .detach_managed_policy(&role_name, &policy_arn)
                .await
                .with_context(|| format!("detaching managed policy {policy_arn}"))?;
        }
        self.iam
            .delete_role(&role_name)
            .await
            .context("deleting execution role")?;
        info!(role = %role_name, "deleted execution role");
        Ok(())
    }
}
