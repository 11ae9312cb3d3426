//! AWS SDK implementations of the provider capabilities.
//!
//! Not-found responses on the get paths (IAM `NoSuchEntityException`, Lambda
//! `ResourceNotFoundException`) map to `Ok(None)`. Lambda's
//! `InvalidParameterValueException` on CreateFunction maps to
//! [`ProviderError::RoleNotAssumable`] — a freshly created role takes a few
//! seconds to become visible to Lambda, and that is the error it surfaces as.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_iam::error::{DisplayErrorContext, SdkError};
use aws_sdk_lambda::{
    primitives::Blob,
    types::{Architecture, FunctionCode, InvocationType, Runtime},
};
use bytes::Bytes;

use super::{
    CreateFunctionRequest,
    FunctionCapability,
    FunctionRecord,
    IamCapability,
    InvokeGrant,
    ProviderError,
    RoleRecord,
    StsCapability,
};

fn api_error<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    ProviderError::Api(format!("{}", DisplayErrorContext(err)))
}

pub struct AwsIam {
    client: aws_sdk_iam::Client,
}

impl AwsIam {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_iam::Client::new(config),
        }
    }
}

#[async_trait]
impl IamCapability for AwsIam {
    async fn get_role(&self, name: &str) -> Result<Option<RoleRecord>, ProviderError> {
        match self.client.get_role().role_name(name).send().await {
            Ok(out) => Ok(out.role().map(|role| RoleRecord {
                arn: role.arn().to_string(),
            })),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_entity_exception() {
                    Ok(None)
                } else {
                    Err(ProviderError::Api(format!(
                        "{}",
                        DisplayErrorContext(service_err)
                    )))
                }
            }
        }
    }

    async fn create_role(&self, name: &str, trust_document: &str) -> Result<(), ProviderError> {
        self.client
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_document)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn attach_managed_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.client
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn put_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<(), ProviderError> {
        self.client
            .put_role_policy()
            .role_name(role_name)
            .policy_name(policy_name)
            .policy_document(document)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn list_attached_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let out = self
            .client
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(api_error)?;
        Ok(out
            .attached_policies()
            .iter()
            .filter_map(|policy| policy.policy_arn().map(String::from))
            .collect())
    }

    async fn detach_managed_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.client
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<(), ProviderError> {
        self.client
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}

pub struct AwsFunctions {
    client: aws_sdk_lambda::Client,
}

impl AwsFunctions {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_lambda::Client::new(config),
        }
    }
}

#[async_trait]
impl FunctionCapability for AwsFunctions {
    async fn get_function(&self, name: &str) -> Result<Option<FunctionRecord>, ProviderError> {
        match self.client.get_function().function_name(name).send().await {
            Ok(out) => Ok(Some(FunctionRecord {
                role_arn: out
                    .configuration()
                    .and_then(|config| config.role())
                    .unwrap_or_default()
                    .to_string(),
            })),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_resource_not_found_exception() {
                    Ok(None)
                } else {
                    Err(ProviderError::Api(format!(
                        "{}",
                        DisplayErrorContext(service_err)
                    )))
                }
            }
        }
    }

    async fn create_function(
        &self,
        request: &CreateFunctionRequest,
    ) -> Result<(), ProviderError> {
        let code = FunctionCode::builder()
            .zip_file(Blob::new(request.archive.to_vec()))
            .build();
        let result = self
            .client
            .create_function()
            .function_name(&request.name)
            .role(&request.role_arn)
            .handler(&request.handler)
            .runtime(Runtime::from(request.runtime.as_str()))
            .architectures(Architecture::from(request.architecture.as_str()))
            .code(code)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_invalid_parameter_value_exception() {
                    Err(ProviderError::RoleNotAssumable(format!(
                        "{}",
                        DisplayErrorContext(service_err)
                    )))
                } else {
                    Err(ProviderError::Api(format!(
                        "{}",
                        DisplayErrorContext(service_err)
                    )))
                }
            }
        }
    }

    async fn update_function_code(
        &self,
        name: &str,
        archive: &Bytes,
    ) -> Result<(), ProviderError> {
        self.client
            .update_function_code()
            .function_name(name)
            .zip_file(Blob::new(archive.to_vec()))
            .publish(true)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn publish_version(&self, name: &str) -> Result<String, ProviderError> {
        let out = self
            .client
            .publish_version()
            .function_name(name)
            .send()
            .await
            .map_err(api_error)?;
        out.version()
            .map(String::from)
            .ok_or_else(|| ProviderError::Api("publish version response missing version".into()))
    }

    async fn invoke_dry_run(&self, name: &str, version: &str) -> Result<(), ProviderError> {
        let out = self
            .client
            .invoke()
            .function_name(name)
            .qualifier(version)
            .invocation_type(InvocationType::DryRun)
            .send()
            .await
            .map_err(api_error)?;
        if let Some(function_error) = out.function_error() {
            return Err(ProviderError::Api(format!(
                "dry-run invocation failed: {function_error}"
            )));
        }
        Ok(())
    }

    async fn add_permission(&self, grant: &InvokeGrant) -> Result<(), ProviderError> {
        self.client
            .add_permission()
            .action("lambda:InvokeFunction")
            .function_name(&grant.function_name)
            .statement_id(&grant.statement_id)
            .principal(&grant.principal)
            .set_source_arn(grant.source_arn.clone())
            .set_source_account(grant.source_account.clone())
            .set_principal_org_id(grant.principal_org_id.clone())
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> Result<(), ProviderError> {
        self.client
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}

pub struct AwsSts {
    client: aws_sdk_sts::Client,
}

impl AwsSts {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl StsCapability for AwsSts {
    async fn caller_account_id(&self) -> Result<String, ProviderError> {
        let out = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(api_error)?;
        out.account()
            .map(String::from)
            .ok_or_else(|| ProviderError::Api("caller identity response missing account".into()))
    }
}
