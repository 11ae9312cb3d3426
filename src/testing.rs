//! Canonical in-memory fakes for the provider capabilities and the injected
//! seams (sleep, tokens, packaging). Every test module shares these rather
//! than rolling its own; scripted failures cover the retry paths.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    package::{PackageError, Packager},
    provider::{
        CreateFunctionRequest,
        FunctionCapability,
        FunctionRecord,
        IamCapability,
        InvokeGrant,
        ProviderError,
        RoleRecord,
        StsCapability,
    },
    retry::Sleeper,
    tokens::TokenSource,
};

/// Everything a [`FakeIam`] has observed, snapshotted for assertions.
#[derive(Debug, Default, Clone)]
pub struct FakeIamState {
    /// Existing role names, seeded plus created.
    pub roles: Vec<String>,
    /// (role name, trust document) for every CreateRole call.
    pub created_roles: Vec<(String, String)>,
    /// (role name, policy arn) for every AttachRolePolicy call, in order.
    pub attached: Vec<(String, String)>,
    /// (role name, policy name, document) for every PutRolePolicy call.
    pub inline_policies: Vec<(String, String, String)>,
    pub detached: Vec<(String, String)>,
    pub deleted_roles: Vec<String>,
}

#[derive(Default)]
pub struct FakeIam {
    state: Mutex<FakeIamState>,
    fail_message: Option<String>,
}

impl FakeIam {
    pub fn with_roles(names: &[&str]) -> Self {
        let fake = FakeIam::default();
        fake.state.lock().unwrap().roles = names.iter().map(|name| name.to_string()).collect();
        fake
    }

    /// A fake whose every operation fails with the given message.
    pub fn failing(message: &str) -> Self {
        FakeIam {
            state: Mutex::default(),
            fail_message: Some(message.to_string()),
        }
    }

    /// Seed an already-attached managed policy, as if from an earlier deploy.
    pub fn attach_existing(&self, role_name: &str, policy_arn: &str) {
        self.state
            .lock()
            .unwrap()
            .attached
            .push((role_name.to_string(), policy_arn.to_string()));
    }

    pub fn state(&self) -> FakeIamState {
        self.state.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), ProviderError> {
        match &self.fail_message {
            Some(message) => Err(ProviderError::Api(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl IamCapability for FakeIam {
    async fn get_role(&self, name: &str) -> Result<Option<RoleRecord>, ProviderError> {
        self.check_failure()?;
        let state = self.state.lock().unwrap();
        Ok(state.roles.iter().any(|role| role == name).then(|| RoleRecord {
            arn: format!("arn:aws:iam::123456789012:role/{name}"),
        }))
    }

    async fn create_role(&self, name: &str, trust_document: &str) -> Result<(), ProviderError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.roles.push(name.to_string());
        state
            .created_roles
            .push((name.to_string(), trust_document.to_string()));
        Ok(())
    }

    async fn attach_managed_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.check_failure()?;
        self.state
            .lock()
            .unwrap()
            .attached
            .push((role_name.to_string(), policy_arn.to_string()));
        Ok(())
    }

    async fn put_inline_policy(
        &self,
        role_name: &str,
        policy_name: &str,
        document: &str,
    ) -> Result<(), ProviderError> {
        self.check_failure()?;
        self.state.lock().unwrap().inline_policies.push((
            role_name.to_string(),
            policy_name.to_string(),
            document.to_string(),
        ));
        Ok(())
    }

    async fn list_attached_policies(
        &self,
        role_name: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.check_failure()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .attached
            .iter()
            .filter(|(role, _)| role == role_name)
            .map(|(_, arn)| arn.clone())
            .collect())
    }

    async fn detach_managed_policy(
        &self,
        role_name: &str,
        policy_arn: &str,
    ) -> Result<(), ProviderError> {
        self.check_failure()?;
        self.state
            .lock()
            .unwrap()
            .detached
            .push((role_name.to_string(), policy_arn.to_string()));
        Ok(())
    }

    async fn delete_role(&self, name: &str) -> Result<(), ProviderError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.roles.retain(|role| role != name);
        state.deleted_roles.push(name.to_string());
        Ok(())
    }
}

/// Everything a [`FakeFunctions`] has observed.
#[derive(Debug, Default, Clone)]
pub struct FakeFunctionsState {
    /// name -> execution role arn for functions that currently exist.
    pub functions: Vec<(String, String)>,
    /// Successful CreateFunction requests.
    pub create_calls: Vec<CreateFunctionRequest>,
    /// CreateFunction attempts, failed ones included.
    pub create_attempts: u32,
    /// Function names passed to UpdateFunctionCode.
    pub update_calls: Vec<String>,
    pub grants: Vec<InvokeGrant>,
    /// (name, version) pairs from dry-run invocations.
    pub invocations: Vec<(String, String)>,
    /// PublishVersion attempts, failed ones included.
    pub publish_attempts: u32,
    pub deleted: Vec<String>,
}

#[derive(Default)]
struct FakeFunctionsScript {
    create_failures: u32,
    create_fatal: Option<String>,
    publish_failures: u32,
    fail_dry_run: bool,
}

#[derive(Default)]
pub struct FakeFunctions {
    state: Mutex<FakeFunctionsState>,
    script: Mutex<FakeFunctionsScript>,
}

impl FakeFunctions {
    pub fn with_function(name: &str, role_arn: &str) -> Self {
        let fake = FakeFunctions::default();
        fake.state
            .lock()
            .unwrap()
            .functions
            .push((name.to_string(), role_arn.to_string()));
        fake
    }

    /// Fail the next `count` CreateFunction calls as if the execution role
    /// had not propagated yet.
    pub fn fail_creates(&self, count: u32) {
        self.script.lock().unwrap().create_failures = count;
    }

    /// Fail every CreateFunction call with a non-retryable error.
    pub fn fail_creates_fatally(&self, message: &str) {
        self.script.lock().unwrap().create_fatal = Some(message.to_string());
    }

    /// Fail the next `count` PublishVersion calls.
    pub fn fail_publishes(&self, count: u32) {
        self.script.lock().unwrap().publish_failures = count;
    }

    pub fn fail_dry_run(&self) {
        self.script.lock().unwrap().fail_dry_run = true;
    }

    pub fn state(&self) -> FakeFunctionsState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl FunctionCapability for FakeFunctions {
    async fn get_function(&self, name: &str) -> Result<Option<FunctionRecord>, ProviderError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .functions
            .iter()
            .find(|(function, _)| function == name)
            .map(|(_, role_arn)| FunctionRecord {
                role_arn: role_arn.clone(),
            }))
    }

    async fn create_function(
        &self,
        request: &CreateFunctionRequest,
    ) -> Result<(), ProviderError> {
        self.state.lock().unwrap().create_attempts += 1;
        {
            let mut script = self.script.lock().unwrap();
            if let Some(message) = &script.create_fatal {
                return Err(ProviderError::Api(message.clone()));
            }
            if script.create_failures > 0 {
                script.create_failures -= 1;
                return Err(ProviderError::RoleNotAssumable(
                    "role defined for the function cannot be assumed".to_string(),
                ));
            }
        }
        let mut state = self.state.lock().unwrap();
        state
            .functions
            .push((request.name.clone(), request.role_arn.clone()));
        state.create_calls.push(request.clone());
        Ok(())
    }

    async fn update_function_code(
        &self,
        name: &str,
        _archive: &Bytes,
    ) -> Result<(), ProviderError> {
        self.state.lock().unwrap().update_calls.push(name.to_string());
        Ok(())
    }

    async fn publish_version(&self, name: &str) -> Result<String, ProviderError> {
        self.state.lock().unwrap().publish_attempts += 1;
        let mut script = self.script.lock().unwrap();
        if script.publish_failures > 0 {
            script.publish_failures -= 1;
            return Err(ProviderError::Api(format!(
                "function {name} not yet consistent"
            )));
        }
        Ok("1".to_string())
    }

    async fn invoke_dry_run(&self, name: &str, version: &str) -> Result<(), ProviderError> {
        if self.script.lock().unwrap().fail_dry_run {
            return Err(ProviderError::Api(format!(
                "dry-run invocation of {name} returned a function error"
            )));
        }
        self.state
            .lock()
            .unwrap()
            .invocations
            .push((name.to_string(), version.to_string()));
        Ok(())
    }

    async fn add_permission(&self, grant: &InvokeGrant) -> Result<(), ProviderError> {
        self.state.lock().unwrap().grants.push(grant.clone());
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.functions.retain(|(function, _)| function != name);
        state.deleted.push(name.to_string());
        Ok(())
    }
}

pub struct FakeSts {
    account_id: String,
}

impl Default for FakeSts {
    fn default() -> Self {
        FakeSts {
            account_id: "123456789012".to_string(),
        }
    }
}

#[async_trait]
impl StsCapability for FakeSts {
    async fn caller_account_id(&self) -> Result<String, ProviderError> {
        Ok(self.account_id.clone())
    }
}

/// Records requested sleep periods without waiting them out.
#[derive(Default)]
pub struct RecordingSleeper {
    periods: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.periods.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, period: Duration) {
        self.periods.lock().unwrap().push(period);
    }
}

/// Deterministic token source so generated names are assertable.
pub struct FixedTokens {
    token: String,
}

impl Default for FixedTokens {
    fn default() -> Self {
        FixedTokens {
            token: "DEADBEEF".to_string(),
        }
    }
}

impl TokenSource for FixedTokens {
    fn short_token(&self) -> String {
        self.token.clone()
    }
}

/// Skips compilation entirely and hands back a fixed archive.
#[derive(Default)]
pub struct FakePackager {
    packaged: Mutex<Vec<PathBuf>>,
}

impl FakePackager {
    pub fn packaged(&self) -> Vec<PathBuf> {
        self.packaged.lock().unwrap().clone()
    }
}

#[async_trait]
impl Packager for FakePackager {
    async fn package(&self, source: &Path) -> Result<Bytes, PackageError> {
        self.packaged.lock().unwrap().push(source.to_path_buf());
        Ok(Bytes::from_static(b"fake archive"))
    }
}
