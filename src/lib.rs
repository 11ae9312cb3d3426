pub mod action;
pub mod config;
pub mod deployer;
pub mod function;
pub mod package;
pub mod policy;
pub mod provider;
pub mod retry;
pub mod role;
pub mod tokens;
pub mod validate;

#[cfg(test)]
pub mod testing;

pub use config::ShipperConfig;
pub use deployer::{DeployOptions, Deployer};
