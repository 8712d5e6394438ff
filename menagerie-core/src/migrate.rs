//! Deploying and tearing down the collections and indexes of a set of models.
//!
//! A [`Deployment`] compiles its models into three atomic batches. Collections are
//! created first and indexes second, since an index can only be built over a
//! collection that already exists. Teardown runs in reverse model order.
//!
//! # Example
//!
//! ```ignore
//! use menagerie::prelude::*;
//!
//! let deployment = Deployment::new([user.clone(), job.clone()]);
//!
//! client.deploy(&deployment).await?;
//! client.teardown(&deployment).await?;
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::{
    client::Client,
    error::ZooResult,
    model::Model,
    query::{Expr, Q},
};

/// The models deployed together, in dependency order.
#[derive(Debug, Clone, Default)]
pub struct Deployment {
    models: Vec<Arc<Model>>,
}

impl Deployment {
    pub fn new(models: impl IntoIterator<Item = Arc<Model>>) -> Self {
        Self {
            models: models.into_iter().collect(),
        }
    }

    pub fn with_model(mut self, model: &Arc<Model>) -> Self {
        self.models.push(Arc::clone(model));
        self
    }

    pub fn models(&self) -> &[Arc<Model>] {
        &self.models
    }

    /// Every model's collections.
    pub fn construct(&self) -> Expr {
        Q::batch(self.models.iter().map(|model| model.construct()))
    }

    /// Every model's indexes.
    pub fn index(&self) -> Expr {
        Q::batch(self.models.iter().map(|model| model.index()))
    }

    /// Every model's indexes and collections, last model first.
    pub fn deconstruct(&self) -> Expr {
        Q::batch(self.models.iter().rev().map(|model| model.deconstruct()))
    }
}

/// Runs deployments against a client. Implemented for every [`Client`].
#[async_trait]
pub trait Migrator: Send + Sync {
    /// Creates every collection, then every index.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::InstanceAlreadyExists`](crate::error::ZooError::InstanceAlreadyExists)
    /// if part of the deployment already exists. Each batch is atomic, so a failed
    /// index batch leaves the collections in place.
    async fn deploy(&self, deployment: &Deployment) -> ZooResult<()>;

    /// Drops every index and collection of the deployment.
    ///
    /// # Errors
    ///
    /// Returns [`ZooError::InstanceNotFound`](crate::error::ZooError::InstanceNotFound)
    /// if part of the deployment does not exist.
    async fn teardown(&self, deployment: &Deployment) -> ZooResult<()>;
}

#[async_trait]
impl<T> Migrator for T
where
    T: Client,
{
    async fn deploy(&self, deployment: &Deployment) -> ZooResult<()> {
        info!(models = deployment.models.len(), "deploying models");

        self.query(deployment.construct()).await?;
        self.query(deployment.index()).await?;
        Ok(())
    }

    async fn teardown(&self, deployment: &Deployment) -> ZooResult<()> {
        info!(models = deployment.models.len(), "tearing down models");

        self.query(deployment.deconstruct()).await?;
        Ok(())
    }
}
