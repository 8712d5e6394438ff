//! The database client seam and the entry point tying a client to model managers.
//!
//! # Overview
//!
//! The [`Client`] trait is the only thing the compiler needs from a database: evaluate
//! one expression and return its result. Implementations are required to be
//! thread-safe (`Send + Sync`) and to evaluate each expression atomically.
//!
//! # Traits
//!
//! - [`Client`]: evaluates expressions
//! - [`ClientBuilder`]: factory trait for creating client instances
//!
//! # Example
//!
//! ```ignore
//! use menagerie::prelude::*;
//!
//! let client = InMemoryClient::builder()
//!     .config(ClientConfig::new("secret"))
//!     .build()
//!     .await?;
//! let database = Database::new(client);
//!
//! let user = database.zoo(&user_model).get("1").await?;
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::{fmt::Debug, sync::Arc};

use crate::{error::ZooResult, model::Model, query::Expr, zoo::Zoo};

/// Evaluates query expressions against a database.
///
/// # Error Handling
///
/// Implementations report a missing document, collection or index as
/// [`ZooError::InstanceNotFound`](crate::error::ZooError::InstanceNotFound) and a unique
/// index collision as
/// [`ZooError::InstanceNotUnique`](crate::error::ZooError::InstanceNotUnique). A failed
/// expression leaves no partial effects behind.
#[async_trait]
pub trait Client: Send + Sync + Debug {
    /// Evaluates `expr` and returns its result.
    async fn query(&self, expr: Expr) -> ZooResult<Bson>;
}

#[async_trait]
impl<C> Client for &C
where
    C: Client + ?Sized,
{
    async fn query(&self, expr: Expr) -> ZooResult<Bson> {
        (**self).query(expr).await
    }
}

#[async_trait]
impl<C> Client for Arc<C>
where
    C: Client + ?Sized,
{
    async fn query(&self, expr: Expr) -> ZooResult<Bson> {
        (**self).query(expr).await
    }
}

#[async_trait]
impl<C> Client for Box<C>
where
    C: Client + ?Sized,
{
    async fn query(&self, expr: Expr) -> ZooResult<Bson> {
        (**self).query(expr).await
    }
}

#[async_trait]
pub trait ClientBuilder {
    type Client: Client;

    async fn build(self) -> ZooResult<Self::Client>;
}

/// A database bound to one client, handing out a [`Zoo`] per model.
///
/// # Type Parameters
///
/// * `C` - The client implementation type
#[derive(Debug)]
pub struct Database<C: Client> {
    client: C,
}

impl<C: Client> Database<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Gets the manager for `model`.
    pub fn zoo<'a>(&'a self, model: &Arc<Model>) -> Zoo<'a, C> {
        Zoo::new(model, &self.client)
    }

    /// Evaluates a raw expression.
    ///
    /// # Errors
    ///
    /// Returns whatever the client reports.
    pub async fn query(&self, expr: Expr) -> ZooResult<Bson> {
        self.client.query(expr).await
    }

    /// Consumes the database, returning its client.
    pub fn into_client(self) -> C {
        self.client
    }
}
