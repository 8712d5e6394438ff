//! Main menagerie crate providing a unified interface for schema-first models.
//!
//! This crate is the primary entry point for users of menagerie. It re-exports the
//! model compiler from `menagerie-core` and the in-memory client from
//! `menagerie-memory`.
//!
//! # Features
//!
//! - **Declarative models** - Named fields with admit and emit schemas
//! - **Relationships** - References, many-to-many links and reverse lookups, each
//!   backed by a secondary index
//! - **Migrations** - Collection and index creation and teardown as atomic batches
//! - **Tolerant reads** - Documents written before a field existed still read back
//!
//! # Quick Start
//!
//! ```ignore
//! use menagerie::{prelude::*, bson::doc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let user = Model::builder("User")
//!         .field("email", ScalarField::new(Schema::String).unique())
//!         .field("password", ScalarField::hidden(Schema::String))
//!         .build()?;
//!
//!     let job = Model::builder("Job")
//!         .field("title", Schema::String)
//!         .field("owner", RefField::new(&user).reverse("jobs"))
//!         .build()?;
//!
//!     let client = InMemoryClient::builder()
//!         .config(ClientConfig::new("secret"))
//!         .build()
//!         .await?;
//!     client.deploy(&Deployment::new([user.clone(), job.clone()])).await?;
//!
//!     let database = Database::new(client);
//!     let alice = database
//!         .zoo(&user)
//!         .create(doc! { "email": "alice@example.com", "password": "hunter2" })
//!         .await?;
//!
//!     // `password` is admitted but never emitted.
//!     assert!(alice.get("password").is_none());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Reverse Models
//!
//! A relationship's reverse index can be listed through a derived model that owns no
//! storage of its own:
//!
//! ```ignore
//! let owners = user.reverse(&job, [("jobs", "owner")])?;
//! let listing = database.zoo(&owners).get(&user_id).await?;
//! ```
//!
//! # Clients
//!
//! - [`memory`] - In-memory client for development and testing

pub mod prelude;

pub use menagerie_core::{
    client, config, error, field, index, migrate, model, projection, query, schema, value,
    zoo,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory client implementations.
pub mod memory {
    pub use menagerie_memory::{InMemoryClient, InMemoryClientBuilder};
}
