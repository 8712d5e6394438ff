//! In-memory database client for menagerie.
//!
//! This crate provides a thread-safe implementation of the `Client` trait that
//! evaluates query expressions against documents held in memory. It is meant for
//! development and tests, where deploying models and running the compiled queries
//! should behave like the hosted database without a network.
//!
//! # Features
//!
//! - **Atomic queries** - every expression commits entirely or not at all
//! - **Secondary indexes** - terms, sorted values and unique constraints
//! - **Pagination** - `Paginate` yields pages of at most 64 entries by default
//!
//! # Quick Start
//!
//! ```ignore
//! use menagerie::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let user = Model::builder("User")
//!         .field("name", Schema::String)
//!         .build()?;
//!
//!     let client = InMemoryClient::builder()
//!         .config(ClientConfig::from_env()?)
//!         .build()
//!         .await?;
//!     client.deploy(&Deployment::new([user.clone()])).await?;
//!
//!     let database = Database::new(client);
//!     let created = database
//!         .zoo(&user)
//!         .create(bson::doc! { "name": "Alice" })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as menagerie_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryClient, InMemoryClientBuilder};
