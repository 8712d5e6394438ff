//! A query and schema compiler for document databases with secondary indexes.
//!
//! Models describe named entities made of typed fields and relationships. This crate
//! compiles them into:
//!
//! - **Migration statements** ([`model`], [`migrate`]) - collection and index creation
//!   and teardown batches
//! - **Read queries** ([`projection`]) - expressions that rebuild emitted instances from
//!   stored documents, resolving related entities
//! - **Write queries** ([`zoo`]) - validated creates, partial updates and deletes
//!
//! Supporting modules:
//!
//! - **Fields** ([`field`]) - scalar, reference, many-to-many and reverse fields
//! - **Schemas** ([`schema`]) - admit and emit validation
//! - **Expressions** ([`query`]) - the query language tree handed to a client
//! - **Index shapes** ([`index`]) - index definitions and sort resolution
//! - **Client seam** ([`client`]) - the trait a database implements
//! - **Configuration** ([`config`]) - credentials and endpoints
//! - **Error handling** ([`error`]) - error types and result types
//!
//! # Example
//!
//! ```ignore
//! use menagerie_core::{field::{RefField, ScalarField}, model::Model, schema::Schema};
//!
//! let user = Model::builder("User")
//!     .field("email", ScalarField::new(Schema::String).unique())
//!     .build()?;
//!
//! let job = Model::builder("Job")
//!     .field("title", Schema::String)
//!     .field("owner", RefField::new(&user).reverse("jobs"))
//!     .build()?;
//!
//! let statements = job.construct();
//! ```

#[allow(unused_extern_crates)]
extern crate self as menagerie_core;

pub mod client;
pub mod config;
pub mod error;
pub mod field;
pub mod index;
pub mod migrate;
pub mod model;
pub mod projection;
pub mod query;
pub mod schema;
pub mod value;
pub mod zoo;
