//! Convenient re-exports of commonly used types from menagerie.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use menagerie::prelude::*;
//! ```

pub use menagerie_core::{
    client::{Client, ClientBuilder, Database},
    config::ClientConfig,
    error::{ZooError, ZooResult},
    field::{
        Field, FieldDescriptor, ManyToManyField, RefField, ReverseField, Reversible,
        ScalarField,
    },
    migrate::{Deployment, Migrator},
    model::Model,
    query::{Expr, Q},
    schema::Schema,
    value::{Instance, Reference, from_instance},
    zoo::Zoo,
};
pub use menagerie_memory::{InMemoryClient, InMemoryClientBuilder};
