//! Shared building blocks for the INGRES assistant: configuration, the
//! error taxonomy, and the data model passed between pipeline stages.

pub mod config;
pub mod error;
pub mod filter;
pub mod record;
pub mod schema;

pub use config::IngresConfig;
pub use error::{IngresError, Result};
pub use filter::{FilterClause, Operator, QueryFilter};
pub use record::{DocumentId, ResultRecord, StoredDocument, ID_FIELD};
pub use schema::SchemaDescription;
