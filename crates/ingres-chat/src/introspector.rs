//! Startup schema inference from a single sampled document.

use tracing::{info, warn};

use ingres_core::schema::SchemaDescription;
use ingres_storage::DocumentStore;

/// Describe the collection's fields by sampling one document.
///
/// Never fails: an empty collection or a store fault yields a placeholder
/// description that is embedded in prompts as-is.
pub fn describe_schema(store: &dyn DocumentStore) -> SchemaDescription {
    match store.sample_one() {
        Ok(Some(doc)) => {
            let schema = SchemaDescription::from_sample(&doc.fields);
            info!(fields = schema.field_count(), "Schema inferred from sample document");
            schema
        }
        Ok(None) => {
            warn!("Collection is empty, schema unavailable");
            SchemaDescription::empty_collection()
        }
        Err(e) => {
            warn!(error = %e, "Could not sample collection for schema");
            SchemaDescription::unavailable()
        }
    }
}
