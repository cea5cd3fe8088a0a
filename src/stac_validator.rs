use std::sync::Arc;

use crate::document::{AssetType, StacDocument};
use crate::error::{Result, ValidationError};
use crate::resolver::{core_schema_for, normalize_extension, resolve_extension_schema};
use crate::schema_engine::SchemaEngine;

/// Result of validating one document: the schemas consulted and the verdict
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub schemas: Vec<String>,
    pub result: Result<()>,
}

impl ValidationOutcome {
    pub fn valid(schemas: Vec<String>) -> Self {
        Self {
            schemas,
            result: Ok(()),
        }
    }

    pub fn invalid(schemas: Vec<String>, error: ValidationError) -> Self {
        Self {
            schemas,
            result: Err(error),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }
}

/// Core and extension validation of single STAC documents
#[derive(Clone)]
pub struct StacSchemaValidator {
    engine: Arc<SchemaEngine>,
}

impl StacSchemaValidator {
    pub fn new(engine: Arc<SchemaEngine>) -> Self {
        Self { engine }
    }

    /// Validate against the core schema for `asset_type` at `version`
    pub async fn validate_core(
        &self,
        document: &StacDocument,
        version: &str,
        asset_type: AssetType,
    ) -> ValidationOutcome {
        let address = core_schema_for(version, asset_type);
        let result = self
            .engine
            .validate(Arc::clone(&document.content), &address)
            .await;
        ValidationOutcome {
            schemas: vec![address],
            result,
        }
    }

    /// Validate an item against each declared extension schema, in order.
    ///
    /// Catalogs and collections fall back to their core schema. For items the
    /// core address leads the schema list but the core schema is not checked.
    pub async fn validate_extensions(
        &self,
        document: &StacDocument,
        version: &str,
        asset_type: AssetType,
    ) -> ValidationOutcome {
        if asset_type != AssetType::Item {
            return self.validate_core(document, version, asset_type).await;
        }

        let mut outcome = self.check_extensions(document, version).await;
        outcome
            .schemas
            .insert(0, core_schema_for(version, AssetType::Item));
        outcome
    }

    /// Core schema, then extension schemas for items
    pub async fn validate_default(
        &self,
        document: &StacDocument,
        version: &str,
        asset_type: AssetType,
    ) -> ValidationOutcome {
        let core = self.validate_core(document, version, asset_type).await;
        if !core.is_valid() || asset_type != AssetType::Item {
            return core;
        }

        let extensions = self.check_extensions(document, version).await;
        let mut schemas = core.schemas;
        schemas.extend(extensions.schemas);
        ValidationOutcome {
            schemas,
            result: extensions.result,
        }
    }

    /// Run the declared extension schemas of an item.
    ///
    /// The first schema violation stops the loop; any other failure is
    /// reported as an extension error. Only extension addresses are listed.
    async fn check_extensions(&self, document: &StacDocument, version: &str) -> ValidationOutcome {
        let mut schemas = Vec::new();
        for extension in document.extensions() {
            let address = resolve_extension_schema(version, normalize_extension(&extension));
            schemas.push(address.clone());

            if let Err(error) = self
                .engine
                .validate(Arc::clone(&document.content), &address)
                .await
            {
                tracing::debug!(
                    location = %document.location,
                    extension = %extension,
                    error = %error,
                    "Extension validation failed"
                );
                return ValidationOutcome::invalid(schemas, extension_failure(error));
            }
        }

        ValidationOutcome::valid(schemas)
    }

    /// Validate against a user-supplied schema URL or path
    pub async fn validate_custom(&self, document: &StacDocument, schema: &str) -> ValidationOutcome {
        let result = self
            .engine
            .validate(Arc::clone(&document.content), schema)
            .await;
        ValidationOutcome {
            schemas: vec![schema.to_string()],
            result,
        }
    }

    /// Validate a 0.7.0 item whose published core schema cannot be used as-is
    pub async fn validate_legacy_item(
        &self,
        document: &StacDocument,
        version: &str,
    ) -> ValidationOutcome {
        let address = core_schema_for(version, AssetType::Item);
        let result = self
            .engine
            .validate_patched(Arc::clone(&document.content), &address)
            .await;
        ValidationOutcome {
            schemas: vec![address],
            result,
        }
    }
}

fn extension_failure(error: ValidationError) -> ValidationError {
    if error.is_schema_violation() {
        error
    } else {
        ValidationError::Generic(format!("{}. Error in Extensions.", error))
    }
}
