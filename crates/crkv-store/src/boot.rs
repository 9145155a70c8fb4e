//! Idempotent provisioning of the namespace and the backing document.

use std::sync::Arc;

use crkv_backend::{DocumentApi, ResourceTypeRegistrar};
use crkv_types::{ResourceType, StorageDocument};
use tracing::{debug, info};

use crate::backoff::{retry, RetryError, RetryPolicy};
use crate::config::StoreConfig;
use crate::context::Context;
use crate::error::{Op, StoreError, StoreResult};

/// Brings the control plane to a state where store operations are valid.
///
/// Running it again, from this or any other process, is a no-op: existing
/// namespaces and documents are left untouched.
pub struct Bootstrapper {
    api: Arc<dyn DocumentApi>,
    config: StoreConfig,
}

impl Bootstrapper {
    pub fn new(config: StoreConfig, api: Arc<dyn DocumentApi>) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self { api, config })
    }

    /// Create the namespace, then the empty backing document.
    ///
    /// Namespace creation is attempted once. Document creation is retried
    /// under the configured policy; "already exists" ends either step
    /// successfully.
    pub async fn boot(&self, ctx: &Context) -> StoreResult<()> {
        let document = self.config.document();

        match ctx.run(self.api.create_namespace(&document.namespace)).await {
            Err(reason) => return Err(StoreError::interrupted(Op::Boot, None, reason)),
            Ok(Ok(())) => info!(namespace = %document.namespace, "namespace created"),
            Ok(Err(e)) if e.is_already_exists() => {
                debug!(namespace = %document.namespace, "namespace already exists");
            }
            Ok(Err(e)) => {
                return Err(StoreError::Backend {
                    op: Op::Boot,
                    key: None,
                    source: e,
                })
            }
        }

        let empty = StorageDocument::empty(&document, &self.config.resource_type);
        let api = &self.api;
        let empty = &empty;
        let created = retry(ctx, &self.config.retry, "create document", || async move {
            match api.create_document(empty).await {
                Ok(_) => Ok(true),
                Err(e) if e.is_already_exists() => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(|e| boot_failure(Op::Boot, e))?;

        if created {
            info!(document = %document, "backing document created");
        } else {
            debug!(document = %document, "backing document already exists");
        }
        Ok(())
    }
}

/// Register the document's resource type, retrying under `policy`.
///
/// Registration is a precondition of [`Bootstrapper::boot`] that the
/// embedding application runs first.
pub async fn ensure_resource_type(
    ctx: &Context,
    registrar: &dyn ResourceTypeRegistrar,
    resource_type: &ResourceType,
    policy: &RetryPolicy,
) -> StoreResult<()> {
    retry(ctx, policy, "register resource type", || {
        registrar.ensure_registered(resource_type)
    })
    .await
    .map_err(|e| boot_failure(Op::RegisterResourceType, e))?;
    info!(resource_type = %resource_type.qualified_name(), "resource type registered");
    Ok(())
}

fn boot_failure(op: Op, err: RetryError<crkv_backend::BackendError>) -> StoreError {
    match err {
        RetryError::Exhausted { last, .. } => StoreError::Backend {
            op,
            key: None,
            source: last,
        },
        RetryError::Interrupted { reason, .. } => StoreError::interrupted(op, None, reason),
    }
}
