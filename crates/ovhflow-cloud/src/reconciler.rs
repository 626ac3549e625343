//! Resource reconciler trait definition

use crate::descriptor::ResourceData;
use crate::error::{CloudError, Result};
use async_trait::async_trait;

/// Create/Read/Delete for one resource kind
///
/// Every provider resource (instance, volume, ...) implements this trait.
/// `Context` is the provider handle (API client plus provider-wide
/// defaults) passed explicitly to every call.
///
/// Orchestrators should go through [`create_resource`], [`read_resource`]
/// and [`delete_resource`], which enforce the identity rules around the
/// raw operations.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Context: Send + Sync;

    /// Type name used by orchestrators (e.g. "ovh_cloud_instance")
    fn resource_type(&self) -> &'static str;

    /// Provision the object and set the identity and computed attributes
    async fn create(&self, ctx: &Self::Context, data: &mut ResourceData) -> Result<()>;

    /// Refresh computed attributes from the remote object
    async fn read(&self, ctx: &Self::Context, data: &mut ResourceData) -> Result<()>;

    /// Remove the remote object
    async fn delete(&self, ctx: &Self::Context, data: &mut ResourceData) -> Result<()>;
}

/// Run `create`, refusing descriptors that already carry an identity
pub async fn create_resource<R>(reconciler: &R, ctx: &R::Context, data: &mut ResourceData) -> Result<()>
where
    R: Reconciler + ?Sized,
{
    if let Some(id) = data.id() {
        return Err(CloudError::Validation(format!(
            "{} is already managed as {}",
            reconciler.resource_type(),
            id
        )));
    }

    tracing::info!(resource_type = reconciler.resource_type(), "Creating resource");
    reconciler.create(ctx, data).await?;

    let id = data.id().ok_or_else(|| {
        CloudError::Validation(format!(
            "{} create finished without assigning an identity",
            reconciler.resource_type()
        ))
    })?;
    tracing::info!(resource_type = reconciler.resource_type(), id, "Resource created");
    Ok(())
}

pub async fn read_resource<R>(reconciler: &R, ctx: &R::Context, data: &mut ResourceData) -> Result<()>
where
    R: Reconciler + ?Sized,
{
    require_identity(reconciler.resource_type(), data)?;
    reconciler.read(ctx, data).await
}

/// Run `delete` and clear the identity once the object is gone
pub async fn delete_resource<R>(reconciler: &R, ctx: &R::Context, data: &mut ResourceData) -> Result<()>
where
    R: Reconciler + ?Sized,
{
    let id = require_identity(reconciler.resource_type(), data)?;
    tracing::info!(resource_type = reconciler.resource_type(), %id, "Deleting resource");
    reconciler.delete(ctx, data).await?;
    data.clear_id();
    tracing::info!(resource_type = reconciler.resource_type(), %id, "Resource deleted");
    Ok(())
}

/// Remove the remote object left behind by a create that failed midway.
///
/// Such a descriptor has no identity, only the remote id attributes the
/// create recorded before giving up. Managed descriptors go through
/// [`delete_resource`] instead.
pub async fn discard_partial<R>(reconciler: &R, ctx: &R::Context, data: &mut ResourceData) -> Result<()>
where
    R: Reconciler + ?Sized,
{
    if let Some(id) = data.id() {
        return Err(CloudError::Validation(format!(
            "{} is managed as {}, delete it instead",
            reconciler.resource_type(),
            id
        )));
    }
    tracing::info!(resource_type = reconciler.resource_type(), "Deleting partially created resource");
    reconciler.delete(ctx, data).await
}

fn require_identity(resource_type: &str, data: &ResourceData) -> Result<String> {
    data.id().map(str::to_string).ok_or_else(|| {
        CloudError::Validation(format!("{} has no identity, it was never created", resource_type))
    })
}
