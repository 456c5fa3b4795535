//! Resource factory capability
//!
//! One generic pool type driven entirely by this trait; each resource kind
//! (context, page) supplies its own implementation and the pool never knows
//! what it is holding.

use async_trait::async_trait;

use super::errors::PoolResult;

/// Knows how to create, validate, reset, and destroy one resource type.
#[async_trait]
pub trait ResourceFactory: Send + Sync + 'static {
    type Resource: Send + 'static;

    /// Create a fresh resource. Failures propagate to the borrower as
    /// creation errors.
    async fn make(&self) -> PoolResult<Self::Resource>;

    /// Prepare a resource immediately before it is handed to a borrower.
    /// An error destroys the resource and the pool tries another.
    async fn activate(&self, resource: &mut Self::Resource) -> PoolResult<()>;

    /// Reset a resource's side effects when it is returned. An error
    /// destroys the resource instead of re-idling it.
    async fn passivate(&self, resource: &mut Self::Resource) -> PoolResult<()>;

    /// Whether the resource is still fit to hand out.
    async fn validate(&self, resource: &Self::Resource) -> bool;

    /// Tear the resource down. Errors are logged by the pool and never
    /// interrupt a drain; the resource is considered gone regardless.
    async fn destroy(&self, resource: Self::Resource) -> PoolResult<()>;
}
