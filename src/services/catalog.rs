//! Product catalog. Plain CRUD; every write is admin-only.

use tracing::{info, instrument};

use crate::domain::aggregates::{Product, ProductDraft, ProductId};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::identity::AdminGrant;
use crate::publisher::{publish_all, DynPublisher};
use crate::store::DynStore;
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct Catalog {
    store: DynStore,
    publisher: DynPublisher,
}

impl Catalog {
    pub fn new(store: DynStore, publisher: DynPublisher) -> Self { Self { store, publisher } }

    pub async fn list(&self, featured_only: bool) -> Result<Vec<Product>> {
        Ok(self.store.list_products(featured_only).await?)
    }

    pub async fn get(&self, id: ProductId) -> Result<Product> {
        self.store.get_product(id).await?.ok_or_else(|| EcommerceError::ProductNotFound(id.to_string()))
    }

    #[instrument(skip(self, _grant, draft), fields(name = %draft.name))]
    pub async fn create(&self, _grant: &AdminGrant, draft: ProductDraft) -> Result<Product> {
        let product = Product::create(draft)?;
        let mut tx = self.store.begin().await?;
        tx.insert_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %product.id, "product created");
        self.publisher.publish(&ProductEvent::Created { product_id: product.id }.into()).await;
        Ok(product)
    }

    /// Full replacement. Identity and `createdAt` survive.
    #[instrument(skip(self, _grant, draft))]
    pub async fn update(&self, _grant: &AdminGrant, id: ProductId, draft: ProductDraft) -> Result<Product> {
        let mut tx = self.store.begin().await?;
        let mut product = tx.lock_product(id).await?.ok_or_else(|| EcommerceError::ProductNotFound(id.to_string()))?;
        product.apply(draft)?;
        tx.save_product(&product).await?;
        tx.commit().await?;

        info!(product_id = %id, "product updated");
        self.publisher.publish(&ProductEvent::Updated { product_id: id }.into()).await;
        Ok(product)
    }

    /// Replaces the whole catalog with `drafts`. Orders keep their snapshots.
    #[instrument(skip(self, _grant, drafts), fields(count = drafts.len()))]
    pub async fn seed(&self, _grant: &AdminGrant, drafts: Vec<ProductDraft>) -> Result<Vec<Product>> {
        let products = drafts.into_iter().map(Product::create).collect::<Result<Vec<_>>>()?;
        let existing = self.store.list_products(false).await?;

        let mut tx = self.store.begin().await?;
        let mut removed = Vec::with_capacity(existing.len());
        for product in &existing {
            if tx.delete_product(product.id).await? {
                removed.push(product.id);
            }
        }
        for product in &products {
            tx.insert_product(product).await?;
        }
        tx.commit().await?;

        info!(removed = removed.len(), seeded = products.len(), "catalog seeded");
        let events: Vec<DomainEvent> = removed.into_iter().map(|product_id| ProductEvent::Deleted { product_id }.into())
            .chain(products.iter().map(|p| ProductEvent::Created { product_id: p.id }.into()))
            .collect();
        publish_all(self.publisher.as_ref(), events).await;
        Ok(products)
    }

    /// Past orders keep their snapshots of a deleted product.
    #[instrument(skip(self, _grant))]
    pub async fn delete(&self, _grant: &AdminGrant, id: ProductId) -> Result<()> {
        let mut tx = self.store.begin().await?;
        if !tx.delete_product(id).await? {
            return Err(EcommerceError::ProductNotFound(id.to_string()));
        }
        tx.commit().await?;

        info!(product_id = %id, "product deleted");
        self.publisher.publish(&ProductEvent::Deleted { product_id: id }.into()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::{simple_draft, variant_draft};
    use crate::identity::Caller;
    use crate::publisher::LogPublisher;
    use crate::services::seed::sample_catalog;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn catalog() -> Catalog {
        Catalog::new(Arc::new(MemoryStore::new()), Arc::new(LogPublisher))
    }

    #[tokio::test]
    async fn test_update_keeps_identity() {
        let catalog = catalog();
        let grant = Caller::admin_user("admin").admin().unwrap();
        let created = catalog.create(&grant, simple_draft("Lamp", 10, 5)).await.unwrap();

        let updated = catalog.update(&grant, created.id, variant_draft("Lamp", &["S"], &["Red"], &[("S", "Red", 2)])).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.has_variants);
        assert_eq!(catalog.get(created.id).await.unwrap().variants.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_products() {
        let catalog = catalog();
        let grant = Caller::admin_user("admin").admin().unwrap();
        let id = uuid::Uuid::now_v7();
        assert!(matches!(catalog.get(id).await, Err(EcommerceError::ProductNotFound(_))));
        assert!(matches!(catalog.update(&grant, id, simple_draft("Lamp", 1, 1)).await, Err(EcommerceError::ProductNotFound(_))));
        assert!(matches!(catalog.delete(&grant, id).await, Err(EcommerceError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_seed_replaces_the_catalog() {
        let catalog = catalog();
        let grant = Caller::admin_user("admin").admin().unwrap();
        let old = catalog.create(&grant, simple_draft("Lamp", 10, 5)).await.unwrap();

        let seeded = catalog.seed(&grant, sample_catalog()).await.unwrap();
        assert_eq!(seeded.len(), 6);
        assert!(matches!(catalog.get(old.id).await, Err(EcommerceError::ProductNotFound(_))));
        assert_eq!(catalog.list(false).await.unwrap().len(), 6);
        assert_eq!(catalog.list(true).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_seed_with_a_bad_draft_keeps_the_old_catalog() {
        let catalog = catalog();
        let grant = Caller::admin_user("admin").admin().unwrap();
        catalog.create(&grant, simple_draft("Lamp", 10, 5)).await.unwrap();

        let mut drafts = sample_catalog();
        drafts[2].name = String::new();
        assert!(catalog.seed(&grant, drafts).await.is_err());
        assert_eq!(catalog.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_draft_is_not_stored() {
        let catalog = catalog();
        let grant = Caller::admin_user("admin").admin().unwrap();
        assert!(catalog.create(&grant, simple_draft("", 10, 5)).await.is_err());
        assert!(catalog.list(false).await.unwrap().is_empty());
    }
}
