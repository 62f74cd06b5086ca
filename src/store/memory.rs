//! In-process store. Transactions are serialized behind one async mutex and
//! work on a copy of the state that replaces the shared one on commit.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::aggregates::{Order, Product, ProductId};
use crate::domain::value_objects::{Quantity, VariantKey};
use crate::store::{Store, StoreError, StoreTransaction};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<Uuid, Order>,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = MemoryState { products: products.into_iter().map(|p| (p.id, p)).collect(), orders: BTreeMap::new() };
        Self { state: Arc::new(Mutex::new(state)) }
    }
}

fn resolve(order: &Order, products: &BTreeMap<ProductId, Product>) -> Order {
    let mut order = order.clone();
    for item in &mut order.items {
        item.product = products.get(&item.product_id).map(Product::detail);
    }
    order
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn list_products(&self, featured_only: bool) -> Result<Vec<Product>, StoreError> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state.products.values().filter(|p| !featured_only || p.featured).cloned().collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn list_orders(&self, user_id: Option<&str>) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state.orders.values()
            .filter(|o| user_id.map_or(true, |u| o.user_id == u))
            .map(|o| resolve(o, &state.products))
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn take_stock(&mut self, id: ProductId, variant: Option<&VariantKey>, quantity: u32) -> Result<Option<Quantity>, StoreError> {
        Ok(self.working.products.get_mut(&id).and_then(|p| p.take_stock(variant, quantity)))
    }

    async fn put_stock(&mut self, id: ProductId, variant: Option<&VariantKey>, quantity: u32) -> Result<Option<Quantity>, StoreError> {
        Ok(self.working.products.get_mut(&id).and_then(|p| p.put_stock(variant, quantity)))
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        if self.working.products.contains_key(&product.id) {
            return Err(StoreError::Conflict);
        }
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn save_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.working.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        Ok(self.working.products.remove(&id).is_some())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.working.orders.get(&id).map(|o| resolve(o, &self.working.products)))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        if self.working.orders.contains_key(&order.id) || self.working.orders.values().any(|o| o.order_id == order.order_id) {
            return Err(StoreError::Conflict);
        }
        let mut stored = order.clone();
        stored.events.clear();
        stored.items.iter_mut().for_each(|i| i.product = None);
        self.working.orders.insert(order.id, stored);
        Ok(())
    }

    async fn save_order(&mut self, order: &Order) -> Result<(), StoreError> {
        let stored = self.working.orders.get_mut(&order.id).ok_or_else(|| StoreError::Corrupt(format!("order {} vanished", order.id)))?;
        stored.status = order.status;
        stored.admin_notes = order.admin_notes.clone();
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.working.orders.remove(&id).is_some())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::tests::simple_draft;

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let product = Product::create(simple_draft("Lamp", 10, 5)).unwrap();
        let id = product.id;
        let store = MemoryStore::with_products([product]);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.take_stock(id, None, 2).await.unwrap(), Some(Quantity::new(3)));
        drop(tx);
        assert_eq!(store.get_product(id).await.unwrap().unwrap().stock, Quantity::new(5));

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.take_stock(id, None, 6).await.unwrap(), None);
        assert_eq!(tx.take_stock(id, None, 5).await.unwrap(), Some(Quantity::ZERO));
        tx.commit().await.unwrap();
        assert_eq!(store.get_product(id).await.unwrap().unwrap().stock, Quantity::ZERO);
    }

    #[tokio::test]
    async fn test_featured_filter() {
        let mut featured = simple_draft("Drone", 199, 1);
        featured.featured = true;
        let store = MemoryStore::with_products([Product::create(featured).unwrap(), Product::create(simple_draft("Lamp", 10, 1)).unwrap()]);
        assert_eq!(store.list_products(true).await.unwrap().len(), 1);
        assert_eq!(store.list_products(false).await.unwrap().len(), 2);
    }
}
