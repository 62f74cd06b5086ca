//! Stock Reservation Engine
//!
//! Turns a cart into a `pending` order. The products a cart touches are
//! locked, every line is checked against the locked stock, and only then are
//! the counters decremented. Decrements and the order insert share one store
//! transaction, so a failure at any point leaves inventory untouched.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument};
use validator::Validate;

use crate::domain::aggregates::{Cart, CartLine, DeliveryAddress, LineItem, NewOrder, Order, Product, ProductId, StockTarget};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{PaymentMethod, VariantKey};
use crate::identity::Caller;
use crate::publisher::{publish_all, DynPublisher};
use crate::store::{DynStore, StoreTransaction};
use crate::{EcommerceError, Result};

/// `POST /api/orders` body.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    pub user_id: String,
    /// Falls back to the caller's `x-user-email` when blank.
    #[serde(default)]
    pub user_email: String,
    pub items: Vec<CartLine>,
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
}

#[derive(Clone)]
pub struct ReservationEngine {
    store: DynStore,
    publisher: DynPublisher,
    verify_totals: bool,
}

/// A cart line matched to the counter it draws on.
struct Reservation<'a> {
    line: &'a CartLine,
    product: &'a Product,
    target: StockTarget,
}

impl ReservationEngine {
    pub fn new(store: DynStore, publisher: DynPublisher, verify_totals: bool) -> Self {
        Self { store, publisher, verify_totals }
    }

    #[instrument(skip_all, fields(user_id = %request.user_id, lines = request.items.len()))]
    pub async fn place_order(&self, caller: &Caller, request: PlaceOrder) -> Result<Order> {
        caller.authorize_placement(&request.user_id)?;
        let user_email = Some(request.user_email.trim())
            .filter(|email| !email.is_empty())
            .or_else(|| caller.email_for(&request.user_id))
            .map(str::to_string)
            .ok_or_else(|| EcommerceError::validation("User email is required"))?;
        if request.total_amount.is_sign_negative() {
            return Err(EcommerceError::validation("Total amount must not be negative"));
        }
        let cart = Cart::from_lines(request.items)?;
        let delivery_address = request.delivery_address.normalized();
        delivery_address.validate()?;

        let mut tx = self.store.begin().await?;
        let products = lock_products(&mut *tx, &cart).await?;
        let plan = plan_reservations(&cart, &products)?;

        let items: Vec<LineItem> = plan.iter().map(snapshot).collect();
        let items_total = LineItem::sum(&items)?;
        if self.verify_totals && items_total.round_dp(2) != request.total_amount.round_dp(2) {
            return Err(EcommerceError::validation(format!(
                "Total amount {} does not match the order items total {}",
                request.total_amount.round_dp(2), items_total.round_dp(2)
            )));
        }

        let mut events: Vec<DomainEvent> = Vec::with_capacity(plan.len() + 1);
        for r in &plan {
            let variant = r.target.variant.as_ref();
            let remaining = tx.take_stock(r.target.product_id, variant, r.line.quantity).await?
                .ok_or_else(|| EcommerceError::InsufficientStock { item: r.product.label(variant), available: r.target.available.value() })?;
            info!(product = %r.product.label(variant), quantity = r.line.quantity, %remaining, "reserved stock");
            events.push(ProductEvent::StockReserved {
                product_id: r.target.product_id, variant: r.target.variant.clone(), quantity: r.line.quantity, remaining: remaining.value(),
            }.into());
        }

        let mut order = Order::place(NewOrder {
            user_id: request.user_id, user_email, items, delivery_address,
            payment_method: request.payment_method, total_amount: request.total_amount,
        });
        tx.insert_order(&order).await?;
        tx.commit().await?;

        info!(order_id = %order.order_id, total = %order.total_amount, "order placed");
        events.extend(order.take_events());
        publish_all(self.publisher.as_ref(), events).await;
        Ok(order)
    }
}

/// Locks every product in the cart, in ascending id order.
async fn lock_products(tx: &mut dyn StoreTransaction, cart: &Cart) -> Result<BTreeMap<ProductId, Product>> {
    let mut products = BTreeMap::new();
    for id in cart.product_ids() {
        let product = tx.lock_product(id).await?.ok_or_else(|| {
            let described = cart.lines().iter().find(|l| l.product_id == id).map_or_else(|| id.to_string(), CartLine::describe);
            EcommerceError::ProductNotFound(described)
        })?;
        products.insert(id, product);
    }
    Ok(products)
}

/// Checks every line before anything is decremented. Lines drawing on the
/// same counter are checked against their combined quantity.
fn plan_reservations<'a>(cart: &'a Cart, products: &'a BTreeMap<ProductId, Product>) -> Result<Vec<Reservation<'a>>> {
    let mut demand: HashMap<(ProductId, Option<VariantKey>), u32> = HashMap::new();
    let mut plan = Vec::with_capacity(cart.lines().len());

    for line in cart.lines() {
        let product = products.get(&line.product_id).ok_or_else(|| EcommerceError::ProductNotFound(line.describe()))?;
        let (size, color) = (line.selected_size.as_deref(), line.selected_color.as_deref());
        let key = product.has_variants.then(|| VariantKey::from_selection(size, color)).flatten();

        let requested = demand.entry((product.id, key)).or_default();
        *requested = requested.saturating_add(line.quantity);
        let target = product.reservation_target(size, color, *requested)?;
        plan.push(Reservation { line, product, target });
    }
    Ok(plan)
}

/// Name, price and image come from the locked product, never from the client.
fn snapshot(r: &Reservation<'_>) -> LineItem {
    LineItem {
        product_id: r.product.id,
        name: r.product.name.clone(),
        price: r.product.price,
        quantity: r.line.quantity,
        image: r.product.image.clone(),
        selected_size: r.line.selected_size.clone(),
        selected_color: r.line.selected_color.clone(),
        product: Some(r.product.detail()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::address;
    use crate::domain::aggregates::product::tests::{simple_draft, variant_draft};
    use crate::domain::value_objects::Quantity;
    use crate::publisher::{LogPublisher, MockEventPublisher};
    use crate::store::{MemoryStore, Store};
    use std::sync::Arc;

    fn request(items: Vec<CartLine>, total: Decimal) -> PlaceOrder {
        PlaceOrder {
            user_id: "user_1".into(), user_email: "ada@example.com".into(), items,
            delivery_address: address(), payment_method: PaymentMethod::Cod, total_amount: total,
        }
    }

    fn engine(store: &MemoryStore) -> ReservationEngine {
        ReservationEngine::new(Arc::new(store.clone()), Arc::new(LogPublisher), true)
    }

    #[tokio::test]
    async fn test_snapshots_come_from_the_product() {
        let lamp = Product::create(simple_draft("Lamp", 10, 5)).unwrap();
        let store = MemoryStore::with_products([lamp.clone()]);
        let mut line = CartLine::new(lamp.id, 2);
        line.name = Some("Client says Chandelier".into());

        let order = engine(&store).place_order(&Caller::user("user_1"), request(vec![line], Decimal::new(20, 0))).await.unwrap();
        assert_eq!(order.items[0].name, "Lamp");
        assert_eq!(order.items[0].price, Decimal::new(10, 0));
        assert_eq!(order.items[0].product.as_ref().map(|p| p.id), Some(lamp.id));
        assert_eq!(store.get_product(lamp.id).await.unwrap().unwrap().stock, Quantity::new(3));
    }

    #[tokio::test]
    async fn test_combined_demand_on_one_variant() {
        let tee = Product::create(variant_draft("Tee", &["M"], &["Red"], &[("M", "Red", 3)])).unwrap();
        let store = MemoryStore::with_products([tee.clone()]);
        let lines = vec![CartLine::new(tee.id, 2).with_variant("M", "Red"), CartLine::new(tee.id, 2).with_variant(" M ", "Red")];

        let err = engine(&store).place_order(&Caller::user("user_1"), request(lines, Decimal::new(100, 0))).await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient stock for Tee (M, Red). Available: 3");
        let tee = store.get_product(tee.id).await.unwrap().unwrap();
        assert_eq!(tee.variant(&VariantKey::new("M", "Red")).unwrap().stock, Quantity::new(3));
    }

    #[tokio::test]
    async fn test_total_mismatch_rejected_only_when_verifying() {
        let lamp = Product::create(simple_draft("Lamp", 10, 5)).unwrap();
        let store = MemoryStore::with_products([lamp.clone()]);
        let lines = vec![CartLine::new(lamp.id, 1)];

        let err = engine(&store).place_order(&Caller::user("user_1"), request(lines.clone(), Decimal::new(1, 0))).await.unwrap_err();
        assert!(matches!(err, EcommerceError::Validation(_)));

        let lenient = ReservationEngine::new(Arc::new(store.clone()), Arc::new(LogPublisher), false);
        let order = lenient.place_order(&Caller::user("user_1"), request(lines, Decimal::new(1, 0))).await.unwrap();
        assert_eq!(order.total_amount, Decimal::new(1, 0));
    }

    #[tokio::test]
    async fn test_total_out_of_range_is_a_validation_error() {
        let mut draft = simple_draft("Yacht", 0, 1_000_000_000);
        draft.price = Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0);
        let yacht = Product::create(draft).unwrap();
        let store = MemoryStore::with_products([yacht.clone()]);

        let err = engine(&store).place_order(&Caller::user("user_1"), request(vec![CartLine::new(yacht.id, 1_000_000_000)], Decimal::ONE)).await.unwrap_err();
        assert_eq!(err.to_string(), "Order total out of range");
        assert_eq!(store.get_product(yacht.id).await.unwrap().unwrap().stock, Quantity::new(1_000_000_000));
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_email_falls_back_to_the_caller() {
        let lamp = Product::create(simple_draft("Lamp", 10, 5)).unwrap();
        let store = MemoryStore::with_products([lamp.clone()]);
        let caller = Caller { email: Some("ada@analytical.org".into()), ..Caller::user("user_1") };
        let mut blank = request(vec![CartLine::new(lamp.id, 1)], Decimal::new(10, 0));
        blank.user_email = "  ".into();

        let order = engine(&store).place_order(&caller, blank.clone()).await.unwrap();
        assert_eq!(order.user_email, "ada@analytical.org");

        let err = engine(&store).place_order(&Caller::user("user_1"), blank).await.unwrap_err();
        assert_eq!(err.to_string(), "User email is required");
    }

    #[tokio::test]
    async fn test_events_published_after_commit() {
        let lamp = Product::create(simple_draft("Lamp", 10, 5)).unwrap();
        let store = MemoryStore::with_products([lamp.clone()]);
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().withf(|e| e.subject() == "storefront.products.stock_reserved").times(1).return_const(());
        publisher.expect_publish().withf(|e| e.subject() == "storefront.orders.placed").times(1).return_const(());

        let engine = ReservationEngine::new(Arc::new(store), Arc::new(publisher), true);
        engine.place_order(&Caller::user("user_1"), request(vec![CartLine::new(lamp.id, 1)], Decimal::new(10, 0))).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_placement_publishes_nothing() {
        let lamp = Product::create(simple_draft("Lamp", 10, 1)).unwrap();
        let store = MemoryStore::with_products([lamp.clone()]);
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish().never();

        let engine = ReservationEngine::new(Arc::new(store), Arc::new(publisher), true);
        let err = engine.place_order(&Caller::user("user_1"), request(vec![CartLine::new(lamp.id, 2)], Decimal::new(20, 0))).await.unwrap_err();
        assert!(matches!(err, EcommerceError::InsufficientStock { available: 1, .. }));
    }

    #[tokio::test]
    async fn test_placing_for_someone_else_is_forbidden() {
        let store = MemoryStore::new();
        let err = engine(&store).place_order(&Caller::user("user_2"), request(vec![], Decimal::ZERO)).await.unwrap_err();
        assert!(matches!(err, EcommerceError::Forbidden));
    }
}
