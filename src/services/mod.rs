//! Application services over the store.

pub mod catalog;
pub mod lifecycle;
pub mod reservation;
pub mod restoration;
pub mod seed;

pub use catalog::Catalog;
pub use lifecycle::{OrderDeletion, OrderLifecycle, OrderPatch};
pub use reservation::{PlaceOrder, ReservationEngine};
pub use restoration::{restore_stock, RestorationReport, SkipReason};

use crate::publisher::DynPublisher;
use crate::store::DynStore;

#[derive(Clone)]
pub struct Services {
    pub reservations: ReservationEngine,
    pub lifecycle: OrderLifecycle,
    pub catalog: Catalog,
}

impl Services {
    pub fn new(store: DynStore, publisher: DynPublisher, verify_totals: bool) -> Self {
        Self {
            reservations: ReservationEngine::new(store.clone(), publisher.clone(), verify_totals),
            lifecycle: OrderLifecycle::new(store.clone(), publisher.clone()),
            catalog: Catalog::new(store, publisher),
        }
    }
}
