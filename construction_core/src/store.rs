use std::sync::Arc;

use parking_lot::RwLock;

use crate::orders::{ConstructionOrder, OrderId};

/// Working set of active construction orders.
///
/// Cloning yields another handle onto the same set. Only the owning manager
/// mutates it (the mutators are crate-private); any number of readers on
/// other threads take snapshots. A reconciliation pass publishes its result
/// with a single write, so readers see either the previous tick or the new
/// one, never a mix.
#[derive(Debug, Clone, Default)]
pub struct ConstructionOrderStore {
    orders: Arc<RwLock<Vec<ConstructionOrder>>>,
}

impl ConstructionOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends without de-duplication.
    pub(crate) fn add(&self, order: ConstructionOrder) {
        self.orders.write().push(order);
    }

    /// Removes by identity; `None` when the order is not present.
    pub(crate) fn remove(&self, id: OrderId) -> Option<ConstructionOrder> {
        let mut guard = self.orders.write();
        let index = guard.iter().position(|order| order.id() == id)?;
        Some(guard.remove(index))
    }

    /// Applies `change` to the order with `id`. Returns `false` when absent.
    pub(crate) fn modify<F>(&self, id: OrderId, change: F) -> bool
    where
        F: FnOnce(&mut ConstructionOrder),
    {
        let mut guard = self.orders.write();
        match guard.iter_mut().find(|order| order.id() == id) {
            Some(order) => {
                change(order);
                true
            }
            None => false,
        }
    }

    /// Replaces the whole working set in one step.
    pub(crate) fn publish(&self, orders: Vec<ConstructionOrder>) {
        *self.orders.write() = orders;
    }

    /// Independent copy of the current members.
    pub fn snapshot(&self) -> Vec<ConstructionOrder> {
        self.orders.read().clone()
    }

    pub fn get(&self, id: OrderId) -> Option<ConstructionOrder> {
        self.orders
            .read()
            .iter()
            .find(|order| order.id() == id)
            .cloned()
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.read().iter().any(|order| order.id() == id)
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}
