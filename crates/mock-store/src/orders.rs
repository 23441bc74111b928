use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use order_core::{
    Delivery, DeliveryStatus, Order, OrderId, OrderStore, PdfKind, PdfRef, StoreError,
};

/// In-memory order store with an atomic platform counter.
#[derive(Clone, Default)]
pub struct MockOrderStore {
    counter: Arc<AtomicI64>,
    orders: Arc<Mutex<BTreeMap<String, Order>>>,
    next_doc: Arc<AtomicI64>,
}

impl MockOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of an order, for assertions.
    pub fn order(&self, id: &OrderId) -> Option<Order> {
        self.orders().get(&id.0).cloned()
    }

    /// All stored orders keyed by document id.
    pub fn all(&self) -> BTreeMap<String, Order> {
        self.orders()
    }

    fn orders(&self) -> BTreeMap<String, Order> {
        self.orders.lock().unwrap().clone()
    }

    fn with_order<T>(
        &self,
        id: &OrderId,
        mutate: impl FnOnce(&mut Order) -> T,
    ) -> Result<T, StoreError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::NotFound(id.0.clone()))?;
        Ok(mutate(order))
    }
}

#[async_trait]
impl OrderStore for MockOrderStore {
    async fn reserve_count(&self) -> Result<i64, StoreError> {
        Ok(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn insert_order(&self, order: &Order) -> Result<OrderId, StoreError> {
        let id = format!("doc-{}", self.next_doc.fetch_add(1, Ordering::SeqCst) + 1);
        self.orders.lock().unwrap().insert(id.clone(), order.clone());
        Ok(OrderId(id))
    }

    async fn find_by_count(&self, count: i64) -> Result<Option<(OrderId, Order)>, StoreError> {
        Ok(self
            .orders()
            .into_iter()
            .find(|(_, order)| order.platform_count == count)
            .map(|(id, order)| (OrderId(id), order)))
    }

    async fn find_by_count_and_email(
        &self,
        count: i64,
        email: &str,
    ) -> Result<Option<(OrderId, Order)>, StoreError> {
        Ok(self
            .orders()
            .into_iter()
            .find(|(_, order)| order.platform_count == count && order.client.email == email)
            .map(|(id, order)| (OrderId(id), order)))
    }

    async fn list_pending_payment(&self) -> Result<Vec<(OrderId, Order)>, StoreError> {
        Ok(self
            .orders()
            .into_iter()
            .filter(|(_, order)| order.payment_status.is_pending())
            .map(|(id, order)| (OrderId(id), order))
            .collect())
    }

    async fn mark_paid(&self, id: &OrderId, paid_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.with_order(id, |order| {
            order.payment_status = order_core::PaymentStatus::Paid;
            order.paid_at = Some(paid_at);
            order.updated_at = Some(paid_at);
        })
    }

    async fn set_delivery(&self, id: &OrderId, delivery: &Delivery) -> Result<(), StoreError> {
        self.with_order(id, |order| {
            order.delivery = Some(delivery.clone());
            order.updated_at = Some(delivery.initialized_at);
        })
    }

    async fn set_delivery_status(
        &self,
        id: &OrderId,
        status: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_order(id, |order| {
            let Some(delivery) = order.delivery.as_mut() else {
                return Err(StoreError::NotFound(format!("{} has no delivery", id)));
            };
            delivery.status = status;
            match status {
                DeliveryStatus::Shipped => delivery.shipped_at = Some(at),
                DeliveryStatus::Received => delivery.received_at = Some(at),
                DeliveryStatus::Pending => {}
            }
            order.updated_at = Some(at);
            Ok(())
        })?
    }

    async fn record_pdf(&self, id: &OrderId, kind: PdfKind, pdf: &PdfRef) -> Result<(), StoreError> {
        self.with_order(id, |order| {
            order.pdfs.insert(kind, pdf.clone());
            order.updated_at = Some(pdf.created_at);
        })
    }

    async fn mark_effect(&self, id: &OrderId, effect: &str) -> Result<(), StoreError> {
        self.with_order(id, |order| {
            order.effects.insert(effect.to_string());
        })
    }
}
