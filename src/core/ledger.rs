use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use crate::error::AppError;
use crate::models::account::{Account, Role};
use crate::models::order::{Order, OrderStatus, STATUS_SEQUENCE};
use crate::models::session::Principal;
use crate::store::{load_or_default, save, BlobStore, ORDERS_KEY};

/// Whether lifecycle transitions may fire on orders already in a terminal
/// state. Permissive applies no guard at all; Strict rejects
/// assign/advance on Delivered or Cancelled orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

/// Owns all order records and their transitions. Every mutation is a
/// whole-collection read, an in-place record replace, and a write back,
/// serialized by an internal lock.
pub struct OrderLedger {
    store: Arc<dyn BlobStore>,
    write_lock: Mutex<()>,
    next_id: AtomicU64,
    policy: TransitionPolicy,
}

impl OrderLedger {
    /// Seeds the id counter above the highest persisted id so restarts
    /// never reissue an id.
    pub fn new(store: Arc<dyn BlobStore>, policy: TransitionPolicy) -> Result<Self, AppError> {
        let orders: Vec<Order> = load_or_default(store.as_ref(), ORDERS_KEY)?;
        let max_id = orders.iter().map(|o| o.id).max().unwrap_or(0);

        Ok(Self {
            store,
            write_lock: Mutex::new(()),
            next_id: AtomicU64::new(max_id + 1),
            policy,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, AppError> {
        self.write_lock
            .lock()
            .map_err(|_| AppError::Internal("ledger lock poisoned".to_string()))
    }

    fn orders(&self) -> Result<Vec<Order>, AppError> {
        load_or_default(self.store.as_ref(), ORDERS_KEY)
    }

    pub fn create(
        &self,
        principal: &Principal,
        quantity: u32,
        address: &str,
    ) -> Result<Order, AppError> {
        if principal.role != Role::Customer {
            return Err(AppError::Forbidden(
                "only customers can place orders".to_string(),
            ));
        }
        if quantity == 0 {
            return Err(AppError::BadRequest("quantity must be > 0".to_string()));
        }
        let address = address.trim();
        if address.is_empty() {
            return Err(AppError::BadRequest("address is required".to_string()));
        }

        let _guard = self.lock()?;
        let order = Order {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            customer_username: principal.username.clone(),
            customer_display_name: principal.display_name.clone(),
            quantity,
            address: address.to_string(),
            status: OrderStatus::Pending,
            assigned_to: None,
            created_at: Utc::now(),
        };

        let mut orders = self.orders()?;
        orders.push(order.clone());
        save(self.store.as_ref(), ORDERS_KEY, &orders)?;

        info!(order_id = order.id, customer = %order.customer_username, "order created");
        Ok(order)
    }

    pub fn find_by_customer(&self, username: &str) -> Result<Vec<Order>, AppError> {
        let mut mine: Vec<Order> = self
            .orders()?
            .into_iter()
            .filter(|o| o.customer_username == username)
            .collect();
        sort_newest_first(&mut mine);
        Ok(mine)
    }

    pub fn find_all(&self) -> Result<Vec<Order>, AppError> {
        let mut all = self.orders()?;
        sort_newest_first(&mut all);
        Ok(all)
    }

    pub fn find_by_assignee(&self, delivery_username: &str) -> Result<Vec<Order>, AppError> {
        let mut mine: Vec<Order> = self
            .orders()?
            .into_iter()
            .filter(|o| o.assigned_to.as_deref() == Some(delivery_username))
            .collect();
        sort_newest_first(&mut mine);
        Ok(mine)
    }

    /// Sets the assignee and forces status to Assigned. The assignee must
    /// be a registered delivery account.
    pub fn assign(
        &self,
        principal: &Principal,
        order_id: u64,
        assignee: &Account,
    ) -> Result<Order, AppError> {
        if principal.role != Role::Vendor {
            return Err(AppError::Forbidden(
                "only vendors can assign orders".to_string(),
            ));
        }
        if assignee.role != Role::Delivery {
            return Err(AppError::BadRequest(format!(
                "{} is not a delivery account",
                assignee.username
            )));
        }

        let assignee_username = assignee.username.clone();
        let order = self.mutate(order_id, |order| {
            order.assigned_to = Some(assignee_username);
            order.status = OrderStatus::Assigned;
            Ok(())
        })?;

        info!(order_id, assignee = %assignee.username, "order assigned");
        Ok(order)
    }

    /// Moves the status one step along the fixed sequence, clamped at
    /// Delivered. A status outside the sequence (Cancelled) restarts at
    /// index 0 and therefore steps to Assigned under the permissive
    /// policy.
    pub fn advance_status(&self, principal: &Principal, order_id: u64) -> Result<Order, AppError> {
        if principal.role != Role::Vendor {
            return Err(AppError::Forbidden(
                "only vendors can advance order status".to_string(),
            ));
        }

        let order = self.mutate(order_id, |order| {
            let idx = STATUS_SEQUENCE
                .iter()
                .position(|s| *s == order.status)
                .unwrap_or(0);
            let next = (idx + 1).min(STATUS_SEQUENCE.len() - 1);
            order.status = STATUS_SEQUENCE[next];
            Ok(())
        })?;

        info!(order_id, status = ?order.status, "order status advanced");
        Ok(order)
    }

    /// Only the owning customer may cancel, and only while Pending.
    pub fn cancel(&self, principal: &Principal, order_id: u64) -> Result<Order, AppError> {
        if principal.role != Role::Customer {
            return Err(AppError::Forbidden(
                "only customers can cancel orders".to_string(),
            ));
        }

        let username = principal.username.clone();
        let order = self.mutate_unguarded(order_id, |order| {
            if order.customer_username != username {
                return Err(AppError::Forbidden(
                    "only the owning customer can cancel this order".to_string(),
                ));
            }
            if order.status != OrderStatus::Pending {
                return Err(AppError::Conflict(format!(
                    "order {order_id} is not pending"
                )));
            }
            order.status = OrderStatus::Cancelled;
            Ok(())
        })?;

        info!(order_id, "order cancelled");
        Ok(order)
    }

    /// Only the assigned delivery principal may mark delivery.
    pub fn mark_delivered(&self, principal: &Principal, order_id: u64) -> Result<Order, AppError> {
        if principal.role != Role::Delivery {
            return Err(AppError::Forbidden(
                "only delivery accounts can mark orders delivered".to_string(),
            ));
        }

        let username = principal.username.clone();
        let order = self.mutate_unguarded(order_id, |order| {
            if order.assigned_to.as_deref() != Some(username.as_str()) {
                return Err(AppError::Forbidden(
                    "order is not assigned to this delivery account".to_string(),
                ));
            }
            order.status = OrderStatus::Delivered;
            Ok(())
        })?;

        info!(order_id, "order delivered");
        Ok(order)
    }

    /// Replace-by-id with the terminal-state guard applied under the
    /// strict policy.
    fn mutate<F>(&self, order_id: u64, apply: F) -> Result<Order, AppError>
    where
        F: FnOnce(&mut Order) -> Result<(), AppError>,
    {
        let policy = self.policy;
        self.mutate_unguarded(order_id, |order| {
            if policy == TransitionPolicy::Strict && order.status.is_terminal() {
                return Err(AppError::Conflict(format!(
                    "order {order_id} is already {:?}",
                    order.status
                )));
            }
            apply(order)
        })
    }

    fn mutate_unguarded<F>(&self, order_id: u64, apply: F) -> Result<Order, AppError>
    where
        F: FnOnce(&mut Order) -> Result<(), AppError>,
    {
        let _guard = self.lock()?;
        let mut orders = self.orders()?;
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        apply(order)?;
        let updated = order.clone();
        save(self.store.as_ref(), ORDERS_KEY, &orders)?;
        Ok(updated)
    }
}

fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn principal(username: &str, role: Role) -> Principal {
        Principal {
            username: username.to_string(),
            role,
            display_name: username.to_string(),
        }
    }

    fn delivery_account(username: &str) -> Account {
        Account {
            username: username.to_string(),
            password: "pw".to_string(),
            role: Role::Delivery,
            display_name: username.to_string(),
        }
    }

    fn ledger() -> OrderLedger {
        OrderLedger::new(Arc::new(MemoryStore::new()), TransitionPolicy::Permissive).unwrap()
    }

    fn strict_ledger() -> OrderLedger {
        OrderLedger::new(Arc::new(MemoryStore::new()), TransitionPolicy::Strict).unwrap()
    }

    #[test]
    fn create_starts_pending_and_unassigned() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);

        ledger.create(&alice, 3, "1 Main St").unwrap();

        let mine = ledger.find_by_customer("alice").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].quantity, 3);
        assert_eq!(mine[0].status, OrderStatus::Pending);
        assert!(mine[0].assigned_to.is_none());
    }

    #[test]
    fn create_rejects_non_customers() {
        let ledger = ledger();
        let vendor = principal("vendor", Role::Vendor);

        let err = ledger.create(&vendor, 1, "1 Main St").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn create_validates_quantity_and_address() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);

        assert!(ledger.create(&alice, 0, "1 Main St").is_err());
        assert!(ledger.create(&alice, 1, "   ").is_err());
    }

    #[test]
    fn successive_creates_get_distinct_ids() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);

        let first = ledger.create(&alice, 1, "1 Main St").unwrap();
        let second = ledger.create(&alice, 2, "1 Main St").unwrap();
        assert_ne!(first.id, second.id);
        assert!(second.id > first.id);
    }

    #[test]
    fn id_counter_reseeds_above_persisted_orders() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let alice = principal("alice", Role::Customer);

        let first = OrderLedger::new(store.clone(), TransitionPolicy::Permissive).unwrap();
        let order = first.create(&alice, 1, "1 Main St").unwrap();

        let reopened = OrderLedger::new(store, TransitionPolicy::Permissive).unwrap();
        let next = reopened.create(&alice, 1, "1 Main St").unwrap();
        assert!(next.id > order.id);
    }

    #[test]
    fn advance_walks_sequence_and_clamps_at_delivered() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();

        let statuses: Vec<OrderStatus> = (0..4)
            .map(|_| ledger.advance_status(&vendor, order.id).unwrap().status)
            .collect();

        assert_eq!(
            statuses,
            vec![
                OrderStatus::Assigned,
                OrderStatus::OutForDelivery,
                OrderStatus::Delivered,
                OrderStatus::Delivered,
            ]
        );
    }

    #[test]
    fn advance_requires_vendor() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let order = ledger.create(&alice, 1, "1 Main St").unwrap();

        let err = ledger.advance_status(&alice, order.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn advance_unknown_order_is_not_found() {
        let ledger = ledger();
        let vendor = principal("vendor", Role::Vendor);

        let err = ledger.advance_status(&vendor, 999).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn assign_sets_assignee_and_forces_assigned() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        ledger
            .assign(&vendor, order.id, &delivery_account("baba"))
            .unwrap();

        let assigned = ledger.find_by_assignee("baba").unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].status, OrderStatus::Assigned);
        assert_eq!(assigned[0].assigned_to.as_deref(), Some("baba"));
    }

    #[test]
    fn assign_rejects_non_delivery_assignee() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);
        let order = ledger.create(&alice, 1, "1 Main St").unwrap();

        let mut not_delivery = delivery_account("bob");
        not_delivery.role = Role::Customer;

        let err = ledger.assign(&vendor, order.id, &not_delivery).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn permissive_assign_overrides_delivered() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        for _ in 0..3 {
            ledger.advance_status(&vendor, order.id).unwrap();
        }

        let reassigned = ledger
            .assign(&vendor, order.id, &delivery_account("baba"))
            .unwrap();
        assert_eq!(reassigned.status, OrderStatus::Assigned);
    }

    #[test]
    fn permissive_advance_restarts_cancelled_at_sequence_start() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        ledger.cancel(&alice, order.id).unwrap();

        // Cancelled is outside the sequence, so it is treated as index 0
        // and stepped once.
        let advanced = ledger.advance_status(&vendor, order.id).unwrap();
        assert_eq!(advanced.status, OrderStatus::Assigned);
    }

    #[test]
    fn strict_policy_rejects_transitions_on_terminal_orders() {
        let ledger = strict_ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        ledger.cancel(&alice, order.id).unwrap();

        let advance_err = ledger.advance_status(&vendor, order.id).unwrap_err();
        assert!(matches!(advance_err, AppError::Conflict(_)));

        let assign_err = ledger
            .assign(&vendor, order.id, &delivery_account("baba"))
            .unwrap_err();
        assert!(matches!(assign_err, AppError::Conflict(_)));
    }

    #[test]
    fn cancel_requires_pending() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        ledger.advance_status(&vendor, order.id).unwrap();

        let err = ledger.cancel(&alice, order.id).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn cancel_requires_owning_customer() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let mallory = principal("mallory", Role::Customer);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        let err = ledger.cancel(&mallory, order.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn cancelled_order_never_reaches_assignee_view() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        ledger.cancel(&alice, order.id).unwrap();

        assert!(ledger.find_by_assignee("baba").unwrap().is_empty());
    }

    #[test]
    fn mark_delivered_requires_matching_assignee() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let vendor = principal("vendor", Role::Vendor);
        let baba = principal("baba", Role::Delivery);
        let drew = principal("drew", Role::Delivery);

        let order = ledger.create(&alice, 1, "1 Main St").unwrap();
        ledger
            .assign(&vendor, order.id, &delivery_account("baba"))
            .unwrap();

        let err = ledger.mark_delivered(&drew, order.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let delivered = ledger.mark_delivered(&baba, order.id).unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
    }

    #[test]
    fn views_are_newest_first() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);

        let first = ledger.create(&alice, 1, "1 Main St").unwrap();
        let second = ledger.create(&alice, 2, "2 Main St").unwrap();
        let third = ledger.create(&alice, 3, "3 Main St").unwrap();

        let all = ledger.find_all().unwrap();
        let ids: Vec<u64> = all.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn customer_view_only_shows_own_orders() {
        let ledger = ledger();
        let alice = principal("alice", Role::Customer);
        let carol = principal("carol", Role::Customer);

        ledger.create(&alice, 1, "1 Main St").unwrap();
        ledger.create(&carol, 2, "2 Main St").unwrap();

        let mine = ledger.find_by_customer("alice").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].customer_username, "alice");
    }
}
