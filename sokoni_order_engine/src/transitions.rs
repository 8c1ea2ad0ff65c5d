//! The sub-order transition table.
//!
//! Every legal status movement is listed here, once, together with the class of actor that may drive it. All engine
//! code routes status changes through [`allowed_actor`]; a `(from, to)` pair this table does not name is an invalid
//! transition no matter who asks.
//!
//! | From | To | Actor |
//! |---|---|---|
//! | PendingPayment | PaidAwaitingShipment | system (payment callback) |
//! | PaidAwaitingShipment | Shipped | merchant |
//! | Shipped | InTransit | merchant |
//! | InTransit | Delivered | merchant |
//! | PendingMerchantDelivery | AtHubVerificationPending | merchant |
//! | AtHubVerificationPending | AtHubReadyForPickup | hub staff |
//! | AtHubVerificationPending | PendingMerchantDelivery | hub staff (rejection) |
//! | AtHubReadyForPickup | Completed | hub staff (pickup + cash) |
//! | any cancellable state | Cancelled | customer |
//! | AtHubReadyForPickup | Expired | scheduler |
use crate::db_types::{PaymentMethod, SubOrderStatus};

/// The class of actor attempting a transition. Identity and scope checks (which merchant, which hub) happen at the
/// API layer; this module only cares about the *kind* of actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorClass {
    /// The payment reconciler, acting on a gateway callback.
    System,
    Merchant,
    HubStaff,
    Customer,
    /// The timer-driven pickup-deadline sweep.
    Scheduler,
}

/// Returns the actor class permitted to move a sub-order from `from` to `to`, or `None` when no such edge exists.
pub fn allowed_actor(from: SubOrderStatus, to: SubOrderStatus) -> Option<ActorClass> {
    use SubOrderStatus::*;
    match (from, to) {
        (PendingPayment, PaidAwaitingShipment) => Some(ActorClass::System),
        (PaidAwaitingShipment, Shipped) => Some(ActorClass::Merchant),
        (Shipped, InTransit) => Some(ActorClass::Merchant),
        (InTransit, Delivered) => Some(ActorClass::Merchant),
        (PendingMerchantDelivery, AtHubVerificationPending) => Some(ActorClass::Merchant),
        (AtHubVerificationPending, AtHubReadyForPickup) => Some(ActorClass::HubStaff),
        (AtHubVerificationPending, PendingMerchantDelivery) => Some(ActorClass::HubStaff),
        (AtHubReadyForPickup, Completed) => Some(ActorClass::HubStaff),
        (PendingPayment | PaidAwaitingShipment | PendingMerchantDelivery | AtHubVerificationPending, Cancelled) => {
            Some(ActorClass::Customer)
        },
        (AtHubReadyForPickup, Expired) => Some(ActorClass::Scheduler),
        (_, _) => None,
    }
}

impl SubOrderStatus {
    /// The state a freshly assembled sub-order starts in, determined by how the customer is paying.
    pub fn initial_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::MobileMoneyDelivery => SubOrderStatus::PendingPayment,
            PaymentMethod::CashOnDelivery => SubOrderStatus::PendingMerchantDelivery,
        }
    }

    /// Terminal states. Nothing ever leaves these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubOrderStatus::Completed | SubOrderStatus::Cancelled | SubOrderStatus::Expired)
    }

    /// The states from which a customer may still cancel. Once goods are moving (shipped, delivered, or sitting at
    /// the hub ready for collection) the window has closed.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            SubOrderStatus::PendingPayment |
                SubOrderStatus::PaidAwaitingShipment |
                SubOrderStatus::PendingMerchantDelivery |
                SubOrderStatus::AtHubVerificationPending
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::SubOrderStatus::*;

    #[test]
    fn table_is_exhaustive() {
        // Every edge that should exist, and nothing else.
        let expected = [
            (PendingPayment, PaidAwaitingShipment, ActorClass::System),
            (PaidAwaitingShipment, Shipped, ActorClass::Merchant),
            (Shipped, InTransit, ActorClass::Merchant),
            (InTransit, Delivered, ActorClass::Merchant),
            (PendingMerchantDelivery, AtHubVerificationPending, ActorClass::Merchant),
            (AtHubVerificationPending, AtHubReadyForPickup, ActorClass::HubStaff),
            (AtHubVerificationPending, PendingMerchantDelivery, ActorClass::HubStaff),
            (AtHubReadyForPickup, Completed, ActorClass::HubStaff),
            (PendingPayment, Cancelled, ActorClass::Customer),
            (PaidAwaitingShipment, Cancelled, ActorClass::Customer),
            (PendingMerchantDelivery, Cancelled, ActorClass::Customer),
            (AtHubVerificationPending, Cancelled, ActorClass::Customer),
            (AtHubReadyForPickup, Expired, ActorClass::Scheduler),
        ];
        for from in SubOrderStatus::ALL {
            for to in SubOrderStatus::ALL {
                let expected_actor =
                    expected.iter().find(|(f, t, _)| *f == from && *t == to).map(|(_, _, actor)| *actor);
                assert_eq!(allowed_actor(from, to), expected_actor, "edge {from} -> {to} disagrees with the table");
            }
        }
    }

    #[test]
    fn hub_ready_cannot_ship() {
        assert_eq!(allowed_actor(AtHubReadyForPickup, Shipped), None);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [Completed, Cancelled, Expired] {
            for to in SubOrderStatus::ALL {
                assert_eq!(allowed_actor(terminal, to), None, "{terminal} must not transition to {to}");
            }
        }
    }

    #[test]
    fn initial_state_follows_payment_method() {
        assert_eq!(SubOrderStatus::initial_for(PaymentMethod::MobileMoneyDelivery), PendingPayment);
        assert_eq!(SubOrderStatus::initial_for(PaymentMethod::CashOnDelivery), PendingMerchantDelivery);
    }

    #[test]
    fn cancellable_set_matches_customer_edges() {
        for status in SubOrderStatus::ALL {
            assert_eq!(status.is_cancellable(), allowed_actor(status, Cancelled) == Some(ActorClass::Customer));
        }
    }
}
