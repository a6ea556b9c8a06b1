use crate::models::OrderStatus;

/// A status change that would move an order backward or out of a terminal
/// state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid order status transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

fn rank(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 0,
        OrderStatus::Confirmed => 1,
        OrderStatus::Processing => 2,
        OrderStatus::Shipped => 3,
        OrderStatus::Delivered => 4,
        OrderStatus::Cancelled => 5, // terminal, not part of the forward chain
    }
}

fn is_terminal(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Delivered | OrderStatus::Cancelled)
}

/// Check a status transition against the fulfillment chain
/// `Pending -> Confirmed -> Processing -> Shipped -> Delivered`, with
/// `Cancelled` reachable from any non-terminal state. Backward movement is
/// never allowed, so a delivered order can never become pending again.
pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), InvalidTransition> {
    if is_terminal(from) {
        return Err(InvalidTransition { from, to });
    }
    if to == OrderStatus::Cancelled {
        return Ok(());
    }
    if rank(to) > rank(from) {
        return Ok(());
    }
    Err(InvalidTransition { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn fulfillment_chain_moves_forward() {
        assert!(validate_transition(Pending, Confirmed).is_ok());
        assert!(validate_transition(Confirmed, Processing).is_ok());
        assert!(validate_transition(Processing, Shipped).is_ok());
        assert!(validate_transition(Shipped, Delivered).is_ok());
    }

    #[test]
    fn skipping_forward_is_allowed() {
        // Small shops mark orders shipped without a confirm step.
        assert!(validate_transition(Pending, Shipped).is_ok());
    }

    #[test]
    fn never_moves_backward() {
        assert!(validate_transition(Shipped, Confirmed).is_err());
        assert!(validate_transition(Delivered, Pending).is_err());
        assert!(validate_transition(Confirmed, Confirmed).is_err());
    }

    #[test]
    fn cancel_allowed_until_delivery() {
        assert!(validate_transition(Pending, Cancelled).is_ok());
        assert!(validate_transition(Processing, Cancelled).is_ok());
        assert!(validate_transition(Delivered, Cancelled).is_err());
        assert!(validate_transition(Cancelled, Cancelled).is_err());
    }

    #[test]
    fn terminal_states_stay_terminal() {
        assert!(validate_transition(Cancelled, Confirmed).is_err());
        assert!(validate_transition(Delivered, Shipped).is_err());
    }
}
