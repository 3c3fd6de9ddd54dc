//! Battle events for external managers.
//!
//! Pre-battle managers (hand, deck, gold) subscribe here instead of having
//! their methods wrapped: the battle tells them when something happened.
//! Events fire on both host and guest, after the mutation they describe.

use crate::core::{AbsoluteSide, CombatantKey};
use crate::net::EndReason;

/// Something an external manager may care about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BattleEvent {
    CombatantDied {
        key: CombatantKey,
        killer: Option<CombatantKey>,
    },
    CombatantRevived {
        key: CombatantKey,
        handler: String,
    },
    RoundEnded {
        round: u32,
    },
    BattleEnded {
        winner: Option<AbsoluteSide>,
        reason: EndReason,
    },
}

/// Receives battle events.
pub trait BattleObserver {
    fn on_event(&mut self, event: &BattleEvent);
}

impl<F: FnMut(&BattleEvent)> BattleObserver for F {
    fn on_event(&mut self, event: &BattleEvent) {
        self(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_closure_observer() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut observer: Box<dyn BattleObserver> = Box::new(move |e: &BattleEvent| {
            sink.borrow_mut().push(e.clone());
        });

        observer.on_event(&BattleEvent::RoundEnded { round: 2 });
        assert_eq!(seen.borrow().as_slice(), &[BattleEvent::RoundEnded { round: 2 }]);
    }
}
