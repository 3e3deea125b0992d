use std::collections::HashMap;

use proptest::prelude::*;

use pricetime_clob::command::Command;
use pricetime_clob::engine::Engine;
use pricetime_clob::{BookError, Event, OrderBook, Side};

fn command() -> impl Strategy<Value = Command> {
    prop_oneof![
        4 => (1u64..40, any::<bool>(), 95i64..106, 1i64..20).prop_map(|(id, is_buy, price, quantity)| Command::Add {
            id,
            side: if is_buy { Side::Buy } else { Side::Sell },
            price,
            quantity,
        }),
        1 => (1u64..40, -2i64..3, -2i64..3).prop_map(|(id, price, quantity)| Command::Add {
            id,
            side: Side::Buy,
            price,
            quantity,
        }),
        2 => (1u64..40).prop_map(|id| Command::Cancel { id }),
    ]
}

fn resting_total(book: &OrderBook) -> u64 {
    book.orders().iter().map(|o| o.remaining).sum()
}

proptest! {
    #[test]
    fn invariants_hold_after_every_command(commands in prop::collection::vec(command(), 1..200)) {
        let mut engine = Engine::new();
        for command in commands {
            engine.handle_command(command);
            prop_assert_eq!(engine.book().check_invariants(), Ok(()));
            if let (Some((bid, _)), Some((ask, _))) = (engine.book().best_bid(), engine.book().best_ask()) {
                prop_assert!(bid < ask);
            }
        }
    }

    #[test]
    fn quantity_is_conserved(commands in prop::collection::vec(command(), 1..200)) {
        let mut engine = Engine::new();
        let mut submitted = 0u64;
        let mut canceled = 0u64;
        let mut filled = 0u64;

        for command in commands {
            for envelope in engine.handle_command(command) {
                match envelope.event {
                    Event::Accepted { quantity, .. } => submitted += quantity,
                    Event::Canceled { remaining, .. } => canceled += remaining,
                    // each fill consumes the same quantity from maker and taker
                    Event::Fill(fill) => filled += 2 * fill.quantity,
                    _ => {}
                }
            }
            prop_assert_eq!(resting_total(engine.book()) + filled + canceled, submitted);
        }
    }

    #[test]
    fn fills_match_taker_consumption(commands in prop::collection::vec(command(), 1..150)) {
        let mut engine = Engine::new();
        for command in commands {
            let Command::Add { id, side, price, quantity } = command else {
                let _ = engine.handle_command(command);
                continue;
            };
            let before: HashMap<u64, u64> =
                engine.book().orders().iter().map(|o| (o.order_id, o.remaining)).collect();
            match engine.add_order(id, side, price, quantity) {
                Ok(outcome) => {
                    let filled = outcome.filled_quantity();
                    prop_assert_eq!(filled + outcome.remaining(), quantity as u64);
                    let mut taken = 0u64;
                    for fill in outcome.fills() {
                        let had = before.get(&fill.maker_order_id).copied().unwrap_or(0);
                        prop_assert_eq!(had - fill.quantity, fill.maker_remaining);
                        let price_ok = match side {
                            Side::Buy => fill.price <= price as u64,
                            Side::Sell => fill.price >= price as u64,
                        };
                        prop_assert!(price_ok);
                        taken += fill.quantity;
                    }
                    prop_assert_eq!(taken, filled);
                }
                Err(BookError::DuplicateOrder(dup)) => {
                    prop_assert!(before.contains_key(&dup));
                    let after: HashMap<u64, u64> =
                        engine.book().orders().iter().map(|o| (o.order_id, o.remaining)).collect();
                    prop_assert_eq!(before, after);
                }
                Err(BookError::InvalidOrderParameters { .. }) => {
                    prop_assert!(price <= 0 || quantity <= 0);
                }
                Err(BookError::UnknownOrder(_)) => prop_assert!(false, "add never reports unknown order"),
            }
        }
    }

    #[test]
    fn second_cancel_is_unknown(id in 1u64..1000, price in 1i64..1000, quantity in 1i64..1000) {
        let mut engine = Engine::new();
        engine.add_order(id, Side::Sell, price, quantity).unwrap();
        prop_assert!(engine.cancel_order(id).is_ok());
        prop_assert_eq!(engine.cancel_order(id), Err(BookError::UnknownOrder(id)));
        prop_assert!(engine.book().is_empty());
    }

    #[test]
    fn replay_state_hash_is_deterministic(commands in prop::collection::vec(command(), 1..100)) {
        let mut first = Engine::new();
        let mut second = Engine::new();
        for command in &commands {
            first.handle_command(*command);
            second.handle_command(*command);
        }
        prop_assert_eq!(first.state_hash().unwrap(), second.state_hash().unwrap());
    }
}
