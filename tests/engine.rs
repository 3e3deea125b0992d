use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use pricetime_clob::command::Command;
use pricetime_clob::engine::Engine;
use pricetime_clob::{BookError, Event, EventEnvelope, Fill, Side};

fn session_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/session.txt")
}

fn events(envelopes: Vec<EventEnvelope>) -> Vec<Event> {
    envelopes.into_iter().map(|e| e.event).collect()
}

#[test]
fn invalid_parameters_never_reach_the_book() {
    let mut engine = Engine::new();
    engine.add_order(1, Side::Buy, 100, 5).unwrap();

    assert_eq!(
        engine.add_order(2, Side::Buy, 0, 5),
        Err(BookError::InvalidOrderParameters {
            id: 2,
            price: 0,
            quantity: 5
        })
    );
    assert_eq!(
        engine.add_order(3, Side::Sell, 100, -1),
        Err(BookError::InvalidOrderParameters {
            id: 3,
            price: 100,
            quantity: -1
        })
    );

    assert_eq!(engine.book().len(), 1);
    assert_eq!(engine.book().best_bid(), Some((100, 5)));
    assert_eq!(engine.book().best_ask(), None);
    assert_eq!(engine.book().next_seq(), 1);
}

#[test]
fn add_command_emits_accept_fills_and_rest() {
    let mut engine = Engine::new();
    engine.handle_command(Command::Add {
        id: 1,
        side: Side::Sell,
        price: 100,
        quantity: 2,
    });

    let out = engine.handle_command(Command::Add {
        id: 2,
        side: Side::Buy,
        price: 101,
        quantity: 5,
    });
    assert!(out.iter().all(|e| e.engine_seq == 2));
    assert_eq!(
        events(out),
        vec![
            Event::Accepted {
                order_id: 2,
                side: Side::Buy,
                price: 101,
                quantity: 5
            },
            Event::Fill(Fill {
                maker_order_id: 1,
                taker_order_id: 2,
                price: 100,
                quantity: 2,
                maker_remaining: 0
            }),
            Event::Rested {
                order_id: 2,
                side: Side::Buy,
                price: 101,
                quantity: 3
            },
        ]
    );
}

#[test]
fn rejected_commands_become_events() {
    let mut engine = Engine::new();
    let out = events(engine.handle_command(Command::Cancel { id: 42 }));
    assert_eq!(out.len(), 1);
    match &out[0] {
        Event::Rejected { order_id, reason, .. } => {
            assert_eq!(*order_id, 42);
            assert_eq!(reason, "unknown_order");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn cancel_command_reports_remaining_quantity() {
    let mut engine = Engine::new();
    engine.add_order(1, Side::Buy, 100, 10).unwrap();
    engine.add_order(2, Side::Sell, 100, 3).unwrap();

    let out = events(engine.handle_command(Command::Cancel { id: 1 }));
    assert_eq!(out, vec![Event::Canceled { order_id: 1, remaining: 7 }]);
    assert!(engine.book().is_empty());
}

#[test]
fn replays_session_file() {
    let mut engine = Engine::new();
    let mut fills = Vec::new();
    let file = File::open(session_path()).unwrap();
    let summary = engine
        .replay(BufReader::new(file), |envelope| {
            if let Event::Fill(fill) = &envelope.event {
                fills.push((fill.maker_order_id, fill.taker_order_id, fill.price, fill.quantity));
            }
        })
        .unwrap();

    assert_eq!(summary.commands, 10);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.unparsable, 1);
    assert_eq!(
        fills,
        vec![(1, 2, 100, 4), (3, 7, 102, 6), (7, 8, 103, 3), (1, 8, 100, 5)]
    );

    let book = engine.book();
    assert_eq!(book.len(), 1);
    assert_eq!(book.best_bid(), Some((100, 1)));
    assert_eq!(book.best_ask(), None);
    assert_eq!(engine.engine_seq(), 10);
    assert_eq!(book.check_invariants(), Ok(()));
}

#[test]
fn maximal_orders_stack_on_one_price() {
    let mut engine = Engine::new();
    for id in 1..=3 {
        engine.add_order(id, Side::Buy, 100, i64::MAX).unwrap();
    }
    let per_order = u128::from(i64::MAX.unsigned_abs());
    assert_eq!(engine.book().best_bid(), Some((100, 3 * per_order)));
    assert_eq!(engine.snapshot(1).bids[0].orders, 3);
    assert_eq!(engine.book().check_invariants(), Ok(()));

    let events = engine.handle_command(Command::Add {
        id: 4,
        side: Side::Sell,
        price: 100,
        quantity: i64::MAX,
    });
    assert!(events.iter().all(|e| !matches!(e.event, Event::Rejected { .. })));
    assert_eq!(engine.book().best_bid(), Some((100, 2 * per_order)));
    assert_eq!(engine.book().check_invariants(), Ok(()));
}

#[test]
fn replay_hash_is_deterministic() {
    let run = || {
        let mut engine = Engine::new();
        let file = File::open(session_path()).unwrap();
        engine.replay(BufReader::new(file), |_| {}).unwrap();
        engine.state_hash().unwrap()
    };
    assert_eq!(run(), run());

    let mut other = Engine::new();
    other.add_order(1, Side::Buy, 100, 1).unwrap();
    assert_ne!(run(), other.state_hash().unwrap());
}

#[test]
fn events_serialize_with_type_tag() {
    let event = Event::Canceled { order_id: 9, remaining: 4 };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "canceled");
    assert_eq!(json["order_id"], 9);
}
