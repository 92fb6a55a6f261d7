use std::io::{Cursor, Write};

use pitch_book::parser::{
    encode_feed, AddOrder, DeleteOrder, EndOfSession, ModifyOrder, OrderExecuted,
    OrderExecutedAtPriceSize, ReduceSize, Time, Trade, TradeBreak,
};
use pitch_book::{
    analyze, replay, EventTime, Message, MessageReader, OrderBookManager, OrderId, PitchError,
    Side, Symbol,
};

const AAPL: &str = "AAPL";

fn time(seconds: u32) -> Message {
    Message::Time(Time { seconds })
}

fn add_bid(order_id: OrderId, price: u64) -> Message {
    Message::AddOrderLong(AddOrder {
        offset: 0,
        order_id,
        side: Side::Bid,
        shares: 100,
        symbol: Symbol::from(AAPL),
        price,
    })
}

fn delete(order_id: OrderId) -> Message {
    Message::DeleteOrder(DeleteOrder {
        offset: 0,
        order_id,
    })
}

/// Encode, decode, and apply in one pass, as the binary does
fn run(messages: &[Message]) -> (OrderBookManager, Option<PitchError>) {
    let bytes = encode_feed(messages).unwrap();
    let mut manager = OrderBookManager::new();
    for message in MessageReader::new(Cursor::new(bytes)) {
        let applied = message.and_then(|message| manager.apply(&message));
        if let Err(err) = applied {
            return (manager, Some(err));
        }
    }
    (manager, None)
}

fn scenario_a() -> Vec<Message> {
    vec![time(0), add_bid(1, 100), time(1), add_bid(2, 101)]
}

#[test]
fn scenario_a_better_bid_displaces_top() {
    let (manager, err) = run(&scenario_a());
    assert!(err.is_none());

    let book = manager.book(&Symbol::from(AAPL)).unwrap();
    assert_eq!(book.best_bid(), Some(101));

    let registry = manager.registry();
    let o1 = registry.order(1).unwrap();
    let o2 = registry.order(2).unwrap();
    assert!(o1.entry_at_top);
    assert!(o2.entry_at_top);
    assert_eq!(o1.exit_time, Some(EventTime::from_secs(1)));
    assert_eq!(o2.exit_time, None);
}

#[test]
fn scenario_b_delete_restores_previous_best() {
    let mut messages = scenario_a();
    messages.extend([time(2), delete(2)]);
    let (manager, err) = run(&messages);
    assert!(err.is_none());

    let book = manager.book(&Symbol::from(AAPL)).unwrap();
    assert_eq!(book.best_bid(), Some(100));
    assert_eq!(
        manager.registry().order(2).unwrap().exit_time,
        Some(EventTime::from_secs(2))
    );
}

#[test]
fn scenario_c_reprice_to_better_level() {
    let mut messages = scenario_a();
    messages.extend([
        time(2),
        delete(2),
        time(3),
        Message::ModifyOrderLong(ModifyOrder {
            offset: 0,
            order_id: 1,
            shares: 100,
            price: 105,
        }),
    ]);
    let (manager, err) = run(&messages);
    assert!(err.is_none());

    let book = manager.book(&Symbol::from(AAPL)).unwrap();
    assert_eq!(book.best_bid(), Some(105));
    assert_eq!(book.level(Side::Bid, 100), &[] as &[OrderId]);
    assert_eq!(book.level(Side::Bid, 105), &[1]);

    let o1 = manager.registry().order(1).unwrap();
    assert!(o1.entry_at_top);
    assert_eq!(o1.entry_time, Some(EventTime::from_secs(0)));
    // first loss of the top at t=1 is kept
    assert_eq!(o1.exit_time, Some(EventTime::from_secs(1)));
    assert!(o1.resident);
}

#[test]
fn scenario_d_remaining_shares_govern_removal() {
    let messages = vec![
        time(0),
        add_bid(1, 100),
        Message::OrderExecutedAtPriceSize(OrderExecutedAtPriceSize {
            offset: 10,
            order_id: 1,
            executed_shares: 40,
            remaining_shares: 0,
            execution_id: 99,
            price: 100,
        }),
    ];
    let (manager, err) = run(&messages);
    assert!(err.is_none());

    let o1 = manager.registry().order(1).unwrap();
    assert_eq!(o1.size, 60);
    assert!(!o1.resident);
    assert_eq!(o1.exit_time, Some(EventTime::from_nanos(10)));
    assert_eq!(manager.book(&Symbol::from(AAPL)).unwrap().best_bid(), None);
}

#[test]
fn scenario_e_unknown_reference_halts() {
    let messages = vec![
        time(0),
        add_bid(1, 100),
        Message::OrderExecuted(OrderExecuted {
            offset: 0,
            order_id: 404,
            executed_shares: 1,
            execution_id: 1,
        }),
        add_bid(2, 101),
    ];
    let (manager, err) = run(&messages);
    assert!(matches!(err, Some(PitchError::UnknownOrderReference(404))));
    // nothing after the bad record was applied
    assert!(manager.registry().order(2).is_none());
    assert_eq!(manager.applied(), 2);
}

#[test]
fn delete_twice_is_rejected() {
    let messages = vec![time(0), add_bid(1, 100), delete(1), delete(1)];
    let (manager, err) = run(&messages);
    assert!(matches!(err, Some(PitchError::UnknownOrderReference(1))));
    assert!(manager.registry().order(1).is_some());
}

#[test]
fn reduce_after_full_removal_is_rejected() {
    let messages = vec![
        time(0),
        add_bid(1, 100),
        Message::ReduceSizeLong(ReduceSize {
            offset: 0,
            order_id: 1,
            canceled_shares: 100,
        }),
        Message::ReduceSizeLong(ReduceSize {
            offset: 0,
            order_id: 1,
            canceled_shares: 1,
        }),
    ];
    let (_, err) = run(&messages);
    assert!(matches!(err, Some(PitchError::UnknownOrderReference(1))));
}

#[test]
fn top_of_book_average_excludes_unfinished_orders() {
    let mut messages = scenario_a();
    messages.extend([time(4), delete(2), delete(1)]);
    messages.extend([add_bid(3, 102), time(6)]);
    let (manager, err) = run(&messages);
    assert!(err.is_none());

    let stats = analyze(manager.registry());
    assert_eq!(stats.len(), 1);
    let aapl = &stats[0];
    // O1: 0 -> 1, O2: 1 -> 4, O3 still at top
    assert_eq!(aapl.measured, 2);
    assert_eq!(aapl.still_at_top, 1);
    assert_eq!(aapl.average_secs, Some(2.0));
}

#[test]
fn ask_side_mirrors_bid_side() {
    let ask = |order_id, price| {
        Message::AddOrderShort(AddOrder {
            offset: 0,
            order_id,
            side: Side::Ask,
            shares: 10,
            symbol: Symbol::from("MSFT"),
            price,
        })
    };
    let messages = vec![time(0), ask(1, 20_000), time(1), ask(2, 19_900), ask(3, 20_100)];
    let (manager, err) = run(&messages);
    assert!(err.is_none());

    let book = manager.book(&Symbol::from("MSFT")).unwrap();
    assert_eq!(book.best_ask(), Some(19_900));
    let registry = manager.registry();
    assert_eq!(registry.order(1).unwrap().exit_time, Some(EventTime::from_secs(1)));
    assert!(registry.order(2).unwrap().entry_at_top);
    assert!(!registry.order(3).unwrap().entry_at_top);
}

#[test]
fn every_kind_decodes_to_its_encoded_fields() {
    let symbol = Symbol::from("ZVZZT");
    let messages = vec![
        Message::Time(Time { seconds: 34_200 }),
        Message::AddOrderLong(AddOrder {
            offset: 1,
            order_id: u64::MAX,
            side: Side::Bid,
            shares: 70_000,
            symbol,
            price: 1_234_567,
        }),
        Message::AddOrderShort(AddOrder {
            offset: 2,
            order_id: 2,
            side: Side::Ask,
            shares: 500,
            symbol,
            price: 6_553_500,
        }),
        Message::OrderExecuted(OrderExecuted {
            offset: 3,
            order_id: 3,
            executed_shares: 10,
            execution_id: 11,
        }),
        Message::OrderExecutedAtPriceSize(OrderExecutedAtPriceSize {
            offset: 4,
            order_id: 4,
            executed_shares: 5,
            remaining_shares: 6,
            execution_id: 12,
            price: 99_999,
        }),
        Message::ReduceSizeLong(ReduceSize {
            offset: 5,
            order_id: 5,
            canceled_shares: 100_000,
        }),
        Message::ReduceSizeShort(ReduceSize {
            offset: 6,
            order_id: 6,
            canceled_shares: 65_535,
        }),
        Message::ModifyOrderLong(ModifyOrder {
            offset: 7,
            order_id: 7,
            shares: 123_456,
            price: 10_000_001,
        }),
        Message::ModifyOrderShort(ModifyOrder {
            offset: 8,
            order_id: 8,
            shares: 12,
            price: 1_200,
        }),
        Message::DeleteOrder(DeleteOrder {
            offset: 9,
            order_id: 9,
        }),
        Message::TradeLong(Trade {
            offset: 10,
            order_id: 10,
            side: Side::Bid,
            shares: 1_000_000,
            symbol,
            price: 5,
            execution_id: 13,
        }),
        Message::TradeShort(Trade {
            offset: 11,
            order_id: 11,
            side: Side::Ask,
            shares: 7,
            symbol,
            price: 300,
            execution_id: 14,
        }),
        Message::TradeBreak(TradeBreak {
            offset: 12,
            execution_id: 13,
        }),
        Message::EndOfSession(EndOfSession { offset: 13 }),
    ];

    let bytes = encode_feed(&messages).unwrap();
    let decoded: Vec<Message> = MessageReader::new(Cursor::new(bytes))
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(decoded, messages);
}

#[test]
fn replay_from_file() {
    let bytes = encode_feed(&scenario_a()).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let manager = replay(std::fs::File::open(file.path()).unwrap()).unwrap();
    assert_eq!(manager.applied(), 4);
    assert_eq!(
        manager.book(&Symbol::from(AAPL)).unwrap().best_bid(),
        Some(101)
    );
}
