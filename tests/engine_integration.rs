use bytes::BytesMut;
use matching_engine::engine::process_order;
use matching_engine::protocol::InputRecord;
use matching_engine::{
    AckMode, ChannelSink, Engine, EngineConfig, EngineEvent, InstrumentBook, Order, OrderId, OrderSide,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedReceiver;

fn encode(orders: &[Order]) -> BytesMut {
    let mut buf = BytesMut::new();
    for order in orders {
        InputRecord::from_order(order).encode(&mut buf);
    }
    buf
}

fn drain(rx: &mut UnboundedReceiver<EngineEvent>) -> Vec<EngineEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

/// Zero the timestamp so events from separate runs compare equal
fn strip(mut event: EngineEvent) -> EngineEvent {
    match &mut event {
        EngineEvent::OrderAdded { timestamp, .. }
        | EngineEvent::OrderExecuted { timestamp, .. }
        | EngineEvent::OrderDeleted { timestamp, .. } => *timestamp = 0,
    }
    event
}

fn engine_with(ack_mode: AckMode) -> (Engine, UnboundedReceiver<EngineEvent>) {
    let (sink, rx) = ChannelSink::new();
    let config = EngineConfig {
        ack_mode,
        ..EngineConfig::default()
    };
    let engine = Engine::start(config, Arc::new(sink)).unwrap();
    (engine, rx)
}

/// Write every order on its own connection and wait for each to finish
async fn replay(engine: &Engine, connections: Vec<Vec<Order>>) {
    let mut handles = Vec::new();
    for orders in connections {
        let (mut client, server) = tokio::io::duplex(4096);
        handles.push(engine.accept(server));
        let bytes = encode(&orders);
        tokio::spawn(async move {
            client.write_all(&bytes).await.unwrap();
            client.shutdown().await.unwrap();
        });
    }
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_reference_scenario_over_connection() {
    let (engine, mut rx) = engine_with(AckMode::Sync);

    replay(
        &engine,
        vec![vec![
            Order::buy(1, "ABC", 100, 10),
            Order::sell(2, "ABC", 100, 4),
            Order::cancel(1),
            Order::cancel(99),
        ]],
    )
    .await;

    let report = engine.shutdown().await;
    assert!(report.clean);
    assert_eq!(report.stats.unknown_cancels, 1);

    let events: Vec<EngineEvent> = drain(&mut rx).into_iter().map(strip).collect();
    assert_eq!(
        events,
        vec![
            strip(EngineEvent::added(OrderSide::Buy, 1, "ABC", 100, 10)),
            strip(EngineEvent::executed(1, 2, 1, 100, 4)),
            strip(EngineEvent::deleted(1, true)),
            strip(EngineEvent::deleted(99, false)),
        ]
    );
}

#[tokio::test]
async fn test_text_output_lines() {
    let (engine, mut rx) = engine_with(AckMode::Sync);

    replay(
        &engine,
        vec![vec![Order::sell(5, "XYZ", 20, 3), Order::buy(6, "XYZ", 25, 5)]],
    )
    .await;
    engine.shutdown().await;

    let lines: Vec<String> = drain(&mut rx)
        .into_iter()
        .map(|event| {
            let line = event.to_string();
            // Drop the timestamp column
            line.rsplit_once(' ').map(|(head, _)| head.to_string()).unwrap_or(line)
        })
        .collect();
    assert_eq!(lines, vec!["S 5 XYZ 20 3", "E 5 6 1 20 3", "B 6 XYZ 25 2"]);
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_orders() {
    let (engine, mut rx) = engine_with(AckMode::Async);

    // Non-crossing orders so every one produces exactly one event
    let orders: Vec<Order> = (1..=500)
        .map(|id| Order::buy(id, if id % 2 == 0 { "ABC" } else { "XYZ" }, 100, 1))
        .collect();
    replay(&engine, vec![orders]).await;

    let report = engine.shutdown().await;
    assert!(report.clean);
    assert!(!report.has_leaks());
    assert_eq!(report.instruments, 2);
    assert_eq!(report.stats.orders_routed, 500);
    assert_eq!(drain(&mut rx).len(), 500);
}

#[tokio::test]
async fn test_instruments_are_isolated() {
    const INSTRUMENTS: [&str; 4] = ["AAPL", "GOOG", "MSFT", "TSLA"];

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut per_instrument: HashMap<&str, Vec<(OrderSide, OrderId, u32, u32)>> = HashMap::new();
    let mut owner: HashMap<OrderId, &str> = HashMap::new();
    let mut next_id: OrderId = 1;

    for _ in 0..2000 {
        let instrument = INSTRUMENTS[rng.random_range(0..INSTRUMENTS.len())];
        let script = per_instrument.entry(instrument).or_default();
        let placed: Vec<OrderId> = script
            .iter()
            .filter(|(side, ..)| *side != OrderSide::Cancel)
            .map(|(_, id, ..)| *id)
            .collect();

        if !placed.is_empty() && rng.random_bool(0.2) {
            let target = placed[rng.random_range(0..placed.len())];
            script.push((OrderSide::Cancel, target, 0, 0));
        } else {
            let side = if rng.random_bool(0.5) { OrderSide::Buy } else { OrderSide::Sell };
            script.push((side, next_id, rng.random_range(90..=110), rng.random_range(1..=20)));
            owner.insert(next_id, instrument);
            next_id += 1;
        }
    }

    let build = |instrument: &str, (side, id, price, count): (OrderSide, OrderId, u32, u32)| match side {
        OrderSide::Cancel => Order::cancel(id),
        _ => Order::new(side, id, instrument.to_string(), price, count),
    };

    // Each instrument on one connection keeps its arrival order deterministic
    let (engine, mut rx) = engine_with(AckMode::Async);
    let connections = INSTRUMENTS
        .iter()
        .map(|&instrument| {
            per_instrument[instrument]
                .iter()
                .map(|entry| build(instrument, *entry))
                .collect()
        })
        .collect();
    replay(&engine, connections).await;
    assert!(engine.shutdown().await.clean);

    let mut observed: HashMap<&str, Vec<EngineEvent>> = HashMap::new();
    for event in drain(&mut rx).into_iter().map(strip) {
        let id = match &event {
            EngineEvent::OrderAdded { order_id, .. } => *order_id,
            EngineEvent::OrderExecuted { resting_order_id, .. } => *resting_order_id,
            EngineEvent::OrderDeleted { order_id, .. } => *order_id,
        };
        observed.entry(owner[&id]).or_default().push(event);
    }

    for instrument in INSTRUMENTS {
        let (sink, mut expected_rx) = ChannelSink::new();
        let mut book = InstrumentBook::new(instrument.to_string());
        for entry in &per_instrument[instrument] {
            process_order(&mut book, build(instrument, *entry), &sink);
        }
        let expected: Vec<EngineEvent> = drain(&mut expected_rx).into_iter().map(strip).collect();

        assert_eq!(
            observed.remove(instrument).unwrap_or_default(),
            expected,
            "event stream for {} diverged",
            instrument
        );
    }
}

#[tokio::test]
async fn test_unix_socket_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.sock");
    let listener = tokio::net::UnixListener::bind(&path).unwrap();

    let (engine, mut rx) = engine_with(AckMode::Sync);

    let client_path = path.clone();
    let client = tokio::spawn(async move {
        let mut stream = tokio::net::UnixStream::connect(&client_path).await.unwrap();
        let bytes = encode(&[Order::buy(1, "GOOG", 500, 2), Order::sell(2, "GOOG", 499, 3)]);
        stream.write_all(&bytes).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    let (stream, _) = listener.accept().await.unwrap();
    let connection = engine.accept(stream);
    client.await.unwrap();
    connection.await.unwrap();

    let report = engine.shutdown().await;
    assert!(report.clean);
    assert_eq!(report.stats.connections_accepted, 1);

    let events: Vec<EngineEvent> = drain(&mut rx).into_iter().map(strip).collect();
    assert_eq!(
        events,
        vec![
            strip(EngineEvent::added(OrderSide::Buy, 1, "GOOG", 500, 2)),
            strip(EngineEvent::executed(1, 2, 1, 500, 2)),
            strip(EngineEvent::added(OrderSide::Sell, 2, "GOOG", 499, 1)),
        ]
    );
}
