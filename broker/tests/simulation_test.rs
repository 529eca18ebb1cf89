use broker::metrics::Window;
use broker::{Broker, ConsumerStatus};
use internals::{BrokerConfig, BrokerError, ExchangeKind, MessageStatus};
use std::time::{Duration, SystemTime};
use tokio_stream::StreamExt;

fn broker_with(kind: ExchangeKind) -> Broker {
    Broker::new(BrokerConfig {
        exchange_type: kind,
        ..BrokerConfig::default()
    })
}

#[tokio::test(start_paused = true)]
async fn full_message_flow() {
    let broker = broker_with(ExchangeKind::Direct);
    broker.add_queue("orders_q").unwrap();
    broker.bind_queue("orders_q", "orders").unwrap();

    let handle = broker.spawn_consumer("orders_q").unwrap();
    let mut consumed = handle.subscribe();

    let receipt = broker.publish("orders", "integration-test-payload").unwrap();
    assert_eq!(receipt.delivered_count, 1);
    assert_eq!(broker.queue_depth("orders_q").unwrap(), 1);

    // default delay 2000ms plus the 500ms work sub-delay
    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(broker.queue_depth("orders_q").unwrap(), 0);

    let msg = consumed.next().await.unwrap().unwrap();
    assert_eq!(msg.uuid, receipt.message_id());
    assert_eq!(msg.status(), MessageStatus::Consumed);
    assert_eq!(handle.stats().processed_count, 1);
}

#[tokio::test(start_paused = true)]
async fn backlog_grows_while_consumer_is_inactive() {
    let broker = broker_with(ExchangeKind::Direct);
    broker.add_queue("q").unwrap();
    broker.bind_queue("q", "a").unwrap();

    let handle = broker.spawn_consumer("q").unwrap();
    handle.set_active(false);

    for i in 0..20 {
        broker.publish("a", format!("backlog {i}")).unwrap();
    }
    tokio::time::sleep(Duration::from_secs(30)).await;

    // backpressure is "do nothing": producers are never rejected
    assert_eq!(broker.queue_depth("q").unwrap(), 20);
    assert_eq!(handle.stats().processed_count, 0);
    assert_eq!(handle.stats().status, ConsumerStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn drain_all_bypasses_the_timer() {
    let broker = broker_with(ExchangeKind::Direct);
    broker.add_queue("q").unwrap();
    broker.bind_queue("q", "a").unwrap();

    let handle = broker.spawn_consumer("q").unwrap();
    handle.set_active(false);
    for i in 0..7 {
        broker.publish("a", format!("bulk {i}")).unwrap();
    }

    let mut consumed = handle.subscribe();
    assert_eq!(handle.drain_all().unwrap(), 7);
    assert_eq!(broker.queue_depth("q").unwrap(), 0);
    assert_eq!(handle.stats().processed_count, 7);

    for i in 0..7 {
        let msg = consumed.next().await.unwrap().unwrap();
        assert_eq!(msg.payload, format!("bulk {i}"));
    }
}

#[tokio::test(start_paused = true)]
async fn fanout_feeds_every_queue_one_copy() {
    let broker = broker_with(ExchangeKind::Fanout);
    for name in ["q1", "q2", "q3"] {
        broker.add_queue(name).unwrap();
        broker.bind_queue(name, "ignored").unwrap();
    }

    let receipt = broker.publish("whatever.key", "broadcast").unwrap();
    assert_eq!(receipt.delivered_count, 3);
    for name in ["q1", "q2", "q3"] {
        assert_eq!(broker.queue_depth(name).unwrap(), 1);
    }

    // queues drain independently, each on its own consumer
    let handles: Vec<_> = ["q1", "q2", "q3"]
        .iter()
        .map(|name| broker.spawn_consumer(name).unwrap())
        .collect();
    tokio::time::sleep(Duration::from_millis(3000)).await;
    for (name, handle) in ["q1", "q2", "q3"].iter().zip(&handles) {
        assert_eq!(broker.queue_depth(name).unwrap(), 0);
        assert_eq!(handle.stats().processed_count, 1);
    }
}

#[tokio::test(start_paused = true)]
async fn topic_routing_end_to_end() {
    let broker = broker_with(ExchangeKind::Topic);
    broker.add_queue("orders_q").unwrap();
    broker.add_queue("billing_q").unwrap();
    broker.bind_queue("orders_q", "orders.#").unwrap();
    broker.bind_queue("billing_q", "billing.*").unwrap();

    assert_eq!(broker.publish("orders", "zero segs").unwrap().delivered_count, 1);
    assert_eq!(broker.publish("orders.created", "one").unwrap().delivered_count, 1);
    assert_eq!(broker.publish("orders.created.eu", "two").unwrap().delivered_count, 1);
    assert_eq!(broker.publish("billing.created", "other").unwrap().delivered_count, 1);

    assert_eq!(broker.queue_depth("orders_q").unwrap(), 3);
    assert_eq!(broker.queue_depth("billing_q").unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn queue_deletion_guard_round_trip() {
    let broker = broker_with(ExchangeKind::Direct);
    broker.add_queue("q").unwrap();
    broker.bind_queue("q", "a").unwrap();
    broker.bind_queue("q", "b").unwrap();

    match broker.remove_queue("q") {
        Err(BrokerError::QueueInUse { queue, bindings }) => {
            assert_eq!(queue, "q");
            assert_eq!(bindings, 2);
        }
        other => panic!("expected QueueInUse, got {other:?}"),
    }

    broker.unbind_queue("q", "a").unwrap();
    broker.unbind_queue("q", "b").unwrap();
    broker.remove_queue("q").unwrap();
}

#[tokio::test(start_paused = true)]
async fn metrics_reflect_consumed_traffic() {
    let broker = broker_with(ExchangeKind::Direct);
    broker.add_queue("q").unwrap();
    broker.bind_queue("q", "a").unwrap();

    let handle = broker.spawn_consumer("q").unwrap();
    handle.set_active(false);
    for i in 0..4 {
        broker.publish("a", format!("m{i}")).unwrap();
    }
    handle.drain_all().unwrap();

    let now = SystemTime::now();
    let rates = broker.rates(now);
    assert_eq!(rates.produced_per_min, 4);
    assert_eq!(rates.consumed_per_min, 4);
    assert_eq!(rates.produced_avg_per_min, 0.8);

    let series = broker.time_series("q", Window::LastHour, now).unwrap();
    assert_eq!(series.len(), 13);
    let last = series.last().unwrap();
    assert_eq!(last.produced, 4);
    assert_eq!(last.consumed, 4);
    assert_eq!(last.queue_depth, 0);

    // read queries are idempotent
    assert_eq!(broker.rates(now), rates);
}
