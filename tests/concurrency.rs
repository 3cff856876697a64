use bytes::BytesMut;
use mqtt_wire::core::codec::MqttCodec;
use mqtt_wire::core::qos::QoS;
use mqtt_wire::error::ProtocolError;
use mqtt_wire::persistence::{Direction, Store};
use mqtt_wire::protocol::packet::Packet;
use mqtt_wire::protocol::publish::Publish;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_encode_decode_heavy() {
    use tokio::task::JoinSet;

    let iterations = 5_000usize;
    let payload_sizes = [0usize, 64, 512, 4096, 65536];

    let mut tasks = JoinSet::new();
    for &size in &payload_sizes {
        tasks.spawn(async move {
            let mut codec = MqttCodec::default();
            let mut buf = BytesMut::new();
            for i in 0..iterations {
                let payload = vec![((i + size) & 0xFF) as u8; size];
                let id = (i % usize::from(u16::MAX)) as u16 + 1;
                let packet =
                    Packet::from(Publish::new("load/test", QoS::AtLeastOnce, payload).with_packet_id(id));
                codec.encode(&packet, &mut buf).unwrap();
                let decoded = codec.decode(&mut buf).unwrap();
                assert_eq!(decoded, Some(packet));
                assert!(buf.is_empty());
            }
        });
    }

    while let Some(res) = tasks.join_next().await {
        res.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_store_transactions_complete_before_shutdown() {
    use tokio::task::JoinSet;

    let dir = tempfile::tempdir().unwrap();
    let store = Store::durable(dir.path()).unwrap();
    let sessions = store.sessions().unwrap();

    let mut tasks = JoinSet::new();
    for worker in 0..8u16 {
        let sessions = sessions.clone();
        tasks.spawn_blocking(move || {
            let session = sessions.new_session(&format!("client-{worker}")).unwrap();
            let messages = session.messages().unwrap();
            for i in 1..=20u16 {
                let packet = Packet::from(
                    Publish::new("drain/test", QoS::ExactlyOnce, "x").with_packet_id(i),
                );
                messages.store(Direction::Out, &[packet]).unwrap();
            }
            messages.load().unwrap().outgoing.len()
        });
    }

    let mut total = 0;
    while let Some(res) = tasks.join_next().await {
        total += res.unwrap();
    }
    assert_eq!(total, 160);

    let closer = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || store.shutdown())
    };
    closer.await.unwrap().unwrap();
    assert!(!store.is_open());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_during_durable_writes_keeps_acknowledged_messages() {
    use tokio::task::JoinSet;

    let dir = tempfile::tempdir().unwrap();
    let store = Store::durable(dir.path()).unwrap();
    let sessions = store.sessions().unwrap();
    let acknowledged = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for worker in 0..8u16 {
        let messages = sessions
            .new_session(&format!("client-{worker}"))
            .unwrap()
            .messages()
            .unwrap();
        let acknowledged = Arc::clone(&acknowledged);
        tasks.spawn_blocking(move || {
            let mut stored = Vec::new();
            for i in 0..100_000u32 {
                let topic = format!("race/{worker}/{i}");
                let packet = Packet::from(
                    Publish::new(topic.clone(), QoS::AtLeastOnce, "x").with_packet_id(1),
                );
                match messages.store(Direction::Out, &[packet]) {
                    Ok(()) => {
                        stored.push(topic);
                        acknowledged.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(ProtocolError::NotOpen) => break,
                    Err(e) => panic!("write failed during shutdown: {e}"),
                }
            }
            (worker, stored)
        });
    }

    // shut down while every writer is still mid-stream
    while acknowledged.load(Ordering::SeqCst) < 64 {
        tokio::task::yield_now().await;
    }
    let closer = {
        let store = store.clone();
        tokio::task::spawn_blocking(move || store.shutdown())
    };
    closer.await.unwrap().unwrap();

    let mut written = Vec::new();
    while let Some(res) = tasks.join_next().await {
        written.push(res.unwrap());
    }

    let reopened = Store::durable(dir.path()).unwrap();
    let sessions = reopened.sessions().unwrap();
    for (worker, stored) in written {
        let outgoing = sessions
            .get(&format!("client-{worker}"))
            .unwrap()
            .messages()
            .unwrap()
            .load()
            .unwrap()
            .outgoing;
        let topics: Vec<String> = outgoing
            .into_iter()
            .map(|packet| match packet {
                Packet::Publish(publish) => publish.topic,
                other => panic!("unexpected packet {other:?}"),
            })
            .collect();
        assert_eq!(topics, stored, "client-{worker}");
    }
    reopened.shutdown().unwrap();
}
