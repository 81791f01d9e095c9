//! 엔드투엔드 테스트
//!
//! 루프백 전송 위에서 프로듀서 -> 컨슈머 전 경로를 검증

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use lms::{
    BytesSerializer, Chunk, Config, Consumer, Error, LoopbackTransport, MessageSplitter, Producer,
    ProducerRecord, RawRecord, Result, Serializer, StringSerializer,
};

const RECORD_COUNT: usize = 1000;

fn small_config(max_segment_size: usize, skip: bool) -> Config {
    Config {
        max_segment_size,
        skip_on_skippable: skip,
        ..Config::default()
    }
}

fn string_producer(
    transport: Arc<LoopbackTransport>,
    config: Config,
) -> Producer<String> {
    Producer::new(config, transport, Box::new(StringSerializer)).unwrap()
}

/// 컨슈머에서 기대 수만큼 레코드를 모음 (30초 상한)
async fn drain(consumer: &Consumer, expected: usize) -> Vec<lms::ConsumerRecord> {
    let mut records = Vec::with_capacity(expected);
    let deadline = Instant::now() + Duration::from_secs(30);

    while records.len() < expected && Instant::now() < deadline {
        records.extend(consumer.poll(Duration::from_millis(20)).await.unwrap());
    }
    records
}

#[tokio::test]
async fn test_send_all_records_consumed() {
    // 작은 레코드 대량 전송: 전부 한 번씩 도착해야 함
    let transport = Arc::new(LoopbackTransport::new());
    let producer = string_producer(transport.clone(), small_config(1000, false));
    let consumer = Consumer::new(small_config(1000, false), transport).unwrap();

    for i in 0..RECORD_COUNT {
        producer
            .send(ProducerRecord::new("bulk", i.to_string()))
            .await
            .unwrap();
    }
    producer.close();

    let records = drain(&consumer, RECORD_COUNT).await;
    assert_eq!(records.len(), RECORD_COUNT);

    let mut seen = vec![false; RECORD_COUNT];
    for record in &records {
        let index: usize = std::str::from_utf8(&record.payload)
            .unwrap()
            .parse()
            .unwrap();
        assert!(!seen[index], "레코드 {} 중복 전달", index);
        seen[index] = true;
    }
    assert!(seen.iter().all(|&s| s));

    consumer.close();
}

#[tokio::test]
async fn test_large_payload_round_trip() {
    // 세그먼트 수백 개짜리 페이로드가 바이트 단위로 복원돼야 함
    let transport = Arc::new(LoopbackTransport::new());
    let config = small_config(4096, false);
    let producer: Producer<Bytes> = Producer::new(
        config.clone(),
        transport.clone(),
        Box::new(BytesSerializer),
    )
    .unwrap();
    let consumer = Consumer::new(config, transport).unwrap();

    let payload: Vec<u8> = (0..1_000_000usize).map(|i| (i % 251) as u8).collect();
    let payload = Bytes::from(payload);

    producer
        .send(ProducerRecord::with_key("big", &b"k1"[..], payload.clone()))
        .await
        .unwrap();

    let records = drain(&consumer, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload, payload);
    assert_eq!(consumer.stats().completed_messages, 1);
    assert!(producer.stats().messages_split >= 1);

    producer.close();
    consumer.close();
}

#[tokio::test]
async fn test_out_of_order_and_duplicate_delivery() {
    // 전송 계층이 순서를 섞고 재전달해도 재조립은 한 번, 바이트 동일
    let transport = Arc::new(LoopbackTransport::new());
    let consumer = Consumer::new(small_config(1000, false), transport.clone()).unwrap();

    let payload: Vec<u8> = (0..2500usize).map(|i| (i * 13) as u8).collect();
    let chunks = MessageSplitter::new(1000).unwrap().split(&payload);
    assert_eq!(chunks.len(), 3);

    let inject = |chunk: &Chunk| {
        transport.inject(RawRecord {
            topic: "shuffled".into(),
            key: None,
            payload: Bytes::from(chunk.to_bytes()),
        });
    };

    // 2, 0, 2(중복), 1, 0(중복) 순서로 주입
    inject(&chunks[2]);
    inject(&chunks[0]);
    inject(&chunks[2]);
    inject(&chunks[1]);
    inject(&chunks[0]);

    let records = drain(&consumer, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0].payload[..], &payload[..]);

    // 완성 후 도착한 중복은 새 버퍼를 만들 수 있으나 두 번째 전달은 없음
    let extra = consumer.poll(Duration::from_millis(20)).await.unwrap();
    assert!(extra.is_empty());
    assert_eq!(consumer.stats().completed_messages, 1);

    consumer.close();
}

/// "ErrorBytes" 값에서만 실패하는 직렬화기
struct ErrorThrowingSerializer;

impl Serializer<String> for ErrorThrowingSerializer {
    fn serialize(&self, topic: &str, value: &String) -> Result<Vec<u8>> {
        if value == "ErrorBytes" {
            return Err(Error::Serialization {
                topic: topic.to_string(),
                reason: "직렬화 불가 값".into(),
            });
        }
        StringSerializer.serialize(topic, value)
    }
}

#[tokio::test]
async fn test_skippable_serialization_error_drops_only_bad_record() {
    // 나쁜 레코드 하나 + 정상 레코드 하나, skip_on_skippable=true
    // -> send에서 에러가 새어나오지 않고 정확히 1건만 소비됨
    let transport = Arc::new(LoopbackTransport::new());
    let config = small_config(1000, true);
    let producer: Producer<String> = Producer::new(
        config.clone(),
        transport.clone(),
        Box::new(ErrorThrowingSerializer),
    )
    .unwrap();
    let consumer = Consumer::new(config, transport).unwrap();

    let skipped = producer
        .send(ProducerRecord::new("events", "ErrorBytes".to_string()))
        .await
        .unwrap();
    assert!(skipped.is_none());

    let sent = producer
        .send(ProducerRecord::new("events", "value".to_string()))
        .await
        .unwrap();
    assert!(sent.is_some());
    producer.close();

    let records = drain(&consumer, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0].payload[..], b"value");

    // 추가 레코드가 없어야 함
    let extra = consumer.poll(Duration::from_millis(20)).await.unwrap();
    assert!(extra.is_empty());
    assert_eq!(producer.stats().records_skipped, 1);

    consumer.close();
}

#[tokio::test]
async fn test_serialization_error_propagates_by_default() {
    let transport = Arc::new(LoopbackTransport::new());
    let producer: Producer<String> = Producer::new(
        small_config(1000, false),
        transport,
        Box::new(ErrorThrowingSerializer),
    )
    .unwrap();

    let result = producer
        .send(ProducerRecord::new("events", "ErrorBytes".to_string()))
        .await;
    assert!(matches!(result, Err(Error::Serialization { .. })));

    producer.close();
}

#[tokio::test]
async fn test_partial_send_is_never_delivered() {
    // 세그먼트 2/3에서 전송 실패 -> 이후 세그먼트는 와이어에 없고
    // 컨슈머는 해당 메시지를 영원히 완성하지 못함
    let transport = Arc::new(LoopbackTransport::new());
    transport.fail_after_sends(2);

    let producer = string_producer(transport.clone(), small_config(1000, false));
    let consumer = Consumer::new(small_config(1000, false), transport.clone()).unwrap();

    let result = producer
        .send(ProducerRecord::new("events", "x".repeat(2500)))
        .await;
    match result {
        Err(Error::PartialSend { succeeded, total }) => {
            assert_eq!(succeeded, 2);
            assert_eq!(total, 3);
        }
        other => panic!("PartialSend 기대, 실제: {:?}", other.map(|_| ())),
    }

    // 도착분은 버퍼링만 되고 전달은 없음
    let records = consumer.poll(Duration::from_millis(50)).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(consumer.buffered_messages(), 1);
    assert_eq!(consumer.stats().completed_messages, 0);

    producer.close();
    consumer.close();
}

#[tokio::test]
async fn test_eviction_reported_for_abandoned_message() {
    // 일부 세그먼트만 도착한 메시지는 시간 초과로 축출되고 콜백으로 보고됨
    let transport = Arc::new(LoopbackTransport::new());
    let config = Config {
        max_segment_size: 1000,
        max_assembly_age_ms: 200,
        sweep_interval_ms: 50,
        ..Config::default()
    };
    let consumer = Consumer::new(config, transport.clone()).unwrap();

    let evicted = Arc::new(AtomicUsize::new(0));
    let evicted_cb = evicted.clone();
    consumer.set_eviction_callback(Box::new(move |_, _| {
        evicted_cb.fetch_add(1, Ordering::SeqCst);
    }));

    let chunks = MessageSplitter::new(1000).unwrap().split(&[7u8; 2500]);
    for chunk in &chunks[..2] {
        transport.inject(RawRecord {
            topic: "events".into(),
            key: None,
            payload: Bytes::from(chunk.to_bytes()),
        });
    }

    let records = consumer.poll(Duration::from_millis(50)).await.unwrap();
    assert!(records.is_empty());
    assert_eq!(consumer.buffered_messages(), 1);

    // 스윕 태스크가 축출할 때까지 대기
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(evicted.load(Ordering::SeqCst), 1);
    assert_eq!(consumer.buffered_messages(), 0);
    assert_eq!(consumer.stats().evicted_expired, 1);

    consumer.close();
}

#[tokio::test]
async fn test_mixed_wrapped_and_plain_producers() {
    // 래퍼 프로듀서와 일반 프로듀서가 같은 토픽에 쓸 때
    // 일반 레코드는 패스스루로 그대로 나와야 함
    let transport = Arc::new(LoopbackTransport::new());
    let producer = string_producer(transport.clone(), small_config(1000, false));
    let consumer = Consumer::new(small_config(1000, false), transport.clone()).unwrap();

    producer
        .send(ProducerRecord::new("mixed", "wrapped".to_string()))
        .await
        .unwrap();
    transport.inject(RawRecord {
        topic: "mixed".into(),
        key: None,
        payload: Bytes::from_static(b"plain"),
    });

    let records = drain(&consumer, 2).await;
    assert_eq!(records.len(), 2);

    let payloads: Vec<&[u8]> = records.iter().map(|r| &r.payload[..]).collect();
    assert!(payloads.contains(&&b"wrapped"[..]));
    assert!(payloads.contains(&&b"plain"[..]));
    assert_eq!(consumer.stats().passthrough_records, 1);

    producer.close();
    consumer.close();
}
