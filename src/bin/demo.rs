//! LMS 데모 - Large Message Segmentation
//!
//! 루프백 전송 위에서 프로듀서/컨슈머를 연결해 대용량 페이로드
//! 왕복을 검증하는 데모
//!
//! 사용법:
//!   cargo run --release --bin lms-demo -- [OPTIONS]
//!
//! 예시:
//!   # 기본 전송 (8MB 페이로드, 1MB 세그먼트)
//!   cargo run --release --bin lms-demo
//!
//!   # 작은 세그먼트로 분할 수 늘리기
//!   cargo run --release --bin lms-demo -- --payload-size 4194304 --segment-size 65536

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lms::{
    BytesSerializer, Config, Consumer, LoopbackTransport, Producer, ProducerRecord,
};

/// 데모 설정
struct DemoConfig {
    payload_size: usize,
    record_count: usize,
    config: Config,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            payload_size: 8 * 1024 * 1024, // 8MB
            record_count: 4,
            config: Config::default(),
        }
    }
}

fn parse_args() -> DemoConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DemoConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--payload-size" | "-p" => {
                if i + 1 < args.len() {
                    config.payload_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--record-count" | "-n" => {
                if i + 1 < args.len() {
                    config.record_count = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--segment-size" => {
                if i + 1 < args.len() {
                    config.config.max_segment_size =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--pool-bytes" => {
                if i + 1 < args.len() {
                    config.config.max_assembly_pool_bytes =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"LMS Demo - Large Message Segmentation 데모

브로커 레코드 한도를 넘는 페이로드를 분할/재조립으로 왕복 검증
- 프로듀서: 분할 + 순서 보장 디스패치
- 컨슈머: 경계 메모리 재조립 + 패스스루

사용법:
  cargo run --release --bin lms-demo -- [OPTIONS]

옵션:
  -p, --payload-size <BYTES>   레코드당 페이로드 크기 (기본: 8388608 = 8MB)
  -n, --record-count <N>       전송할 레코드 수 (기본: 4)
  --segment-size <BYTES>       청크당 페이로드 크기 (기본: 1MB - 헤더)
  --pool-bytes <BYTES>         조립 풀 상한 (기본: 33554432 = 32MB)
  -h, --help                   이 도움말 출력

예시:
  # 64KB 세그먼트로 잘게 분할
  cargo run --release --bin lms-demo -- --segment-size 65536
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let demo = parse_args();

    info!("LMS Demo starting...");
    info!("Payload size: {} bytes x {}", demo.payload_size, demo.record_count);
    info!("Segment size: {} bytes", demo.config.max_segment_size);
    info!(
        "Assembly pool: {} bytes, age {}ms",
        demo.config.max_assembly_pool_bytes, demo.config.max_assembly_age_ms
    );

    // 인프로세스 루프백 전송으로 프로듀서/컨슈머 연결
    let transport = Arc::new(LoopbackTransport::new());
    let producer: Producer<Bytes> = Producer::new(
        demo.config.clone(),
        transport.clone(),
        Box::new(BytesSerializer),
    )?;
    let consumer = Consumer::new(demo.config.clone(), transport)?;

    let start = Instant::now();
    let mut sent_payloads = Vec::with_capacity(demo.record_count);

    for seq in 0..demo.record_count {
        // 레코드마다 다른 패턴으로 채워 재조립 검증을 의미 있게 만듦
        let payload: Vec<u8> = (0..demo.payload_size)
            .map(|idx| ((idx + seq * 31) % 251) as u8)
            .collect();
        let payload = Bytes::from(payload);
        sent_payloads.push(payload.clone());

        let message_id = producer
            .send(ProducerRecord::with_key(
                "lms-demo",
                format!("key-{}", seq),
                payload,
            ))
            .await?;

        info!(
            "레코드 {} 전송: {} bytes, message={:?}",
            seq, demo.payload_size, message_id
        );
    }

    // 전부 재조립될 때까지 수신
    let mut received = Vec::with_capacity(demo.record_count);
    let deadline = Instant::now() + Duration::from_secs(30);

    while received.len() < demo.record_count && Instant::now() < deadline {
        let records = consumer.poll(Duration::from_millis(100)).await?;
        for record in records {
            info!("레코드 수신: {} bytes, key={:?}", record.payload.len(), record.key);
            received.push(record);
        }
    }

    // 바이트 단위 검증
    if received.len() != demo.record_count {
        return Err(format!(
            "수신 레코드 부족: {}/{}",
            received.len(),
            demo.record_count
        )
        .into());
    }

    for (seq, record) in received.iter().enumerate() {
        if record.payload != sent_payloads[seq] {
            return Err(format!("레코드 {} 페이로드 불일치", seq).into());
        }
    }

    let elapsed = start.elapsed();
    let total_bytes = demo.payload_size * demo.record_count;

    info!("왕복 검증 완료: {} bytes, {:.2}s", total_bytes, elapsed.as_secs_f64());
    info!(
        "Throughput: {:.2} MB/s",
        total_bytes as f64 / elapsed.as_secs_f64() / 1_000_000.0
    );
    info!("Producer: {}", producer.stats().summary());
    info!("Consumer: {}", consumer.stats().summary());

    producer.close();
    consumer.close();

    Ok(())
}
