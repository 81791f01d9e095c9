//! # LMS (Large Message Segmentation)
//!
//! Kafka 호환 브로커용 투명 대용량 메시지 계층
//!
//! ## 핵심 특징
//! - **투명 분할**: 브로커 레코드 한도를 넘는 페이로드를 청크 레코드로 분할 전송
//! - **투명 재조립**: 수신측에서 원본 페이로드를 바이트 단위로 복원, 완성된 메시지만 전달
//! - **경계 메모리**: 조립 풀 바이트 상한 + 오래된 버퍼 우선 축출
//! - **패스스루**: 래퍼 없이 생산된 레코드는 그대로 전달 (하위 호환)
//! - **스킵 정책**: 직렬화/손상/부분전송 오류를 skip 또는 fail로 분류
//! - **브로커 무변경**: 키 단위 순서 보장만 있으면 어떤 전송 계층 위에서도 동작

pub mod assembler;
pub mod chunk;
pub mod config;
pub mod consumer;
pub mod error;
pub mod message;
pub mod producer;
pub mod stats;
pub mod transport;

pub use assembler::{
    AssemblyBuffer, DropReason, EvictionCallback, EvictionReason, MessageAssembler, RouteOutcome,
};
pub use chunk::{Chunk, ChunkHeader, MessageId, MessageSplitter};
pub use config::Config;
pub use consumer::Consumer;
pub use error::{DecodeError, Disposition, Error, Result, SkippablePolicy};
pub use message::{
    BytesSerializer, ConsumerRecord, ProducerRecord, RawRecord, SendAck, Serializer,
    StringSerializer,
};
pub use producer::{DispatchState, Producer, SendSequencer};
pub use stats::{AssemblyStats, ProducerStats};
pub use transport::{LoopbackTransport, RecordTransport};

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 매직 넘버 (청크 레코드 식별용)
pub const MAGIC_NUMBER: u32 = 0x4C4D_5347; // "LMSG"

/// 청크 헤더 크기 (바이트)
///
/// magic(4) + version(1) + message_id(16) + sequence_number(4)
/// + segment_count(4) + crc32(4) + payload_len(4)
pub const CHUNK_HEADER_LEN: usize = 37;

/// 기본 브로커 레코드 한도 (바이트)
pub const DEFAULT_MAX_RECORD_SIZE: usize = 1024 * 1024; // 1MB

/// 기본 세그먼트 크기 (청크당 페이로드 바이트)
///
/// 브로커 레코드 한도에서 청크 헤더 오버헤드를 뺀 값
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = DEFAULT_MAX_RECORD_SIZE - CHUNK_HEADER_LEN;
