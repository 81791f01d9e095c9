//! 프로듀서 래퍼 (송신측)
//!
//! - 대용량 페이로드 분할 전송
//! - 세그먼트 순서 보장 디스패치
//! - 스킵 정책 적용

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::chunk::{Chunk, MessageId, MessageSplitter};
use crate::config::Config;
use crate::error::{Disposition, Error, Result, SkippablePolicy};
use crate::message::{ProducerRecord, RawRecord, Serializer};
use crate::stats::ProducerStats;
use crate::transport::RecordTransport;

/// 메시지 하나의 전송 진행 상태
#[derive(Debug, Clone, Copy)]
pub struct DispatchState {
    /// 총 세그먼트 수
    pub total: u32,

    /// 수락된 세그먼트 수
    pub sent: u32,
}

/// 세그먼트 순서 보장 디스패처
///
/// 세그먼트 i+1은 i의 send가 수락된 뒤에만 전송하여 전송 계층의
/// 세그먼트 단위 순서 보장에 기대지 않고 브로커 레벨 순서를 만듦.
/// 첫 실패 시 나머지 세그먼트는 전송하지 않음: 부분 전송 메시지는
/// 컨슈머가 완성할 수 없으므로 와이어 낭비일 뿐임.
pub struct SendSequencer {
    transport: Arc<dyn RecordTransport>,

    /// 진행 중 메시지 상태 (message_id -> 진행도)
    in_flight: DashMap<MessageId, DispatchState>,

    /// 종료 플래그 (프로듀서와 공유)
    closed: Arc<AtomicBool>,
}

impl SendSequencer {
    pub fn new(transport: Arc<dyn RecordTransport>, closed: Arc<AtomicBool>) -> Self {
        Self {
            transport,
            in_flight: DashMap::new(),
            closed,
        }
    }

    /// 진행 중 메시지 수
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// 한 메시지의 청크들을 순서대로 전송
    ///
    /// 실패하거나 종료되면 `PartialSend{succeeded, total}`.
    /// 종료 확인은 세그먼트 경계마다 수행됨.
    pub async fn dispatch(
        &self,
        topic: &str,
        key: Option<Bytes>,
        chunks: Vec<Chunk>,
    ) -> Result<()> {
        let total = chunks.len() as u32;
        let message_id = match chunks.first() {
            Some(chunk) => chunk.header.message_id,
            None => return Ok(()),
        };

        self.in_flight
            .insert(message_id, DispatchState { total, sent: 0 });

        let mut sent = 0u32;
        for chunk in &chunks {
            if self.closed.load(Ordering::SeqCst) {
                self.in_flight.remove(&message_id);
                return Err(Error::PartialSend {
                    succeeded: sent,
                    total,
                });
            }

            let record = RawRecord {
                topic: topic.to_string(),
                key: key.clone(),
                payload: Bytes::from(chunk.to_bytes()),
            };

            match self.transport.send(record).await {
                Ok(_ack) => {
                    sent += 1;
                    if let Some(mut state) = self.in_flight.get_mut(&message_id) {
                        state.sent = sent;
                    }
                }
                Err(error) => {
                    warn!(
                        "세그먼트 전송 실패: message={}, seq={}/{}, {}",
                        message_id, chunk.header.sequence_number, total, error
                    );
                    self.in_flight.remove(&message_id);
                    return Err(Error::PartialSend {
                        succeeded: sent,
                        total,
                    });
                }
            }
        }

        self.in_flight.remove(&message_id);
        Ok(())
    }
}

/// 대용량 메시지 프로듀서 래퍼
///
/// 호출자는 브로커 한도를 신경쓰지 않고 send. 한도 초과 페이로드는
/// 투명하게 분할되고, 스킵 정책에 따라 실패가 처리됨
pub struct Producer<V> {
    policy: SkippablePolicy,
    splitter: MessageSplitter,
    serializer: Box<dyn Serializer<V>>,
    sequencer: SendSequencer,
    stats: RwLock<ProducerStats>,
    closed: Arc<AtomicBool>,
}

impl<V> Producer<V> {
    /// 새 프로듀서 생성 (설정 검증 포함)
    pub fn new(
        config: Config,
        transport: Arc<dyn RecordTransport>,
        serializer: Box<dyn Serializer<V>>,
    ) -> Result<Self> {
        config.validate()?;

        let splitter = MessageSplitter::new(config.max_segment_size)?;
        let policy = SkippablePolicy::new(config.skip_on_skippable);
        let closed = Arc::new(AtomicBool::new(false));

        info!(
            "LMS Producer started: max_segment_size={}, skip_on_skippable={}",
            config.max_segment_size, config.skip_on_skippable
        );

        Ok(Self {
            policy,
            splitter,
            serializer,
            sequencer: SendSequencer::new(transport, closed.clone()),
            stats: RwLock::new(ProducerStats::new()),
            closed,
        })
    }

    /// 레코드 전송
    ///
    /// 성공 시 메시지 ID, 정책상 스킵된 레코드는 `Ok(None)`
    pub async fn send(&self, record: ProducerRecord<V>) -> Result<Option<MessageId>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ProducerClosed);
        }

        // 직렬화 (스킵 후보 지점)
        let payload = match self.serializer.serialize(&record.topic, &record.value) {
            Ok(payload) => payload,
            Err(error) => return self.handle_failure(error),
        };

        let chunks = self.splitter.split(&payload);
        let segment_count = chunks.len();
        let message_id = chunks[0].header.message_id;

        debug!(
            "메시지 {} 분할: {} bytes, {} 세그먼트, topic={}",
            message_id,
            payload.len(),
            segment_count,
            record.topic
        );

        match self
            .sequencer
            .dispatch(&record.topic, record.key, chunks)
            .await
        {
            Ok(()) => {
                let mut stats = self.stats.write();
                stats.records_sent += 1;
                stats.segments_sent += segment_count as u64;
                stats.bytes_sent += payload.len() as u64;
                if segment_count > 1 {
                    stats.messages_split += 1;
                }
                Ok(Some(message_id))
            }
            Err(error) => {
                if matches!(error, Error::PartialSend { .. }) {
                    self.stats.write().partial_sends += 1;
                }
                self.handle_failure(error)
            }
        }
    }

    /// 실패를 정책에 따라 스킵 또는 전파
    fn handle_failure(&self, error: Error) -> Result<Option<MessageId>> {
        match self.policy.classify(&error) {
            Disposition::Skip => {
                warn!("스킵 가능 에러로 레코드 버림: {}", error);
                self.stats.write().records_skipped += 1;
                Ok(None)
            }
            Disposition::Fail => Err(error),
        }
    }

    /// 프로듀서 종료
    ///
    /// 진행 중 디스패치는 다음 세그먼트 경계에서 중단되고
    /// `PartialSend`로 끝남
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("LMS Producer closed: {}", self.stats.read().summary());
        }
    }

    /// 종료 여부
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 진행 중 메시지 수
    pub fn in_flight_messages(&self) -> usize {
        self.sequencer.in_flight_len()
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> ProducerStats {
        self.stats.read().clone()
    }
}
