//! 조립 버퍼와 메시지 조립기 (컨슈머측)
//!
//! - 라우팅: 패스스루 / 버퍼링 / 완성 / 드랍
//! - 경계 메모리: 풀 바이트 상한, first_seen 오래된 버퍼 우선 축출
//! - 시간 초과 축출: route마다 기회적으로 + 주기 스윕
//!
//! 버퍼 상태 전이: Empty -> Partial -> Complete(즉시 제거)
//! 또는 Empty/Partial -> Evicted(전달 없이 제거, 콜백으로 보고)

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::chunk::{Chunk, MessageId};
use crate::error::DecodeError;
use crate::message::{ConsumerRecord, RawRecord};
use crate::stats::AssemblyStats;

/// 축출 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// max_assembly_age 경과
    Expired,

    /// 풀 바이트 상한에 밀려남
    Capacity,
}

/// 드랍 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// 손상 청크 (CRC/길이/순번/세그먼트 수 불일치)
    Corrupt { reason: String },

    /// 단일 청크 페이로드가 풀 상한보다 큼
    PoolOverflow,
}

/// route 결과
#[derive(Debug)]
pub enum RouteOutcome {
    /// 완성된 레코드 (패스스루 포함)
    Delivered(ConsumerRecord),

    /// 버퍼에 보관됨 (중복 청크 포함)
    Buffered,

    /// 버려짐
    Dropped(DropReason),
}

/// 축출 보고 콜백
///
/// 부분 조립 상태로 버려진 메시지는 조용히 사라지지 않고 여기로 보고됨.
/// 기본은 no-op.
pub type EvictionCallback = Box<dyn Fn(MessageId, EvictionReason) + Send + Sync>;

/// 청크 삽입 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InsertOutcome {
    Inserted,
    Duplicate,
    CountMismatch,
}

/// 진행 중인 메시지 하나의 조립 버퍼
#[derive(Debug)]
pub struct AssemblyBuffer {
    /// 메시지 ID
    message_id: MessageId,

    /// 총 세그먼트 수 (첫 청크에서 확정)
    segment_count: u32,

    /// 순번별 페이로드 슬롯
    slots: Vec<Option<Bytes>>,

    /// 수신된 세그먼트 수
    received_count: u32,

    /// 버퍼된 페이로드 바이트
    buffered_bytes: usize,

    /// 최초 수신 시간 (용량 축출 순서 기준)
    first_seen_at: Instant,

    /// 마지막 갱신 시간 (시간 초과 기준)
    last_updated_at: Instant,
}

impl AssemblyBuffer {
    fn new(message_id: MessageId, segment_count: u32, now: Instant) -> Self {
        Self {
            message_id,
            segment_count,
            slots: vec![None; segment_count as usize],
            received_count: 0,
            buffered_bytes: 0,
            first_seen_at: now,
            last_updated_at: now,
        }
    }

    /// 세그먼트 삽입 (멱등)
    ///
    /// 이미 채워진 슬롯은 그대로 둠 (at-least-once 재전달 가드)
    fn insert(&mut self, chunk: &Chunk, now: Instant) -> InsertOutcome {
        if chunk.header.segment_count != self.segment_count {
            return InsertOutcome::CountMismatch;
        }

        let seq = chunk.header.sequence_number as usize;
        if self.slots[seq].is_some() {
            return InsertOutcome::Duplicate;
        }

        self.buffered_bytes += chunk.payload.len();
        self.slots[seq] = Some(chunk.payload.clone());
        self.received_count += 1;
        self.last_updated_at = now;
        InsertOutcome::Inserted
    }

    /// 해당 순번 슬롯 보유 여부
    fn has_slot(&self, sequence_number: u32) -> bool {
        self.slots
            .get(sequence_number as usize)
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// 완성 여부
    pub fn is_complete(&self) -> bool {
        self.received_count == self.segment_count
    }

    /// 수신된 세그먼트 수
    pub fn received_count(&self) -> u32 {
        self.received_count
    }

    /// 총 세그먼트 수
    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    /// 버퍼된 바이트
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// 순번 순서로 이어붙여 원본 페이로드 복원
    fn into_payload(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.buffered_bytes);
        for slot in self.slots.into_iter().flatten() {
            buf.extend_from_slice(&slot);
        }
        buf.freeze()
    }
}

/// 메시지 조립기: 조립 버퍼 풀의 단독 소유자
///
/// 불변식: 풀 전체 버퍼 바이트 ≤ max_pool_bytes.
/// 완성된 버퍼는 즉시 제거되므로 완성 상태로 머무는 버퍼는 없음.
pub struct MessageAssembler {
    max_assembly_age: Duration,
    max_pool_bytes: usize,
    buffers: HashMap<MessageId, AssemblyBuffer>,
    total_buffered_bytes: usize,
    on_evicted: EvictionCallback,
    stats: AssemblyStats,
}

impl MessageAssembler {
    pub fn new(max_assembly_age: Duration, max_pool_bytes: usize) -> Self {
        Self {
            max_assembly_age,
            max_pool_bytes,
            buffers: HashMap::new(),
            total_buffered_bytes: 0,
            on_evicted: Box::new(|_, _| {}),
            stats: AssemblyStats::new(),
        }
    }

    /// 축출 콜백 등록 (기본은 no-op)
    pub fn set_eviction_callback(&mut self, callback: EvictionCallback) {
        self.on_evicted = callback;
    }

    /// 레코드 라우팅
    pub fn route(&mut self, record: RawRecord) -> RouteOutcome {
        self.route_at(record, Instant::now())
    }

    /// 명시적 시계로 라우팅 (결정적 테스트/스윕 조율용)
    pub fn route_at(&mut self, record: RawRecord, now: Instant) -> RouteOutcome {
        // 기회적 시간 초과 축출
        self.sweep_expired_at(now);

        let chunk = match Chunk::from_bytes(&record.payload) {
            Ok(chunk) => chunk,
            Err(DecodeError::NotAChunk) => {
                // 래퍼 없이 생산된 레코드는 그대로 전달
                self.stats.passthrough_records += 1;
                return RouteOutcome::Delivered(ConsumerRecord {
                    topic: record.topic,
                    key: record.key,
                    payload: record.payload,
                });
            }
            Err(DecodeError::Corrupt { reason }) => {
                warn!("손상 청크 버림: topic={}, {}", record.topic, reason);
                self.stats.corrupt_records += 1;
                return RouteOutcome::Dropped(DropReason::Corrupt { reason });
            }
        };

        self.stats.chunks_received += 1;
        let message_id = chunk.header.message_id;
        let incoming = chunk.payload.len();

        // 기존 버퍼 선검사: 중복이면 용량 처리 없이 조용히 무시
        if let Some(buffer) = self.buffers.get(&message_id) {
            if buffer.segment_count != chunk.header.segment_count {
                let reason = format!(
                    "세그먼트 수 불일치: message={}, {} != {}",
                    message_id, chunk.header.segment_count, buffer.segment_count
                );
                warn!("{}", reason);
                self.stats.corrupt_records += 1;
                return RouteOutcome::Dropped(DropReason::Corrupt { reason });
            }
            if buffer.has_slot(chunk.header.sequence_number) {
                self.stats.duplicate_chunks += 1;
                return RouteOutcome::Buffered;
            }
        }

        // 수용 공간 확보: first_seen 오래된 버퍼부터 축출
        if !self.make_room(incoming, now) {
            warn!(
                "풀 상한보다 큰 청크 버림: message={}, {} bytes > {} bytes",
                message_id, incoming, self.max_pool_bytes
            );
            self.stats.overflow_drops += 1;
            return RouteOutcome::Dropped(DropReason::PoolOverflow);
        }

        // make_room이 대상 버퍼 자체를 축출했을 수 있으므로 entry로 재조회
        let buffer = self
            .buffers
            .entry(message_id)
            .or_insert_with(|| AssemblyBuffer::new(message_id, chunk.header.segment_count, now));

        match buffer.insert(&chunk, now) {
            InsertOutcome::Inserted => {
                self.total_buffered_bytes += incoming;
                self.stats.buffered_bytes = self.total_buffered_bytes as u64;
            }
            InsertOutcome::Duplicate => {
                self.stats.duplicate_chunks += 1;
                return RouteOutcome::Buffered;
            }
            InsertOutcome::CountMismatch => {
                let reason = format!("세그먼트 수 불일치: message={}", message_id);
                self.stats.corrupt_records += 1;
                return RouteOutcome::Dropped(DropReason::Corrupt { reason });
            }
        }

        if buffer.is_complete() {
            // 완성 즉시 제거, 완성 상태로 머무는 버퍼는 없음
            if let Some(buffer) = self.buffers.remove(&message_id) {
                self.total_buffered_bytes -= buffer.buffered_bytes;
                self.stats.buffered_bytes = self.total_buffered_bytes as u64;
                self.stats.completed_messages += 1;

                let elapsed = now.duration_since(buffer.first_seen_at);
                let payload = buffer.into_payload();
                self.stats.completed_bytes += payload.len() as u64;

                debug!(
                    "메시지 {} 완성: {} bytes, {:.2}ms",
                    message_id,
                    payload.len(),
                    elapsed.as_secs_f64() * 1000.0
                );

                return RouteOutcome::Delivered(ConsumerRecord {
                    topic: record.topic,
                    key: record.key,
                    payload,
                });
            }
        }

        RouteOutcome::Buffered
    }

    /// 시간 초과 버퍼 축출
    pub fn sweep_expired(&mut self) -> Vec<MessageId> {
        self.sweep_expired_at(Instant::now())
    }

    /// 명시적 시계로 시간 초과 버퍼 축출
    ///
    /// 축출된 메시지 ID 목록 반환
    pub fn sweep_expired_at(&mut self, now: Instant) -> Vec<MessageId> {
        let mut expired: Vec<(Instant, MessageId)> = self
            .buffers
            .values()
            .filter(|buffer| {
                now.saturating_duration_since(buffer.last_updated_at) >= self.max_assembly_age
            })
            .map(|buffer| (buffer.first_seen_at, buffer.message_id))
            .collect();

        // 오래된 순서로 보고
        expired.sort_by_key(|(first_seen, _)| *first_seen);

        expired
            .into_iter()
            .map(|(_, message_id)| {
                self.evict(message_id, EvictionReason::Expired, now);
                message_id
            })
            .collect()
    }

    /// 버퍼된 메시지 수
    pub fn buffered_len(&self) -> usize {
        self.buffers.len()
    }

    /// 풀 전체 버퍼 바이트
    pub fn total_buffered_bytes(&self) -> usize {
        self.total_buffered_bytes
    }

    /// 통계 스냅샷
    pub fn stats(&self) -> AssemblyStats {
        self.stats.clone()
    }

    /// incoming 바이트를 수용할 때까지 오래된 버퍼부터 축출
    ///
    /// 풀 상한 자체보다 큰 페이로드면 false
    fn make_room(&mut self, incoming: usize, now: Instant) -> bool {
        if incoming > self.max_pool_bytes {
            return false;
        }

        while self.total_buffered_bytes + incoming > self.max_pool_bytes {
            let oldest = self
                .buffers
                .values()
                .min_by_key(|buffer| buffer.first_seen_at)
                .map(|buffer| buffer.message_id);

            match oldest {
                Some(message_id) => self.evict(message_id, EvictionReason::Capacity, now),
                None => break,
            }
        }

        self.total_buffered_bytes + incoming <= self.max_pool_bytes
    }

    fn evict(&mut self, message_id: MessageId, reason: EvictionReason, now: Instant) {
        if let Some(buffer) = self.buffers.remove(&message_id) {
            self.total_buffered_bytes -= buffer.buffered_bytes;
            self.stats.buffered_bytes = self.total_buffered_bytes as u64;
            match reason {
                EvictionReason::Expired => self.stats.evicted_expired += 1,
                EvictionReason::Capacity => self.stats.evicted_capacity += 1,
            }

            warn!(
                "조립 버퍼 축출: message={}, reason={:?}, {}/{} 세그먼트, {:.1}s 경과",
                message_id,
                reason,
                buffer.received_count,
                buffer.segment_count,
                now.saturating_duration_since(buffer.first_seen_at).as_secs_f64()
            );

            (self.on_evicted)(message_id, reason);
        }
    }
}
