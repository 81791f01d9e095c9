//! 전송/조립 통계

use std::time::{Duration, Instant};

/// 프로듀서측 통계
#[derive(Debug, Clone)]
pub struct ProducerStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 전송 완료된 논리 메시지 수
    pub records_sent: u64,

    /// 정책에 의해 스킵된 레코드 수
    pub records_skipped: u64,

    /// 분할이 필요했던 메시지 수 (세그먼트 2개 이상)
    pub messages_split: u64,

    /// 수락된 세그먼트 수
    pub segments_sent: u64,

    /// 전송된 페이로드 바이트 (헤더 제외)
    pub bytes_sent: u64,

    /// 부분 전송 실패 수
    pub partial_sends: u64,
}

impl ProducerStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            records_sent: 0,
            records_skipped: 0,
            messages_split: 0,
            segments_sent: 0,
            bytes_sent: 0,
            partial_sends: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 처리율 (bytes/sec)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_sent as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Records: {} sent, {} skipped | Split: {} | Segments: {} | Bytes: {} | Partial: {} | Throughput: {:.2} MB/s",
            self.records_sent,
            self.records_skipped,
            self.messages_split,
            self.segments_sent,
            self.bytes_sent,
            self.partial_sends,
            self.throughput() / 1_000_000.0,
        )
    }
}

impl Default for ProducerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// 조립측 통계
#[derive(Debug, Clone)]
pub struct AssemblyStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 수신한 청크 수
    pub chunks_received: u64,

    /// 조용히 무시된 중복 청크 수
    pub duplicate_chunks: u64,

    /// 패스스루로 전달된 레코드 수
    pub passthrough_records: u64,

    /// 손상으로 버린 레코드 수
    pub corrupt_records: u64,

    /// 풀 상한보다 커서 버린 청크 수
    pub overflow_drops: u64,

    /// 완성된 메시지 수
    pub completed_messages: u64,

    /// 완성 페이로드 바이트
    pub completed_bytes: u64,

    /// 시간 초과 축출 수
    pub evicted_expired: u64,

    /// 용량 축출 수
    pub evicted_capacity: u64,

    /// 현재 버퍼된 바이트 (게이지)
    pub buffered_bytes: u64,
}

impl AssemblyStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            chunks_received: 0,
            duplicate_chunks: 0,
            passthrough_records: 0,
            corrupt_records: 0,
            overflow_drops: 0,
            completed_messages: 0,
            completed_bytes: 0,
            evicted_expired: 0,
            evicted_capacity: 0,
            buffered_bytes: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 총 축출 수
    pub fn evicted_total(&self) -> u64 {
        self.evicted_expired + self.evicted_capacity
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Chunks: {} ({} dup) | Completed: {} msgs, {} bytes | Passthrough: {} | Corrupt: {} | Evicted: {} (age {}, cap {}) | Buffered: {} bytes",
            self.chunks_received,
            self.duplicate_chunks,
            self.completed_messages,
            self.completed_bytes,
            self.passthrough_records,
            self.corrupt_records,
            self.evicted_total(),
            self.evicted_expired,
            self.evicted_capacity,
            self.buffered_bytes,
        )
    }
}

impl Default for AssemblyStats {
    fn default() -> Self {
        Self::new()
    }
}
