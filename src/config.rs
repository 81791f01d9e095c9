//! 래퍼 설정

use std::time::Duration;

use crate::error::{Error, Result};
use crate::{CHUNK_HEADER_LEN, DEFAULT_MAX_SEGMENT_SIZE};

/// LMS 래퍼 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크당 최대 페이로드 크기 (바이트)
    ///
    /// 기본값은 브로커 레코드 한도에서 헤더 오버헤드를 뺀 값
    pub max_segment_size: usize,

    /// 미완성 조립 버퍼 최대 보존 시간 (밀리초)
    pub max_assembly_age_ms: u64,

    /// 조립 풀 전체 바이트 상한
    pub max_assembly_pool_bytes: usize,

    /// 축출 스윕 주기 (밀리초)
    pub sweep_interval_ms: u64,

    /// 스킵 후보 에러(직렬화/손상/부분전송)를 스킵할지 여부
    pub skip_on_skippable: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            max_assembly_age_ms: 60_000,                 // 60초
            max_assembly_pool_bytes: 32 * 1024 * 1024,   // 32MB
            sweep_interval_ms: 5_000,                    // 5초
            skip_on_skippable: false,                    // 기본은 전파
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정 검증
    ///
    /// 프로듀서/컨슈머 생성 시점에 호출되어 잘못된 값은 즉시 실패
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size <= CHUNK_HEADER_LEN {
            return Err(Error::Config {
                reason: format!(
                    "max_segment_size({})는 청크 헤더({} bytes)보다 커야 함",
                    self.max_segment_size, CHUNK_HEADER_LEN
                ),
            });
        }

        if self.max_assembly_pool_bytes < self.max_segment_size {
            return Err(Error::Config {
                reason: format!(
                    "max_assembly_pool_bytes({})는 max_segment_size({}) 이상이어야 함",
                    self.max_assembly_pool_bytes, self.max_segment_size
                ),
            });
        }

        if self.max_assembly_age_ms == 0 {
            return Err(Error::Config {
                reason: "max_assembly_age_ms는 0일 수 없음".into(),
            });
        }

        if self.sweep_interval_ms == 0 {
            return Err(Error::Config {
                reason: "sweep_interval_ms는 0일 수 없음".into(),
            });
        }

        Ok(())
    }

    /// 페이로드가 나뉠 세그먼트 수 계산
    pub fn segments_for(&self, payload_len: usize) -> usize {
        if payload_len == 0 {
            return 1;
        }
        (payload_len + self.max_segment_size - 1) / self.max_segment_size
    }

    /// 조립 버퍼 보존 시간
    pub fn max_assembly_age(&self) -> Duration {
        Duration::from_millis(self.max_assembly_age_ms)
    }

    /// 스윕 주기
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// 베스트 에포트 설정
    ///
    /// 스킵 가능 에러는 버리고 계속 진행, 버퍼는 짧게 유지
    pub fn best_effort() -> Self {
        Self {
            max_assembly_age_ms: 30_000,
            sweep_interval_ms: 2_000,
            skip_on_skippable: true,
            ..Self::default()
        }
    }

    /// 메모리 제약 환경용 설정
    pub fn constrained_memory() -> Self {
        Self {
            max_segment_size: 256 * 1024,              // 256KB
            max_assembly_age_ms: 15_000,
            max_assembly_pool_bytes: 4 * 1024 * 1024,  // 4MB
            sweep_interval_ms: 1_000,
            skip_on_skippable: false,
        }
    }
}
