//! 컨슈머 래퍼 (수신측)
//!
//! - poll 배치 라우팅: 완성된 메시지만 호출자에게 전달
//! - 주기 축출 스윕 태스크 (poll 경로와 뮤텍스 공유)
//! - 손상 레코드 스킵 정책

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::assembler::{DropReason, EvictionCallback, MessageAssembler, RouteOutcome};
use crate::config::Config;
use crate::error::{DecodeError, Disposition, Error, Result, SkippablePolicy};
use crate::message::ConsumerRecord;
use crate::stats::AssemblyStats;
use crate::transport::RecordTransport;

/// 대용량 메시지 컨슈머 래퍼
///
/// poll은 완전 조립된 페이로드만 반환하며 호출자는 세그먼트를 보지 않음
pub struct Consumer {
    transport: Arc<dyn RecordTransport>,

    /// poll 경로와 스윕 태스크가 공유하는 조립기
    assembler: Arc<Mutex<MessageAssembler>>,

    policy: SkippablePolicy,
    running: Arc<AtomicBool>,
}

impl Consumer {
    /// 새 컨슈머 생성 및 스윕 태스크 시작
    pub fn new(config: Config, transport: Arc<dyn RecordTransport>) -> Result<Self> {
        config.validate()?;

        let assembler = Arc::new(Mutex::new(MessageAssembler::new(
            config.max_assembly_age(),
            config.max_assembly_pool_bytes,
        )));
        let policy = SkippablePolicy::new(config.skip_on_skippable);
        let running = Arc::new(AtomicBool::new(true));

        // 주기 축출 스윕 태스크
        let assembler_sweep = assembler.clone();
        let running_sweep = running.clone();
        let sweep_interval = config.sweep_interval();

        tokio::spawn(async move {
            while running_sweep.load(Ordering::SeqCst) {
                tokio::time::sleep(sweep_interval).await;

                let evicted = assembler_sweep.lock().sweep_expired();
                if !evicted.is_empty() {
                    debug!("스윕 축출: {}개 버퍼", evicted.len());
                }
            }
        });

        info!(
            "LMS Consumer started: pool={} bytes, age={}ms, sweep={}ms",
            config.max_assembly_pool_bytes, config.max_assembly_age_ms, config.sweep_interval_ms
        );

        Ok(Self {
            transport,
            assembler,
            policy,
            running,
        })
    }

    /// 축출 보고 콜백 등록 (기본은 no-op)
    pub fn set_eviction_callback(&self, callback: EvictionCallback) {
        self.assembler.lock().set_eviction_callback(callback);
    }

    /// 완성된 레코드 수신
    ///
    /// 손상 레코드는 정책에 따라 스킵(계속) 또는 이 poll 호출만 중단.
    /// 축출은 에러로 올라오지 않고 콜백/통계로만 보고됨.
    pub async fn poll(&self, timeout: Duration) -> Result<Vec<ConsumerRecord>> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(Error::ConsumerClosed);
        }

        let raw_records = self.transport.poll(timeout).await?;
        let mut delivered = Vec::new();

        let mut assembler = self.assembler.lock();
        for raw in raw_records {
            match assembler.route(raw) {
                RouteOutcome::Delivered(record) => delivered.push(record),
                RouteOutcome::Buffered => {}
                RouteOutcome::Dropped(DropReason::Corrupt { reason }) => {
                    let error = Error::Decode(DecodeError::Corrupt { reason });
                    if self.policy.classify(&error) == Disposition::Fail {
                        return Err(error);
                    }
                    // Skip: 해당 레코드만 버리고 계속 (경고는 라우팅에서 남김)
                }
                RouteOutcome::Dropped(DropReason::PoolOverflow) => {
                    // 콜백/통계로 보고 완료, poll은 계속
                }
            }
        }

        Ok(delivered)
    }

    /// 컨슈머 종료 (스윕 태스크 중단)
    pub fn close(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("LMS Consumer closed: {}", self.assembler.lock().stats().summary());
        }
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 조립 중인 메시지 수
    pub fn buffered_messages(&self) -> usize {
        self.assembler.lock().buffered_len()
    }

    /// 조립 통계 스냅샷
    pub fn stats(&self) -> AssemblyStats {
        self.assembler.lock().stats()
    }
}
