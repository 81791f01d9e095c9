//! 전송 계층 경계
//!
//! 실제 브로커 클라이언트의 네트워크 IO/파티셔닝/오프셋 관리는
//! 전부 이 트레잇 뒤에 있음. 같은 키의 레코드는 전송 순서대로
//! poll에 돌아온다는 가정만 사용함.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::message::{RawRecord, SendAck};

/// 레코드 전송 계약 (브로커 클라이언트가 구현)
#[async_trait]
pub trait RecordTransport: Send + Sync {
    /// 레코드 한 건 전송, 수락 시 ack
    async fn send(&self, record: RawRecord) -> Result<SendAck>;

    /// 도착한 레코드 배치 수신
    ///
    /// 비어 있으면 timeout까지 대기 후 빈 배치 반환
    async fn poll(&self, timeout: Duration) -> Result<Vec<RawRecord>>;
}

/// 인프로세스 루프백 전송 (테스트/데모용)
///
/// send된 레코드를 FIFO 큐에 쌓고 poll로 꺼냄.
/// 브로커의 레코드 크기 한도와 전송 실패를 흉내낼 수 있음.
pub struct LoopbackTransport {
    queue: Mutex<VecDeque<RawRecord>>,

    /// 레코드 크기 한도 (브로커 max.message.bytes 대응), 0이면 무제한
    max_record_size: usize,

    /// n건 수락 후 전부 실패시키는 테스트 훅
    remaining_ok: Mutex<Option<u64>>,

    next_offset: AtomicU64,
}

impl LoopbackTransport {
    /// 크기 무제한 루프백 생성
    pub fn new() -> Self {
        Self::with_max_record_size(0)
    }

    /// 레코드 크기 한도를 갖는 루프백 생성
    pub fn with_max_record_size(max_record_size: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            max_record_size,
            remaining_ok: Mutex::new(None),
            next_offset: AtomicU64::new(0),
        }
    }

    /// n건 수락 후 모든 send를 실패시킴 (테스트 훅)
    pub fn fail_after_sends(&self, n: u64) {
        *self.remaining_ok.lock() = Some(n);
    }

    /// 주입된 실패 해제
    pub fn clear_failure(&self) {
        *self.remaining_ok.lock() = None;
    }

    /// 큐에 대기 중인 레코드 수
    pub fn queued_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// 프레이밍을 거치지 않은 레코드 주입 (패스스루 테스트용)
    pub fn inject(&self, record: RawRecord) {
        self.queue.lock().push_back(record);
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordTransport for LoopbackTransport {
    async fn send(&self, record: RawRecord) -> Result<SendAck> {
        {
            let mut remaining = self.remaining_ok.lock();
            if let Some(left) = remaining.as_mut() {
                if *left == 0 {
                    return Err(Error::Transport {
                        reason: "주입된 전송 실패".into(),
                    });
                }
                *left -= 1;
            }
        }

        if self.max_record_size > 0 && record.payload.len() > self.max_record_size {
            return Err(Error::Transport {
                reason: format!(
                    "레코드 크기 초과: {} > {}",
                    record.payload.len(),
                    self.max_record_size
                ),
            });
        }

        self.queue.lock().push_back(record);
        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);

        Ok(SendAck {
            offset: Some(offset),
        })
    }

    async fn poll(&self, timeout: Duration) -> Result<Vec<RawRecord>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            {
                let mut queue = self.queue.lock();
                if !queue.is_empty() {
                    return Ok(queue.drain(..).collect());
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}
