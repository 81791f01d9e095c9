//! 에러 타입 정의와 스킵 정책

use thiserror::Error;

/// 청크 디코딩 에러
///
/// `NotAChunk`는 래퍼 없이 생산된 레코드(패스스루 대상),
/// `Corrupt`는 청크로 인식됐지만 손상된 레코드
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("청크 아님: 매직/버전 불일치")]
    NotAChunk,

    #[error("손상된 청크: {reason}")]
    Corrupt { reason: String },
}

/// LMS 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("설정 에러: {reason}")]
    Config { reason: String },

    #[error("직렬화 에러: topic={topic}, {reason}")]
    Serialization { topic: String, reason: String },

    #[error("디코딩 에러: {0}")]
    Decode(#[from] DecodeError),

    #[error("부분 전송: {succeeded}/{total} 세그먼트만 수락됨")]
    PartialSend { succeeded: u32, total: u32 },

    #[error("전송 계층 에러: {reason}")]
    Transport { reason: String },

    #[error("프로듀서 종료됨")]
    ProducerClosed,

    #[error("컨슈머 종료됨")]
    ConsumerClosed,

    #[error("채널 에러")]
    ChannelError,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;

/// 에러 처분
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// 로그 남기고 해당 레코드만 버림
    Skip,

    /// 호출자에게 전파
    Fail,
}

/// 스킵 가능 에러 분류 정책
///
/// 직렬화 실패, 손상 청크, 부분 전송만 스킵 후보.
/// 설정 오류와 IO/전송 계층 오류는 항상 Fail.
#[derive(Debug, Clone, Copy)]
pub struct SkippablePolicy {
    /// 스킵 후보 에러를 실제로 스킵할지 여부 (기본 false = Fail)
    pub skip_on_skippable: bool,
}

impl SkippablePolicy {
    pub fn new(skip_on_skippable: bool) -> Self {
        Self { skip_on_skippable }
    }

    /// 스킵 후보 여부
    pub fn is_skippable(error: &Error) -> bool {
        matches!(
            error,
            Error::Serialization { .. }
                | Error::Decode(DecodeError::Corrupt { .. })
                | Error::PartialSend { .. }
        )
    }

    /// 에러 분류
    pub fn classify(&self, error: &Error) -> Disposition {
        if self.skip_on_skippable && Self::is_skippable(error) {
            Disposition::Skip
        } else {
            Disposition::Fail
        }
    }
}

impl Default for SkippablePolicy {
    fn default() -> Self {
        Self {
            skip_on_skippable: false,
        }
    }
}
