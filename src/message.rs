//! 레코드 타입과 직렬화 계약
//!
//! 호출자 대면 레코드(ProducerRecord/ConsumerRecord)와
//! 전송 계층 단위(RawRecord) 정의

use bytes::Bytes;

use crate::error::Result;

/// 프로듀서 입력 레코드
#[derive(Debug, Clone)]
pub struct ProducerRecord<V> {
    /// 목적지 토픽
    pub topic: String,

    /// 파티셔닝 키 (같은 키 = 같은 순서 스트림, 청크 전부가 공유)
    pub key: Option<Bytes>,

    /// 사용자 값 (직렬화 전)
    pub value: V,
}

impl<V> ProducerRecord<V> {
    /// 키 없는 레코드 생성
    pub fn new(topic: impl Into<String>, value: V) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value,
        }
    }

    /// 키 있는 레코드 생성
    pub fn with_key(topic: impl Into<String>, key: impl Into<Bytes>, value: V) -> Self {
        Self {
            topic: topic.into(),
            key: Some(key.into()),
            value,
        }
    }
}

/// 컨슈머 출력 레코드
///
/// 페이로드는 항상 완전 조립된 원본 바이트 (호출자는 세그먼트를 볼 수 없음)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    /// 토픽
    pub topic: String,

    /// 파티셔닝 키
    pub key: Option<Bytes>,

    /// 원본 페이로드
    pub payload: Bytes,
}

/// 와이어 레코드 (전송 계층 단위)
///
/// 청크 레코드이거나, 래퍼 없이 생산된 패스스루 레코드
#[derive(Debug, Clone)]
pub struct RawRecord {
    /// 토픽
    pub topic: String,

    /// 파티셔닝 키
    pub key: Option<Bytes>,

    /// 와이어 바이트 (청크 프레이밍 포함 가능)
    pub payload: Bytes,
}

/// 전송 수락 응답
#[derive(Debug, Clone, Copy, Default)]
pub struct SendAck {
    /// 브로커가 부여한 오프셋 (전송 계층이 제공할 때만)
    pub offset: Option<u64>,
}

/// 값 직렬화 계약
///
/// 직렬화 실패는 스킵 후보 에러(`Error::Serialization`)로 분류될 수 있음
pub trait Serializer<V>: Send + Sync {
    fn serialize(&self, topic: &str, value: &V) -> Result<Vec<u8>>;
}

/// 바이트 패스스루 직렬화기
pub struct BytesSerializer;

impl Serializer<Bytes> for BytesSerializer {
    fn serialize(&self, _topic: &str, value: &Bytes) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }
}

impl Serializer<Vec<u8>> for BytesSerializer {
    fn serialize(&self, _topic: &str, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }
}

/// 문자열 직렬화기
pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn serialize(&self, _topic: &str, value: &String) -> Result<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }
}
