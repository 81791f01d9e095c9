//! 청크 프레이밍과 메시지 분할
//!
//! - Chunk: 브로커 레코드 한 건에 실리는 세그먼트 단위
//! - MessageSplitter: 대용량 페이로드를 청크 시퀀스로 분할 (프로듀서측)
//!
//! 와이어 레이아웃 (리틀 엔디안 고정폭):
//! magic(4) + version(1) + message_id(16) + sequence_number(4)
//! + segment_count(4) + crc32(4) + payload_len(4) + payload

use bytes::{BufMut, Bytes};

use crate::error::{DecodeError, Error, Result};
use crate::{CHUNK_HEADER_LEN, MAGIC_NUMBER, PROTOCOL_VERSION};

/// 메시지 ID (128비트, 논리 메시지당 1회 생성)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId([u8; 16]);

impl MessageId {
    /// 새 무작위 ID 생성
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// 청크 헤더
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    /// 프로토콜 버전
    pub version: u8,

    /// 메시지 ID (같은 메시지의 모든 청크가 공유)
    pub message_id: MessageId,

    /// 세그먼트 순번 (0부터)
    pub sequence_number: u32,

    /// 메시지의 총 세그먼트 수
    pub segment_count: u32,

    /// 페이로드 CRC32
    pub crc32: u32,

    /// 페이로드 길이 (바이트)
    pub payload_len: u32,
}

/// 청크 (브로커 레코드 단위)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 청크 헤더
    pub header: ChunkHeader,

    /// 세그먼트 페이로드
    pub payload: Bytes,
}

impl Chunk {
    /// 새 청크 생성
    pub fn new(
        message_id: MessageId,
        sequence_number: u32,
        segment_count: u32,
        payload: Bytes,
    ) -> Self {
        let crc32 = crc32fast::hash(&payload);

        Self {
            header: ChunkHeader {
                version: PROTOCOL_VERSION,
                message_id,
                sequence_number,
                segment_count,
                crc32,
                payload_len: payload.len() as u32,
            },
            payload,
        }
    }

    /// 청크를 와이어 바이트로 직렬화
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CHUNK_HEADER_LEN + self.payload.len());
        buf.put_u32_le(MAGIC_NUMBER);
        buf.put_u8(self.header.version);
        buf.put_slice(self.header.message_id.as_bytes());
        buf.put_u32_le(self.header.sequence_number);
        buf.put_u32_le(self.header.segment_count);
        buf.put_u32_le(self.header.crc32);
        buf.put_u32_le(self.header.payload_len);
        buf.put_slice(&self.payload);
        buf
    }

    /// 와이어 바이트에서 청크 역직렬화
    ///
    /// 매직/버전 불일치는 `NotAChunk`(패스스루 대상),
    /// 청크로 인식된 뒤의 불일치는 전부 `Corrupt`
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        if bytes.len() < 5 {
            return Err(DecodeError::NotAChunk);
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC_NUMBER {
            return Err(DecodeError::NotAChunk);
        }

        let version = bytes[4];
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::NotAChunk);
        }

        if bytes.len() < CHUNK_HEADER_LEN {
            return Err(DecodeError::Corrupt {
                reason: format!("헤더 길이 부족: {} < {}", bytes.len(), CHUNK_HEADER_LEN),
            });
        }

        let mut id_bytes = [0u8; 16];
        id_bytes.copy_from_slice(&bytes[5..21]);
        let message_id = MessageId::from_bytes(id_bytes);

        let sequence_number = u32::from_le_bytes([bytes[21], bytes[22], bytes[23], bytes[24]]);
        let segment_count = u32::from_le_bytes([bytes[25], bytes[26], bytes[27], bytes[28]]);
        let crc32 = u32::from_le_bytes([bytes[29], bytes[30], bytes[31], bytes[32]]);
        let payload_len = u32::from_le_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);

        if segment_count == 0 {
            return Err(DecodeError::Corrupt {
                reason: "segment_count가 0".into(),
            });
        }

        if sequence_number >= segment_count {
            return Err(DecodeError::Corrupt {
                reason: format!(
                    "순번 범위 초과: seq={}, count={}",
                    sequence_number, segment_count
                ),
            });
        }

        let actual_len = bytes.len() - CHUNK_HEADER_LEN;
        if actual_len != payload_len as usize {
            return Err(DecodeError::Corrupt {
                reason: format!(
                    "페이로드 길이 불일치: 선언 {}, 실제 {}",
                    payload_len, actual_len
                ),
            });
        }

        let payload = Bytes::copy_from_slice(&bytes[CHUNK_HEADER_LEN..]);
        if crc32fast::hash(&payload) != crc32 {
            return Err(DecodeError::Corrupt {
                reason: format!("CRC 불일치: expected {:08X}", crc32),
            });
        }

        Ok(Self {
            header: ChunkHeader {
                version,
                message_id,
                sequence_number,
                segment_count,
                crc32,
                payload_len,
            },
            payload,
        })
    }

    /// CRC 검증
    pub fn verify_crc(&self) -> bool {
        crc32fast::hash(&self.payload) == self.header.crc32
    }
}

/// 메시지 분할기 (프로듀서측)
///
/// 단일 세그먼트 메시지도 같은 프레이밍을 거치므로
/// 컨슈머 경로는 분할/비분할을 구분하지 않음
pub struct MessageSplitter {
    max_segment_size: usize,
}

impl MessageSplitter {
    /// 새 분할기 생성
    ///
    /// 세그먼트 크기가 헤더 오버헤드 이하면 설정 에러
    pub fn new(max_segment_size: usize) -> Result<Self> {
        if max_segment_size <= CHUNK_HEADER_LEN {
            return Err(Error::Config {
                reason: format!(
                    "max_segment_size({})는 청크 헤더({} bytes)보다 커야 함",
                    max_segment_size, CHUNK_HEADER_LEN
                ),
            });
        }

        Ok(Self { max_segment_size })
    }

    /// 세그먼트 크기 반환
    pub fn max_segment_size(&self) -> usize {
        self.max_segment_size
    }

    /// 페이로드를 청크들로 분할 (새 메시지 ID 생성)
    pub fn split(&self, payload: &[u8]) -> Vec<Chunk> {
        self.split_with_id(MessageId::generate(), payload)
    }

    /// 지정한 메시지 ID로 분할
    pub fn split_with_id(&self, message_id: MessageId, payload: &[u8]) -> Vec<Chunk> {
        // 빈 페이로드도 단일 청크로 프레이밍 유지
        if payload.is_empty() {
            return vec![Chunk::new(message_id, 0, 1, Bytes::new())];
        }

        let segment_count =
            (payload.len() + self.max_segment_size - 1) / self.max_segment_size;

        payload
            .chunks(self.max_segment_size)
            .enumerate()
            .map(|(idx, part)| {
                Chunk::new(
                    message_id,
                    idx as u32,
                    segment_count as u32,
                    Bytes::copy_from_slice(part),
                )
            })
            .collect()
    }
}
