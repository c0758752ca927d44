use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use crate::error::{Error, Result};

/// 魔数 - 标识销售索引快照
pub const MAGIC_BYTES: &[u8] = b"SALES";

/// 当前写出的快照版本
pub const SNAPSHOT_VERSION: [u8; 2] = [1, 0];

/// 魔数 + 版本号 + 原始长度
const HEADER_LEN: usize = MAGIC_BYTES.len() + 2 + 4;

/// 快照头部信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: [u8; 2],
    pub raw_len: usize,
}

/// 将对象序列化为二进制格式
pub fn to_binary<T: serde::Serialize>(obj: &T) -> Result<Vec<u8>> {
    Ok(bincode::serde::encode_to_vec(obj, bincode::config::standard())?)
}

/// 从二进制格式反序列化对象
pub fn from_binary<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    let (value, _) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
    Ok(value)
}

/// 序列化并压缩，写出带头部的快照
pub fn to_compressed<T: serde::Serialize>(obj: &T, version: [u8; 2]) -> Result<Vec<u8>> {
    let binary = to_binary(obj)?;
    let raw_len = u32::try_from(binary.len())
        .map_err(|_| Error::InvalidSnapshot(format!("数据过大: {} 字节", binary.len())))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(&binary)?;
    let compressed = encoder.finish()?;

    let mut output = Vec::with_capacity(HEADER_LEN + compressed.len());
    output.extend_from_slice(MAGIC_BYTES);
    output.extend_from_slice(&version);
    output.extend_from_slice(&raw_len.to_le_bytes());
    output.extend_from_slice(&compressed);
    Ok(output)
}

/// 解析并校验快照头部
pub fn read_header(data: &[u8], max_version: u8) -> Result<SnapshotHeader> {
    if data.len() < HEADER_LEN {
        return Err(Error::InvalidSnapshot(format!(
            "数据太短，无法解析: {} 字节",
            data.len()
        )));
    }

    if &data[..MAGIC_BYTES.len()] != MAGIC_BYTES {
        return Err(Error::InvalidSnapshot("魔数不匹配".to_string()));
    }

    let offset = MAGIC_BYTES.len();
    let version = [data[offset], data[offset + 1]];
    if version[0] > max_version {
        return Err(Error::UnsupportedVersion {
            major: version[0],
            minor: version[1],
            max: max_version,
        });
    }

    let mut size_bytes = [0u8; 4];
    size_bytes.copy_from_slice(&data[offset + 2..HEADER_LEN]);

    Ok(SnapshotHeader {
        version,
        raw_len: u32::from_le_bytes(size_bytes) as usize,
    })
}

/// 解压并反序列化快照，允许指定支持的最大主版本
pub fn from_compressed_with_max_version<T: serde::de::DeserializeOwned>(
    data: &[u8],
    max_version: u8,
) -> Result<T> {
    let header = read_header(data, max_version)?;

    let mut decoder = GzDecoder::new(&data[HEADER_LEN..]);
    let mut raw = Vec::with_capacity(header.raw_len);
    decoder.read_to_end(&mut raw)?;

    if raw.len() != header.raw_len {
        return Err(Error::SizeMismatch {
            expected: header.raw_len,
            actual: raw.len(),
        });
    }

    from_binary(&raw)
}

/// 按当前版本解压快照
pub fn from_compressed<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
    from_compressed_with_max_version(data, SNAPSHOT_VERSION[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_magic() {
        let mut data = to_compressed(&vec![1u32, 2, 3], SNAPSHOT_VERSION).unwrap();
        data[0] = b'X';
        assert!(matches!(
            from_compressed::<Vec<u32>>(&data),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn rejects_newer_version() {
        let data = to_compressed(&"payload".to_string(), [9, 1]).unwrap();
        match from_compressed::<String>(&data) {
            Err(Error::UnsupportedVersion { major, minor, max }) => {
                assert_eq!((major, minor, max), (9, 1, SNAPSHOT_VERSION[0]));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(matches!(
            read_header(b"SALES", 1),
            Err(Error::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn header_reports_raw_length() {
        let value = vec![7u64; 32];
        let raw = to_binary(&value).unwrap();
        let data = to_compressed(&value, SNAPSHOT_VERSION).unwrap();
        let header = read_header(&data, 1).unwrap();
        assert_eq!(header.version, SNAPSHOT_VERSION);
        assert_eq!(header.raw_len, raw.len());
        assert_eq!(from_compressed::<Vec<u64>>(&data).unwrap(), value);
    }
}
