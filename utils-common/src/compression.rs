use std::io::{self, Read, Write};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};

/// 魔数常量 - 用于标识列表索引文件格式
pub const MAGIC_BYTES: &[u8] = b"LPIDX";

/// 当前写入的容器版本
pub const INDEX_FORMAT_VERSION: [u8; 2] = [1, 0];

/// 头部长度：魔数 + 版本号(2字节) + 原始数据大小(4字节)
const HEADER_LEN: usize = MAGIC_BYTES.len() + 2 + 4;

fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// 将对象序列化为二进制格式
pub fn to_binary<T: serde::Serialize>(obj: &T) -> Result<Vec<u8>, io::Error> {
    bincode::serde::encode_to_vec(obj, bincode::config::standard())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("序列化失败: {}", e)))
}

/// 从二进制格式反序列化对象
pub fn from_binary<T: for<'a> serde::de::Deserialize<'a>>(data: &[u8]) -> Result<T, io::Error> {
    bincode::serde::decode_from_slice(data, bincode::config::standard())
        .map_err(|e| invalid_data(format!("反序列化失败: {}", e)))
        .map(|(value, _)| value)
}

/// 将对象序列化为压缩的二进制容器
pub fn to_compressed<T: serde::Serialize>(obj: &T, version: [u8; 2]) -> Result<Vec<u8>, io::Error> {
    let binary = to_binary(obj)?;
    let data_len = u32::try_from(binary.len())
        .map_err(|_| invalid_data(format!("数据过大: {} 字节", binary.len())))?;

    let mut output = Vec::with_capacity(HEADER_LEN + binary.len() / 2);
    output.extend_from_slice(MAGIC_BYTES);
    output.extend_from_slice(&version);
    output.extend_from_slice(&data_len.to_le_bytes());

    let mut encoder = GzEncoder::new(output, Compression::best());
    encoder.write_all(&binary)?;
    encoder.finish()
}

/// 解析并校验容器头部，返回(版本号, 原始数据大小)
fn read_header(data: &[u8], max_version: u8) -> Result<([u8; 2], u32), io::Error> {
    if data.len() < HEADER_LEN {
        return Err(invalid_data(format!("数据太短，无法解析: {} 字节", data.len())));
    }
    if &data[..MAGIC_BYTES.len()] != MAGIC_BYTES {
        return Err(invalid_data("无效的文件格式：魔数不匹配".to_string()));
    }

    let offset = MAGIC_BYTES.len();
    let version = [data[offset], data[offset + 1]];
    if version[0] > max_version {
        return Err(invalid_data(format!("不支持的版本: {}.{}", version[0], version[1])));
    }

    let mut size_bytes = [0u8; 4];
    size_bytes.copy_from_slice(&data[offset + 2..HEADER_LEN]);
    Ok((version, u32::from_le_bytes(size_bytes)))
}

/// 从压缩容器反序列化对象，支持当前主版本
pub fn from_compressed<T: for<'a> serde::de::Deserialize<'a>>(data: &[u8]) -> Result<T, io::Error> {
    from_compressed_with_max_version(data, INDEX_FORMAT_VERSION[0])
}

/// 从压缩容器反序列化对象，允许指定支持的最大版本
pub fn from_compressed_with_max_version<T: for<'a> serde::de::Deserialize<'a>>(
    data: &[u8],
    max_version: u8,
) -> Result<T, io::Error> {
    let (_, original_size) = read_header(data, max_version)?;

    let mut decoder = GzDecoder::new(&data[HEADER_LEN..]);
    let mut decompressed = Vec::with_capacity(original_size as usize);
    decoder.read_to_end(&mut decompressed)?;

    if decompressed.len() != original_size as usize {
        return Err(invalid_data(format!(
            "解压后数据大小不匹配: 期望 {} 字节, 实际 {} 字节",
            original_size,
            decompressed.len()
        )));
    }

    from_binary(&decompressed)
}

/// 验证压缩容器头部是否有效，返回版本号
pub fn validate_compressed_data(data: &[u8]) -> Result<[u8; 2], io::Error> {
    read_header(data, INDEX_FORMAT_VERSION[0]).map(|(version, _)| version)
}
