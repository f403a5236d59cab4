use std::net::SocketAddr;

use thiserror::Error;

use crate::config::Protocol;
use crate::server::ServerState;

/// 服务器生命周期错误
#[derive(Error, Debug)]
pub enum ServerError {
    /// 地址/端口无法绑定（被占用、无权限、无法解析）
    #[error("cannot bind {address}:{port}: {source}")]
    Bind {
        address: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// accept 出现非超时错误，accept 循环因此结束
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("protocol {0:?} is not supported")]
    Unsupported(Protocol),

    /// 生命周期调用顺序错误（例如重复 start，或 Closed 之后再 start）
    #[error("operation not allowed in state {0:?}")]
    InvalidState(ServerState),

    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// 配置错误：在 start() 之前或期间同步返回
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("terminator must not be empty")]
    EmptyTerminator,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("unknown encoding label {0:?}")]
    UnknownEncoding(String),

    #[error("encoding {0} cannot be used for responses")]
    UnsupportedOutputEncoding(&'static str),

    #[error("response for {request:?} cannot be encoded as {encoding}")]
    Unencodable { request: String, encoding: &'static str },

    #[error("malformed answers file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read answers file: {0}")]
    Io(#[from] std::io::Error),
}

/// 输入字节不符合 input_encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed {encoding} input at byte {offset}")]
pub struct DecodeError {
    pub encoding: &'static str,
    /// 出错位置（相对于该连接收到的全部字节）
    pub offset: usize,
}

/// 单个连接上的错误，只影响该连接
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// ErrorLog 中的一条记录
#[derive(Debug, Clone)]
pub struct ConnectionFailure {
    pub peer: SocketAddr,
    pub error: std::sync::Arc<ConnectionError>,
}
