use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::codec;
use crate::error::ConfigError;

pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_TERMINATOR: &str = "\n";
pub const DEFAULT_ENCODING: &str = "utf-8";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    // 配置层面预留，服务器目前只实现 TCP
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol: {}", other)),
        }
    }
}

/// 每个请求在匹配之前要去掉的首尾字符
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trim {
    /// Unicode 空白字符
    #[default]
    Whitespace,
    /// 给定集合中的任意字符；空集合表示不做处理
    Chars(String),
}

impl Trim {
    pub fn none() -> Self {
        Trim::Chars(String::new())
    }

    pub fn apply<'a>(&self, s: &'a str) -> &'a str {
        match self {
            Trim::Whitespace => s.trim(),
            Trim::Chars(set) => s.trim_matches(|c: char| set.contains(c)),
        }
    }
}

/// Server configuration. Each server owns its own copy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub address: String,
    /// 0 = 由系统分配空闲端口；start() 之后为实际绑定的端口
    pub port: u16,
    pub protocol: Protocol,
    /// How long a single accept attempt blocks before the stop signal is
    /// re-checked. This bounds the latency of `stop()`; very small values
    /// turn the accept loop into a busy poll.
    #[serde(rename = "poll_interval_ms", deserialize_with = "millis::deserialize")]
    pub poll_interval: Duration,
    pub terminator: String,
    pub input_encoding: String,
    pub output_encoding: String,
    pub input_trim: Trim,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: 0,
            protocol: Protocol::Tcp,
            poll_interval: DEFAULT_POLL_INTERVAL,
            terminator: DEFAULT_TERMINATOR.to_string(),
            input_encoding: DEFAULT_ENCODING.to_string(),
            output_encoding: DEFAULT_ENCODING.to_string(),
            input_trim: Trim::Whitespace,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.terminator = terminator.into();
        self
    }

    pub fn with_input_encoding(mut self, label: impl Into<String>) -> Self {
        self.input_encoding = label.into();
        self
    }

    pub fn with_output_encoding(mut self, label: impl Into<String>) -> Self {
        self.output_encoding = label.into();
        self
    }

    pub fn with_input_trim(mut self, trim: Trim) -> Self {
        self.input_trim = trim;
        self
    }

    /// 校验所有选项；start() 会先调用它
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.terminator.is_empty() {
            return Err(ConfigError::EmptyTerminator);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        codec::lookup(&self.input_encoding)?;
        codec::lookup_output(&self.output_encoding)?;
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
