use std::collections::HashMap;
use std::path::Path;

use bytes::Bytes;
use encoding_rs::Encoding;
use serde::Deserialize;

use crate::codec;
use crate::error::ConfigError;

/// Fixed mapping from expected requests to canned responses.
///
/// Entries keep their insertion order. A `None` response is the "no response"
/// marker: the request is matched but nothing is written back, which is
/// different from an empty response (matched, zero bytes written).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerTable {
    entries: Vec<(String, Option<String>)>,
    index: HashMap<String, usize>,
    default_answer: Option<String>,
}

impl AnswerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个请求及其响应，重复的请求会覆盖旧值但保留原位置
    pub fn insert(&mut self, request: impl Into<String>, response: Option<String>) -> &mut Self {
        let request = request.into();
        match self.index.get(&request) {
            Some(&i) => self.entries[i].1 = response,
            None => {
                self.index.insert(request.clone(), self.entries.len());
                self.entries.push((request, response));
            }
        }
        self
    }

    pub fn answer(mut self, request: impl Into<String>, response: impl Into<String>) -> Self {
        self.insert(request, Some(response.into()));
        self
    }

    /// 匹配但不回复
    pub fn silent(mut self, request: impl Into<String>) -> Self {
        self.insert(request, None);
        self
    }

    pub fn default_answer(mut self, response: impl Into<String>) -> Self {
        self.default_answer = Some(response.into());
        self
    }

    pub fn set_default_answer(&mut self, response: Option<String>) {
        self.default_answer = response;
    }

    pub fn get_default_answer(&self) -> Option<&str> {
        self.default_answer.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// 找到匹配项时返回其响应，否则返回默认响应；None 表示不写任何内容
    pub fn resolve(&self, request: &str) -> Option<&str> {
        match self.index.get(request) {
            Some(&i) => self.entries[i].1.as_deref(),
            None => self.default_answer.as_deref(),
        }
    }

    /// Pre-encodes every response with the output encoding.
    pub fn encode(&self, encoding: &'static Encoding) -> Result<ResponseTable, ConfigError> {
        let encode_one = |request: &str, text: &str| {
            codec::encode(encoding, text)
                .map(Bytes::from)
                .ok_or_else(|| ConfigError::Unencodable {
                    request: request.to_string(),
                    encoding: encoding.name(),
                })
        };

        let mut responses = HashMap::with_capacity(self.entries.len());
        for (request, response) in &self.entries {
            let bytes = match response {
                Some(text) => Some(encode_one(request, text)?),
                None => None,
            };
            responses.insert(request.clone(), bytes);
        }

        let default = match &self.default_answer {
            Some(text) => Some(encode_one("<default>", text)?),
            None => None,
        };

        Ok(ResponseTable { responses, default })
    }

    /// Parses `{"answers": {"PING": "PONG", "QUIT": null}, "default": "?"}`.
    ///
    /// `null` marks a request that is matched but never answered. Both keys
    /// are optional.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let file: AnswersFile = serde_json::from_str(s)?;
        let mut table = AnswerTable::new();
        for (request, value) in file.answers {
            let response: Option<String> = serde_json::from_value(value)?;
            table.insert(request, response);
        }
        table.default_answer = file.default;
        Ok(table)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[derive(Deserialize)]
struct AnswersFile {
    #[serde(default)]
    answers: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    default: Option<String>,
}

/// 已编码的响应表，start() 时构建，所有连接只读共享
#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    responses: HashMap<String, Option<Bytes>>,
    default: Option<Bytes>,
}

impl ResponseTable {
    pub fn resolve(&self, request: &str) -> Option<&Bytes> {
        match self.responses.get(request) {
            Some(found) => found.as_ref(),
            None => self.default.as_ref(),
        }
    }
}
