use crate::codec::TextDecoder;
use crate::error::DecodeError;

/// Turns a byte stream into complete requests.
///
/// Pure logic, no I/O: bytes go in through [`feed`](Self::feed), complete
/// requests (terminator removed, not yet trimmed) come out. The end of the
/// stream always completes a pending request, see [`finish`](Self::finish).
pub struct RequestSplitter {
    decoder: TextDecoder,
    terminator: String,
    pending: String,
}

impl RequestSplitter {
    /// `terminator` must not be empty (checked by `Config::validate`).
    pub fn new(decoder: TextDecoder, terminator: impl Into<String>) -> Self {
        Self {
            decoder,
            terminator: terminator.into(),
            pending: String::new(),
        }
    }

    /// 追加新字节，返回因此完成的所有请求（按出现顺序）
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, DecodeError> {
        let text = self.decoder.decode(bytes, false)?;
        self.pending.push_str(&text);
        Ok(self.split_pending())
    }

    /// 输入流结束：剩余的非空文本作为最后一个请求
    pub fn finish(&mut self) -> Result<Option<String>, DecodeError> {
        let text = self.decoder.decode(&[], true)?;
        self.pending.push_str(&text);

        if self.pending.is_empty() {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut self.pending)))
    }

    /// 尚未遇到终止符的文本
    pub fn pending(&self) -> &str {
        &self.pending
    }

    fn split_pending(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        let mut start = 0;

        while let Some(idx) = self.pending[start..].find(&self.terminator) {
            out.push(self.pending[start..start + idx].to_string());
            start += idx + self.terminator.len();
        }

        if start > 0 {
            self.pending.drain(..start);
        }
        out
    }
}
