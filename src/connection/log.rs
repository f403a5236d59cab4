use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ConnectionFailure;

/// 所有连接共享的请求记录（只追加）
///
/// Cloning yields another handle to the same log. Appends from concurrent
/// connection tasks are serialized by the lock; nothing is lost or torn.
#[derive(Debug, Clone, Default)]
pub struct RequestLog {
    inner: Arc<Mutex<Vec<String>>>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: impl Into<String>) {
        self.inner.lock().push(request.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// 连接错误记录，供控制方在运行中或结束后查看
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    inner: Arc<Mutex<Vec<ConnectionFailure>>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, failure: ConnectionFailure) {
        self.inner.lock().push(failure);
    }

    pub fn snapshot(&self) -> Vec<ConnectionFailure> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
