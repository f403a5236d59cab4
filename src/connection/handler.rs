use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::answers::ResponseTable;
use crate::config::Trim;
use crate::connection::log::RequestLog;
use crate::connection::splitter::RequestSplitter;
use crate::error::ConnectionError;

const READ_BUFFER_SIZE: usize = 4096;

/// Request/response logic for one accepted connection.
///
/// Generic over any readable/writable pair, so tests can drive it with
/// in-memory duplex streams.
pub struct ConnectionHandler {
    splitter: RequestSplitter,
    responses: Arc<ResponseTable>,
    trim: Trim,
    requests: RequestLog,
}

impl ConnectionHandler {
    pub fn new(
        splitter: RequestSplitter,
        responses: Arc<ResponseTable>,
        trim: Trim,
        requests: RequestLog,
    ) -> Self {
        Self {
            splitter,
            responses,
            trim,
            requests,
        }
    }

    /// 读取直到对端关闭或出错；每个完整请求都会立即处理并回复
    pub async fn run<R, W>(mut self, mut reader: R, mut writer: W) -> Result<(), ConnectionError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

        loop {
            buf.clear();
            let n = reader
                .read_buf(&mut buf)
                .await
                .map_err(ConnectionError::Read)?;

            if n == 0 {
                break;
            }

            for request in self.splitter.feed(&buf[..n])? {
                self.process(&request, &mut writer).await?;
            }
        }

        // 传输结束总是视为请求结束
        if let Some(request) = self.splitter.finish()? {
            self.process(&request, &mut writer).await?;
        }

        writer.shutdown().await.map_err(ConnectionError::Write)?;
        Ok(())
    }

    async fn process<W>(&self, raw: &str, writer: &mut W) -> Result<(), ConnectionError>
    where
        W: AsyncWrite + Unpin,
    {
        let request = self.trim.apply(raw);
        self.requests.push(request);

        match self.responses.resolve(request) {
            Some(response) => {
                tracing::debug!(request, bytes = response.len(), "answering");
                writer
                    .write_all(response)
                    .await
                    .map_err(ConnectionError::Write)?;
                writer.flush().await.map_err(ConnectionError::Write)
            }
            None => {
                tracing::debug!(request, "no answer");
                Ok(())
            }
        }
    }
}
