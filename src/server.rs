use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::answers::{AnswerTable, ResponseTable};
use crate::codec::{self, TextDecoder};
use crate::config::{Config, Protocol, Trim};
use crate::connection::{ConnectionHandler, ErrorLog, RequestLog, RequestSplitter};
use crate::error::{ConnectionFailure, ServerError, ServerResult};

/// 服务器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// 已创建，尚未绑定
    Idle,
    /// accept 循环正在运行
    Listening,
    /// stop() 已发出，等待 accept 循环退出
    Stopping,
    /// 监听 socket 已释放；不可重启
    Closed,
}

/// accept 循环的连接来源；生产环境为 `TcpListener`
pub(crate) trait Acceptor: Send + Sync + 'static {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

/// 每个连接任务共享的只读上下文
struct ConnectionContext {
    responses: Arc<ResponseTable>,
    terminator: String,
    trim: Trim,
    input_encoding: &'static encoding_rs::Encoding,
    requests: RequestLog,
    errors: ErrorLog,
}

impl ConnectionContext {
    fn handler(&self) -> ConnectionHandler {
        let splitter = RequestSplitter::new(
            TextDecoder::new(self.input_encoding),
            self.terminator.clone(),
        );
        ConnectionHandler::new(
            splitter,
            self.responses.clone(),
            self.trim.clone(),
            self.requests.clone(),
        )
    }
}

/// Stub server answering fixed requests with fixed responses.
///
/// `start()` binds and spawns the accept loop in the background; `stop()`
/// signals the loop and waits for it to release the socket. Dropping a
/// started server releases the socket as well, so a forgotten `stop()` never
/// leaks the listener past the owning scope.
///
/// ```no_run
/// # async fn demo() -> netanswer::ServerResult<()> {
/// use netanswer::{AnswerServer, AnswerTable, Config};
///
/// let answers = AnswerTable::new().answer("PING", "PONG").default_answer("?");
/// let mut server = AnswerServer::new(Config::default(), answers);
/// server.start().await?;
/// let port = server.port();
/// // ... exercise the client under test against `port` ...
/// server.stop().await?;
/// println!("{} answered {:?}", port, server.requests());
/// # Ok(())
/// # }
/// ```
pub struct AnswerServer {
    config: Config,
    answers: AnswerTable,
    state: ServerState,
    local_addr: Option<SocketAddr>,
    requests: RequestLog,
    errors: ErrorLog,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
    accept_task: Option<JoinHandle<ServerResult<()>>>,
    accept_error: Option<ServerError>,
}

impl AnswerServer {
    pub fn new(config: Config, answers: AnswerTable) -> Self {
        Self {
            config,
            answers,
            state: ServerState::Idle,
            local_addr: None,
            requests: RequestLog::new(),
            errors: ErrorLog::new(),
            cancel_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            accept_task: None,
            accept_error: None,
        }
    }

    /// Binds the listening socket and spawns the accept loop.
    ///
    /// Returns as soon as the socket is listening. On any error the server
    /// stays `Idle` and nothing is left bound.
    pub async fn start(&mut self) -> ServerResult<()> {
        if self.state != ServerState::Idle {
            return Err(ServerError::InvalidState(self.state));
        }
        if self.config.protocol != Protocol::Tcp {
            return Err(ServerError::Unsupported(self.config.protocol));
        }

        let ctx = self.connection_context()?;

        let listener = TcpListener::bind((self.config.address.as_str(), self.config.port))
            .await
            .map_err(|source| self.bind_error(source))?;
        let local_addr = listener.local_addr().map_err(|source| self.bind_error(source))?;

        // port 为 0 时回写系统分配的端口
        self.config.port = local_addr.port();
        self.local_addr = Some(local_addr);

        info!(
            protocol = self.config.protocol.as_str(),
            addr = %local_addr,
            poll_interval = ?self.config.poll_interval,
            "netanswer listening"
        );

        self.launch(listener, ctx);
        Ok(())
    }

    /// 校验配置并预编码所有响应
    fn connection_context(&self) -> ServerResult<Arc<ConnectionContext>> {
        self.config.validate()?;
        let input_encoding = codec::lookup(&self.config.input_encoding)?;
        let output_encoding = codec::lookup_output(&self.config.output_encoding)?;
        let responses = Arc::new(self.answers.encode(output_encoding)?);

        Ok(Arc::new(ConnectionContext {
            responses,
            terminator: self.config.terminator.clone(),
            trim: self.config.input_trim.clone(),
            input_encoding,
            requests: self.requests.clone(),
            errors: self.errors.clone(),
        }))
    }

    fn launch<A: Acceptor>(&mut self, acceptor: A, ctx: Arc<ConnectionContext>) {
        self.accept_task = Some(tokio::spawn(accept_loop(
            acceptor,
            ctx,
            self.config.poll_interval,
            self.cancel_token.clone(),
            self.tracker.clone(),
        )));
        self.state = ServerState::Listening;
    }

    /// Stops the accept loop and waits until the listening socket is closed.
    ///
    /// Waits at most about one `poll_interval`. Connections that were already
    /// accepted keep running; use [`drain`](Self::drain) to wait for them.
    /// Calling it again is a no-op; a server that never started just moves
    /// to `Closed`. If the returned future is dropped before it completes,
    /// the server stays `Stopping` and the next call resumes the wait.
    pub async fn stop(&mut self) -> ServerResult<()> {
        let Some(task) = self.accept_task.as_mut() else {
            if self.state == ServerState::Idle {
                self.state = ServerState::Closed;
            }
            return Ok(());
        };

        self.state = ServerState::Stopping;
        self.cancel_token.cancel();
        self.tracker.close();

        // 句柄在 join 完成之后才移出，取消 stop() 不会丢失它
        let joined = task.await;
        self.accept_task = None;
        self.state = ServerState::Closed;

        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.accept_error = Some(e),
            Err(e) => return Err(ServerError::Shutdown(e.to_string())),
        }

        info!(
            requests = self.requests.len(),
            connection_errors = self.errors.len(),
            "netanswer stopped"
        );
        Ok(())
    }

    /// 等待所有已接受的连接处理结束（只在 stop() 之后返回）
    pub async fn drain(&self) {
        self.tracker.wait().await;
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Effective configuration; `port` holds the bound port after `start()`.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn answers(&self) -> &AnswerTable {
        &self.answers
    }

    /// Every request seen so far, across all connections.
    pub fn requests(&self) -> Vec<String> {
        self.requests.snapshot()
    }

    pub fn errors(&self) -> Vec<ConnectionFailure> {
        self.errors.snapshot()
    }

    /// 导致 accept 循环提前结束的错误（在 stop() 之后可见）
    pub fn accept_error(&self) -> Option<&ServerError> {
        self.accept_error.as_ref()
    }

    fn bind_error(&self, source: std::io::Error) -> ServerError {
        ServerError::Bind {
            address: self.config.address.clone(),
            port: self.config.port,
            source,
        }
    }
}

impl Drop for AnswerServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self.tracker.close();
        // 任务持有 listener，abort 之后 socket 随任务一起释放
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

async fn accept_loop<A: Acceptor>(
    listener: A,
    ctx: Arc<ConnectionContext>,
    poll_interval: Duration,
    cancel_token: CancellationToken,
    tracker: TaskTracker,
) -> ServerResult<()> {
    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        let (stream, peer) = match timeout(poll_interval, listener.accept()).await {
            // 超时：回到循环顶部检查停止信号
            Err(_) => continue,
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                error!(error = %e, "accept failed, stopping accept loop");
                return Err(ServerError::Accept(e));
            }
        };

        debug!(%peer, "connection accepted");
        tracker.spawn(serve_connection(stream, peer, ctx.clone()));
    }

    debug!("accept loop exited");
    Ok(())
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, ctx: Arc<ConnectionContext>) {
    let (reader, writer) = stream.into_split();

    match ctx.handler().run(reader, writer).await {
        Ok(()) => debug!(%peer, "connection closed"),
        Err(e) => {
            warn!(%peer, error = %e, "connection failed");
            ctx.errors.push(ConnectionFailure {
                peer,
                error: Arc::new(e),
            });
        }
    }
}
