use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use netanswer::{AnswerServer, AnswerTable, Config, Protocol, Trim};

#[derive(Parser, Debug)]
#[command(name = "netanswer", about = "Constant responses for constant requests")]
struct Opt {
    #[arg(long, default_value = "localhost")]
    address: String,

    /// 0 = 任意空闲端口
    #[arg(long, default_value_t = 0)]
    port: u16,

    #[arg(long, default_value = "tcp")]
    protocol: Protocol,

    /// Accept poll interval in milliseconds (upper bound of shutdown latency)
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Request terminator; understands \n \r \t \0 and \\
    #[arg(long, default_value = "\\n")]
    terminator: String,

    #[arg(long, default_value = "utf-8")]
    input_encoding: String,

    #[arg(long, default_value = "utf-8")]
    output_encoding: String,

    /// Characters stripped from each request; whitespace when omitted
    #[arg(long)]
    trim: Option<String>,

    /// JSON answers file: {"answers": {"PING": "PONG", "QUIT": null}, "default": "?"}
    #[arg(long)]
    answers: Option<PathBuf>,

    /// Default answer, overrides the one in the answers file
    #[arg(long = "default")]
    default_answer: Option<String>,
}

impl Opt {
    fn config(&self) -> Config {
        Config::new()
            .with_address(&self.address)
            .with_port(self.port)
            .with_protocol(self.protocol)
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_terminator(unescape(&self.terminator))
            .with_input_encoding(&self.input_encoding)
            .with_output_encoding(&self.output_encoding)
            .with_input_trim(match &self.trim {
                Some(chars) => Trim::Chars(unescape(chars)),
                None => Trim::Whitespace,
            })
    }

    fn answers(&self) -> Result<AnswerTable> {
        let mut table = match &self.answers {
            Some(path) => AnswerTable::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AnswerTable::new(),
        };
        if let Some(default) = &self.default_answer {
            table.set_default_answer(Some(default.clone()));
        }
        Ok(table)
    }
}

/// 解析命令行中常见的转义序列
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opt = Opt::parse();
    let config = opt.config();
    let poll_interval = config.poll_interval;
    let mut server = AnswerServer::new(config, opt.answers()?);

    server.start().await?;
    info!(port = server.port(), answers = server.answers().len(), "ready, Ctrl-C to stop");

    if let Err(e) = signal::ctrl_c().await {
        error!("cannot listen for shutdown signal: {}", e);
    }

    server.stop().await?;
    if let Some(e) = server.accept_error() {
        warn!("accept loop ended early: {}", e);
    }
    if tokio::time::timeout(poll_interval, server.drain()).await.is_err() {
        warn!("some connections were still open at exit");
    }

    let requests = serde_json::to_string_pretty(&server.requests())
        .map_err(|e| anyhow!("cannot serialize request log: {}", e))?;
    println!("{}", requests);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("\\n"), "\n");
        assert_eq!(unescape("\\r\\n"), "\r\n");
        assert_eq!(unescape("END"), "END");
        assert_eq!(unescape("a\\\\b"), "a\\b");
        assert_eq!(unescape("\\x"), "\\x");
        assert_eq!(unescape("tail\\"), "tail\\");
    }

    #[test]
    fn test_opt_defaults() {
        let opt = Opt::parse_from(["netanswer"]);
        let config = opt.config();
        assert_eq!(config, Config::default());
        assert!(opt.answers().unwrap().is_empty());
    }

    #[test]
    fn test_opt_overrides() {
        let opt = Opt::parse_from([
            "netanswer",
            "--port",
            "7001",
            "--terminator",
            "\\r\\n",
            "--trim",
            "*",
            "--default",
            "?",
        ]);
        let config = opt.config();
        assert_eq!(config.port, 7001);
        assert_eq!(config.terminator, "\r\n");
        assert_eq!(config.input_trim, Trim::Chars("*".into()));
        assert_eq!(opt.answers().unwrap().get_default_answer(), Some("?"));
    }
}
