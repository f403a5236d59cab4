#[cfg(test)]
mod tests {
    use std::io::Write;

    use netanswer::{AnswerServer, AnswerTable, ConfigError, Config};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn test_load_answers_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"answers": {{"HELO": "250 hello", "NOOP": null, "QUIT": "221"}}, "default": "500"}}"#
        )
        .unwrap();

        let table = AnswerTable::from_json_file(file.path()).unwrap();
        assert_eq!(table.len(), 3);
        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["HELO", "NOOP", "QUIT"]);
        assert_eq!(table.resolve("NOOP"), None);
        assert_eq!(table.resolve("RSET"), Some("500"));
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let missing = AnswerTable::from_json_file("/definitely/not/here.json");
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            AnswerTable::from_json_file(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_server_from_answers_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"answers": {{"PING": "PONG"}}}}"#).unwrap();
        let table = AnswerTable::from_json_file(file.path()).unwrap();

        let mut server = AnswerServer::new(Config::new().with_address("127.0.0.1"), table);
        server.start().await.unwrap();

        let mut client = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
        client.write_all(b"PING\n").await.unwrap();
        client.shutdown().await.unwrap();
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "PONG");

        server.stop().await.unwrap();
        assert_eq!(server.requests(), vec!["PING"]);
    }
}
