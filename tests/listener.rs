//! End-to-end tests over real TCP connections
#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use mailsink::{
    config::Timeouts,
    controller::Signal,
    listener::Listener,
    notify::{self, Backpressure},
    storage::{MemoryStorage, Storage},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
    sync::broadcast,
};

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(address: std::net::SocketAddr) -> Self {
        let (reader, writer) = TcpStream::connect(address)
            .await
            .expect("Failed to connect")
            .into_split();

        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Read one complete reply, returning its lines without CRLF
    async fn reply(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            let read = self.reader.read_line(&mut line).await.unwrap();
            assert!(read > 0, "connection closed mid-reply");

            let line = line.trim_end().to_string();
            let last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line);
            if last {
                return lines;
            }
        }
    }

    async fn send(&mut self, command: &str) -> Vec<String> {
        self.writer
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .unwrap();
        self.reply().await
    }

    async fn closed(&mut self) -> bool {
        let mut rest = Vec::new();
        self.reader.read_to_end(&mut rest).await.unwrap() == 0
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Network operations not supported in MIRI")]
async fn serves_connections_until_shutdown() {
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = socket.local_addr().unwrap();

    let storage = Arc::new(MemoryStorage::new());
    let (notifier, mut messages) = notify::channel(8, Backpressure::Block);
    let (shutdown, _) = broadcast::channel(16);
    let mut finalised = shutdown.subscribe();

    let server = {
        let shutdown = shutdown.clone();
        let storage: Arc<dyn Storage> = storage.clone();
        let listener = Listener::new(address, "test.local", Timeouts::default());
        tokio::spawn(async move { listener.serve_on(socket, storage, notifier, &shutdown).await })
    };

    let mut client = Client::connect(address).await;
    assert_eq!(client.reply().await, vec!["220 test.local ESMTP mailsink"]);
    assert_eq!(
        client.send("EHLO client.local").await,
        vec![
            "250-test.local Hello client.local",
            "250-PIPELINING",
            "250 AUTH PLAIN",
        ]
    );
    assert_eq!(client.send("MAIL FROM:<a@b.com>").await, vec!["250 Sender a@b.com ok"]);
    assert_eq!(client.send("RCPT TO:<c@d.com>").await, vec!["250 Recipient c@d.com ok"]);
    assert_eq!(
        client.send("DATA").await,
        vec!["354 End data with <CR><LF>.<CR><LF>"]
    );

    client
        .writer
        .write_all(b"Subject: Test\r\n\r\nHello World!\r\n")
        .await
        .unwrap();
    let queued = client.send(".").await;
    assert!(queued[0].starts_with("250 Ok: queued as "));

    assert_eq!(client.send("QUIT").await, vec!["221 Bye"]);
    assert!(client.closed().await);

    let message = messages.recv().await.unwrap();
    assert_eq!(message.content.header("Subject"), Some("Test"));
    assert_eq!(message.content.body, "Hello World!\r\n");
    assert!(queued[0].ends_with(message.id.as_str()));
    assert_eq!(storage.count().await.unwrap(), 1);

    let mut idle = Client::connect(address).await;
    assert_eq!(idle.reply().await, vec!["220 test.local ESMTP mailsink"]);

    shutdown.send(Signal::Shutdown).unwrap();

    assert_eq!(
        idle.reply().await,
        vec!["421 test.local Service not available, closing transmission channel"]
    );
    assert!(idle.closed().await);

    server.await.unwrap().unwrap();

    loop {
        if matches!(finalised.recv().await, Ok(Signal::Finalised)) {
            break;
        }
    }
}
