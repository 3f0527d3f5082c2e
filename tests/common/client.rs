//! Test line-protocol client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// A connected, identified test client.
pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl TestClient {
    /// Connect and complete the `HELLO` handshake.
    pub async fn connect(addr: SocketAddr, user: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        };

        client.send_line(&format!("HELLO {user}")).await?;
        let greeting = client.recv_line().await?;
        anyhow::ensure!(
            greeting.contains(&format!("hello {user}")),
            "unexpected greeting: {greeting}"
        );
        Ok(client)
    }

    /// Send one line.
    pub async fn send_line(&mut self, line: &str) -> anyhow::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive one line, with a timeout.
    pub async fn recv_line(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;
        anyhow::ensure!(read > 0, "connection closed");
        Ok(line.trim_end().to_string())
    }

    /// Read lines until one contains `needle`, returning it.
    ///
    /// Gives up after a bounded number of lines so a chatty failure
    /// doesn't hang the test.
    pub async fn expect_containing(&mut self, needle: &str) -> anyhow::Result<String> {
        for _ in 0..32 {
            let line = self.recv_line().await?;
            if line.contains(needle) {
                return Ok(line);
            }
        }
        anyhow::bail!("never received a line containing {needle:?}")
    }
}
