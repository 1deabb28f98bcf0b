use crate::{Error, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Request written to the device once its network has been joined.
pub const STATUS_REQUEST: &str = "STATUS\n";

/// Response bytes read per query; anything past this is ignored.
const RESPONSE_BUF: usize = 1024;

/// One-shot TCP client for the device status endpoint.
///
/// Opens a fresh connection per query, writes the request, reads a single
/// response of up to 1024 bytes and closes the stream. Connect and read are
/// both bounded by the same timeout so a dead endpoint can never hang the
/// poll cycle.
#[derive(Debug, Clone)]
pub struct StatusClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl StatusClient {
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    /// Send `request` and return the device's reply decoded as text.
    pub async fn query(&self, request: &str) -> Result<String> {
        let mut stream = timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        stream.write_all(request.as_bytes()).await?;

        let mut buf = vec![0u8; RESPONSE_BUF];
        let n = timeout(self.timeout, stream.read(&mut buf))
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        // 设备返回 UTF-8 文本；遇到脏字节时宽松解码
        let reply = String::from_utf8_lossy(&buf[..n]).into_owned();
        tracing::debug!(bytes = n, "device replied");
        Ok(reply)
    }

    /// Send the fixed status request.
    pub async fn query_status(&self) -> Result<String> {
        self.query(STATUS_REQUEST).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_device(reply: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], STATUS_REQUEST.as_bytes());
            sock.write_all(reply.as_bytes()).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn query_returns_device_reply() {
        let addr = spawn_device("LED state: ON\n").await;
        let client = StatusClient::new(addr, Duration::from_secs(1));
        let reply = client.query_status().await.unwrap();
        assert_eq!(reply, "LED state: ON\n");
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        // Bind to grab a free port, then drop the listener so connects are
        // refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = StatusClient::new(addr, Duration::from_secs(1));
        assert!(client.query_status().await.is_err());
    }

    #[tokio::test]
    async fn silent_server_times_out_within_bound() {
        // Server accepts but never replies; the read must hit the timeout.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let client = StatusClient::new(addr, Duration::from_millis(200));
        let started = tokio::time::Instant::now();
        let err = client.query_status().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
