//! Session loop.
//!
//! A [`Session`] owns the Host streams and the Backend channel and moves
//! through three states:
//!
//! ```text
//! AwaitingHandshake ──► Serving ──► Terminated
//!                       │    ▲
//!                       └────┘  one request/response exchange
//! ```
//!
//! Exactly one exchange is in flight at a time: a request frame is decoded,
//! sent to the Backend, and the Backend's reply is written to the Host before
//! the next frame is read. Any error ends the session where it happened; the
//! caller is expected to drop the session and exit.
//!
//! # Example
//!
//! ```ignore
//! use extbridge::protocol::ByteOrder;
//! use extbridge::session::Session;
//! use extbridge::transport::BackendProcess;
//!
//! let (_process, channel) = BackendProcess::spawn(&command)?;
//! let mut session = Session::new(
//!     tokio::io::stdin(),
//!     tokio::io::stdout(),
//!     channel,
//!     ByteOrder::Native,
//! );
//! session.run().await?;
//! ```

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::protocol::{negotiate, ByteOrder, Request, RequestDecoder, Response, ResponseEncoder};
use crate::transport::BackendChannel;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the Backend's identity document.
    AwaitingHandshake,
    /// Forwarding requests. Holds the endpoint count from the handshake.
    Serving {
        /// Number of endpoints the Backend declared.
        endpoint_count: usize,
    },
    /// The Host ended the session.
    Terminated,
}

/// A bridge session between one Host and one Backend.
pub struct Session<HR, HW, BR, BW> {
    host_in: HR,
    host_out: HW,
    backend: BackendChannel<BR, BW>,
    order: ByteOrder,
    state: SessionState,
    exchanges: u64,
}

impl<HR, HW, BR, BW> Session<HR, HW, BR, BW>
where
    HR: AsyncRead + Unpin,
    HW: AsyncWrite + Unpin,
    BR: AsyncRead + Unpin,
    BW: AsyncWrite + Unpin,
{
    /// Create a session that has not yet performed the handshake.
    pub fn new(
        host_in: HR,
        host_out: HW,
        backend: BackendChannel<BR, BW>,
        order: ByteOrder,
    ) -> Self {
        Self {
            host_in,
            host_out,
            backend,
            order,
            state: SessionState::AwaitingHandshake,
            exchanges: 0,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Completed request/response exchanges.
    #[inline]
    pub fn exchanges(&self) -> u64 {
        self.exchanges
    }

    /// Perform one transition and return the new state.
    ///
    /// In `Terminated` this does nothing.
    ///
    /// # Errors
    ///
    /// Any error is fatal for the session: a truncated request frame, a
    /// Backend JSON failure, a closed Backend, or a failed Host write.
    pub async fn step(&mut self) -> Result<SessionState> {
        match self.state {
            SessionState::AwaitingHandshake => {
                let info = negotiate(&mut self.backend, &mut self.host_out).await?;
                self.state = SessionState::Serving {
                    endpoint_count: info.endpoint_count(),
                };
            }
            SessionState::Serving { endpoint_count } => {
                let decoder = RequestDecoder::new(self.order, endpoint_count);
                match decoder.read_request(&mut self.host_in).await? {
                    Some(request) => self.exchange(request).await?,
                    None => {
                        tracing::info!(exchanges = self.exchanges, "host ended session");
                        self.state = SessionState::Terminated;
                    }
                }
            }
            SessionState::Terminated => {}
        }
        Ok(self.state)
    }

    /// Run until the Host ends the session.
    ///
    /// Returns the number of completed exchanges.
    pub async fn run(&mut self) -> Result<u64> {
        while self.step().await? != SessionState::Terminated {}
        Ok(self.exchanges)
    }

    async fn exchange(&mut self, request: Request) -> Result<()> {
        self.backend.send(&request).await?;
        let response: Response = self.backend.recv().await?;

        ResponseEncoder::new(self.order)
            .write_to(&response, &mut self.host_out)
            .await?;
        self.exchanges += 1;

        tracing::debug!(
            port = request.port,
            path = request.path.as_deref().unwrap_or(""),
            status = response.status,
            "exchange complete"
        );
        Ok(())
    }

    /// Take the session apart, e.g. to inspect what was written.
    pub fn into_parts(self) -> (HR, HW, BackendChannel<BR, BW>) {
        (self.host_in, self.host_out, self.backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
    use tokio::task::JoinHandle;

    type TestSession<'a> = Session<
        &'a [u8],
        Vec<u8>,
        tokio::io::ReadHalf<DuplexStream>,
        tokio::io::WriteHalf<DuplexStream>,
    >;

    /// Backend that announces `info`, then answers each request line with
    /// the next canned reply. Returns the request lines it saw.
    fn fake_backend(info: &str, replies: Vec<String>) -> (DuplexStream, JoinHandle<Vec<String>>) {
        let (bridge_side, backend_side) = duplex(64 * 1024);
        let info = info.to_string();
        let task = tokio::spawn(async move {
            let (read, mut write) = split(backend_side);
            write.write_all(format!("{}\n", info).as_bytes()).await.unwrap();

            let mut replies = replies.into_iter();
            let mut lines = BufReader::new(read).lines();
            let mut seen = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                seen.push(line);
                if let Some(reply) = replies.next() {
                    write.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();
                }
            }
            seen
        });
        (bridge_side, task)
    }

    fn new_session<'a>(host_in: &'a [u8], bridge_side: DuplexStream) -> TestSession<'a> {
        let (read, write) = split(bridge_side);
        Session::new(
            host_in,
            Vec::new(),
            BackendChannel::new(read, write),
            ByteOrder::Little,
        )
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (bridge_side, backend) = fake_backend(r#"{"id":"t","endpoints":["/"]}"#, vec![]);
        let mut session = new_session(&[0x01, 0, 0], bridge_side);

        assert_eq!(session.state(), SessionState::AwaitingHandshake);
        assert_eq!(
            session.step().await.unwrap(),
            SessionState::Serving { endpoint_count: 1 }
        );
        assert_eq!(session.step().await.unwrap(), SessionState::Terminated);
        assert_eq!(session.step().await.unwrap(), SessionState::Terminated);

        drop(session);
        assert!(backend.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_exchange() {
        let (bridge_side, backend) = fake_backend(
            r#"{"id":"t","endpoints":["/"]}"#,
            vec![r#"{"status":200,"headers":{},"body":"","commands":[]}"#.to_string()],
        );
        let host_in = [0x00, 0x50, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut session = new_session(&host_in, bridge_side);

        assert_eq!(session.run().await.unwrap(), 1);

        let (_, host_out, _) = session.into_parts();
        let mut expected = vec![1, b't', 1, 1, b'/'];
        expected.extend_from_slice(&[200, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(host_out, expected);

        assert_eq!(backend.await.unwrap(), vec![r#"{"port":80}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_truncated_frame_aborts() {
        let (bridge_side, backend) = fake_backend(r#"{"id":"t","endpoints":[]}"#, vec![]);
        let host_in = [0x00, 0x50, 0x00, 0, 0];
        let mut session = new_session(&host_in, bridge_side);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, BridgeError::TruncatedFrame { .. }));

        drop(session);
        assert!(backend.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_closing_mid_exchange_aborts() {
        let (bridge_side, backend_side) = duplex(4096);
        // Announce, take one request, then hang up without replying.
        let backend = tokio::spawn(async move {
            let (read, mut write) = split(backend_side);
            write
                .write_all(b"{\"id\":\"t\",\"endpoints\":[]}\n")
                .await
                .unwrap();
            BufReader::new(read).lines().next_line().await.unwrap()
        });
        let host_in = [0x00, 0x50, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut session = new_session(&host_in, bridge_side);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, BridgeError::BackendClosed));
        assert_eq!(session.exchanges(), 0);
        assert_eq!(backend.await.unwrap().as_deref(), Some(r#"{"port":80}"#));
    }

    #[tokio::test]
    async fn test_bad_response_json_aborts() {
        let (bridge_side, _backend) = fake_backend(
            r#"{"id":"t","endpoints":[]}"#,
            vec![r#"{"status":"ok"}"#.to_string()],
        );
        let host_in = [0x00, 0x50, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        let mut session = new_session(&host_in, bridge_side);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, BridgeError::Json(_)));
        assert_eq!(session.exchanges(), 0);
    }
}
