//! Server network layer handling TCP sessions and state broadcasting

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::{GameState, Outcome};
use crate::slots::Frame;
use log::{debug, error, info, warn};
use shared::{marker, MAX_COMMAND_LEN, SERVER_FULL};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, Receiver};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tokio::time::timeout;

/// The single lock guarding grid and slot table for every connection
pub type SharedState = Arc<Mutex<GameState>>;

/// Listening server that owns the shared game state
pub struct Server {
    listener: TcpListener,
    state: SharedState,
    limits: PeerLimits,
}

/// Per-peer bounds on outbound traffic
#[derive(Debug, Clone, Copy)]
pub struct PeerLimits {
    pub write_timeout: Duration,
    pub max_queued_frames: usize,
}

impl From<&ServerConfig> for PeerLimits {
    fn from(config: &ServerConfig) -> Self {
        PeerLimits {
            write_timeout: config.write_timeout,
            max_queued_frames: config.max_queued_frames,
        }
    }
}

impl Server {
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            state: Arc::new(Mutex::new(GameState::new())),
            limits: PeerLimits::from(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Accept loop; spawns one session task per connection
    pub async fn run(self) -> Result<(), ServerError> {
        info!("Server started successfully");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("Accepted connection from {}", addr);
                    let state = Arc::clone(&self.state);
                    let limits = self.limits;
                    tokio::spawn(async move {
                        handle_connection(stream, addr, state, limits).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

/// Runs one peer from slot allocation to release
///
/// The state lock is taken once per event (join, each line, leave) and held
/// only while the state is mutated and the resulting frame is queued. Socket
/// writes happen in a separate writer task, so a slow peer delays only its
/// own frames, never other players' commands.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: SharedState,
    limits: PeerLimits,
) {
    let (reader, mut writer) = stream.into_split();
    let (peer, frames) = mpsc::channel(limits.max_queued_frames.max(1));

    let joined = state.lock().await.join(peer);
    let seat = match joined {
        Ok(seat) => seat,
        Err(e) => {
            info!("Rejecting {}: {}", addr, e);
            if let Err(e) = reject(&mut writer).await {
                debug!("Could not send rejection to {}: {}", addr, e);
            }
            return;
        }
    };
    let player = marker(seat.slot);
    info!("Player {} connected from {}", player, addr);

    let mut writer_task = tokio::spawn(write_frames(writer, frames, limits.write_timeout));
    let mut writer_finished = false;
    let mut reader = BufReader::new(reader);

    loop {
        tokio::select! {
            line = read_command(&mut reader) => match line {
                Ok(Some(line)) => {
                    let outcome = state.lock().await.handle_line(seat, &line);
                    if outcome == Outcome::Closed {
                        info!("Player {} left", player);
                        break;
                    }
                }
                Ok(None) => {
                    info!("Player {} disconnected", player);
                    break;
                }
                Err(e) => {
                    warn!("Player {}: {}", player, ServerError::PeerDisconnected(e));
                    break;
                }
            },
            result = &mut writer_task => {
                writer_finished = true;
                log_writer_result(seat.slot, result);
                break;
            }
        }
    }

    // No-op if QUIT or a full queue already released this seat
    state.lock().await.leave(seat);

    // Releasing dropped the last sender, so the writer flushes what is queued and exits
    if !writer_finished {
        log_writer_result(seat.slot, writer_task.await);
    }
}

/// Reads one command line of at most `MAX_COMMAND_LEN` bytes
///
/// Bytes are decoded lossily, so invalid UTF-8 reaches the interpreter as an
/// unrecognised command instead of failing the read. A longer line is cut
/// after `MAX_COMMAND_LEN + 1` bytes, which the parser rejects as too long,
/// and the rest of it is skipped. Returns `None` at end of stream.
pub async fn read_command<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_COMMAND_LEN as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }

    if buf.last() != Some(&b'\n') && buf.len() > MAX_COMMAND_LEN {
        skip_line(reader).await?;
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Consumes input up to and including the next newline, without buffering it
async fn skip_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (used, done) = {
            let available = reader.fill_buf().await?;
            match available.iter().position(|&b| b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), available.is_empty()),
            }
        };
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}

/// Drains queued frames to the socket until every sender is gone
///
/// Each write is bounded by `write_timeout`; a failed or slow write ends the
/// task, which the session treats as a disconnect.
pub async fn write_frames<W>(
    mut writer: W,
    mut frames: Receiver<Frame>,
    write_timeout: Duration,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        timeout(write_timeout, writer.write_all(frame.as_bytes()))
            .await
            .map_err(|_| ServerError::write_timeout())?
            .map_err(ServerError::PeerDisconnected)?;
    }

    writer
        .shutdown()
        .await
        .map_err(ServerError::PeerDisconnected)
}

/// Sends the capacity rejection line and closes the write side
pub async fn reject<W>(mut writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(format!("{}\n", SERVER_FULL).as_bytes()).await?;
    writer.shutdown().await
}

fn log_writer_result(slot: usize, result: Result<Result<(), ServerError>, JoinError>) {
    match result {
        Ok(Ok(())) => debug!("Writer for slot {} finished", slot),
        Ok(Err(e)) => warn!("Player {}: {}", marker(slot), e),
        Err(e) => error!("Writer task for slot {} failed: {}", slot, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Command, MalformedCommand, StateSnapshot};
    use tokio_test::io::Builder;

    fn frame(text: &str) -> Frame {
        Frame::from(text)
    }

    #[tokio::test]
    async fn test_write_frames_in_order() {
        let mock = Builder::new().write(b"first\n").write(b"second\n").build();
        let (tx, rx) = mpsc::channel(8);

        tx.try_send(frame("first\n")).unwrap();
        tx.try_send(frame("second\n")).unwrap();
        drop(tx);

        let result = write_frames(mock, rx, Duration::from_secs(1)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_write_frames_error_is_disconnect() {
        let mock = Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let (tx, rx) = mpsc::channel(8);
        tx.try_send(frame("STATE\n")).unwrap();

        let result = write_frames(mock, rx, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ServerError::PeerDisconnected(_))));
    }

    #[tokio::test]
    async fn test_write_frames_times_out_on_stalled_peer() {
        // Nobody reads the other end, so the frame never fits in the pipe
        let (writer, _stalled_reader) = tokio::io::duplex(8);
        let (tx, rx) = mpsc::channel(8);
        tx.try_send(frame("0123456789abcdef")).unwrap();

        let result = write_frames(writer, rx, Duration::from_millis(50)).await;
        match result {
            Err(ServerError::PeerDisconnected(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stalled_peer_is_dropped_when_queue_fills() {
        let mut game = GameState::new();

        let (stalled_writer, _stalled_reader) = tokio::io::duplex(8);
        let (tx, rx) = mpsc::channel(2);
        let stalled = game.join(tx).unwrap();
        let writer = tokio::spawn(write_frames(stalled_writer, rx, Duration::from_millis(200)));

        let (tx, mut watcher_frames) = mpsc::channel(64);
        let watcher = game.join(tx).unwrap();

        for _ in 0..10 {
            if !game.slots.is_current(stalled) {
                break;
            }
            game.handle_line(watcher, "MOVE RIGHT");
            tokio::task::yield_now().await;
        }
        assert!(!game.slots.is_current(stalled));
        assert!(game.slots.is_current(watcher));

        let mut last = None;
        while let Ok(frame) = watcher_frames.try_recv() {
            last = Some(frame);
        }
        let snapshot = StateSnapshot::parse(&last.unwrap()).unwrap();
        assert!(snapshot.player('A').is_none());
        assert!(snapshot.player('B').is_some());

        let result = writer.await.unwrap();
        assert!(matches!(result, Err(ServerError::PeerDisconnected(_))));
    }

    #[tokio::test]
    async fn test_read_command_decodes_invalid_utf8() {
        let mut input: &[u8] = b"\xffMOVE UP\r\nATTACK";

        let garbled = read_command(&mut input).await.unwrap().unwrap();
        assert_eq!(garbled, "\u{FFFD}MOVE UP\r\n");
        assert!(garbled.parse::<Command>().is_err());

        assert_eq!(read_command(&mut input).await.unwrap(), Some("ATTACK".to_string()));
        assert_eq!(read_command(&mut input).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_command_cuts_overlong_line() {
        let mut bytes = vec![b'X'; MAX_COMMAND_LEN * 3];
        bytes.extend_from_slice(b"\nQUIT\n");
        let mut input: &[u8] = &bytes;

        let overlong = read_command(&mut input).await.unwrap().unwrap();
        assert_eq!(overlong.len(), MAX_COMMAND_LEN + 1);
        assert!(matches!(
            overlong.parse::<Command>(),
            Err(MalformedCommand::TooLong(_))
        ));

        assert_eq!(read_command(&mut input).await.unwrap(), Some("QUIT\n".to_string()));
        assert_eq!(read_command(&mut input).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_command_skips_overlong_line_across_reads() {
        let mock = Builder::new()
            .read(&[b'X'; 2000])
            .read(b"XXXX")
            .read(b"\nATTACK\n")
            .build();
        let mut reader = BufReader::new(mock);

        let overlong = read_command(&mut reader).await.unwrap().unwrap();
        assert_eq!(overlong.len(), MAX_COMMAND_LEN + 1);
        assert_eq!(read_command(&mut reader).await.unwrap(), Some("ATTACK\n".to_string()));
        assert_eq!(read_command(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_at_limit_is_kept_whole() {
        let line = format!("CHAT {}\n", "y".repeat(MAX_COMMAND_LEN - 5));
        let mut input: &[u8] = line.as_bytes();

        let read = read_command(&mut input).await.unwrap().unwrap();
        assert_eq!(read, line);
        assert!(matches!(read.parse::<Command>(), Ok(Command::Chat(_))));
    }

    #[tokio::test]
    async fn test_reject_sends_server_full() {
        let (writer, mut reader) = tokio::io::duplex(64);

        reject(writer).await.unwrap();

        let mut received = String::new();
        reader.read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "Server full\n");
    }

    #[tokio::test]
    async fn test_bind_failure_reports_address() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: taken.local_addr().unwrap().port(),
            ..ServerConfig::default()
        };

        match Server::bind(&config).await {
            Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, config.address()),
            Err(other) => panic!("Unexpected error: {}", other),
            Ok(_) => panic!("Bind should fail"),
        }
    }

    #[tokio::test]
    async fn test_session_join_command_and_quit() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ServerConfig::default()
        };
        let server = Server::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let state = server.state();
        tokio::spawn(server.run());

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let first = read_frame(&mut reader, 1).await;
        assert_eq!(first.player('A').unwrap().row, 0);

        writer.write_all(b"MOVE RIGHT\r\n").await.unwrap();
        let moved = read_frame(&mut reader, 1).await;
        assert_eq!(moved.player('A').unwrap().col, 1);
        assert_eq!(moved.cell(0, 1), Some('A'));

        writer.write_all(b"QUIT\n").await.unwrap();

        // Connection closes without a frame for the quitting player
        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let game = state.lock().await;
        assert!(game.slots.is_empty());
        assert_eq!(game.broadcast_count(), 3);
    }

    async fn read_frame<R>(reader: &mut R, players: usize) -> StateSnapshot
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        let mut text = String::new();
        for _ in 0..(shared::GRID_ROWS + 2 + players) {
            reader.read_line(&mut text).await.unwrap();
        }
        StateSnapshot::parse(&text).unwrap()
    }
}
