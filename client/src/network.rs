//! Terminal client: relays typed commands to the server and prints every update

use log::{debug, info};
use shared::Command;
use std::error::Error;
use tokio::io::{
    self, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
    BufReader,
};
use tokio::net::TcpStream;

pub const PROMPT: &str = "Enter command (MOVE/ATTACK/QUIT/CHAT <MSG>): ";
pub const DISCONNECTED: &str = "Disconnected from server.";

const BUFFER_SIZE: usize = 1024;

pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub async fn connect(addr: &str) -> Result<Self, Box<dyn Error>> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to {}", stream.peer_addr()?);
        Ok(Client { stream })
    }

    /// Runs until the server closes the connection, or until stdin ends and the
    /// server has seen our half-close.
    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        let (reader, writer) = self.stream.into_split();
        let mut receiver = tokio::spawn(print_updates(reader, io::stdout()));

        tokio::select! {
            result = &mut receiver => {
                result??;
            }
            result = send_commands(BufReader::new(io::stdin()), writer) => {
                result?;
                receiver.await??;
            }
        }

        Ok(())
    }
}

/// Copies whatever the server sends to `out`, re-showing the prompt after each
/// chunk. Returns once the server closes the connection.
pub async fn print_updates<R, W>(mut server: R, mut out: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = [0u8; BUFFER_SIZE];

    loop {
        let len = server.read(&mut buffer).await?;
        if len == 0 {
            out.write_all(format!("\n{}\n", DISCONNECTED).as_bytes()).await?;
            out.flush().await?;
            return Ok(());
        }

        out.write_all(b"\r").await?;
        out.write_all(&buffer[..len]).await?;
        out.write_all(PROMPT.as_bytes()).await?;
        out.flush().await?;
    }
}

/// Sends each input line as one command. Stops after `QUIT` or at end of input,
/// half-closing the connection either way.
///
/// Lines are trimmed at both ends before sending, and blank lines are not sent
/// at all. The server would answer a blank line with an unchanged frame, so
/// skipping it saves a round trip.
pub async fn send_commands<R, W>(input: R, mut server: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }

        debug!("Sending {:?}", command);
        server.write_all(format!("{}\n", command).as_bytes()).await?;

        if matches!(command.parse::<Command>(), Ok(Command::Quit)) {
            break;
        }
    }

    server.shutdown().await
}
