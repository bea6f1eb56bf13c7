//! TCP connection handler
//!
//! Wires one accepted socket to a session: a line-framed reader feeding
//! the session, and a writer task draining the participant's outbound
//! queue into the socket.

use std::sync::Arc;

use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppError;
use crate::participant::{Connection, Participant};
use crate::registry::Registry;
use crate::router::RouterHandle;
use crate::session::Session;
use crate::types::ParticipantId;

/// Handle a new TCP connection
///
/// Runs the session until the client quits or the connection drops.
pub async fn handle_connection(
    stream: TcpStream,
    registry: Arc<Registry>,
    router: RouterHandle,
    config: &Config,
) -> Result<(), AppError> {
    let id = ParticipantId::from(stream.peer_addr()?);
    debug!("New TCP connection from {}", id);

    let (reader, writer) = stream.into_split();
    let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(config.max_line_length));
    let mut sink = FramedWrite::new(writer, LinesCodec::new());

    // Server -> client lines
    let (line_tx, mut line_rx) = mpsc::channel::<String>(config.outbound_capacity());

    // Ends once the session and every registry copy of the participant are gone
    let writer_id = id.clone();
    tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if let Err(e) = sink.send(line).await {
                debug!("Write to {} failed: {}", writer_id, e);
                break;
            }
        }
        let _ = SinkExt::<String>::close(&mut sink).await;
        debug!("Write task ended for {}", writer_id);
    });

    let participant = Participant::new(id.clone(), Connection::new(line_tx));
    let mut session = Session::new(participant, registry, router);
    let result = session.run(lines).await;

    info!("Client {} disconnected", id);
    result
}
