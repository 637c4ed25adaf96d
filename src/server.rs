use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::commands::{Command, Dispatcher};
use crate::errors::ProtocolError;
use crate::resp::{RespHandler, RespValue};
use crate::store::Store;

/// Bind the listening socket and serve forever. The store is created here
/// and handed to every connection behind one mutex; the dispatcher table is
/// built once and shared read-only.
pub async fn run(host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    info!("listening on {host}:{port}");

    let store = Arc::new(Mutex::new(Store::new()));
    let dispatcher = Arc::new(Dispatcher::new());
    serve(listener, store, dispatcher).await
}

/// Accept loop. Each connection gets its own task; tokio's reactor wakes
/// tasks on socket readiness, so a slow client never stalls the rest.
pub async fn serve(
    listener: TcpListener,
    store: Arc<Mutex<Store>>,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("client connected: {peer}");

        let store = Arc::clone(&store);
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, store, dispatcher).await {
                debug!("client {peer} dropped: {e:#}");
            }
            debug!("client disconnected: {peer}");
        });
    }
}

/// Per-connection request loop: read one frame, dispatch it, write the
/// reply, repeat. Per-request failures become error frames on this
/// connection only; nothing here can take the process down.
async fn handle_client(
    stream: TcpStream,
    store: Arc<Mutex<Store>>,
    dispatcher: Arc<Dispatcher>,
) -> Result<()> {
    let mut handler = RespHandler::new(stream);

    loop {
        let value = match handler.read_value().await {
            Ok(Some(value)) => value,
            Ok(None) => return Ok(()), // clean disconnect
            Err(e) => match e.downcast_ref::<ProtocolError>() {
                Some(ProtocolError::Malformed(reason)) => {
                    warn!("malformed frame: {reason}");
                    handler
                        .write_value(RespValue::Error(format!("ERR Protocol error: {reason}")))
                        .await?;
                    // The rest of this read may not start on a frame
                    // boundary, so throw it away and wait for fresh input.
                    handler.discard_input();
                    continue;
                }
                _ => return Err(e), // transport failure, tear the connection down
            },
        };

        let reply = match Command::from_value(value) {
            Ok(command) => {
                debug!("command :: {} {:?}", command.name, command.args);
                let mut store = store.lock().await;
                dispatcher.dispatch(&mut store, &command)
            }
            Err(e) => RespValue::Error(format!("ERR Protocol error: {e}")),
        };

        handler.write_value(reply).await?;
    }
}
