//! Board Service
//!
//! Runs a [`MetaWearBoard`] on its own tokio task. Transport callbacks,
//! submitted commands and listener changes all arrive over one channel, so
//! the board handles them one at a time in arrival order. The operation
//! watchdog is driven from the same loop.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::connection::MetaWearBoard;
use super::transport::{GattTransport, TransportEvent};
use crate::error::{Error, Result};
use crate::modules::CommandSink;
use crate::protocol::{Command, CommandEncoder, Listener, ListenerId};

/// Requests handled by the service loop.
enum BoardCommand {
    Transport(TransportEvent),
    Submit(Command),
    ReadCharacteristic(Uuid),
    AddListener {
        module: u8,
        listener: Box<dyn Listener>,
        reply: oneshot::Sender<ListenerId>,
    },
    RemoveListener(ListenerId),
    Disconnect,
    Shutdown,
}

pub struct BoardService<T> {
    board: MetaWearBoard<T>,
    commands: mpsc::UnboundedReceiver<BoardCommand>,
}

impl<T: GattTransport + 'static> BoardService<T> {
    pub fn new(board: MetaWearBoard<T>) -> (Self, BoardHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let handle = BoardHandle {
            sender,
            encoder: CommandSink::encoder(&board).clone(),
        };
        (Self { board, commands }, handle)
    }

    /// Spawn the service loop on the current runtime.
    pub fn spawn(board: MetaWearBoard<T>) -> (BoardHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(board);
        (handle, tokio::spawn(service.run()))
    }

    /// Run until shut down or every handle is dropped. The link is torn
    /// down on exit.
    pub async fn run(mut self) {
        info!("Board service started");
        loop {
            let deadline = self.board.operation_deadline();
            let command = tokio::select! {
                command = self.commands.recv() => command,
                _ = wait_until(deadline) => {
                    self.board.check_timeout(std::time::Instant::now());
                    continue;
                }
            };

            match command {
                Some(BoardCommand::Shutdown) | None => break,
                Some(command) => self.apply(command),
            }
        }
        self.board.disconnect();
        info!("Board service stopped");
    }

    fn apply(&mut self, command: BoardCommand) {
        match command {
            BoardCommand::Transport(event) => {
                debug!("Transport event: {:?}", event);
                self.board.handle(event);
            }
            BoardCommand::Submit(command) => {
                if let Err(e) = self.board.submit(command) {
                    warn!("Failed to queue command: {}", e);
                }
            }
            BoardCommand::ReadCharacteristic(characteristic) => {
                self.board.read_characteristic(characteristic);
            }
            BoardCommand::AddListener {
                module,
                listener,
                reply,
            } => {
                let id = self.board.add_listener(module, listener);
                let _ = reply.send(id);
            }
            BoardCommand::RemoveListener(id) => {
                self.board.remove_listener(id);
            }
            BoardCommand::Disconnect => self.board.disconnect(),
            BoardCommand::Shutdown => {}
        }
    }
}

async fn wait_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
        }
        None => std::future::pending().await,
    }
}

/// Cheap, cloneable way to talk to a running [`BoardService`]. Module
/// controllers work on it directly: `handle.led().play(false)?`.
#[derive(Clone)]
pub struct BoardHandle {
    sender: mpsc::UnboundedSender<BoardCommand>,
    encoder: CommandEncoder,
}

impl BoardHandle {
    /// Forward a callback from the Bluetooth stack.
    pub fn transport_event(&self, event: TransportEvent) -> Result<()> {
        self.send(BoardCommand::Transport(event))
    }

    pub fn read_characteristic(&self, characteristic: Uuid) -> Result<()> {
        self.send(BoardCommand::ReadCharacteristic(characteristic))
    }

    pub async fn add_listener(&self, module: u8, listener: Box<dyn Listener>) -> Result<ListenerId> {
        let (reply, id) = oneshot::channel();
        self.send(BoardCommand::AddListener {
            module,
            listener,
            reply,
        })?;
        id.await.map_err(|_| Error::ServiceClosed)
    }

    pub fn remove_listener(&self, id: ListenerId) -> Result<()> {
        self.send(BoardCommand::RemoveListener(id))
    }

    pub fn disconnect(&self) -> Result<()> {
        self.send(BoardCommand::Disconnect)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(BoardCommand::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn send(&self, command: BoardCommand) -> Result<()> {
        self.sender.send(command).map_err(|_| Error::ServiceClosed)
    }
}

impl CommandSink for BoardHandle {
    fn encoder(&self) -> &CommandEncoder {
        &self.encoder
    }

    fn submit(&mut self, command: Command) -> Result<()> {
        self.send(BoardCommand::Submit(command))
    }
}
