//! IPC server implementation
//!
//! Listens on localhost TCP for newline-delimited JSON requests.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use lk_core::error::{LkError, StoreError};
use lk_core::ipc::{ActorInfo, DaemonStatus, IpcRequest, IpcResponse, SessionInfo};
use lk_core::session::{NewSession, SessionUpdate};
use lk_core::types::{ResourceId, UserId};

use crate::state::DaemonState;

/// IPC server for operator communication
///
/// Listens on localhost (127.0.0.1) only - not accessible from network.
pub struct IpcServer {
    /// Address to bind (127.0.0.1:port)
    pub address: String,
    /// Daemon state
    state: Arc<DaemonState>,
    /// Cancellation token for shutdown
    shutdown_token: Option<CancellationToken>,
}

impl IpcServer {
    /// Create a new IPC server
    pub fn new(address: String, state: Arc<DaemonState>) -> Self {
        Self {
            address,
            state,
            shutdown_token: None,
        }
    }

    /// Set the shutdown token (call before run)
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = Some(token);
        self
    }

    /// Start the IPC server
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.address)
            .await
            .with_context(|| format!("Failed to bind IPC server to {}", self.address))?;

        tracing::info!("IPC server listening on {}", self.address);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    // Only accept connections from localhost
                    if !peer_addr.ip().is_loopback() {
                        tracing::warn!("Rejected non-localhost connection from {}", peer_addr);
                        continue;
                    }

                    let state = Arc::clone(&self.state);
                    let shutdown_token = self.shutdown_token.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, state, shutdown_token).await {
                            tracing::warn!("IPC client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept IPC connection: {}", e);
                }
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    state: Arc<DaemonState>,
    shutdown_token: Option<CancellationToken>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<IpcRequest>(trimmed) {
            Ok(request) => handle_request(request, &state, shutdown_token.as_ref()).await,
            Err(e) => IpcResponse::Error {
                message: format!("Invalid request: {}", e),
            },
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
    }

    Ok(())
}

fn error_response(err: LkError) -> IpcResponse {
    IpcResponse::Error {
        message: err.to_string(),
    }
}

fn not_found(user_id: &str) -> IpcResponse {
    IpcResponse::Error {
        message: format!("Session not found: {}", user_id),
    }
}

async fn handle_request(
    request: IpcRequest,
    state: &DaemonState,
    shutdown_token: Option<&CancellationToken>,
) -> IpcResponse {
    let sessions = &state.sessions;

    match request {
        IpcRequest::GetStatus => {
            let session_count = match sessions.list_sessions().await {
                Ok(list) => list.len(),
                Err(e) => return error_response(e),
            };

            IpcResponse::Status(DaemonStatus {
                running: true,
                uptime_secs: state.uptime_secs(),
                session_count,
                actor_count: state.actors().len(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
        }

        IpcRequest::CreateSession {
            user_id,
            primary_resource_id,
            secondary_resource_ids,
            duration_minutes,
        } => {
            let new = NewSession {
                user_id: UserId::new(user_id),
                primary_resource_id: ResourceId::new(primary_resource_id),
                secondary_resource_ids: secondary_resource_ids
                    .into_iter()
                    .map(ResourceId::new)
                    .collect(),
                duration_minutes,
            };

            match sessions.create_session(new).await {
                Ok(created) => IpcResponse::SessionCreated {
                    session: SessionInfo::from(&created.session),
                    expires_at: created.expires_at,
                },
                Err(e) => error_response(e),
            }
        }

        IpcRequest::GetSession { user_id } => {
            match sessions.get_session(&UserId::new(user_id.clone())).await {
                Ok(Some(session)) => IpcResponse::Session(SessionInfo::from(&session)),
                Ok(None) => not_found(&user_id),
                Err(e) => error_response(e),
            }
        }

        IpcRequest::ListSessions => match sessions.list_sessions().await {
            Ok(list) => IpcResponse::Sessions {
                sessions: list.iter().map(SessionInfo::from).collect(),
            },
            Err(e) => error_response(e),
        },

        IpcRequest::UpdateSession {
            user_id,
            duration_minutes,
        } => {
            if duration_minutes == 0 {
                return IpcResponse::Error {
                    message: "duration_minutes must be positive".to_string(),
                };
            }

            let update = SessionUpdate {
                duration_minutes: Some(duration_minutes),
            };
            match sessions
                .update_session(&UserId::new(user_id.clone()), update)
                .await
            {
                Ok(session) => IpcResponse::Session(SessionInfo::from(&session)),
                Err(LkError::Store(StoreError::NotFound(_))) => not_found(&user_id),
                Err(e) => error_response(e),
            }
        }

        IpcRequest::DeleteSession { user_id } => {
            match sessions.delete_session(&UserId::new(user_id.clone())).await {
                Ok(true) => IpcResponse::Ok,
                Ok(false) => not_found(&user_id),
                Err(e) => error_response(e),
            }
        }

        IpcRequest::GetActor { user_id } => {
            match sessions.actor_status(&UserId::new(user_id.clone())).await {
                Ok(Some(actor)) => IpcResponse::Actor(ActorInfo::from(&actor)),
                Ok(None) => IpcResponse::Actor(ActorInfo::idle(user_id)),
                Err(e) => error_response(e),
            }
        }

        IpcRequest::Ping => IpcResponse::Pong,

        IpcRequest::Shutdown => {
            tracing::info!("Shutdown requested via IPC");
            if let Some(token) = shutdown_token {
                token.cancel();
                IpcResponse::Ok
            } else {
                IpcResponse::Error {
                    message: "Shutdown not supported (no shutdown token configured)".to_string(),
                }
            }
        }
    }
}
