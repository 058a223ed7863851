use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;
use zha_jin_hua_core::{ClientMessage, ErrorKind, GameError, PlayerId, Room, RoomId, ServerMessage};

use crate::coordinator::Coordinator;
use crate::notify::Connections;

/// 服务器全局状态
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub connections: Arc<Connections>,
}

type SharedState = Arc<AppState>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .with_state(Arc::new(state))
}

// 认证成功后填充的连接上下文
struct Session {
    room_id: RoomId,
    player_id: PlayerId,
    conn_id: Uuid,
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 创建一个 MPSC 通道，用于从其他任务接收要发送的消息
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(64);

    // 启动一个新任务，专门负责将 MPSC 通道中的消息发送到 WebSocket
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    let mut session: Option<Session> = None;

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(client_msg, &state, &tx, &mut session).await,
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                    reply(&tx, request_error(format!("无法解析的消息: {}", e))).await;
                }
            }
        }
    }

    // 客户端断开连接。连接已被重连替换时不视为断线。
    if let Some(Session { room_id, player_id, conn_id }) = session {
        if state.connections.detach(player_id, conn_id) {
            state.coordinator.player_disconnected(room_id, player_id);
        }
    }
    info!("客户端连接关闭");
}

/// 核心消息处理逻辑
async fn handle_client_message(
    msg: ClientMessage,
    state: &AppState,
    tx: &mpsc::Sender<ServerMessage>,
    session: &mut Option<Session>,
) {
    let coordinator = &state.coordinator;
    match msg {
        ClientMessage::CreateRoom { nickname, base_bet, total_rounds } => {
            if session.is_some() {
                reply(tx, request_error("你已经在一个房间里了")).await;
                return;
            }
            match coordinator.create_room(nickname, base_bet, total_rounds) {
                Ok((player_id, room)) => enter_room(state, tx, session, player_id, room).await,
                Err(e) => reply(tx, (&e).into()).await,
            }
        }
        ClientMessage::JoinRoom { room_id, nickname } => {
            if session.is_some() {
                reply(tx, request_error("你已经在一个房间里了")).await;
                return;
            }
            match coordinator.join_room(room_id, nickname) {
                Ok((player_id, room)) => enter_room(state, tx, session, player_id, room).await,
                Err(e) => reply(tx, (&e).into()).await,
            }
        }
        ClientMessage::Rejoin { room_id, player_id, secret } => {
            if session.is_some() {
                reply(tx, request_error("你已经在一个房间里了")).await;
                return;
            }
            if !state.connections.verify(player_id, secret) {
                reply(tx, request_error("身份验证失败")).await;
                return;
            }
            let room = match coordinator.room(room_id) {
                Ok(room) if room.is_seated(player_id) => room,
                Ok(_) => {
                    reply(tx, (&GameError::PlayerNotFound(player_id)).into()).await;
                    return;
                }
                Err(e) => {
                    reply(tx, (&e).into()).await;
                    return;
                }
            };
            let conn_id = state.connections.attach(player_id, tx.clone());
            *session = Some(Session { room_id, player_id, conn_id });
            coordinator.player_reconnected(room_id, player_id);
            reply(tx, ServerMessage::RoomJoined { your_id: player_id, your_secret: secret, room }).await;
            if let Ok(view) = coordinator.game_view(room_id, player_id) {
                reply(tx, ServerMessage::GameStateSnapshot(view)).await;
            }
        }
        // ... 其他需要认证后才能执行的消息
        _ => {
            let Some(Session { room_id, player_id, .. }) = session else {
                reply(tx, request_error("请先加入或创建房间")).await;
                return;
            };
            let (room_id, player_id) = (*room_id, *player_id);
            let result = match msg {
                ClientMessage::StartGame => coordinator.start_game(room_id, player_id).map(|_| ()),
                ClientMessage::PerformAction(action) => coordinator.perform_action(room_id, player_id, action),
                ClientMessage::ConfirmContinue => coordinator.confirm_continue(room_id, player_id),
                ClientMessage::GetGameData => coordinator
                    .game_view(room_id, player_id)
                    .map(|view| {
                        // 快照只发给请求者
                        if tx.try_send(ServerMessage::GameStateSnapshot(view)).is_err() {
                            warn!(%player_id, "发送游戏快照失败");
                        }
                    }),
                ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } | ClientMessage::Rejoin { .. } => {
                    Ok(())
                }
            };
            // 错误消息只发给当前玩家，其余通知由 outbox 投递
            if let Err(e) = result {
                reply(tx, (&e).into()).await;
            }
        }
    }
}

async fn enter_room(
    state: &AppState,
    tx: &mpsc::Sender<ServerMessage>,
    session: &mut Option<Session>,
    player_id: PlayerId,
    room: Room,
) {
    let secret = state.connections.register(player_id);
    let conn_id = state.connections.attach(player_id, tx.clone());
    *session = Some(Session { room_id: room.id, player_id, conn_id });
    reply(tx, ServerMessage::RoomJoined { your_id: player_id, your_secret: secret, room }).await;
}

fn request_error(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error { kind: ErrorKind::InvalidRequest, message: message.into() }
}

async fn reply(tx: &mpsc::Sender<ServerMessage>, message: ServerMessage) {
    if tx.send(message).await.is_err() {
        warn!("回复客户端失败（可能已断开）");
    }
}
