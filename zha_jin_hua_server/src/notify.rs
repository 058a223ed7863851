use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use zha_jin_hua_core::{Delivery, PlayerId, PlayerSecret, ServerMessage};

pub type Outbox = mpsc::UnboundedSender<Delivery>;

pub fn outbox() -> (Outbox, mpsc::UnboundedReceiver<Delivery>) {
    mpsc::unbounded_channel()
}

// 玩家的网络连接信息
struct PlayerConnection {
    conn_id: Uuid,
    // 用于向该玩家的 WebSocket 任务发送消息的通道
    sender: mpsc::Sender<ServerMessage>,
}

/// 玩家与网络连接的映射。secret 在断线后仍然保留，用于重连认证。
#[derive(Default)]
pub struct Connections {
    secrets: DashMap<PlayerId, PlayerSecret>,
    live: DashMap<PlayerId, PlayerConnection>,
}

impl Connections {
    /// 为新玩家生成 secret
    pub fn register(&self, player_id: PlayerId) -> PlayerSecret {
        let secret = Uuid::new_v4();
        self.secrets.insert(player_id, secret);
        secret
    }

    pub fn verify(&self, player_id: PlayerId, secret: PlayerSecret) -> bool {
        self.secrets.get(&player_id).is_some_and(|s| *s == secret)
    }

    /// 绑定连接，替换该玩家已有的连接。返回连接 id。
    pub fn attach(&self, player_id: PlayerId, sender: mpsc::Sender<ServerMessage>) -> Uuid {
        let conn_id = Uuid::new_v4();
        self.live.insert(player_id, PlayerConnection { conn_id, sender });
        conn_id
    }

    /// 解除绑定。连接已被新连接替换时返回 false。
    pub fn detach(&self, player_id: PlayerId, conn_id: Uuid) -> bool {
        self.live.remove_if(&player_id, |_, c| c.conn_id == conn_id).is_some()
    }

    pub fn is_online(&self, player_id: PlayerId) -> bool {
        self.live.contains_key(&player_id)
    }

    pub fn send(&self, player_id: PlayerId, message: ServerMessage) -> bool {
        match self.live.get(&player_id) {
            Some(conn) => conn.sender.try_send(message).is_ok(),
            None => false,
        }
    }
}

/// 把 outbox 中的消息投递到在线连接
pub async fn dispatch(connections: Arc<Connections>, mut deliveries: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(Delivery { to, message }) = deliveries.recv().await {
        if connections.send(to, message) {
            continue;
        }
        if connections.is_online(to) {
            warn!(player_id = %to, "向玩家发送消息失败（发送队列已满或已断开）");
        } else {
            debug!(player_id = %to, "玩家不在线，消息已丢弃");
        }
    }
}
