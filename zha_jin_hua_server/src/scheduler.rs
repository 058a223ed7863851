use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;
use zha_jin_hua_core::{GameId, PlayerId};

/// 计时器的用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// 行动超时，到期后替该玩家弃牌
    Turn { player_id: PlayerId },
    /// 结算后等待确认超时，到期后强制开始下一局
    Settlement,
    /// 断线保留期结束
    Disconnect { player_id: PlayerId },
}

/// 同一时刻每个槽位最多只有一个计时器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    Turn,
    Settlement,
    Disconnect(PlayerId),
}

impl TimerKind {
    pub fn slot(&self) -> TimerSlot {
        match self {
            TimerKind::Turn { .. } => TimerSlot::Turn,
            TimerKind::Settlement => TimerSlot::Settlement,
            TimerKind::Disconnect { player_id } => TimerSlot::Disconnect(*player_id),
        }
    }
}

/// 到期通知。`token` 用于丢弃已经被取消或替换的计时器。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub game_id: GameId,
    pub kind: TimerKind,
    pub token: u64,
}

struct Armed {
    token: u64,
    kind: TimerKind,
    handle: AbortHandle,
}

/// 一个游戏会话拥有的全部计时器。
///
/// 由会话锁保护，和游戏状态一起修改；会话被丢弃时所有计时器随之取消。
pub struct SessionTimers {
    game_id: GameId,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
    next_token: u64,
    armed: HashMap<TimerSlot, Armed>,
}

impl SessionTimers {
    pub fn new(game_id: GameId, fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self { game_id, fired_tx, next_token: 0, armed: HashMap::new() }
    }

    /// 设置计时器，替换同一槽位上的旧计时器。返回新计时器的 token。
    pub fn arm(&mut self, kind: TimerKind, after: Duration) -> u64 {
        self.cancel(kind.slot());
        self.next_token += 1;
        let token = self.next_token;

        let fired = TimerFired { game_id: self.game_id, kind, token };
        let tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // 接收端已关闭说明服务正在退出
            let _ = tx.send(fired);
        })
        .abort_handle();

        debug!(game_id = %self.game_id, ?kind, token, secs = after.as_secs(), "计时器已设置");
        self.armed.insert(kind.slot(), Armed { token, kind, handle });
        token
    }

    /// 取消槽位上的计时器，没有计时器时什么也不做
    pub fn cancel(&mut self, slot: TimerSlot) -> bool {
        match self.armed.remove(&slot) {
            Some(armed) => {
                armed.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, armed) in self.armed.drain() {
            armed.handle.abort();
        }
    }

    /// 到期的计时器是否仍然有效。有效时将其从槽位中移除。
    pub fn take_if_current(&mut self, fired: &TimerFired) -> bool {
        let slot = fired.kind.slot();
        match self.armed.get(&slot) {
            Some(armed) if armed.token == fired.token && armed.kind == fired.kind => {
                self.armed.remove(&slot);
                true
            }
            _ => false,
        }
    }

    pub fn armed_kind(&self, slot: TimerSlot) -> Option<TimerKind> {
        self.armed.get(&slot).map(|a| a.kind)
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
