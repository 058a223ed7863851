use crate::card::{Card, HandCategory, classify};
use crate::error::{ErrorKind, GameError};
use crate::room::Room;
use crate::state::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type PlayerSecret = Uuid;

// --- 客户端 -> 服务器 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ClientMessage {
    // --- 房间管理消息 ---
    /// 创建房间并入座
    CreateRoom { nickname: String, base_bet: i64, total_rounds: u32 },
    /// 加入一个已存在的房间
    JoinRoom { room_id: RoomId, nickname: String },
    /// 断线后凭 secret 重新连接
    Rejoin { room_id: RoomId, player_id: PlayerId, secret: PlayerSecret },

    // --- 游戏内消息 ---
    /// 房主开始游戏
    StartGame,
    /// 玩家执行的游戏动作
    PerformAction(PlayerAction),
    /// 结算后确认继续下一局
    ConfirmContinue,
    /// 获取当前游戏数据
    GetGameData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    SeeCards,           // 看牌
    Call,               // 跟注
    Raise(u32),         // 加注
    Fold,               // 弃牌
    Compare(PlayerId),  // 比牌
}

// --- 服务器 -> 客户端 的消息 ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum ServerMessage {
    /// 成功加入或创建房间后，私密地发给该玩家
    RoomJoined { your_id: PlayerId, your_secret: PlayerSecret, room: Room },
    /// 房间信息变化
    RoomUpdated(Room),

    /// 新的一局开始，每名玩家收到自己视角的数据
    RoundStarted(GameView),
    /// 完整游戏状态的快照，已按接收者隐藏他人手牌
    GameStateSnapshot(GameView),

    PlayerActed { player_id: PlayerId, action: PlayerAction, new_pot: i64 },
    /// 弃牌，`reason` 区分主动弃牌、超时和断线
    PlayerFolded { player_id: PlayerId, reason: FoldReason },
    PlayerCompared { player_id: PlayerId, target_id: PlayerId, loser_id: Option<PlayerId> },
    /// 轮到下一个玩家行动
    NextToAct { player_id: PlayerId, deadline: Option<DateTime<Utc>> },

    /// 单局结束，等待所有人确认
    RoundEnded {
        record: RoundRecord,
        round: u32,
        total_rounds: u32,
        confirmations: BTreeMap<PlayerId, bool>,
        settlement_deadline: Option<DateTime<Utc>>,
    },
    PlayerConfirmed { player_id: PlayerId, confirmations: BTreeMap<PlayerId, bool> },
    /// 打满全部局数
    GameEnded { record: RoundRecord, history: Vec<RoundRecord>, standings: Vec<Standing> },

    PlayerOffline { player_id: PlayerId },
    PlayerReconnected { player_id: PlayerId },

    Info { message: String },
    Error { kind: ErrorKind, message: String },
}

/// 整场结束时每名玩家的成绩
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub user_id: PlayerId,
    pub nickname: String,
    pub room_gold: i64,
    pub gold_change: i64,
}

/// 某个玩家看到的游戏数据
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub id: GameId,
    pub room_id: RoomId,
    pub round: u32,
    pub total_rounds: u32,
    pub status: GameStatus,
    pub pot: i64,
    pub min_bet: i64,
    pub betting_round: u32,
    pub dealer_index: usize,
    pub current_player_index: usize,
    pub current_player_id: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub winner: Option<WinnerSnapshot>,
    pub confirmations: BTreeMap<PlayerId, bool>,
    pub current_turn_deadline: Option<DateTime<Utc>>,
    pub settlement_deadline: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub user_id: PlayerId,
    pub nickname: String,
    pub avatar: String,
    pub room_gold: i64,
    /// 对接收者不可见时为 None
    pub cards: Option<Vec<Card>>,
    pub category: Option<HandCategory>,
    pub has_seen_cards: bool,
    pub current_round_bet: i64,
    pub total_bet: i64,
    pub status: PlayerStatus,
    pub is_self: bool,
}

/// 发给某个玩家的一条消息
#[derive(Debug, Clone)]
pub struct Delivery {
    pub to: PlayerId,
    pub message: ServerMessage,
}

impl From<&GameError> for ServerMessage {
    fn from(err: &GameError) -> Self {
        ServerMessage::Error { kind: err.kind(), message: err.to_string() }
    }
}

impl From<PlayerAction> for ClientMessage {
    fn from(action: PlayerAction) -> Self {
        ClientMessage::PerformAction(action)
    }
}

impl Game {
    /// 生成 `viewer` 视角的游戏数据。
    ///
    /// 自己的牌、比过牌的对手的牌总是可见；结算后所有人的牌都公开。
    pub fn view_for(&self, viewer: PlayerId) -> GameView {
        let showdown = matches!(self.status, GameStatus::Settled | GameStatus::Finished);
        GameView {
            id: self.id,
            room_id: self.room_id,
            round: self.round,
            total_rounds: self.total_rounds,
            status: self.status,
            pot: self.pot,
            min_bet: self.min_bet,
            betting_round: self.betting_round,
            dealer_index: self.dealer_index,
            current_player_index: self.current_player_index,
            current_player_id: self.current_player_id(),
            players: self
                .players
                .iter()
                .map(|p| {
                    let is_self = p.user_id == viewer;
                    let visible = is_self || showdown || p.revealed_to.contains(&viewer);
                    let cards = (visible && !p.cards.is_empty()).then(|| p.cards.clone());
                    let category = cards.as_ref().and_then(|c| classify(c).ok()).map(|r| r.category);
                    PlayerView {
                        user_id: p.user_id,
                        nickname: p.nickname.clone(),
                        avatar: p.avatar.clone(),
                        room_gold: p.room_gold,
                        cards,
                        category,
                        has_seen_cards: p.has_seen_cards,
                        current_round_bet: p.current_round_bet,
                        total_bet: p.total_bet,
                        status: p.status,
                        is_self,
                    }
                })
                .collect(),
            winner: self.winner.clone(),
            confirmations: self.player_confirmations.clone(),
            current_turn_deadline: self.current_turn_deadline,
            settlement_deadline: self.settlement_deadline,
        }
    }

    /// 整场的成绩，`entry_gold` 为入座时的金币
    pub fn standings(&self, entry_gold: i64) -> Vec<Standing> {
        self.players
            .iter()
            .map(|p| Standing {
                user_id: p.user_id,
                nickname: p.nickname.clone(),
                room_gold: p.room_gold,
                gold_change: p.room_gold - entry_gold,
            })
            .collect()
    }
}

/// 根据一次操作产生的事件，计算每名玩家需要收到的消息。
///
/// 只计算 "通知谁、通知什么"，不负责投递。
pub fn notifications(game: &Game, events: &[GameEvent], entry_gold: i64) -> Vec<Delivery> {
    let recipients = game.player_ids();
    let mut out = Vec::new();
    let broadcast = |out: &mut Vec<Delivery>, message: ServerMessage| {
        for &to in &recipients {
            out.push(Delivery { to, message: message.clone() });
        }
    };

    let mut round_started = false;
    for event in events {
        match event {
            GameEvent::RoundStarted { .. } => {
                round_started = true;
                for &to in &recipients {
                    out.push(Delivery { to, message: ServerMessage::RoundStarted(game.view_for(to)) });
                }
            }
            GameEvent::CardsSeen { player_id } => broadcast(&mut out, ServerMessage::PlayerActed {
                player_id: *player_id,
                action: PlayerAction::SeeCards,
                new_pot: game.pot,
            }),
            GameEvent::Called { player_id, .. } => broadcast(&mut out, ServerMessage::PlayerActed {
                player_id: *player_id,
                action: PlayerAction::Call,
                new_pot: game.pot,
            }),
            GameEvent::Raised { player_id, amount, .. } => broadcast(&mut out, ServerMessage::PlayerActed {
                player_id: *player_id,
                action: PlayerAction::Raise(u32::try_from(*amount).unwrap_or(u32::MAX)),
                new_pot: game.pot,
            }),
            GameEvent::Folded { player_id, reason } => {
                broadcast(&mut out, ServerMessage::PlayerFolded { player_id: *player_id, reason: *reason })
            }
            GameEvent::Compared { player_id, target_id, loser_id } => {
                broadcast(&mut out, ServerMessage::PlayerCompared {
                    player_id: *player_id,
                    target_id: *target_id,
                    loser_id: *loser_id,
                })
            }
            GameEvent::TurnPassed { player_id } => broadcast(&mut out, ServerMessage::NextToAct {
                player_id: *player_id,
                deadline: game.current_turn_deadline,
            }),
            GameEvent::Settled { record } => {
                let message = if game.status == GameStatus::Finished {
                    ServerMessage::GameEnded {
                        record: record.clone(),
                        history: game.round_history.clone(),
                        standings: game.standings(entry_gold),
                    }
                } else {
                    ServerMessage::RoundEnded {
                        record: record.clone(),
                        round: record.round,
                        total_rounds: game.total_rounds,
                        confirmations: game.player_confirmations.clone(),
                        settlement_deadline: game.settlement_deadline,
                    }
                };
                broadcast(&mut out, message);
            }
            GameEvent::Confirmed { player_id, .. } => broadcast(&mut out, ServerMessage::PlayerConfirmed {
                player_id: *player_id,
                confirmations: game.player_confirmations.clone(),
            }),
            GameEvent::BettingRoundOpened { .. } | GameEvent::Finished => {}
        }
    }

    if !round_started && !events.is_empty() {
        for &to in &recipients {
            out.push(Delivery { to, message: ServerMessage::GameStateSnapshot(game.view_for(to)) });
        }
    }
    out
}
