use crate::card::{Card, HandCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type RoomId = Uuid;
pub type PlayerId = Uuid;
pub type GameId = Uuid;

/// 每个游戏实例自带的规则参数，截止时间都按这里计算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRules {
    pub turn_timeout_secs: u64,
    pub settlement_timeout_secs: u64,
    /// 下注轮次上限，超过后直接比牌结算
    pub max_betting_rounds: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            turn_timeout_secs: 30,
            settlement_timeout_secs: 30,
            max_betting_rounds: 15,
        }
    }
}

/// 一个房间的一次游戏会话，跨越多局，直到打满 `total_rounds`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub room_id: RoomId,
    pub round: u32,
    pub total_rounds: u32,
    pub status: GameStatus,
    pub pot: i64, // 底池
    pub betting_round: u32, // 当前下注轮次
    pub current_player_index: usize, // 当前行动玩家在 players 中的索引
    pub dealer_index: usize,
    pub base_bet: i64, // 底注，每局开始时每人扣除
    pub min_bet: i64, // 未看牌玩家的跟注额，看牌玩家加倍
    pub players: Vec<GamePlayer>,
    pub winner: Option<WinnerSnapshot>,
    pub round_history: Vec<RoundRecord>,
    // BTreeMap 保证序列化顺序稳定
    pub player_confirmations: BTreeMap<PlayerId, bool>,
    pub current_turn_deadline: Option<DateTime<Utc>>,
    pub settlement_deadline: Option<DateTime<Utc>>,
    pub rules: GameRules,
}

/// 牌局中的玩家
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayer {
    pub user_id: PlayerId,
    pub nickname: String,
    pub avatar: String,
    pub room_gold: i64,  // 房间内金币，允许为负
    pub cards: Vec<Card>,
    pub has_seen_cards: bool,
    pub current_round_bet: i64,
    pub total_bet: i64,
    pub has_acted_this_round: bool,
    pub status: PlayerStatus,
    // 通过比牌已经看过这名玩家手牌的其他玩家
    pub revealed_to: Vec<PlayerId>,
}

/// 开局时由房间提供的座位信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub user_id: PlayerId,
    pub nickname: String,
    pub avatar: String,
    pub room_gold: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GameStatus {
    Waiting,
    Betting,
    Settled,
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PlayerStatus {
    Playing,
    Folded,
    Lost,
    Winner,
}

/// 弃牌的来源，客户端据此区分 "超时" 和 "主动弃牌"
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FoldReason {
    Voluntary,
    TurnTimeout,
    Disconnected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoundOutcome {
    /// 经过比牌决出胜负
    Showdown,
    /// 其他人都弃牌，剩下的玩家直接获胜
    AllFolded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerSnapshot {
    pub user_id: PlayerId,
    pub nickname: String,
    pub cards: Vec<Card>,
    pub category: HandCategory,
    pub winnings: i64,
}

/// 一局结束后每名玩家的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub user_id: PlayerId,
    pub nickname: String,
    pub cards: Vec<Card>,
    pub category: HandCategory,
    pub result: PlayerStatus,
    pub gold_change: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub winner: WinnerSnapshot,
    pub outcome: RoundOutcome,
    pub pot: i64,
    pub players: Vec<PlayerResult>,
}

/// 状态变化事件，由聚合根的各项操作产生，通知层据此生成推送
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    RoundStarted { round: u32, dealer_id: PlayerId },
    CardsSeen { player_id: PlayerId },
    Called { player_id: PlayerId, amount: i64 },
    Raised { player_id: PlayerId, amount: i64, min_bet: i64 },
    Folded { player_id: PlayerId, reason: FoldReason },
    Compared { player_id: PlayerId, target_id: PlayerId, loser_id: Option<PlayerId> },
    BettingRoundOpened { betting_round: u32 },
    TurnPassed { player_id: PlayerId },
    Settled { record: RoundRecord },
    Confirmed { player_id: PlayerId, all_confirmed: bool },
    Finished,
}

// --- Game 的实现方法 ---

impl GamePlayer {
    pub fn from_seat(seat: &Seat) -> Self {
        Self {
            user_id: seat.user_id,
            nickname: seat.nickname.clone(),
            avatar: seat.avatar.clone(),
            room_gold: seat.room_gold,
            cards: Vec::new(),
            has_seen_cards: false,
            current_round_bet: 0,
            total_bet: 0,
            has_acted_this_round: false,
            status: PlayerStatus::Playing,
            revealed_to: Vec::new(),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlayerStatus::Playing
    }

    /// 跟注金额：看过牌的玩家是未看牌玩家的两倍
    pub fn call_cost(&self, min_bet: i64) -> i64 {
        if self.has_seen_cards { min_bet * 2 } else { min_bet }
    }

    /// 下注：扣金币，累加下注额，返回实际下注额
    pub(crate) fn stake(&mut self, amount: i64) -> i64 {
        self.room_gold -= amount;
        self.total_bet += amount;
        self.current_round_bet += amount;
        amount
    }
}

impl Game {
    pub fn new(id: GameId, room_id: RoomId, total_rounds: u32, base_bet: i64, rules: GameRules) -> Self {
        Self {
            id,
            room_id,
            round: 0,
            total_rounds,
            status: GameStatus::Waiting,
            pot: 0,
            betting_round: 1,
            current_player_index: 0,
            dealer_index: 0,
            base_bet,
            min_bet: base_bet,
            players: Vec::new(),
            winner: None,
            round_history: Vec::new(),
            player_confirmations: BTreeMap::new(),
            current_turn_deadline: None,
            settlement_deadline: None,
            rules,
        }
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&GamePlayer> {
        self.players.iter().find(|p| p.user_id == player_id)
    }

    pub fn player_index(&self, player_id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.user_id == player_id)
    }

    /// 获取当前行动的玩家ID (仅在下注阶段有意义)
    pub fn current_player_id(&self) -> Option<PlayerId> {
        if self.status != GameStatus::Betting {
            return None;
        }
        self.players.get(self.current_player_index).map(|p| p.user_id)
    }

    pub fn playing_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_playing()).count()
    }

    pub fn playing_ids(&self) -> Vec<PlayerId> {
        self.players.iter().filter(|p| p.is_playing()).map(|p| p.user_id).collect()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.user_id).collect()
    }

    /// 本局是否已经是最后一局
    pub fn is_last_round(&self) -> bool {
        self.round >= self.total_rounds
    }

    pub fn all_confirmed(&self) -> bool {
        self.players
            .iter()
            .all(|p| self.player_confirmations.get(&p.user_id).copied().unwrap_or(false))
    }

    pub fn latest_record(&self) -> Option<&RoundRecord> {
        self.round_history.last()
    }
}
