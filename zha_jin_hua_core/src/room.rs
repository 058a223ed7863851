use crate::error::{GameError, GameResult};
use crate::state::{Game, GameId, PlayerId, RoomId, Seat};
use serde::{Deserialize, Serialize};

/// 房间参数的取值范围
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomLimits {
    pub min_players: usize,
    pub max_players: usize,
    pub base_bets: Vec<i64>,
    pub total_rounds: Vec<u32>,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            min_players: 2,
            max_players: 5,
            base_bets: vec![1, 2, 5],
            total_rounds: vec![10, 20, 50],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomPlayer {
    pub user_id: PlayerId,
    pub nickname: String,
    pub avatar: String,
    pub room_gold: i64,
}

/// 房间。游戏进行中以 `Game` 里的金币为准，这里只是每次操作后的快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub creator: PlayerId,
    pub base_bet: i64,
    pub total_rounds: u32,
    pub current_round: u32,
    // 入座时的金币，用于计算整场输赢
    pub entry_gold: i64,
    pub status: RoomStatus,
    pub players: Vec<RoomPlayer>,
    pub game_id: Option<GameId>,
}

impl Room {
    /// 创建房间，创建者自动入座
    pub fn open(
        id: RoomId,
        creator: RoomPlayer,
        base_bet: i64,
        total_rounds: u32,
        limits: &RoomLimits,
    ) -> GameResult<Self> {
        if !limits.base_bets.contains(&base_bet) {
            return Err(GameError::InvalidRoomConfig("底注不在允许范围内"));
        }
        if !limits.total_rounds.contains(&total_rounds) {
            return Err(GameError::InvalidRoomConfig("局数不在允许范围内"));
        }
        Ok(Self {
            id,
            creator: creator.user_id,
            base_bet,
            total_rounds,
            current_round: 0,
            entry_gold: creator.room_gold,
            status: RoomStatus::Waiting,
            players: vec![creator],
            game_id: None,
        })
    }

    pub fn is_seated(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.user_id == player_id)
    }

    /// 玩家入座。已在房间内的玩家重复加入视为重连，不受房间状态限制。
    pub fn seat(&mut self, mut player: RoomPlayer, limits: &RoomLimits) -> GameResult<()> {
        if self.is_seated(player.user_id) {
            return Ok(());
        }
        if self.status != RoomStatus::Waiting || self.game_id.is_some() {
            return Err(GameError::RoomNotWaiting(self.id));
        }
        if self.players.len() >= limits.max_players {
            return Err(GameError::RoomFull);
        }
        player.room_gold = self.entry_gold;
        self.players.push(player);
        Ok(())
    }

    /// 开局用的座位列表
    pub fn seats(&self) -> Vec<Seat> {
        self.players
            .iter()
            .map(|p| Seat {
                user_id: p.user_id,
                nickname: p.nickname.clone(),
                avatar: p.avatar.clone(),
                room_gold: p.room_gold,
            })
            .collect()
    }

    /// 把游戏中的金币和局数同步回房间
    pub fn sync_from(&mut self, game: &Game) {
        self.current_round = game.round;
        for room_player in self.players.iter_mut() {
            if let Some(p) = game.player(room_player.user_id) {
                room_player.room_gold = p.room_gold;
            }
        }
    }

    /// 整场结束：回到等待状态并解除游戏绑定。
    /// 金币已经结算到账户，房间金币恢复为入座金币。
    pub fn reset_after_finish(&mut self) {
        self.status = RoomStatus::Waiting;
        self.game_id = None;
        for player in self.players.iter_mut() {
            player.room_gold = self.entry_gold;
        }
    }
}
