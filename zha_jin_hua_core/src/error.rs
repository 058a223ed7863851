use crate::state::{GameId, GameStatus, PlayerId, RoomId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 引擎层面的所有错误。
///
/// 任何返回 `Err` 的操作都保证没有修改游戏状态。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("游戏 {0} 不存在")]
    GameNotFound(GameId),

    #[error("房间 {0} 不存在")]
    RoomNotFound(RoomId),

    #[error("玩家 {0} 不在游戏中")]
    PlayerNotFound(PlayerId),

    #[error("当前状态 {status:?} 不允许执行 {action}")]
    InvalidState {
        action: &'static str,
        status: GameStatus,
    },

    #[error("玩家 {0} 当前状态不允许该操作")]
    PlayerNotPlaying(PlayerId),

    #[error("必须是三张牌，实际为 {0} 张")]
    InvalidHand(usize),

    #[error("牌堆只剩 {available} 张，无法发出 {requested} 张")]
    DeckExhausted { requested: usize, available: usize },

    #[error("玩家数量不足，至少需要2人，当前 {0} 人")]
    InsufficientPlayers(usize),

    #[error("第 {round} 局超出了房间总局数 {total}")]
    RoundExhausted { round: u32, total: u32 },

    #[error("房间配置不合法: {0}")]
    InvalidRoomConfig(&'static str),

    #[error("房间 {0} 不在等待状态")]
    RoomNotWaiting(RoomId),

    #[error("房间已满")]
    RoomFull,

    #[error("只有房主可以开始游戏")]
    NotRoomCreator,
}

/// 发给客户端的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InvalidHand,
    InsufficientPlayers,
    RoundExhausted,
    InvalidRequest,
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::GameNotFound(_) | GameError::RoomNotFound(_) | GameError::PlayerNotFound(_) => {
                ErrorKind::NotFound
            }
            GameError::InvalidState { .. }
            | GameError::PlayerNotPlaying(_)
            | GameError::DeckExhausted { .. }
            | GameError::RoomNotWaiting(_) => {
                ErrorKind::InvalidState
            }
            GameError::InvalidHand(_) => ErrorKind::InvalidHand,
            GameError::InsufficientPlayers(_) => ErrorKind::InsufficientPlayers,
            GameError::RoundExhausted { .. } => ErrorKind::RoundExhausted,
            GameError::InvalidRoomConfig(_) | GameError::RoomFull | GameError::NotRoomCreator => {
                ErrorKind::InvalidRequest
            }
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
