use dashmap::DashMap;
use zha_jin_hua_core::{GameError, GameResult, PlayerId, Room, RoomId};

/// 房间的读取与持久化
pub trait RoomStore: Send + Sync {
    fn insert(&self, room: Room);

    fn get(&self, room_id: RoomId) -> GameResult<Room>;

    /// 原子地修改房间。闭包返回 Err 时房间保持不变。
    fn update(&self, room_id: RoomId, f: &mut dyn FnMut(&mut Room) -> GameResult<()>) -> GameResult<Room>;
}

/// 玩家跨房间的金币账户，只在整场结束时结算
pub trait UserLedger: Send + Sync {
    fn credit(&self, user_id: PlayerId, amount: i64);

    fn balance(&self, user_id: PlayerId) -> i64;
}

#[derive(Debug, Default)]
pub struct InMemoryRoomStore {
    rooms: DashMap<RoomId, Room>,
}

impl RoomStore for InMemoryRoomStore {
    fn insert(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    fn get(&self, room_id: RoomId) -> GameResult<Room> {
        self.rooms
            .get(&room_id)
            .map(|r| r.clone())
            .ok_or(GameError::RoomNotFound(room_id))
    }

    fn update(&self, room_id: RoomId, f: &mut dyn FnMut(&mut Room) -> GameResult<()>) -> GameResult<Room> {
        let mut entry = self.rooms.get_mut(&room_id).ok_or(GameError::RoomNotFound(room_id))?;
        let mut draft = entry.clone();
        f(&mut draft)?;
        *entry = draft.clone();
        Ok(draft)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: DashMap<PlayerId, i64>,
}

impl UserLedger for InMemoryLedger {
    fn credit(&self, user_id: PlayerId, amount: i64) {
        *self.balances.entry(user_id).or_insert(0) += amount;
    }

    fn balance(&self, user_id: PlayerId) -> i64 {
        self.balances.get(&user_id).map(|b| *b).unwrap_or(0)
    }
}
