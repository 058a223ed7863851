use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zha_jin_hua_core::{
    Clock, Delivery, FoldReason, Game, GameError, GameEvent, GameId, GameResult, GameStatus, GameView, PlayerAction,
    PlayerId, Room, RoomId, RoomLimits, RoomPlayer, RoomStatus, ServerMessage, notifications,
};

use crate::config::ServerConfig;
use crate::notify::Outbox;
use crate::scheduler::{SessionTimers, TimerFired, TimerKind, TimerSlot};
use crate::store::{RoomStore, UserLedger};

/// 一个进行中的游戏会话
// 重要‼️：锁的顺序固定为 session -> rng，房间存储只在持有 session 时短暂访问
struct GameSession {
    room_id: RoomId,
    entry_gold: i64,
    inner: Mutex<SessionInner>,
}

struct SessionInner {
    game: Game,
    timers: SessionTimers,
    // 断线且尚未重连的玩家
    offline: HashSet<PlayerId>,
}

/// 房间协调器：把房间绑定到游戏，驱动计时器，并把状态变化送进 outbox
pub struct Coordinator {
    config: ServerConfig,
    limits: RoomLimits,
    rooms: Arc<dyn RoomStore>,
    ledger: Arc<dyn UserLedger>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    sessions: DashMap<GameId, Arc<GameSession>>,
    outbox: Outbox,
    timer_tx: mpsc::UnboundedSender<TimerFired>,
}

impl Coordinator {
    /// 创建协调器。返回的接收端需要交给 [`Coordinator::run_timers`]。
    pub fn new(
        config: ServerConfig,
        limits: RoomLimits,
        rooms: Arc<dyn RoomStore>,
        ledger: Arc<dyn UserLedger>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
        outbox: Outbox,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TimerFired>) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(Self {
            config,
            limits,
            rooms,
            ledger,
            clock,
            rng: Mutex::new(rng),
            sessions: DashMap::new(),
            outbox,
            timer_tx,
        });
        (coordinator, timer_rx)
    }

    /// 计时器驱动循环
    pub async fn run_timers(self: Arc<Self>, mut fired: mpsc::UnboundedReceiver<TimerFired>) {
        while let Some(timer) = fired.recv().await {
            self.handle_timer(timer);
        }
    }

    // --- 房间管理 ---

    pub fn create_room(&self, nickname: String, base_bet: i64, total_rounds: u32) -> GameResult<(PlayerId, Room)> {
        let player_id = Uuid::new_v4();
        let creator = RoomPlayer { user_id: player_id, nickname, avatar: String::new(), room_gold: self.config.room_gold };
        let room = Room::open(Uuid::new_v4(), creator, base_bet, total_rounds, &self.limits)?;
        self.rooms.insert(room.clone());
        info!(room_id = %room.id, %player_id, base_bet, total_rounds, "创建了新房间");
        Ok((player_id, room))
    }

    pub fn join_room(&self, room_id: RoomId, nickname: String) -> GameResult<(PlayerId, Room)> {
        let player_id = Uuid::new_v4();
        let limits = &self.limits;
        let mut player = Some(RoomPlayer { user_id: player_id, nickname, avatar: String::new(), room_gold: 0 });
        let room = self.rooms.update(room_id, &mut |room| match player.take() {
            Some(p) => room.seat(p, limits),
            None => Ok(()),
        })?;
        info!(%room_id, %player_id, "玩家加入了房间");

        // 通知房间内其他玩家
        for p in room.players.iter().filter(|p| p.user_id != player_id) {
            self.deliver(p.user_id, ServerMessage::RoomUpdated(room.clone()));
        }
        Ok((player_id, room))
    }

    pub fn room(&self, room_id: RoomId) -> GameResult<Room> {
        self.rooms.get(room_id)
    }

    /// 房主开始游戏
    pub fn start_game(&self, room_id: RoomId, player_id: PlayerId) -> GameResult<GameId> {
        let room = self.rooms.get(room_id)?;
        if room.creator != player_id {
            return Err(GameError::NotRoomCreator);
        }
        self.start_new_game(room_id)
    }

    /// 为房间开始游戏：没有游戏时新建，已有游戏时进入下一局
    pub fn start_new_game(&self, room_id: RoomId) -> GameResult<GameId> {
        let room = self.rooms.get(room_id)?;
        if room.status != RoomStatus::Waiting {
            return Err(GameError::RoomNotWaiting(room_id));
        }
        if room.players.len() < self.limits.min_players {
            return Err(GameError::InsufficientPlayers(room.players.len()));
        }

        if let Some(game_id) = room.game_id {
            let session = self.session(game_id)?;
            let mut inner = session.inner.lock();
            let now = self.clock.now();
            let events = inner.game.start_next_round(&mut *self.rng.lock(), now)?;
            self.after_transition(&session, &mut inner, events);
            return Ok(game_id);
        }

        let seats = room.seats();
        let mut game = Game::new(Uuid::new_v4(), room_id, room.total_rounds, room.base_bet, self.config.rules());
        let events = {
            let mut rng = self.rng.lock();
            let dealer_index = rng.random_range(0..seats.len());
            game.start_round(&seats, dealer_index, &mut *rng, self.clock.now())?
        };
        let game_id = game.id;

        // 绑定房间，期间房间被其他请求占用时放弃这次开局
        self.rooms.update(room_id, &mut |r| {
            if r.status != RoomStatus::Waiting || r.game_id.is_some() {
                return Err(GameError::RoomNotWaiting(room_id));
            }
            r.game_id = Some(game_id);
            r.status = RoomStatus::Playing;
            Ok(())
        })?;

        let session = Arc::new(GameSession {
            room_id,
            entry_gold: room.entry_gold,
            inner: Mutex::new(SessionInner {
                timers: SessionTimers::new(game_id, self.timer_tx.clone()),
                game,
                offline: HashSet::new(),
            }),
        });
        self.sessions.insert(game_id, session.clone());

        let mut inner = session.inner.lock();
        self.after_transition(&session, &mut inner, events);
        Ok(game_id)
    }

    // --- 游戏内操作 ---

    /// 执行玩家动作
    pub fn perform_action(&self, room_id: RoomId, player_id: PlayerId, action: PlayerAction) -> GameResult<()> {
        let session = self.session_for_room(room_id, "perform_action")?;
        let mut inner = session.inner.lock();
        let now = self.clock.now();

        // 下注类动作先取消行动计时器，失败时按原截止时间恢复
        let cancelled = action != PlayerAction::SeeCards && inner.timers.cancel(TimerSlot::Turn);
        let result = match &action {
            PlayerAction::SeeCards => inner.game.see_cards(player_id),
            PlayerAction::Call => inner.game.call(player_id, now),
            PlayerAction::Raise(amount) => inner.game.raise(player_id, *amount, now),
            PlayerAction::Fold => inner.game.fold(player_id, FoldReason::Voluntary, now),
            PlayerAction::Compare(target_id) => inner.game.compare_hands(player_id, *target_id, now),
        };
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                if cancelled {
                    self.arm_turn(&mut inner, now);
                }
                debug!(%room_id, %player_id, ?action, error = %e, "动作被拒绝");
                return Err(e);
            }
        };

        debug!(%room_id, %player_id, ?action, pot = inner.game.pot, "玩家执行了动作");
        self.after_transition(&session, &mut inner, events);
        Ok(())
    }

    /// 结算后确认继续，所有人确认后开始下一局
    pub fn confirm_continue(&self, room_id: RoomId, player_id: PlayerId) -> GameResult<()> {
        let session = self.session_for_room(room_id, "confirm_continue")?;
        let mut inner = session.inner.lock();
        let now = self.clock.now();
        let events = inner.game.confirm_continue(player_id, &mut *self.rng.lock(), now)?;
        self.after_transition(&session, &mut inner, events);
        Ok(())
    }

    /// 玩家视角的游戏数据
    pub fn game_view(&self, room_id: RoomId, player_id: PlayerId) -> GameResult<GameView> {
        let session = self.session_for_room(room_id, "get_game_data")?;
        let inner = session.inner.lock();
        if inner.game.player(player_id).is_none() {
            return Err(GameError::PlayerNotFound(player_id));
        }
        Ok(inner.game.view_for(player_id))
    }

    // --- 连接状态 ---

    /// 玩家断线。下注阶段仍在牌局中的玩家有一段保留时间，之后自动弃牌。
    pub fn player_disconnected(&self, room_id: RoomId, player_id: PlayerId) {
        let Ok(session) = self.session_for_room(room_id, "disconnect") else {
            return;
        };
        let mut inner = session.inner.lock();
        let Some(player) = inner.game.player(player_id) else {
            return;
        };
        let playing = inner.game.status == GameStatus::Betting && player.is_playing();

        inner.offline.insert(player_id);
        if playing {
            inner.timers.arm(TimerKind::Disconnect { player_id }, self.config.disconnect_grace());
        }
        info!(%room_id, %player_id, playing, "玩家断开连接");
        self.broadcast(&inner.game.player_ids(), ServerMessage::PlayerOffline { player_id });
    }

    pub fn player_reconnected(&self, room_id: RoomId, player_id: PlayerId) {
        let Ok(session) = self.session_for_room(room_id, "reconnect") else {
            return;
        };
        let mut inner = session.inner.lock();
        if !inner.offline.remove(&player_id) {
            return;
        }
        inner.timers.cancel(TimerSlot::Disconnect(player_id));
        info!(%room_id, %player_id, "玩家重新连接");
        self.broadcast(&inner.game.player_ids(), ServerMessage::PlayerReconnected { player_id });
    }

    // --- 计时器 ---

    /// 处理到期的计时器。已取消或已被替换的计时器直接忽略。
    pub fn handle_timer(&self, fired: TimerFired) {
        let Some(session) = self.sessions.get(&fired.game_id).map(|s| s.clone()) else {
            debug!(game_id = %fired.game_id, "游戏已结束，忽略计时器");
            return;
        };
        let mut inner = session.inner.lock();
        if !inner.timers.take_if_current(&fired) {
            debug!(game_id = %fired.game_id, kind = ?fired.kind, "计时器已失效");
            return;
        }

        let now = self.clock.now();
        let room_id = session.room_id;
        let result = match fired.kind {
            TimerKind::Turn { player_id } => {
                warn!(%room_id, %player_id, round = inner.game.round, "玩家行动超时，自动弃牌");
                inner.game.fold(player_id, FoldReason::TurnTimeout, now)
            }
            TimerKind::Settlement => {
                warn!(%room_id, round = inner.game.round, "结算确认超时，强制开始下一局");
                let result = inner.game.start_next_round(&mut *self.rng.lock(), now);
                if result.is_ok() {
                    self.broadcast(
                        &inner.game.player_ids(),
                        ServerMessage::Info { message: "结算超时，自动开始下一局".to_string() },
                    );
                }
                result
            }
            TimerKind::Disconnect { player_id } => {
                let still_playing = inner.game.status == GameStatus::Betting
                    && inner.game.player(player_id).is_some_and(|p| p.is_playing());
                if !inner.offline.contains(&player_id) || !still_playing {
                    return;
                }
                warn!(%room_id, %player_id, "玩家断线超时，自动弃牌");
                inner.game.fold(player_id, FoldReason::Disconnected, now)
            }
        };

        match result {
            Ok(events) => self.after_transition(&session, &mut inner, events),
            Err(e) => {
                warn!(%room_id, kind = ?fired.kind, error = %e, "计时器触发的操作失败");
                // 行动计时器失效后仍需有人推动牌局
                if inner.game.status == GameStatus::Betting {
                    self.arm_turn(&mut inner, now);
                }
            }
        }
    }

    // --- 辅助函数 ---

    fn session(&self, game_id: GameId) -> GameResult<Arc<GameSession>> {
        self.sessions
            .get(&game_id)
            .map(|s| s.clone())
            .ok_or(GameError::GameNotFound(game_id))
    }

    fn session_for_room(&self, room_id: RoomId, action: &'static str) -> GameResult<Arc<GameSession>> {
        let room = self.rooms.get(room_id)?;
        match room.game_id {
            Some(game_id) => self.session(game_id),
            None => Err(GameError::InvalidState { action, status: GameStatus::Waiting }),
        }
    }

    /// 按当前截止时间设置行动计时器
    fn arm_turn(&self, inner: &mut SessionInner, now: DateTime<Utc>) {
        let (Some(player_id), Some(deadline)) = (inner.game.current_player_id(), inner.game.current_turn_deadline)
        else {
            return;
        };
        inner.timers.arm(TimerKind::Turn { player_id }, until(deadline, now));
    }

    /// 每次状态变化后：同步房间、调整计时器、推送通知
    fn after_transition(&self, session: &GameSession, inner: &mut SessionInner, events: Vec<GameEvent>) {
        let now = self.clock.now();
        let room_id = session.room_id;
        let game_id = inner.game.id;
        let status = inner.game.status;

        let sync = self.rooms.update(room_id, &mut |room| {
            room.sync_from(&inner.game);
            match status {
                GameStatus::Betting => room.status = RoomStatus::Playing,
                GameStatus::Waiting | GameStatus::Settled => room.status = RoomStatus::Waiting,
                GameStatus::Finished => room.reset_after_finish(),
            }
            Ok(())
        });
        if let Err(e) = sync {
            warn!(%room_id, %game_id, error = %e, "同步房间失败");
        }

        for event in &events {
            match event {
                GameEvent::RoundStarted { round, dealer_id } => {
                    info!(%room_id, %game_id, round, %dealer_id, "新一局开始");
                }
                GameEvent::Settled { record } => {
                    info!(%room_id, %game_id, round = record.round, winner = %record.winner.user_id, pot = record.pot, outcome = ?record.outcome, "本局结算");
                }
                GameEvent::Finished => info!(%room_id, %game_id, "整场游戏结束"),
                _ => {}
            }
        }

        match status {
            GameStatus::Betting => {
                inner.timers.cancel(TimerSlot::Settlement);
                let turn_moved = events
                    .iter()
                    .any(|e| matches!(e, GameEvent::RoundStarted { .. } | GameEvent::TurnPassed { .. }));
                if turn_moved {
                    self.arm_turn(inner, now);
                }
            }
            GameStatus::Settled => {
                inner.timers.cancel(TimerSlot::Turn);
                if events.iter().any(|e| matches!(e, GameEvent::Settled { .. })) {
                    if let Some(deadline) = inner.game.settlement_deadline {
                        inner.timers.arm(TimerKind::Settlement, until(deadline, now));
                    }
                }
            }
            GameStatus::Finished => {
                inner.timers.cancel_all();
                for player in &inner.game.players {
                    self.ledger.credit(player.user_id, player.room_gold);
                }
                self.sessions.remove(&game_id);
            }
            GameStatus::Waiting => {}
        }

        for delivery in notifications(&inner.game, &events, session.entry_gold) {
            self.push(delivery);
        }
    }

    fn deliver(&self, to: PlayerId, message: ServerMessage) {
        self.push(Delivery { to, message });
    }

    fn broadcast(&self, recipients: &[PlayerId], message: ServerMessage) {
        for &to in recipients {
            self.deliver(to, message.clone());
        }
    }

    fn push(&self, delivery: Delivery) {
        if self.outbox.send(delivery).is_err() {
            warn!("通知队列已关闭");
        }
    }
}

fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}
