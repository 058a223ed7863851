use crate::card::*;
use crate::error::{GameError, GameResult};
use crate::state::*;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::cmp::Ordering;

// --- 核心游戏流程 ---
//
// 所有操作都先校验再修改：返回 Err 时游戏状态保持不变。

impl Game {
    /// 开始第一局
    ///
    /// - 用房间座位初始化玩家列表。
    /// - 洗牌并给每人发三张牌。
    /// - 每人扣除底注 (允许金币为负)，放入底池。
    /// - 从庄家开始行动，设置 30 秒的行动截止时间。
    pub fn start_round<R: Rng + ?Sized>(
        &mut self,
        seats: &[Seat],
        dealer_index: usize,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<Vec<GameEvent>> {
        self.ensure_status(GameStatus::Waiting, "start_round")?;
        if seats.len() < 2 {
            return Err(GameError::InsufficientPlayers(seats.len()));
        }
        if self.round + 1 > self.total_rounds {
            return Err(GameError::RoundExhausted { round: self.round + 1, total: self.total_rounds });
        }

        let hands = deal_hands(seats.len(), rng)?;
        self.players = seats.iter().map(GamePlayer::from_seat).collect();
        Ok(self.open_round(hands, dealer_index % seats.len(), now))
    }

    /// 开始下一局：局数 +1，庄家轮换到下一个座位，重新发牌和收底注
    pub fn start_next_round<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<Vec<GameEvent>> {
        if self.is_last_round() {
            return Err(GameError::RoundExhausted { round: self.round + 1, total: self.total_rounds });
        }
        self.ensure_status(GameStatus::Settled, "start_next_round")?;
        if self.players.len() < 2 {
            return Err(GameError::InsufficientPlayers(self.players.len()));
        }

        let hands = deal_hands(self.players.len(), rng)?;
        let dealer_index = (self.dealer_index + 1) % self.players.len();
        Ok(self.open_round(hands, dealer_index, now))
    }

    /// 看牌，不影响金币
    pub fn see_cards(&mut self, player_id: PlayerId) -> GameResult<Vec<GameEvent>> {
        self.ensure_status(GameStatus::Betting, "see_cards")?;
        let idx = self.playing_index(player_id)?;
        self.players[idx].has_seen_cards = true;
        Ok(vec![GameEvent::CardsSeen { player_id }])
    }

    /// 跟注：未看牌付 min_bet，看过牌付 2 * min_bet
    pub fn call(&mut self, player_id: PlayerId, now: DateTime<Utc>) -> GameResult<Vec<GameEvent>> {
        self.ensure_betting("call")?;
        let idx = self.playing_index(player_id)?;

        let player = &mut self.players[idx];
        let amount = player.stake(player.call_cost(self.min_bet));
        player.has_acted_this_round = true;
        self.pot += amount;

        let mut events = vec![GameEvent::Called { player_id, amount }];
        self.advance_turn_into(now, &mut events)?;
        Ok(events)
    }

    /// 加注：下注额由玩家指定，不做上下限校验。
    /// 之后的 min_bet 按未看牌的口径记录，看过牌的玩家加注额折半。
    pub fn raise(&mut self, player_id: PlayerId, amount: u32, now: DateTime<Utc>) -> GameResult<Vec<GameEvent>> {
        self.ensure_betting("raise")?;
        let idx = self.playing_index(player_id)?;

        let player = &mut self.players[idx];
        let amount = player.stake(amount as i64);
        player.has_acted_this_round = true;
        self.min_bet = if player.has_seen_cards { amount / 2 } else { amount };
        self.pot += amount;

        let mut events = vec![GameEvent::Raised { player_id, amount, min_bet: self.min_bet }];
        self.advance_turn_into(now, &mut events)?;
        Ok(events)
    }

    /// 弃牌。只剩一名玩家时直接结算。
    pub fn fold(&mut self, player_id: PlayerId, reason: FoldReason, now: DateTime<Utc>) -> GameResult<Vec<GameEvent>> {
        self.ensure_betting("fold")?;
        let idx = self.playing_index(player_id)?;

        self.players[idx].status = PlayerStatus::Folded;
        self.players[idx].has_acted_this_round = true;

        let mut events = vec![GameEvent::Folded { player_id, reason }];
        if self.playing_count() <= 1 {
            self.settle_into(now, &mut events)?;
        } else {
            self.advance_turn_into(now, &mut events)?;
        }
        Ok(events)
    }

    /// 比牌：输的一方出局 (Lost)，平局双方都保留。
    /// 比牌双方互相可以看到对方的手牌。
    pub fn compare_hands(
        &mut self,
        player_id: PlayerId,
        target_id: PlayerId,
        now: DateTime<Utc>,
    ) -> GameResult<Vec<GameEvent>> {
        self.ensure_betting("compare")?;
        let idx = self.playing_index(player_id)?;
        let target_idx = self.playing_index(target_id)?;
        if idx == target_idx {
            return Err(GameError::InvalidState { action: "compare_with_self", status: self.status });
        }

        let result = compare_hands(&self.players[idx].cards, &self.players[target_idx].cards)?;
        let loser_idx = match result {
            Ordering::Greater => Some(target_idx),
            Ordering::Less => Some(idx),
            Ordering::Equal => None,
        };

        if let Some(loser) = loser_idx {
            self.players[loser].status = PlayerStatus::Lost;
        }
        self.players[idx].has_acted_this_round = true;
        reveal(&mut self.players[idx], target_id);
        reveal(&mut self.players[target_idx], player_id);

        let mut events = vec![GameEvent::Compared {
            player_id,
            target_id,
            loser_id: loser_idx.map(|i| self.players[i].user_id),
        }];
        if self.playing_count() <= 1 {
            self.settle_into(now, &mut events)?;
        } else {
            self.advance_turn_into(now, &mut events)?;
        }
        Ok(events)
    }

    /// 把行动权交给下一位仍在牌局中的玩家
    pub fn advance_turn(&mut self, now: DateTime<Utc>) -> GameResult<Vec<GameEvent>> {
        self.ensure_betting("advance_turn")?;
        let mut events = Vec::new();
        self.advance_turn_into(now, &mut events)?;
        Ok(events)
    }

    /// 结算：剩一人则其获胜，否则两两比牌取最大。赢家拿走整个底池。
    pub fn settle(&mut self, now: DateTime<Utc>) -> GameResult<Vec<GameEvent>> {
        self.ensure_betting("settle")?;
        let mut events = Vec::new();
        self.settle_into(now, &mut events)?;
        Ok(events)
    }

    /// 玩家确认继续。所有玩家确认后自动开始下一局。
    pub fn confirm_continue<R: Rng + ?Sized>(
        &mut self,
        player_id: PlayerId,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<Vec<GameEvent>> {
        self.ensure_status(GameStatus::Settled, "confirm_continue")?;
        if self.player_index(player_id).is_none() {
            return Err(GameError::PlayerNotFound(player_id));
        }

        let previous = self.player_confirmations.insert(player_id, true);
        let all_confirmed = self.all_confirmed();
        let mut events = vec![GameEvent::Confirmed { player_id, all_confirmed }];
        if all_confirmed {
            match self.start_next_round(rng, now) {
                Ok(next) => events.extend(next),
                Err(e) => {
                    // 回滚确认状态
                    match previous {
                        Some(value) => self.player_confirmations.insert(player_id, value),
                        None => self.player_confirmations.remove(&player_id),
                    };
                    return Err(e);
                }
            }
        }
        Ok(events)
    }

    // --- 辅助逻辑函数 ---

    fn ensure_status(&self, expected: GameStatus, action: &'static str) -> GameResult<()> {
        if self.status != expected {
            return Err(GameError::InvalidState { action, status: self.status });
        }
        Ok(())
    }

    /// 查找仍在牌局中的玩家
    fn playing_index(&self, player_id: PlayerId) -> GameResult<usize> {
        let idx = self.player_index(player_id).ok_or(GameError::PlayerNotFound(player_id))?;
        if !self.players[idx].is_playing() {
            return Err(GameError::PlayerNotPlaying(player_id));
        }
        Ok(idx)
    }

    fn turn_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.rules.turn_timeout_secs as i64)
    }

    /// 重置每局字段、收底注并进入下注阶段
    fn open_round(&mut self, hands: Vec<Vec<Card>>, dealer_index: usize, now: DateTime<Utc>) -> Vec<GameEvent> {
        let ante = self.base_bet;
        for (player, cards) in self.players.iter_mut().zip(hands) {
            player.cards = cards;
            player.has_seen_cards = false;
            player.current_round_bet = 0;
            player.total_bet = 0;
            player.has_acted_this_round = false;
            player.status = PlayerStatus::Playing;
            player.revealed_to.clear();
            player.stake(ante);
        }

        self.round += 1;
        self.pot = ante * self.players.len() as i64;
        self.min_bet = self.base_bet;
        self.betting_round = 1;
        self.dealer_index = dealer_index;
        self.current_player_index = dealer_index;
        self.winner = None;
        self.player_confirmations.clear();
        self.settlement_deadline = None;
        self.current_turn_deadline = Some(self.turn_deadline(now));
        self.status = GameStatus::Betting;

        vec![GameEvent::RoundStarted {
            round: self.round,
            dealer_id: self.players[dealer_index].user_id,
        }]
    }

    fn advance_turn_into(&mut self, now: DateTime<Utc>, events: &mut Vec<GameEvent>) -> GameResult<()> {
        let total = self.players.len();
        let mut next = self.current_player_index;
        // 最多扫描一圈，找不到时停在原处
        for _ in 0..total {
            next = (next + 1) % total;
            if self.players[next].is_playing() {
                break;
            }
        }
        self.current_player_index = next;

        if self.is_betting_round_complete() {
            if self.playing_count() <= 1 || self.betting_round >= self.rules.max_betting_rounds {
                return self.settle_into(now, events);
            }
            for player in self.players.iter_mut() {
                player.has_acted_this_round = false;
            }
            self.betting_round += 1;
            events.push(GameEvent::BettingRoundOpened { betting_round: self.betting_round });
        }

        self.current_turn_deadline = Some(self.turn_deadline(now));
        events.push(GameEvent::TurnPassed { player_id: self.players[next].user_id });
        Ok(())
    }

    /// 所有仍在牌局中的玩家都已行动，或只剩不到两人
    pub fn is_betting_round_complete(&self) -> bool {
        self.playing_count() <= 1
            || self.players.iter().filter(|p| p.is_playing()).all(|p| p.has_acted_this_round)
    }

    /// 下注阶段的操作都可能触发结算，提前确认每手牌都能评估
    fn ensure_betting(&self, action: &'static str) -> GameResult<()> {
        self.ensure_status(GameStatus::Betting, action)?;
        for player in &self.players {
            classify(&player.cards)?;
        }
        Ok(())
    }

    /// 找出赢家的索引。平局时保留座位靠后的玩家。
    fn find_winner(&self) -> GameResult<usize> {
        let mut winner: Option<usize> = None;
        for (idx, player) in self.players.iter().enumerate() {
            if !player.is_playing() {
                continue;
            }
            match winner {
                Some(best) => {
                    if compare_hands(&self.players[best].cards, &player.cards)? != Ordering::Greater {
                        winner = Some(idx);
                    }
                }
                None => winner = Some(idx),
            }
        }
        winner.ok_or(GameError::InvalidState { action: "settle", status: self.status })
    }

    fn settle_into(&mut self, now: DateTime<Utc>, events: &mut Vec<GameEvent>) -> GameResult<()> {
        let winner_idx = self.find_winner()?;
        let categories = self
            .players
            .iter()
            .map(|p| classify(&p.cards).map(|r| r.category))
            .collect::<GameResult<Vec<_>>>()?;

        // 只有在其他人全部弃牌时才算 "全员弃牌"
        let outcome = if self
            .players
            .iter()
            .enumerate()
            .all(|(i, p)| i == winner_idx || p.status == PlayerStatus::Folded)
        {
            RoundOutcome::AllFolded
        } else {
            RoundOutcome::Showdown
        };

        for (idx, player) in self.players.iter_mut().enumerate() {
            if idx == winner_idx {
                player.status = PlayerStatus::Winner;
            } else if player.is_playing() {
                player.status = PlayerStatus::Lost;
            }
        }

        let pot = self.pot;
        let winner = &mut self.players[winner_idx];
        winner.room_gold += pot;
        let snapshot = WinnerSnapshot {
            user_id: winner.user_id,
            nickname: winner.nickname.clone(),
            cards: winner.cards.clone(),
            category: categories[winner_idx],
            winnings: pot,
        };

        let record = RoundRecord {
            round: self.round,
            winner: snapshot.clone(),
            outcome,
            pot,
            players: self
                .players
                .iter()
                .zip(&categories)
                .enumerate()
                .map(|(idx, (p, &category))| PlayerResult {
                    user_id: p.user_id,
                    nickname: p.nickname.clone(),
                    cards: p.cards.clone(),
                    category,
                    result: p.status,
                    gold_change: if idx == winner_idx { pot - p.total_bet } else { -p.total_bet },
                })
                .collect(),
        };

        self.winner = Some(snapshot);
        self.round_history.push(record.clone());
        self.current_turn_deadline = None;
        events.push(GameEvent::Settled { record });

        if self.is_last_round() {
            self.status = GameStatus::Finished;
            self.settlement_deadline = None;
            events.push(GameEvent::Finished);
        } else {
            self.status = GameStatus::Settled;
            self.settlement_deadline = Some(now + Duration::seconds(self.rules.settlement_timeout_secs as i64));
            self.player_confirmations = self.players.iter().map(|p| (p.user_id, false)).collect();
        }
        Ok(())
    }
}

/// 洗一副新牌并给 `count` 名玩家各发三张
fn deal_hands<R: Rng + ?Sized>(count: usize, rng: &mut R) -> GameResult<Vec<Vec<Card>>> {
    let mut deck = create_deck();
    shuffle_deck(&mut deck, rng);
    (0..count).map(|_| deal(&mut deck, 3)).collect()
}

fn reveal(player: &mut GamePlayer, viewer: PlayerId) {
    if !player.revealed_to.contains(&viewer) {
        player.revealed_to.push(viewer);
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Rank, Suit};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    // 辅助函数：创建用于测试的 Game 并开局
    fn setup_test_game(golds: &[i64], total_rounds: u32) -> (Game, Vec<PlayerId>, StdRng) {
        let seats: Vec<Seat> = golds
            .iter()
            .enumerate()
            .map(|(i, &gold)| Seat {
                user_id: Uuid::new_v4(),
                nickname: format!("Player_{}", i),
                avatar: String::new(),
                room_gold: gold,
            })
            .collect();
        let ids = seats.iter().map(|s| s.user_id).collect();

        let mut rng = StdRng::seed_from_u64(42);
        let mut game = Game::new(Uuid::new_v4(), Uuid::new_v4(), total_rounds, 10, GameRules::default());
        game.start_round(&seats, 0, &mut rng, now()).unwrap();
        (game, ids, rng)
    }

    fn set_cards(game: &mut Game, idx: usize, cards: [(Rank, Suit); 3]) {
        game.players[idx].cards = cards.iter().map(|&(r, s)| Card::new(r, s)).collect();
    }

    fn pot_matches_bets(game: &Game) -> bool {
        game.players.iter().map(|p| p.total_bet).sum::<i64>() == game.pot
    }

    #[test]
    fn test_start_round_antes() {
        let (game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);

        assert_eq!(game.status, GameStatus::Betting);
        assert_eq!(game.round, 1);
        assert_eq!(game.pot, 30);
        assert_eq!(game.min_bet, 10);
        assert_eq!(game.current_player_id(), Some(ids[0]));
        assert_eq!(game.current_turn_deadline, Some(now() + Duration::seconds(30)));
        for player in &game.players {
            assert_eq!(player.cards.len(), 3);
            assert_eq!(player.room_gold, 990);
            assert_eq!(player.total_bet, 10);
            assert_eq!(player.status, PlayerStatus::Playing);
        }
    }

    #[test]
    fn test_start_round_needs_two_players() {
        let mut game = Game::new(Uuid::new_v4(), Uuid::new_v4(), 10, 10, GameRules::default());
        let seat = Seat { user_id: Uuid::new_v4(), nickname: "solo".into(), avatar: String::new(), room_gold: 0 };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            game.start_round(&[seat], 0, &mut rng, now()).unwrap_err(),
            GameError::InsufficientPlayers(1)
        );
        assert_eq!(game.status, GameStatus::Waiting);
        assert!(game.players.is_empty());
    }

    #[test]
    fn test_ante_allows_negative_gold() {
        let (game, _, _) = setup_test_game(&[0, 5], 10);
        assert_eq!(game.players[0].room_gold, -10);
        assert_eq!(game.players[1].room_gold, -5);
    }

    #[test]
    fn test_call_cost_blind_and_seen() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        game.call(ids[0], now()).unwrap();
        assert_eq!(game.players[0].room_gold, 980);
        assert_eq!(game.current_player_id(), Some(ids[1]));

        game.see_cards(ids[1]).unwrap();
        game.call(ids[1], now()).unwrap();
        assert_eq!(game.players[1].room_gold, 970);
        assert_eq!(game.pot, 60);
        assert!(pot_matches_bets(&game));
    }

    #[test]
    fn test_raise_updates_min_bet() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        game.see_cards(ids[0]).unwrap();
        game.raise(ids[0], 40, now()).unwrap();
        assert_eq!(game.min_bet, 20);

        game.raise(ids[1], 50, now()).unwrap();
        assert_eq!(game.min_bet, 50);
        assert_eq!(game.pot, 30 + 40 + 50);
        assert!(pot_matches_bets(&game));
    }

    #[test]
    fn test_actions_require_playing_player() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        game.fold(ids[0], FoldReason::Voluntary, now()).unwrap();

        let before = game.pot;
        assert_eq!(game.call(ids[0], now()).unwrap_err(), GameError::PlayerNotPlaying(ids[0]));
        assert_eq!(game.see_cards(ids[0]).unwrap_err(), GameError::PlayerNotPlaying(ids[0]));
        let stranger = Uuid::new_v4();
        assert_eq!(game.raise(stranger, 10, now()).unwrap_err(), GameError::PlayerNotFound(stranger));
        assert_eq!(game.pot, before);
    }

    #[test]
    fn test_fold_out_settles_immediately() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        game.call(ids[0], now()).unwrap(); // pot 40
        game.fold(ids[1], FoldReason::Voluntary, now()).unwrap();
        assert_eq!(game.status, GameStatus::Betting);

        let events = game.fold(ids[2], FoldReason::Voluntary, now()).unwrap();
        assert_eq!(game.status, GameStatus::Settled);
        assert_eq!(game.players[0].status, PlayerStatus::Winner);
        assert_eq!(game.players[0].room_gold, 1000 - 20 + 40);
        assert_eq!(game.settlement_deadline, Some(now() + Duration::seconds(30)));
        assert!(game.player_confirmations.values().all(|&c| !c));
        assert_eq!(game.player_confirmations.len(), 3);

        let record = game.latest_record().unwrap();
        assert_eq!(record.outcome, RoundOutcome::AllFolded);
        assert_eq!(record.winner.winnings, 40);
        assert_eq!(record.players[0].gold_change, 20);
        assert_eq!(record.players[1].gold_change, -10);
        assert!(matches!(events.last(), Some(GameEvent::Settled { .. })));
    }

    #[test]
    fn test_scenario_raise_call_fold_compare() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        set_cards(&mut game, 0, [(Rank::Ace, Suit::Spade), (Rank::Ace, Suit::Heart), (Rank::Two, Suit::Club)]);
        set_cards(&mut game, 1, [(Rank::King, Suit::Spade), (Rank::Queen, Suit::Heart), (Rank::Two, Suit::Heart)]);
        assert_eq!(game.pot, 30);

        game.raise(ids[0], 20, now()).unwrap();
        assert_eq!(game.min_bet, 20);
        assert_eq!(game.pot, 50);

        game.call(ids[1], now()).unwrap();
        assert_eq!(game.players[1].total_bet, 30);
        assert_eq!(game.pot, 70);

        game.fold(ids[2], FoldReason::Voluntary, now()).unwrap();
        assert_eq!(game.status, GameStatus::Betting);

        game.compare_hands(ids[0], ids[1], now()).unwrap();
        assert_eq!(game.status, GameStatus::Settled);
        let winner = &game.players[0];
        assert_eq!(winner.status, PlayerStatus::Winner);
        assert_eq!(winner.room_gold, 1000 - winner.total_bet + 70);
        assert_eq!(game.players[1].status, PlayerStatus::Lost);
        assert_eq!(game.latest_record().unwrap().outcome, RoundOutcome::Showdown);
        assert!(pot_matches_bets(&game));
    }

    #[test]
    fn test_compare_loser_and_reveal() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        set_cards(&mut game, 0, [(Rank::Two, Suit::Spade), (Rank::Five, Suit::Heart), (Rank::Nine, Suit::Club)]);
        set_cards(&mut game, 2, [(Rank::Three, Suit::Spade), (Rank::Three, Suit::Heart), (Rank::Nine, Suit::Heart)]);

        let events = game.compare_hands(ids[0], ids[2], now()).unwrap();
        assert_eq!(game.players[0].status, PlayerStatus::Lost);
        assert_eq!(game.players[2].status, PlayerStatus::Playing);
        assert!(game.players[0].revealed_to.contains(&ids[2]));
        assert!(game.players[2].revealed_to.contains(&ids[0]));
        assert!(matches!(
            events[0],
            GameEvent::Compared { loser_id: Some(loser), .. } if loser == ids[0]
        ));
        // 仍有两人，轮到下一位
        assert_eq!(game.status, GameStatus::Betting);
        assert_eq!(game.current_player_id(), Some(ids[1]));
    }

    #[test]
    fn test_advance_turn_skips_out_players() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000, 1000], 10);
        game.fold(ids[1], FoldReason::Voluntary, now()).unwrap();
        game.fold(ids[2], FoldReason::Voluntary, now()).unwrap();

        for _ in 0..6 {
            let current = game.current_player_id().unwrap();
            assert!(game.player(current).unwrap().is_playing());
            game.call(current, now()).unwrap();
        }
        assert_eq!(game.status, GameStatus::Betting);
    }

    #[test]
    fn test_advance_turn_moves_to_next_playing_player() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        game.fold(ids[1], FoldReason::Voluntary, now()).unwrap();
        assert_eq!(game.current_player_id(), Some(ids[2]));

        let later = now() + Duration::seconds(5);
        let events = game.advance_turn(later).unwrap();
        assert_eq!(events, vec![GameEvent::TurnPassed { player_id: ids[0] }]);
        assert_eq!(game.current_player_id(), Some(ids[0]));
        assert_eq!(game.current_turn_deadline, Some(later + Duration::seconds(30)));
        assert_eq!(game.betting_round, 1);
        assert_eq!(game.pot, 30);

        game.fold(ids[2], FoldReason::Voluntary, now()).unwrap();
        assert_eq!(
            game.advance_turn(now()).unwrap_err(),
            GameError::InvalidState { action: "advance_turn", status: GameStatus::Settled }
        );
    }

    #[test]
    fn test_betting_round_opens_when_everyone_acted() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        game.call(ids[0], now()).unwrap();
        game.call(ids[1], now()).unwrap();
        assert_eq!(game.betting_round, 1);

        let events = game.call(ids[2], now()).unwrap();
        assert_eq!(game.betting_round, 2);
        assert!(events.contains(&GameEvent::BettingRoundOpened { betting_round: 2 }));
        assert!(game.players.iter().all(|p| !p.has_acted_this_round));
        // 其他字段不重置
        assert_eq!(game.players[0].current_round_bet, 20);
    }

    #[test]
    fn test_betting_round_cap_forces_showdown() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000], 10);
        game.rules.max_betting_rounds = 2;
        set_cards(&mut game, 0, [(Rank::Two, Suit::Spade), (Rank::Five, Suit::Heart), (Rank::Nine, Suit::Club)]);
        set_cards(&mut game, 1, [(Rank::Jack, Suit::Spade), (Rank::Jack, Suit::Heart), (Rank::Nine, Suit::Heart)]);

        for _ in 0..2 {
            game.call(ids[0], now()).unwrap();
            game.call(ids[1], now()).unwrap();
        }
        assert_eq!(game.status, GameStatus::Settled);
        assert_eq!(game.players[1].status, PlayerStatus::Winner);
        assert_eq!(game.players[0].status, PlayerStatus::Lost);
        assert_eq!(game.latest_record().unwrap().outcome, RoundOutcome::Showdown);
    }

    #[test]
    fn test_settle_picks_best_hand() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000, 1000], 10);
        set_cards(&mut game, 0, [(Rank::Two, Suit::Spade), (Rank::Five, Suit::Heart), (Rank::Nine, Suit::Club)]);
        set_cards(&mut game, 1, [(Rank::Four, Suit::Club), (Rank::Four, Suit::Diamond), (Rank::Four, Suit::Heart)]);
        set_cards(&mut game, 2, [(Rank::Ace, Suit::Club), (Rank::King, Suit::Club), (Rank::Queen, Suit::Club)]);

        game.settle(now()).unwrap();
        assert_eq!(game.winner.as_ref().map(|w| w.user_id), Some(ids[1]));
        assert_eq!(game.winner.as_ref().map(|w| w.category), Some(HandCategory::Three));
        assert_eq!(game.players.iter().filter(|p| p.status == PlayerStatus::Winner).count(), 1);
    }

    #[test]
    fn test_confirm_continue_starts_next_round() {
        let (mut game, ids, mut rng) = setup_test_game(&[1000, 1000], 10);
        game.fold(ids[1], FoldReason::Voluntary, now()).unwrap();
        assert_eq!(game.status, GameStatus::Settled);

        game.confirm_continue(ids[0], &mut rng, now()).unwrap();
        game.confirm_continue(ids[0], &mut rng, now()).unwrap();
        assert_eq!(game.status, GameStatus::Settled);

        let events = game.confirm_continue(ids[1], &mut rng, now()).unwrap();
        assert!(matches!(events[0], GameEvent::Confirmed { all_confirmed: true, .. }));
        assert_eq!(game.status, GameStatus::Betting);
        assert_eq!(game.round, 2);
        assert_eq!(game.dealer_index, 1);
        assert_eq!(game.current_player_id(), Some(ids[1]));
        assert_eq!(game.pot, 20);
        // 第一局: 1000 - 10 + 20 = 1010；第二局再扣底注
        assert_eq!(game.players[0].room_gold, 1000);
        assert_eq!(game.players[1].room_gold, 980);
        assert!(game.player_confirmations.is_empty());
    }

    #[test]
    fn test_last_round_finishes() {
        let (mut game, ids, mut rng) = setup_test_game(&[1000, 1000], 1);
        let events = game.fold(ids[0], FoldReason::TurnTimeout, now()).unwrap();
        assert_eq!(game.status, GameStatus::Finished);
        assert_eq!(events.last(), Some(&GameEvent::Finished));
        assert_eq!(game.settlement_deadline, None);
        assert_eq!(
            game.start_next_round(&mut rng, now()).unwrap_err(),
            GameError::RoundExhausted { round: 2, total: 1 }
        );
        assert!(matches!(
            game.confirm_continue(ids[1], &mut rng, now()).unwrap_err(),
            GameError::InvalidState { .. }
        ));
    }

    #[test]
    fn test_actions_rejected_after_settlement() {
        let (mut game, ids, _) = setup_test_game(&[1000, 1000], 10);
        game.fold(ids[0], FoldReason::Voluntary, now()).unwrap();
        assert_eq!(
            game.call(ids[1], now()).unwrap_err(),
            GameError::InvalidState { action: "call", status: GameStatus::Settled }
        );
    }

    #[test]
    fn test_pot_equals_total_bets_for_random_play() {
        use rand::Rng;
        let mut action_rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let (mut game, _, _) = setup_test_game(&[500, 500, 500, 500], 10);
            while game.status == GameStatus::Betting {
                let current = game.current_player_id().unwrap();
                match action_rng.random_range(0..5) {
                    0 => { game.call(current, now()).unwrap(); }
                    1 => { game.raise(current, action_rng.random_range(1..60), now()).unwrap(); }
                    2 => { game.fold(current, FoldReason::Voluntary, now()).unwrap(); }
                    3 => {
                        let others: Vec<PlayerId> =
                            game.playing_ids().into_iter().filter(|&p| p != current).collect();
                        let target = others[action_rng.random_range(0..others.len())];
                        game.compare_hands(current, target, now()).unwrap();
                    }
                    _ => { game.see_cards(current).unwrap(); }
                }
                assert!(pot_matches_bets(&game));
            }
            assert_eq!(game.players.iter().filter(|p| p.status == PlayerStatus::Winner).count(), 1);
        }
    }
}
