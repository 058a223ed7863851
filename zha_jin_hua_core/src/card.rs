use crate::error::{GameError, GameResult};
use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
// --- 核心数据结构定义 ---

/// 花色 (Suit)
/// 声明顺序即大小顺序：♠ > ♥ > ♣ > ♦
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Diamond, // 方块 ♦️
    Club,    // 梅花 ♣️
    Heart,   // 红心 ♥️
    Spade,   // 黑桃 ♠️
}

/// 点数 (Rank)，数值 2..=14，A 为 14。
/// A-3-2 顺子在牌型判断里单独处理，这里 A 永远是最大的单张。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spade, Suit::Heart, Suit::Club, Suit::Diamond];
}

/// 单张扑克牌 (Card)
/// 派生的 Ord 先比点数再比花色，正好是同牌型时逐张比较的规则。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Card {
        Card { rank, suit }
    }
}

/// 牌型 (HandCategory)，从小到大排列，可以直接利用 `Ord` 比较。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum HandCategory {
    Single,        // 单张
    Pair,          // 对子
    Straight,      // 顺子
    Flush,         // 同花
    StraightFlush, // 同花顺
    Three,         // 豹子
}

impl HandCategory {
    pub fn name(self) -> &'static str {
        match self {
            HandCategory::Single => "单张",
            HandCategory::Pair => "对子",
            HandCategory::Straight => "顺子",
            HandCategory::Flush => "同花",
            HandCategory::StraightFlush => "同花顺",
            HandCategory::Three => "豹子",
        }
    }
}

/// 三张牌的牌力。
///
/// `strength` 把牌型和同牌型内的点数比较编码成一个整数：
/// `牌型序号 * 15^3 + 牌型内的值`，牌型内的值总是小于 15^3，
/// 所以比较 `strength` 就同时完成了跨牌型和同牌型的比较。
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct HandRank {
    pub category: HandCategory,
    pub strength: u32,
}

impl PartialOrd for HandRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.strength.cmp(&other.strength)
    }
}

const CATEGORY_STRIDE: u32 = 15 * 15 * 15;

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠",
            Suit::Heart => "♥",
            Suit::Club => "♣",
            Suit::Diamond => "♦",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rank::Jack => write!(f, "J"),
            Rank::Queen => write!(f, "Q"),
            Rank::King => write!(f, "K"),
            Rank::Ace => write!(f, "A"),
            other => write!(f, "{}", other.value()),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.suit, self.rank)
    }
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.category.name())
    }
}

/// 手牌的展示形式，例如 `♠A ♥K ♦2`
pub fn format_cards(cards: &[Card]) -> String {
    if cards.is_empty() {
        return "无牌".to_string();
    }
    cards.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" ")
}

// --- 牌堆操作 ---

/// 创建一副完整的 52 张扑克牌
pub fn create_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(52);
    for &suit in &Suit::ALL {
        for &rank in &Rank::ALL {
            deck.push(Card { rank, suit });
        }
    }
    deck
}

/// 洗牌 (Fisher–Yates)
pub fn shuffle_deck<R: Rng + ?Sized>(deck: &mut [Card], rng: &mut R) {
    deck.shuffle(rng);
}

/// 从牌堆顶部发出 `count` 张牌
pub fn deal(deck: &mut Vec<Card>, count: usize) -> GameResult<Vec<Card>> {
    if deck.len() < count {
        return Err(GameError::DeckExhausted { requested: count, available: deck.len() });
    }
    Ok(deck.drain(..count).collect())
}

// --- 牌型评估逻辑 ---

/// 按点数(再按花色)从大到小排序
fn sorted_desc(cards: &[Card]) -> Vec<Card> {
    let mut sorted = cards.to_vec();
    sorted.sort_by(|a, b| b.cmp(a));
    sorted
}

/// 判断三张牌的牌型
pub fn classify(cards: &[Card]) -> GameResult<HandRank> {
    if cards.len() != 3 {
        return Err(GameError::InvalidHand(cards.len()));
    }

    let sorted = sorted_desc(cards);
    let (r0, r1, r2) = (
        sorted[0].rank.value() as u32,
        sorted[1].rank.value() as u32,
        sorted[2].rank.value() as u32,
    );

    let rank = |category: HandCategory, value: u32| HandRank {
        category,
        strength: category as u32 * CATEGORY_STRIDE + value,
    };

    if r0 == r1 && r1 == r2 {
        return Ok(rank(HandCategory::Three, r0));
    }

    let is_flush = sorted[0].suit == sorted[1].suit && sorted[1].suit == sorted[2].suit;
    // A-3-2 是最小的顺子，按 3 计算
    let ace_low = r0 == 14 && r1 == 3 && r2 == 2;
    let is_straight = ace_low || (r0 == r1 + 1 && r1 == r2 + 1);
    let top = if ace_low { 3 } else { r0 };
    let kickers = r0 * 225 + r1 * 15 + r2;

    Ok(match (is_straight, is_flush) {
        (true, true) => rank(HandCategory::StraightFlush, top),
        (false, true) => rank(HandCategory::Flush, kickers),
        (true, false) => rank(HandCategory::Straight, top),
        _ if r0 == r1 => rank(HandCategory::Pair, r0 * 15 + r2),
        _ if r1 == r2 => rank(HandCategory::Pair, r1 * 15 + r0),
        _ => rank(HandCategory::Single, kickers),
    })
}

/// 比较两手牌
///
/// 先比较牌力 (`HandRank::strength`)，相同时从大到小逐张比较点数与花色，
/// 第一张不同的牌决定胜负。`Ordering::Greater` 表示 `a` 赢。
pub fn compare_hands(a: &[Card], b: &[Card]) -> GameResult<Ordering> {
    let rank_a = classify(a)?;
    let rank_b = classify(b)?;
    Ok(rank_a.cmp(&rank_b).then_with(|| sorted_desc(a).cmp(&sorted_desc(b))))
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn c(rank: Rank, suit: Suit) -> Card {
        Card::new(rank, suit)
    }

    // 每种牌型一手，按从小到大排列
    fn one_hand_per_category() -> Vec<Vec<Card>> {
        use Rank::*;
        use Suit::*;
        vec![
            vec![c(Ace, Spade), c(King, Heart), c(Nine, Club)],     // 单张
            vec![c(Two, Spade), c(Two, Heart), c(Three, Club)],     // 对子
            vec![c(Ace, Diamond), c(Three, Spade), c(Two, Heart)],  // 顺子 A-3-2
            vec![c(Two, Club), c(Four, Club), c(Six, Club)],        // 同花
            vec![c(Four, Heart), c(Three, Heart), c(Two, Heart)],   // 同花顺
            vec![c(Two, Diamond), c(Two, Club), c(Two, Spade)],     // 豹子
        ]
    }

    #[test]
    fn test_create_deck_is_complete() {
        let deck = create_deck();
        assert_eq!(deck.len(), 52);
        let unique: HashSet<_> = deck.iter().collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn test_shuffle_keeps_cards() {
        let mut deck = create_deck();
        let mut rng = StdRng::seed_from_u64(7);
        shuffle_deck(&mut deck, &mut rng);
        let mut sorted = deck.clone();
        sorted.sort();
        let mut fresh = create_deck();
        fresh.sort();
        assert_eq!(sorted, fresh);
    }

    #[test]
    fn test_deal_from_head() {
        let mut deck = create_deck();
        let head: Vec<Card> = deck[..3].to_vec();
        let dealt = deal(&mut deck, 3).unwrap();
        assert_eq!(dealt, head);
        assert_eq!(deck.len(), 49);

        let mut short = vec![c(Rank::Two, Suit::Club)];
        assert_eq!(
            deal(&mut short, 3),
            Err(GameError::DeckExhausted { requested: 3, available: 1 })
        );
        assert_eq!(short.len(), 1);
    }

    #[test]
    fn test_classify_requires_three_cards() {
        let two = [c(Rank::Ace, Suit::Spade), c(Rank::King, Suit::Spade)];
        assert_eq!(classify(&two), Err(GameError::InvalidHand(2)));
        assert_eq!(compare_hands(&two, &two), Err(GameError::InvalidHand(2)));
    }

    #[test]
    fn test_classify_categories() {
        let expected = [
            HandCategory::Single,
            HandCategory::Pair,
            HandCategory::Straight,
            HandCategory::Flush,
            HandCategory::StraightFlush,
            HandCategory::Three,
        ];
        for (hand, category) in one_hand_per_category().iter().zip(expected) {
            assert_eq!(classify(hand).unwrap().category, category, "{}", format_cards(hand));
        }
    }

    #[test]
    fn test_category_matrix() {
        let hands = one_hand_per_category();
        for (i, a) in hands.iter().enumerate() {
            for (j, b) in hands.iter().enumerate() {
                assert_eq!(compare_hands(a, b).unwrap(), i.cmp(&j), "{} vs {}", i, j);
            }
        }
    }

    #[test]
    fn test_ace_low_straight() {
        use Rank::*;
        use Suit::*;
        let ace_low = [c(Ace, Spade), c(Two, Heart), c(Three, Club)];
        let low = [c(Four, Spade), c(Five, Heart), c(Six, Club)];
        let two_three_four = [c(Two, Spade), c(Three, Heart), c(Four, Club)];
        let aces = [c(Ace, Heart), c(Ace, Club), c(King, Spade)];

        let rank = classify(&ace_low).unwrap();
        assert_eq!(rank.category, HandCategory::Straight);
        assert_eq!(compare_hands(&ace_low, &low).unwrap(), Ordering::Less);
        assert_eq!(compare_hands(&ace_low, &two_three_four).unwrap(), Ordering::Less);
        assert_eq!(compare_hands(&ace_low, &aces).unwrap(), Ordering::Greater);

        // K-A-2 不是顺子
        let wrap = [c(King, Spade), c(Ace, Heart), c(Two, Club)];
        assert_eq!(classify(&wrap).unwrap().category, HandCategory::Single);
    }

    #[test]
    fn test_pair_and_single_tiebreaks() {
        use Rank::*;
        use Suit::*;
        let kings_five = [c(King, Spade), c(King, Heart), c(Five, Club)];
        let kings_four = [c(King, Club), c(King, Diamond), c(Four, Club)];
        let queens_ace = [c(Queen, Spade), c(Queen, Heart), c(Ace, Club)];
        assert_eq!(compare_hands(&kings_five, &kings_four).unwrap(), Ordering::Greater);
        assert_eq!(compare_hands(&queens_ace, &kings_four).unwrap(), Ordering::Less);

        let high = [c(Ace, Club), c(Ten, Heart), c(Three, Club)];
        let lower = [c(Ace, Heart), c(Nine, Spade), c(Eight, Diamond)];
        assert_eq!(compare_hands(&high, &lower).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_suit_breaks_equal_ranks() {
        use Rank::*;
        use Suit::*;
        let spade_top = [c(Ace, Spade), c(Ten, Diamond), c(Four, Club)];
        let heart_top = [c(Ace, Heart), c(Ten, Spade), c(Four, Spade)];
        assert_eq!(compare_hands(&spade_top, &heart_top).unwrap(), Ordering::Greater);

        let same = [c(Seven, Club), c(Five, Diamond), c(Two, Heart)];
        assert_eq!(compare_hands(&same, &same).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_compare_is_antisymmetric() {
        let mut rng = StdRng::seed_from_u64(2024);
        for _ in 0..500 {
            let mut deck = create_deck();
            shuffle_deck(&mut deck, &mut rng);
            let a = deal(&mut deck, 3).unwrap();
            let b = deal(&mut deck, 3).unwrap();
            let ab = compare_hands(&a, &b).unwrap();
            let ba = compare_hands(&b, &a).unwrap();
            assert_eq!(ab, ba.reverse());
            // 同一副牌里两手不同的牌不会打平
            assert_ne!(ab, Ordering::Equal);
        }
    }

    #[test]
    fn test_format_cards() {
        let hand = [c(Rank::Ace, Suit::Spade), c(Rank::Ten, Suit::Heart)];
        assert_eq!(format_cards(&hand), "♠A ♥10");
        assert_eq!(format_cards(&[]), "无牌");
    }
}
