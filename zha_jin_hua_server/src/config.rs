use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use zha_jin_hua_core::GameRules;

/// 服务器配置，命令行参数优先，其次读取环境变量
#[derive(Parser, Debug, Clone)]
#[command(name = "zha_jin_hua_server", version, about = "炸金花游戏服务器")]
pub struct ServerConfig {
    /// 监听地址
    #[arg(long, env = "ZJH_LISTEN", default_value = "0.0.0.0:25917")]
    pub listen: SocketAddr,

    /// 每次行动的超时时间 (秒)，超时自动弃牌
    #[arg(long, env = "ZJH_TURN_TIMEOUT_SECS", default_value_t = 30)]
    pub turn_timeout_secs: u64,

    /// 结算后等待确认的时间 (秒)，超时自动开始下一局
    #[arg(long, env = "ZJH_SETTLEMENT_TIMEOUT_SECS", default_value_t = 30)]
    pub settlement_timeout_secs: u64,

    /// 断线后保留座位的时间 (秒)
    #[arg(long, env = "ZJH_DISCONNECT_GRACE_SECS", default_value_t = 60)]
    pub disconnect_grace_secs: u64,

    #[arg(long, env = "ZJH_MAX_BETTING_ROUNDS", default_value_t = 15)]
    pub max_betting_rounds: u32,

    /// 入座时每名玩家的房间金币
    #[arg(long, env = "ZJH_ROOM_GOLD", default_value_t = 10000)]
    pub room_gold: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let rules = GameRules::default();
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 25917)),
            turn_timeout_secs: rules.turn_timeout_secs,
            settlement_timeout_secs: rules.settlement_timeout_secs,
            disconnect_grace_secs: 60,
            max_betting_rounds: rules.max_betting_rounds,
            room_gold: 10000,
        }
    }
}

impl ServerConfig {
    /// 新建游戏时使用的规则
    pub fn rules(&self) -> GameRules {
        GameRules {
            turn_timeout_secs: self.turn_timeout_secs,
            settlement_timeout_secs: self.settlement_timeout_secs,
            max_betting_rounds: self.max_betting_rounds,
        }
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_secs(self.disconnect_grace_secs)
    }
}
