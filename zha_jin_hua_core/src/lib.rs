//! # 炸金花核心逻辑库
//!
//! 这个 `core` crate 包含了炸金花游戏的状态管理、牌型评估、
//! 房间模型以及客户端-服务器通信消息的定义。
//! 它不依赖任何运行时：时间由调用方传入，随机数由调用方提供，
//! 服务器、测试或者其他上层应用都可以直接复用。

mod card;
mod clock;
mod error;
mod logic;
mod message;
mod room;
mod state;

pub use card::*;

pub use clock::*;

pub use error::*;

pub use message::*;

pub use room::*;

pub use state::*;
