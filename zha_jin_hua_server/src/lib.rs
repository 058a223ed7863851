//! # 炸金花服务器
//!
//! 在核心库之上提供计时器调度、房间协调、通知投递和 WebSocket 接入。

pub mod config;
pub mod coordinator;
pub mod notify;
pub mod scheduler;
pub mod store;
pub mod ws;
