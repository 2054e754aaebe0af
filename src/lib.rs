//! 生产监控看板客户端库
//! 会话与令牌生命周期、后端 API 访问以及看板业务规则

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod telemetry;
