//! 数据模型模块
//! 认证模型与看板接口的响应结构

pub mod action_plan;
pub mod auth;
pub mod production;
