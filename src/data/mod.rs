//! 数据管理模块
//!
//! - `error`: 数据层错误类型
//! - `managers`: 配置文件格式管理器（目前只有 properties）

pub mod error;
pub mod managers;

pub use error::{DataError, Result};
pub use managers::PropertiesManager;
