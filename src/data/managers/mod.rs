//! 配置文件格式管理器
//!
//! - `properties`: 扁平 `key=value` 文件，忽略注释

pub mod properties;

pub use properties::PropertiesManager;
