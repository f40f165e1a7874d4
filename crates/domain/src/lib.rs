//! 线路变更传播系统核心领域模型
//!
//! 包含线路段记录、变更事件等核心类型，以及领域/仓储错误定义。

pub mod entities;
pub mod errors;
pub mod events;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use events::*;
pub use value_objects::*;
