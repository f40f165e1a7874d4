//! 领域事件模块

pub mod change_event;

pub use change_event::{ChangeEvent, OperationKind};
