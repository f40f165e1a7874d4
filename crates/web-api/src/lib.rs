//! Web API 层。
//!
//! 线路集线器：客户端 WebSocket 连接、捕获进程的发布入口、
//! 连接注册表以及可选的 Redis 背板。

mod backplane;
mod hub;
mod routes;
mod snapshot;
mod state;

pub use backplane::{BackplaneError, RedisBackplane};
pub use hub::{ConnectionId, HubBroadcaster, LinesHub};
pub use routes::router;
pub use snapshot::{PgSnapshotSource, SnapshotSource};
pub use state::AppState;
