//! 集线器路由
//!
//! - `/{path}`：客户端连接。连接建立后立即向调用方发送 `ReceiveLines` 快照，
//!   之后接收所有广播。
//! - `/{path}/publish`：捕获进程的发布入口，收到的帧被广播给所有客户端。

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use application::{HubFrame, HubMethod};

use crate::hub::ConnectionId;
use crate::state::AppState;

pub fn router(state: AppState, hub_path: &str) -> Router {
    let path = format!("/{}", hub_path.trim_matches('/'));
    Router::new()
        .route(&path, get(connect_client))
        .route(&format!("{}/publish", path), get(connect_publisher))
        .with_state(state)
}

async fn connect_client(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

async fn connect_publisher(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_publisher(socket, state))
}

async fn handle_client(socket: WebSocket, state: AppState) {
    // 先注册再读快照：快照期间的广播留在通道中，快照直接写入套接字后才开始转发
    let (connection_id, mut outbound) = state.hub.register().await;
    let (mut sender, mut receiver) = socket.split();

    if let Some(text) = snapshot_frame(&state, connection_id).await {
        let bytes = text.len();
        if let Err(err) = sender.send(WsMessage::Text(text.into())).await {
            warn!(connection_id = %connection_id, error = %err, "快照发送失败");
            state.hub.unregister(connection_id).await;
            return;
        }
        info!(connection_id = %connection_id, bytes, "快照已发送给调用方");
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if let Err(err) = sender.send(WsMessage::Text(text.into())).await {
                debug!(connection_id = %connection_id, error = %err, "发送失败，连接已关闭");
                break;
            }
        }
        let _ = sender.send(WsMessage::Close(None)).await;
    });

    let shutdown = state.shutdown.clone();
    let mut recv_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = receiver.next() => message,
            };
            match message {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => debug!(connection_id = %connection_id, "忽略客户端消息"),
                Some(Err(err)) => {
                    warn!(connection_id = %connection_id, error = %err, "WebSocket 错误");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!(connection_id = %connection_id, "发送任务结束");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!(connection_id = %connection_id, "接收任务结束");
            send_task.abort();
        }
    }

    state.hub.unregister(connection_id).await;
}

/// 调用方专属的 `ReceiveLines` 帧；读取失败时不发送快照
async fn snapshot_frame(state: &AppState, connection_id: ConnectionId) -> Option<String> {
    let lines = match state.snapshots.snapshot(&state.shutdown).await {
        Ok(lines) => lines,
        Err(err) => {
            error!(connection_id = %connection_id, error = %err, "读取线路快照失败");
            return None;
        }
    };

    let count = lines.len();
    let frame = serde_json::to_value(&lines)
        .map(|payload| HubFrame::new(HubMethod::ReceiveLines, payload))
        .and_then(|frame| serde_json::to_string(&frame));

    match frame {
        Ok(text) => {
            debug!(connection_id = %connection_id, count, "线路快照已读取");
            Some(text)
        }
        Err(err) => {
            error!(connection_id = %connection_id, error = %err, "快照序列化失败");
            None
        }
    }
}

async fn handle_publisher(mut socket: WebSocket, state: AppState) {
    info!("捕获进程已连接到发布入口");

    loop {
        let message = tokio::select! {
            _ = state.shutdown.cancelled() => break,
            message = socket.recv() => message,
        };

        match message {
            Some(Ok(WsMessage::Text(text))) => publish_frame(&state, text.as_str()).await,
            Some(Ok(WsMessage::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(err)) => {
                warn!(error = %err, "发布入口连接错误");
                break;
            }
        }
    }

    info!("捕获进程已断开发布入口");
}

async fn publish_frame(state: &AppState, text: &str) {
    let frame: HubFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "无法解析发布帧");
            return;
        }
    };

    match frame.method() {
        Some(HubMethod::ReceiveLinesData | HubMethod::DeletedLinesData) => {}
        Some(HubMethod::ReceiveLines) | None => {
            warn!(target_method = %frame.target, "拒绝广播该方法");
            return;
        }
    }

    if frame.arguments.first().map_or(true, Value::is_null) {
        warn!(target_method = %frame.target, "发布帧缺少载荷");
        return;
    }

    if let Err(err) = state.broadcaster.broadcast(frame).await {
        error!(error = %err, "广播失败");
    }
}
