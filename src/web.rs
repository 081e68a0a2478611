use crate::data::PriceRecord;
use crate::ledger::JsonLedger;
use axum::extract::ws::Message;
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use log::{debug, error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct AppState {
    ledger_path: Arc<PathBuf>,
}

pub fn run_web_server(
    cancellation_token: CancellationToken,
    record_sender: Sender<PriceRecord>,
    ledger_path: PathBuf,
    host: String,
    port: u16,
) -> JoinHandle<()> {
    let mut router = Router::new()
        .route("/api/v1/prices", get(get_prices_handler))
        .route("/api/v1/latest", get(get_latest_handler))
        .with_state(AppState {
            ledger_path: Arc::new(ledger_path),
        });

    router = configure_ws(router, cancellation_token.clone(), record_sender);

    let url = format!("{host}:{port}");

    tokio::spawn(async move {
        serve(cancellation_token, router, url).await;
    })
}

async fn get_prices_handler(State(state): State<AppState>) -> Json<Vec<PriceRecord>> {
    Json(JsonLedger::load(&state.ledger_path))
}

async fn get_latest_handler(
    State(state): State<AppState>,
) -> Result<Json<PriceRecord>, StatusCode> {
    JsonLedger::load(&state.ledger_path)
        .pop()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

fn configure_ws(
    router: Router,
    cancellation_token: CancellationToken,
    record_sender: Sender<PriceRecord>,
) -> Router {
    router.route(
        "/ws/prices",
        get(
            |ws: WebSocketUpgrade, connect_info: ConnectInfo<SocketAddr>| async move {
                debug!("Connected {connect_info:?}");

                ws.on_upgrade(move |mut socket| async move {
                    let mut record_receiver: Receiver<PriceRecord> = record_sender.subscribe();
                    loop {
                        tokio::select! {
                            data = record_receiver.recv() => {
                                let record = match data {
                                    Ok(record) => record,
                                    Err(RecvError::Lagged(skipped)) => {
                                        debug!("{connect_info:?} lagged by {skipped} records");
                                        continue;
                                    }
                                    Err(RecvError::Closed) => {
                                        error!("Receiver channel closed");
                                        break;
                                    }
                                };
                                let msg = match serde_json::to_string(&record) {
                                    Ok(msg) => msg,
                                    Err(e) => {
                                        error!("Error serialising record: {e}");
                                        continue;
                                    }
                                };
                                if let Err(e) = socket.send(Message::Text(msg)).await {
                                    debug!("Error sending message: {e}");
                                    break;
                                }
                            },
                            _ = cancellation_token.cancelled() => {
                                debug!("Cancellation requested, closing WebSocket connection...");
                                if let Err(e) = socket.close().await {
                                    error!("Error closing WebSocket: {e}");
                                }
                                break;
                            }
                        }
                    }
                })
            },
        ),
    )
}

async fn serve(cancellation_token: CancellationToken, app: Router, addr: String) {
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            return;
        }
    };
    if let Ok(local_addr) = listener.local_addr() {
        info!("listening on {local_addr}");
    }

    tokio::select! {
        _ = cancellation_token.cancelled() => {
            info!("Cancellation requested, exiting...");
        }
        _ = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
            info!("Server stopped");
        }
    }
}
