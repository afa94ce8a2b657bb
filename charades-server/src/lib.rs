use charades_core::RoomCode;
use serde::Serialize;
use std::sync::Arc;
use warp::Filter;

use crate::registry::RoomRegistry;
use crate::relay::SignalingRelay;
use crate::websocket::RateLimiter;

pub mod config;
pub mod registry;
pub mod relay;
pub mod websocket;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomResponse {
    room_code: String,
}

#[derive(Serialize)]
struct ValidateRoomResponse {
    valid: bool,
    players: usize,
}

pub fn create_routes(
    registry: Arc<RoomRegistry>,
    rate_limiter: RateLimiter,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let relay = Arc::new(SignalingRelay::new(registry.connections().clone()));

    let registry_filter = warp::any().map({
        let registry = registry.clone();
        move || registry.clone()
    });

    let relay_filter = warp::any().map(move || relay.clone());

    let rate_limiter_filter = warp::any().map(move || rate_limiter.clone());

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(registry_filter.clone())
        .and(relay_filter)
        .and(rate_limiter_filter)
        .map(
            |ws: warp::ws::Ws, registry: Arc<RoomRegistry>, relay, rate_limiter| {
                ws.on_upgrade(move |socket| {
                    let connections = registry.connections().clone();
                    websocket::handle_connection(socket, connections, registry, relay, rate_limiter)
                })
            },
        );

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    let create_room = warp::path!("game" / "create")
        .and(warp::post())
        .and(registry_filter.clone())
        .map(|registry: Arc<RoomRegistry>| {
            let code = registry.generate_room_code();
            tracing::info!("Issued room code {}", code);
            warp::reply::json(&CreateRoomResponse {
                room_code: code.to_string(),
            })
        });

    let validate_room = warp::path!("game" / "validate" / String)
        .and(warp::get())
        .and(registry_filter)
        .and_then(handle_validate_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    websocket
        .or(health)
        .or(create_room)
        .or(validate_room)
        .with(cors)
        .with(warp::log("charades"))
}

async fn handle_validate_request(
    raw_code: String,
    registry: Arc<RoomRegistry>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let players = match RoomCode::parse(&raw_code) {
        Ok(code) => registry.player_count(&code).await,
        Err(_) => None,
    };

    Ok(warp::reply::json(&ValidateRoomResponse {
        valid: players.is_some(),
        players: players.unwrap_or(0),
    }))
}
