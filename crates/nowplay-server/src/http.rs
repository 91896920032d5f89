//! Site-facing JSON API.
//!
//! Three thin routes over the core library. Visitors never see provider
//! errors: the now-playing route degrades to `null` and the widget simply
//! shows nothing.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use nowplay_core::client::SpotifyClient;
use nowplay_core::track::TrackRecord;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Serialize)]
struct PreviewBody {
    url: String,
}

#[derive(Serialize)]
struct TokenBody {
    access_token: String,
    expires_in: i64,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

pub fn router(client: Arc<SpotifyClient>) -> Router {
    Router::new()
        .route("/api/now-playing", get(now_playing))
        .route("/api/preview/:id", get(preview))
        .route("/api/token", get(token))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(client)
}

pub async fn serve(
    bind_address: String,
    port: u16,
    client: Arc<SpotifyClient>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, router(client)).await?;
    Ok(())
}

/// Normalized track record, or `null` when nothing is playing or any part
/// of the fetch cycle failed. No error detail reaches the visitor.
async fn now_playing(State(client): State<Arc<SpotifyClient>>) -> Json<Option<TrackRecord>> {
    match client.fetch_current().await {
        Ok(record) => Json(record),
        Err(e) => {
            warn!("now-playing fetch failed: {}", e);
            Json(None)
        }
    }
}

async fn preview(
    State(client): State<Arc<SpotifyClient>>,
    Path(id): Path<String>,
) -> Result<Json<PreviewBody>, (StatusCode, Json<ErrorBody>)> {
    match client.resolve_preview(&id).await {
        Ok(Some(url)) => Ok(Json(PreviewBody { url })),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "No preview URL found",
            }),
        )),
        Err(e) => {
            warn!("preview resolve failed for {}: {}", id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to fetch preview URL",
                }),
            ))
        }
    }
}

/// Thin variant of the exchange: no cache write, the caller manages its
/// own expiry bookkeeping.
async fn token(
    State(client): State<Arc<SpotifyClient>>,
) -> Result<Json<TokenBody>, (StatusCode, Json<ErrorBody>)> {
    match client.tokens().exchange(client.http()).await {
        Ok(response) => Ok(Json(TokenBody {
            access_token: response.access_token,
            expires_in: response.expires_in,
        })),
        Err(e) => {
            warn!("token exchange failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Failed to fetch token",
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowplay_core::config::Config;

    /// Mock embed host: `/embed/has-preview` carries the inline blob,
    /// anything else does not.
    async fn start_embed_mock() -> String {
        let app = Router::new().route(
            "/embed/:id",
            get(|Path(id): Path<String>| async move {
                if id == "has-preview" {
                    r#"<html>{"audioPreview":{"url":"https://p.example/clip.mp3"}}</html>"#
                } else {
                    "<html>nothing embedded</html>"
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Serves the real router over a client with no secrets configured and
    /// the embed endpoint pointed at the mock.
    async fn start_api() -> String {
        let embed_base = start_embed_mock().await;
        let mut config = Config::default();
        config.endpoints.embed_url = format!("{}/embed", embed_base);
        // No secrets and an unreachable token endpoint: credential paths fail.
        config.endpoints.token_url = "http://127.0.0.1:9/api/token".to_string();

        let client = Arc::new(SpotifyClient::new(&config, None));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(client)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn now_playing_degrades_to_null() {
        let base = start_api().await;
        let response = reqwest::get(format!("{}/api/now-playing", base)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "null");
    }

    #[tokio::test]
    async fn preview_found_and_not_found_shapes() {
        let base = start_api().await;

        let found = reqwest::get(format!("{}/api/preview/has-preview", base))
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);
        let body: serde_json::Value = found.json().await.unwrap();
        assert_eq!(body["url"], "https://p.example/clip.mp3");

        let missing = reqwest::get(format!("{}/api/preview/other", base))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = missing.json().await.unwrap();
        assert_eq!(body["error"], "No preview URL found");
    }

    #[tokio::test]
    async fn token_errors_as_500_shape() {
        let base = start_api().await;
        let response = reqwest::get(format!("{}/api/token", base)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}
