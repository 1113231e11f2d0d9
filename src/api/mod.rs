//! HTTP API
//!
//! JSON surface for game sessions, win submission and NFT reads. Field
//! names on the wire are camelCase; every rejection is a 400 with a
//! stable machine-readable `error` reason.

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::cabinet::config::{CabinetConfig, PrizeCatalog, PrizeDef};
use crate::chain::{pin_with_retry, MetadataStorage, SettlementClient};
use crate::core::address::Address;
use crate::game::replay::ReplayData;
use crate::session::SessionStore;
use crate::voucher::{
    generate_custom_traits, issue_voucher, score_difficulty, validate_replay, CustomTraits,
    OracleSigner,
};

/// Shared server state.
pub struct AppState {
    pub config: CabinetConfig,
    pub catalog: PrizeCatalog,
    pub sessions: Arc<dyn SessionStore>,
    pub settlement: Arc<dyn SettlementClient>,
    pub storage: Arc<dyn MetadataStorage>,
    pub signer: OracleSigner,
    /// Replays of issued vouchers, keyed by hex replay hash. Serves the
    /// NFT replay endpoint after the prize is minted.
    replay_archive: RwLock<BTreeMap<String, ReplayData>>,
}

impl AppState {
    pub fn new(
        config: CabinetConfig,
        catalog: PrizeCatalog,
        sessions: Arc<dyn SessionStore>,
        settlement: Arc<dyn SettlementClient>,
        storage: Arc<dyn MetadataStorage>,
        signer: OracleSigner,
    ) -> Self {
        Self {
            config,
            catalog,
            sessions,
            settlement,
            storage,
            signer,
            replay_archive: RwLock::new(BTreeMap::new()),
        }
    }
}

/// Register every route on a service config.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/game/start", web::post().to(start_game))
        .route("/game/session/{id}", web::get().to(get_session))
        .route("/game/submit-win", web::post().to(submit_win))
        .route("/nft/collection/{address}", web::get().to(nft_collection))
        .route("/nft/{token_id}/metadata", web::get().to(nft_metadata))
        .route("/nft/{token_id}/replay", web::get().to(nft_replay))
        .route("/nft/{token_id}/info", web::get().to(nft_info));
}

fn bad_request(reason: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": reason }))
}

fn not_found(reason: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": reason }))
}

// =============================================================================
// GAME ENDPOINTS
// =============================================================================

async fn health() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub wallet_address: String,
    pub network: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub tokens_escrowed: u64,
}

/// Open a server session for a wallet whose escrow is already live on
/// the settlement layer.
async fn start_game(
    state: web::Data<AppState>,
    body: web::Json<StartGameRequest>,
) -> impl Responder {
    let wallet = match Address::parse(&body.wallet_address) {
        Ok(addr) => addr,
        Err(_) => return bad_request("invalid_address"),
    };

    let Some(active) = state.settlement.active_session(&wallet).await else {
        warn!(wallet = %wallet, "game start without on-chain escrow");
        return bad_request("no_active_game");
    };

    let session = state
        .sessions
        .create(wallet, active.tokens_escrowed, &body.network)
        .await;
    info!(session_id = %session.id, wallet = %wallet, "game session opened");

    HttpResponse::Ok().json(StartGameResponse {
        session_id: session.id,
        timestamp: session.started_at,
        tokens_escrowed: session.tokens_escrowed,
    })
}

async fn get_session(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match state.sessions.get(&path).await {
        Some(session) => HttpResponse::Ok().json(session),
        None => not_found("not_found"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWinRequest {
    pub session_id: String,
    pub wallet_address: String,
    pub replay_data: ReplayData,
    pub prize_id: String,
    pub custom_traits: Option<CustomTraits>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherPayload {
    pub voucher_hash: String,
    pub signature: String,
    pub nonce: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPayload {
    pub uri: String,
    pub replay_data_hash: String,
    pub difficulty: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitWinResponse {
    pub voucher: VoucherPayload,
    pub metadata: MetadataPayload,
    pub prize_id: String,
    pub custom_traits: CustomTraits,
}

/// Validate a winning replay and issue a signed voucher for it.
///
/// The session is consumed only after a voucher exists, so a failed
/// submission leaves it claimable.
async fn submit_win(
    state: web::Data<AppState>,
    body: web::Json<SubmitWinRequest>,
) -> impl Responder {
    let wallet = match Address::parse(&body.wallet_address) {
        Ok(addr) => addr,
        Err(_) => return bad_request("invalid_address"),
    };

    let session = match state.sessions.validate(&body.session_id, &wallet).await {
        Ok(session) => session,
        Err(e) => {
            warn!(session_id = %body.session_id, reason = e.reason(), "win rejected at session check");
            return bad_request(e.reason());
        }
    };

    let Some(prize) = state.catalog.get(&body.prize_id).cloned() else {
        return bad_request("unknown_prize");
    };

    if let Err(e) = validate_replay(&body.replay_data, &session.id) {
        warn!(session_id = %session.id, reason = e.reason(), "win rejected at replay check");
        return bad_request(e.reason());
    }

    let difficulty = score_difficulty(&state.config, &body.replay_data);
    let custom_traits = generate_custom_traits(
        &wallet,
        &prize,
        difficulty,
        session.tokens_escrowed,
        body.custom_traits.as_ref(),
    );

    let replay_hash_hex = format!("0x{}", hex::encode(body.replay_data.content_hash()));
    let document = metadata_document(&prize, &custom_traits, difficulty, &replay_hash_hex, &wallet);
    let uri = match pin_with_retry(state.storage.as_ref(), &document).await {
        Ok(uri) => uri,
        Err(e) => {
            error!(error = %e, "metadata pinning exhausted retries");
            return HttpResponse::InternalServerError()
                .json(json!({ "error": "metadata_unavailable" }));
        }
    };

    let now_ms = Utc::now().timestamp_millis() as u64;
    let signed = match issue_voucher(
        &state.signer,
        &state.config,
        wallet,
        &session.id,
        &body.replay_data,
        &body.prize_id,
        &uri,
        now_ms,
    ) {
        Ok(signed) => signed,
        Err(e) => {
            warn!(session_id = %session.id, reason = e.reason(), "voucher issuance failed");
            return bad_request(e.reason());
        }
    };

    if let Err(e) = state.sessions.complete(&session.id, &body.prize_id).await {
        // The session was valid moments ago; losing the race means a
        // concurrent submission already consumed it
        warn!(session_id = %session.id, reason = e.reason(), "session lost before completion");
        return bad_request(e.reason());
    }

    state
        .replay_archive
        .write()
        .await
        .insert(replay_hash_hex.clone(), body.replay_data.clone());

    HttpResponse::Ok().json(SubmitWinResponse {
        voucher: VoucherPayload {
            voucher_hash: format!("0x{}", hex::encode(signed.voucher_hash)),
            signature: format!("0x{}", hex::encode(signed.signature)),
            nonce: signed.voucher.nonce,
        },
        metadata: MetadataPayload {
            uri,
            replay_data_hash: replay_hash_hex,
            difficulty,
        },
        prize_id: body.prize_id.clone(),
        custom_traits,
    })
}

/// Metadata document pinned for a minted prize.
fn metadata_document(
    prize: &PrizeDef,
    traits: &CustomTraits,
    difficulty: u8,
    replay_hash_hex: &str,
    player: &Address,
) -> Value {
    let mut attributes: Vec<Value> = traits
        .iter()
        .map(|(category, value)| json!({ "trait_type": category, "value": value }))
        .collect();
    attributes.push(json!({ "trait_type": "rarity", "value": prize.rarity }));
    attributes.push(json!({ "trait_type": "difficulty", "value": difficulty }));

    json!({
        "name": format!("Clawcade Prize: {}", prize.key),
        "description": "A prize won from the Clawcade claw machine.",
        "attributes": attributes,
        "properties": {
            "player": player.to_string(),
            "replayDataHash": replay_hash_hex,
        },
    })
}

// =============================================================================
// NFT ENDPOINTS
// =============================================================================

async fn nft_metadata(state: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    let Some(minted) = state.settlement.minted_prize(*path).await else {
        return not_found("unknown_token");
    };
    match state.storage.fetch_metadata(&minted.metadata_uri).await {
        Some(document) => HttpResponse::Ok().json(document),
        None => not_found("metadata_missing"),
    }
}

async fn nft_replay(state: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    let Some(minted) = state.settlement.minted_prize(*path).await else {
        return not_found("unknown_token");
    };
    let key = format!("0x{}", minted.replay_hash);
    match state.replay_archive.read().await.get(&key) {
        Some(replay) => HttpResponse::Ok().json(replay),
        None => not_found("replay_missing"),
    }
}

async fn nft_info(state: web::Data<AppState>, path: web::Path<u64>) -> impl Responder {
    match state.settlement.minted_prize(*path).await {
        Some(minted) => HttpResponse::Ok().json(minted),
        None => not_found("unknown_token"),
    }
}

async fn nft_collection(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let owner = match Address::parse(&path) {
        Ok(addr) => addr,
        Err(_) => return bad_request("invalid_address"),
    };
    let owned = state.settlement.collection(&owner).await;
    HttpResponse::Ok().json(owned)
}

// =============================================================================
// TESTS
// =============================================================================
