//! Handler for `run`: print a REST market snapshot, connect, keep the
//! session alive and print every application event until Ctrl-C.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::adapter::api::MarketDepth;
use crate::adapter::{ApiClient, StoredTokenProvider, WebSocketConnector};
use crate::application::{self, AppEvent, Session};
use crate::cli::output;
use crate::config::{Config, ACCESS_TOKEN_VAR, TOKEN_EXPIRY_VAR};
use crate::error::{Error, Result};

/// # Errors
///
/// Returns an error if the configuration is invalid or the venue rejects the
/// credential.
pub async fn execute(path: &Path) -> Result<()> {
    let config = Config::load(path)?;
    config.init_logging();

    let tokens = Arc::new(StoredTokenProvider::from_env(ACCESS_TOKEN_VAR, TOKEN_EXPIRY_VAR)?);
    let api = config.api_client(tokens.clone());
    let connector = Arc::new(WebSocketConnector::new(config.network.ws_url.clone()));
    let session = Session::new(connector, tokens, config.session());

    output::section("Session");
    output::field("WebSocket", &config.network.ws_url);
    output::field("API", api.base_url());
    print_market_snapshot(&api).await;

    let (handle, driver) = application::spawn(session);
    let mut events = handle.subscribe();
    handle.start_auto_reconnect().await;

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(AppEvent::AuthExpired) => {
                    output::error("Credential rejected, logged out");
                    break Err(Error::Connection("authentication expired".into()));
                }
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => {
                    break Err(Error::Connection("session driver stopped".into()));
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break Ok(());
            }
        }
    };

    handle.disconnect().await;
    drop(handle);
    let _ = driver.await;
    output::success("Disconnected");
    outcome
}

/// Best effort: a failed snapshot does not stop the session.
async fn print_market_snapshot(api: &ApiClient) {
    match api.market_data().await {
        Ok(depth) => {
            output::section("Market");
            for line in depth.iter().map(describe_depth) {
                output::field("Asset", line);
            }
        }
        Err(e) => {
            warn!(error = %e, "Market snapshot unavailable");
            output::warning(&format!("Market snapshot unavailable: {e}"));
        }
    }
}

fn describe_depth(depth: &MarketDepth) -> String {
    format!(
        "{} bid {} offer {} ({} / {} resting)",
        depth.asset,
        display_or_dash(depth.best_bid()),
        display_or_dash(depth.best_offer()),
        depth.bids.len(),
        depth.offers.len()
    )
}

fn print_event(event: &AppEvent) {
    let timestamp = Utc::now().format("%H:%M:%S").to_string();
    let message = describe(event);
    if is_prompt(event) {
        output::prompt(&timestamp, event.name(), &message);
    } else {
        output::event(&timestamp, event.name(), &message);
    }
}

const fn is_prompt(event: &AppEvent) -> bool {
    matches!(
        event,
        AppEvent::SellerApprovalRequested(_)
            | AppEvent::NegotiationTurn(_)
            | AppEvent::QuantityTopUpRequested(_)
            | AppEvent::PartialFillApprovalRequested(_)
    )
}

fn describe(event: &AppEvent) -> String {
    match event {
        AppEvent::ConnectionRestored => "connection restored".into(),
        AppEvent::ConnectionLost { reason } => format!("connection lost: {reason}"),
        AppEvent::ReconnectAttempt { attempt } => format!("attempt {attempt}"),
        AppEvent::AuthExpired => "credential rejected".into(),
        AppEvent::Order { kind, notice } => format!("{kind:?} {}", notice.order_id),
        AppEvent::TradeExecuted(trade) => {
            format!("{} {} @ {}", trade.asset, trade.quantity, trade.price)
        }
        AppEvent::MarketUpdate(update) => format!(
            "{} bid {} offer {}",
            update.asset,
            display_or_dash(update.best_bid),
            display_or_dash(update.best_offer)
        ),
        AppEvent::SellerApprovalRequested(request)
        | AppEvent::QuantityTopUpRequested(request)
        | AppEvent::PartialFillApprovalRequested(request) => format!(
            "{} {} {} @ {} ({} / {})",
            request.key,
            request.asset,
            request.side,
            request.price,
            request.party_quantity,
            request.counterparty_quantity
        ),
        AppEvent::NegotiationTurn(turn) => format!(
            "{} your {} (bid {} offer {})",
            turn.asset,
            turn.turn,
            display_or_dash(turn.best_bid),
            display_or_dash(turn.best_offer)
        ),
        AppEvent::SellerApprovalExpired { key } | AppEvent::ConfirmationExpired { key } => {
            format!("{key} expired")
        }
        AppEvent::PartialFillDeclined { key, reason }
        | AppEvent::CounterpartyDeclined { key, reason } => match reason {
            Some(reason) => format!("{key} declined: {reason}"),
            None => format!("{key} declined"),
        },
    }
}

fn display_or_dash(value: Option<rust_decimal::Decimal>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}
