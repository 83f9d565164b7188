//! HTTP adapter: routes requests to [`LedgerService`] and maps its errors to
//! status codes.

mod wire;

pub use wire::*;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;

use crate::application::{LedgerError, LedgerService};
use crate::domain::AccountId;

pub const TRANSACTIONS_ROUTE: &str = "/clientes/{id}/transacoes";
pub const STATEMENT_ROUTE: &str = "/clientes/{id}/extrato";

/// Build the application router.
pub fn router(service: LedgerService) -> Router {
    Router::new()
        .route(TRANSACTIONS_ROUTE, post(post_transaction))
        .route(STATEMENT_ROUTE, get(get_statement))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve until Ctrl+C or SIGTERM, then drain in-flight requests.
pub async fn serve(listener: TcpListener, service: LedgerService) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn post_transaction(
    State(service): State<LedgerService>,
    Path(id): Path<String>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Response {
    let Some(account_id) = parse_account_id(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!("rejected transaction body: {rejection}");
            return StatusCode::UNPROCESSABLE_ENTITY.into_response();
        }
    };

    match service
        .apply(account_id, request.tipo, request.valor, &request.descricao)
        .await
    {
        Ok(update) => Json(BalanceResponse::from(update)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_statement(
    State(service): State<LedgerService>,
    Path(id): Path<String>,
) -> Response {
    let Some(account_id) = parse_account_id(&id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match service.snapshot(account_id).await {
        Ok(statement) => Json(StatementResponse::from(statement)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// A path segment that is not an integer cannot name an account.
fn parse_account_id(segment: &str) -> Option<AccountId> {
    segment.parse().ok()
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        match self {
            LedgerError::AccountNotFound(_) => StatusCode::NOT_FOUND.into_response(),
            LedgerError::Validation(_)
            | LedgerError::LimitExceeded { .. }
            | LedgerError::BalanceOverflow { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY.into_response()
            }
            // Logged by the service; details never reach the client.
            LedgerError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::debug!("Received ctrl+c signal."),
        _ = terminate => tracing::debug!("Received terminate signal."),
    }
}
