//! JSON bodies of the HTTP interface.
//!
//! Field names are part of the public wire format and stay in Portuguese.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{BalanceUpdate, Cents, Statement, Transaction, TransactionKind};

/// Body of `POST /clientes/{id}/transacoes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub valor: Cents,
    pub tipo: TransactionKind,
    pub descricao: String,
}

/// Response to an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub limite: Cents,
    pub saldo: Cents,
}

impl From<BalanceUpdate> for BalanceResponse {
    fn from(update: BalanceUpdate) -> Self {
        Self {
            limite: update.limit,
            saldo: update.balance,
        }
    }
}

/// Response of `GET /clientes/{id}/extrato`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementResponse {
    pub saldo: StatementBalance,
    pub ultimas_transacoes: Vec<StatementEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementBalance {
    pub total: Cents,
    pub data_extrato: DateTime<Utc>,
    pub limite: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementEntry {
    pub valor: Cents,
    pub tipo: TransactionKind,
    pub descricao: String,
    pub realizada_em: DateTime<Utc>,
}

impl From<Transaction> for StatementEntry {
    fn from(transaction: Transaction) -> Self {
        Self {
            valor: transaction.amount,
            tipo: transaction.kind,
            descricao: transaction.description,
            realizada_em: transaction.occurred_at,
        }
    }
}

impl From<Statement> for StatementResponse {
    fn from(statement: Statement) -> Self {
        Self {
            saldo: StatementBalance {
                total: statement.balance,
                data_extrato: statement.as_of,
                limite: statement.limit,
            },
            ultimas_transacoes: statement
                .recent_transactions
                .into_iter()
                .map(StatementEntry::from)
                .collect(),
        }
    }
}
