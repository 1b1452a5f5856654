// 🧾 Structured Intent - the output entity
// What a message asks for: a transaction or a task, the action on it,
// and the resolved date/time. Wire names are the Portuguese keys that
// downstream consumers already read (tipo, acao, descricao, ...).

use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

use crate::temporal::{hhmm, parse_hhmm};
use crate::text::normalize_token;

// ============================================================================
// VOCABULARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "transacao")]
    Transaction,
    #[serde(rename = "tarefa")]
    Task,
}

impl EntityType {
    pub fn code(&self) -> &str {
        match self {
            EntityType::Transaction => "transacao",
            EntityType::Task => "tarefa",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "transacao" => Some(EntityType::Transaction),
            "tarefa" => Some(EntityType::Task),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "inserir")]
    Insert,
    #[serde(rename = "editar")]
    Edit,
    #[serde(rename = "consultar")]
    Query,
    #[serde(rename = "remover")]
    Remove,
}

impl Action {
    pub fn code(&self) -> &str {
        match self {
            Action::Insert => "inserir",
            Action::Edit => "editar",
            Action::Query => "consultar",
            Action::Remove => "remover",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "inserir" => Some(Action::Insert),
            "editar" => Some(Action::Edit),
            "consultar" => Some(Action::Query),
            "remover" => Some(Action::Remove),
            _ => None,
        }
    }
}

/// Money in (ENTRADA) or out (SAIDA)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionDirection {
    #[serde(rename = "ENTRADA")]
    Inflow,
    #[serde(rename = "SAIDA")]
    Outflow,
}

impl TransactionDirection {
    pub fn code(&self) -> &str {
        match self {
            TransactionDirection::Inflow => "ENTRADA",
            TransactionDirection::Outflow => "SAIDA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "entrada" => Some(TransactionDirection::Inflow),
            "saida" => Some(TransactionDirection::Outflow),
            _ => None,
        }
    }
}

/// Reporting window for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "hoje")]
    Today,
    #[serde(rename = "ontem")]
    Yesterday,
    #[serde(rename = "semana")]
    Week,
    #[serde(rename = "mes")]
    Month,
}

impl Period {
    pub fn code(&self) -> &str {
        match self {
            Period::Today => "hoje",
            Period::Yesterday => "ontem",
            Period::Week => "semana",
            Period::Month => "mes",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_token(raw).as_str() {
            "hoje" => Some(Period::Today),
            "ontem" => Some(Period::Yesterday),
            "semana" => Some(Period::Week),
            "mes" => Some(Period::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error("unknown value {value:?} for field '{field}'")]
    Unknown { field: &'static str, value: String },
}

// ============================================================================
// STRUCTURED INTENT
// ============================================================================

/// Final interpretation of one message
///
/// Every optional field serializes as an explicit `null`, never omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredIntent {
    #[serde(rename = "tipo")]
    pub entity_type: EntityType,

    #[serde(rename = "acao")]
    pub action: Action,

    #[serde(rename = "descricao")]
    pub description: String,

    /// Only for transactions
    #[serde(rename = "valor", with = "rust_decimal::serde::float_option", default)]
    pub amount: Option<Decimal>,

    #[serde(rename = "data", default)]
    pub date: Option<NaiveDate>,

    #[serde(rename = "hora", with = "hhmm", default)]
    pub time: Option<NaiveTime>,

    #[serde(rename = "tipoTransacao", default)]
    pub transaction_direction: Option<TransactionDirection>,

    #[serde(rename = "categoria", default)]
    pub category: Option<String>,

    /// Only meaningful for queries
    #[serde(rename = "periodo", default)]
    pub period: Option<Period>,
}

impl StructuredIntent {
    /// Intent used whenever the classifier cannot be trusted:
    /// a task to insert, described by the original message, nothing else.
    pub fn fallback(message: &str) -> Self {
        StructuredIntent {
            entity_type: EntityType::Task,
            action: Action::Insert,
            description: message.to_string(),
            amount: None,
            date: None,
            time: None,
            transaction_direction: None,
            category: None,
            period: None,
        }
    }

    pub fn is_task(&self) -> bool {
        self.entity_type == EntityType::Task
    }

    pub fn is_insert(&self) -> bool {
        self.action == Action::Insert
    }

    /// Tasks carry no money fields and no period; an explicit date on a query wins over its period
    pub fn enforce_invariants(&mut self) {
        if self.is_task() {
            self.amount = None;
            self.transaction_direction = None;
            self.category = None;
            self.period = None;
        }

        if self.action == Action::Query && self.date.is_some() {
            self.period = None;
        }
    }
}

// ============================================================================
// RAW INTENT (classifier output, before validation)
// ============================================================================

/// Classifier JSON as received: every field optional and loosely typed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawIntent {
    #[serde(default, deserialize_with = "text_only")]
    pub tipo: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub acao: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub descricao: Option<String>,

    #[serde(default)]
    pub valor: Option<Value>,

    #[serde(default, deserialize_with = "text_only")]
    pub data: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub hora: Option<String>,

    #[serde(rename = "tipoTransacao", default, deserialize_with = "text_only")]
    pub tipo_transacao: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub categoria: Option<String>,

    #[serde(default, deserialize_with = "text_only")]
    pub periodo: Option<String>,
}

/// Keep string values only; a number or array where text belongs is dropped, not fatal
fn text_only<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// `"null"` (any case) and blank strings mean "no value"
fn absent_if_null(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

impl RawIntent {
    /// Replace literal `"null"` strings with real absence
    ///
    /// Idempotent: a normalized value is indistinguishable from an omitted field.
    pub fn normalize_nulls(self) -> Self {
        let valor = match self.valor {
            Some(Value::Null) => None,
            Some(Value::String(s)) => absent_if_null(Some(s)).map(Value::String),
            other => other,
        };

        RawIntent {
            tipo: absent_if_null(self.tipo),
            acao: absent_if_null(self.acao),
            descricao: absent_if_null(self.descricao),
            valor,
            data: absent_if_null(self.data),
            hora: absent_if_null(self.hora),
            tipo_transacao: absent_if_null(self.tipo_transacao),
            categoria: absent_if_null(self.categoria),
            periodo: absent_if_null(self.periodo),
        }
    }

    /// Validate against the vocabulary and build the typed intent
    ///
    /// `tipo` and `acao` are required; optional fields that do not parse are dropped.
    pub fn into_intent(self, message: &str) -> Result<StructuredIntent, VocabularyError> {
        let raw = self.normalize_nulls();

        let entity_type = required(raw.tipo.as_deref(), "tipo", EntityType::parse)?;
        let action = required(raw.acao.as_deref(), "acao", Action::parse)?;

        let mut intent = StructuredIntent {
            entity_type,
            action,
            description: raw.descricao.unwrap_or_else(|| message.to_string()),
            amount: raw.valor.as_ref().and_then(parse_amount),
            date: raw
                .data
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            time: raw.hora.as_deref().and_then(parse_hhmm),
            transaction_direction: raw
                .tipo_transacao
                .as_deref()
                .and_then(TransactionDirection::parse),
            category: raw.categoria,
            period: raw.periodo.as_deref().and_then(Period::parse),
        };

        intent.enforce_invariants();
        Ok(intent)
    }
}

fn required<T>(
    value: Option<&str>,
    field: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<T, VocabularyError> {
    let value = value.ok_or(VocabularyError::Missing(field))?;
    parse(value).ok_or_else(|| VocabularyError::Unknown {
        field,
        value: value.to_string(),
    })
}

lazy_static! {
    /// "1.200" / "-12.500.000": dots grouping thousands, no decimal part
    static ref DOT_THOUSANDS: Regex =
        Regex::new(r"^-?[0-9]{1,3}(?:\.[0-9]{3})+$").expect("dot thousands pattern");
}

/// JSON number, or a string such as "45,90" / "1.200" / "R$ 1.200,00"
fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches("R$")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let cleaned = if cleaned.contains(',') {
                cleaned.replace('.', "").replace(',', ".")
            } else if DOT_THOUSANDS.is_match(&cleaned) {
                cleaned.replace('.', "")
            } else {
                cleaned
            };
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
