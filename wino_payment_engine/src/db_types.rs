use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;
use wpg_common::TokenAmount;

/// Ledger account addresses and matching keys are 32-byte public keys.
pub const ACCOUNT_KEY_LENGTH: usize = 32;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------       Account       ---------------------------------------------------------
/// A ledger account address. A lightweight wrapper around the base58 encoding of a 32-byte public key.
#[derive(Clone, Debug, Type, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct Account(String);

impl Account {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Account {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = bs58::decode(s).into_vec().map_err(|e| ConversionError(format!("{s} is not base58. {e}")))?;
        if bytes.len() == ACCOUNT_KEY_LENGTH {
            Ok(Self(s.to_string()))
        } else {
            Err(ConversionError(format!("{s} decodes to {} bytes, not {ACCOUNT_KEY_LENGTH}", bytes.len())))
        }
    }
}

impl TryFrom<String> for Account {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Account> for String {
    fn from(value: Account) -> Self {
        value.0
    }
}

//--------------------------------------     MatchingKey     ---------------------------------------------------------
/// A single-use random reference, embedded in a payment request and echoed back by compliant wallets as a referenced
/// account of the transfer instruction. It is therefore shaped exactly like an [`Account`].
#[derive(Clone, Debug, Type, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct MatchingKey(String);

impl MatchingKey {
    /// Generates a fresh key from 32 bytes of OS-seeded randomness.
    pub fn random() -> Self {
        let mut bytes = [0u8; ACCOUNT_KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_account(&self) -> Account {
        Account(self.0.clone())
    }
}

impl Display for MatchingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Account> for MatchingKey {
    fn from(value: &Account) -> Self {
        Self(value.0.clone())
    }
}

impl FromStr for MatchingKey {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let account = Account::from_str(s)?;
        Ok(Self::from(&account))
    }
}

impl TryFrom<String> for MatchingKey {
    type Error = ConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MatchingKey> for String {
    fn from(value: MatchingKey) -> Self {
        value.0
    }
}

//--------------------------------------      InvoiceId      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for InvoiceId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for InvoiceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------  InvoiceStatusType  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatusType {
    /// The invoice is awaiting payment.
    Pending,
    /// A settlement has been matched to the invoice. Terminal.
    Paid,
    /// The invoice expired, or was superseded by a newer invoice for the same destination. Terminal.
    Declined,
}

impl InvoiceStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for InvoiceStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatusType::Pending => write!(f, "Pending"),
            InvoiceStatusType::Paid => write!(f, "Paid"),
            InvoiceStatusType::Declined => write!(f, "Declined"),
        }
    }
}

impl FromStr for InvoiceStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Declined" => Ok(Self::Declined),
            s => Err(ConversionError(format!("Invalid invoice status: {s}"))),
        }
    }
}

//--------------------------------------       Invoice       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// The token account that is expected to receive the funds
    pub merchant_destination: Account,
    /// The amount due, in the asset's smallest unit. `None` lets the payer choose the amount.
    pub expected_amount: Option<TokenAmount>,
    pub matching_key: MatchingKey,
    pub status: InvoiceStatusType,
    /// Set when an ambiguous fallback match could not be resolved automatically
    pub needs_review: bool,
    /// Settlement references of the ambiguous events that flagged this invoice for review
    pub review_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    /// The ledger transaction identifier of the matched settlement
    pub settlement_ref: Option<String>,
    /// The payer, if the event source reported one. Informational only.
    pub payer_identity: Option<Account>,
}

impl Invoice {
    pub fn is_pending(&self) -> bool {
        self.status == InvoiceStatusType::Pending
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatusType::Paid
    }

    /// True if the invoice is still pending in storage, but its validity window has closed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && now > self.expires_at
    }
}

//--------------------------------------      NewInvoice     ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInvoice {
    pub merchant_destination: Account,
    #[serde(default)]
    pub expected_amount: Option<TokenAmount>,
    /// Validity window in seconds. The configured default is used if this is omitted.
    #[serde(default)]
    pub ttl_seconds: Option<i64>,
}

impl NewInvoice {
    pub fn new(merchant_destination: Account) -> Self {
        Self { merchant_destination, expected_amount: None, ttl_seconds: None }
    }

    pub fn with_amount(mut self, amount: TokenAmount) -> Self {
        self.expected_amount = Some(amount);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_seconds = Some(ttl.num_seconds());
        self
    }
}

//-------------------------------------- ExternalPaymentEvent ---------------------------------------------------------
/// A decoded ledger transfer, normalized from whatever shape the delivering channel uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPaymentEvent {
    /// The ledger transaction identifier (signature)
    pub settlement_ref: String,
    /// The token account that received the funds
    pub destination: Account,
    pub amount: TokenAmount,
    /// Every auxiliary account referenced by the transfer instruction
    #[serde(default)]
    pub referenced_accounts: Vec<Account>,
    /// Block time of the transfer, as unix seconds on the wire
    #[serde(with = "chrono::serde::ts_seconds")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub sender: Option<Account>,
}

impl ExternalPaymentEvent {
    pub fn new(settlement_ref: String, destination: Account, amount: TokenAmount, occurred_at: DateTime<Utc>) -> Self {
        Self { settlement_ref, destination, amount, referenced_accounts: Vec::new(), occurred_at, sender: None }
    }

    pub fn with_reference(mut self, account: Account) -> Self {
        self.referenced_accounts.push(account);
        self
    }

    pub fn with_sender(mut self, sender: Account) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn references(&self, key: &MatchingKey) -> bool {
        self.referenced_accounts.iter().any(|a| a.as_str() == key.as_str())
    }
}
