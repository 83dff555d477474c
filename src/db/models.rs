use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use uuid::Uuid;

/// One checkout. Status moves forward only: pending -> processing ->
/// completed (terminal). 'completed' is written exclusively by the
/// fulfillment procedure.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub total_price: BigDecimal,
    pub currency_used: String,
    pub payment_method: String,
    pub status: String,
    pub payment_reference: Option<String>,
    pub transaction_signatures: Option<Vec<String>>,
    pub split_code: Option<String>,
    pub order_date: DateTime<Utc>,
}

impl Order {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }

    /// The on-chain payment signature, when one has been recorded.
    pub fn first_signature(&self) -> Option<&str> {
        self.transaction_signatures
            .as_ref()
            .and_then(|sigs| sigs.first())
            .map(String::as_str)
    }
}

/// One purchased unit within an order. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub beat_id: Uuid,
    pub title: String,
    pub price: BigDecimal,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Beat {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub title: String,
    pub purchase_count: i64,
}

/// Durable entitlement record: grants a buyer permanent access to a beat.
/// At most one row per (order_id, beat_id), enforced by the schema.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PurchasedBeat {
    pub id: Uuid,
    pub user_id: Uuid,
    pub beat_id: Uuid,
    pub license_type: Option<String>,
    pub order_id: Uuid,
    pub currency_code: String,
    pub purchase_date: DateTime<Utc>,
}

impl PurchasedBeat {
    pub fn new(user_id: Uuid, beat_id: Uuid, order_id: Uuid, currency_code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            beat_id,
            license_type: Some("standard".to_string()),
            order_id,
            currency_code,
            purchase_date: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub related_entity_id: Option<Uuid>,
    pub related_entity_type: Option<String>,
    pub is_read: bool,
    pub created_date: DateTime<Utc>,
}

impl Notification {
    pub fn purchase_confirmation(buyer_id: Uuid, order_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: buyer_id,
            sender_id: None,
            title: "Beat Purchase Complete".to_string(),
            body: "Your beat purchase is complete. You can now download the full track from your library.".to_string(),
            notification_type: "purchase".to_string(),
            related_entity_id: Some(order_id),
            related_entity_type: Some("order".to_string()),
            is_read: false,
            created_date: Utc::now(),
        }
    }

    pub fn sale_alert(producer_id: Uuid, buyer_id: Uuid, order_id: Uuid, beat_title: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: producer_id,
            sender_id: Some(buyer_id),
            title: "New Sale".to_string(),
            body: format!("Your beat \"{}\" was just purchased.", beat_title),
            notification_type: "sale".to_string(),
            related_entity_id: Some(order_id),
            related_entity_type: Some("order".to_string()),
            is_read: false,
            created_date: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub producer_id: Option<Uuid>,
    pub amount: Option<BigDecimal>,
    pub status: String,
    pub transaction_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub payout_date: Option<DateTime<Utc>>,
    pub transaction_details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
