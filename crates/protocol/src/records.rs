use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Response envelope used by every one-shot endpoint.
///
/// `success = false` marks an application-level failure even when the HTTP
/// layer reported 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// A published material price for a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id: String,
    pub material: String,
    pub location: String,
    pub country: String,
    pub price: f64,
    pub currency: String,
    pub unit: String,
    #[serde(default)]
    pub change_percent: Option<f64>,
    pub updated_at: String,
}

/// A supplier listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub id: String,
    pub name: String,
    pub country: String,
    pub industry: String,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    pub verified: bool,
    pub updated_at: String,
}

/// A tracked shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: String,
    pub tracking_number: String,
    pub status: String,
    #[serde(default)]
    pub current_location: Option<serde_json::Value>,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_round_trips() {
        let value = json!({
            "data": [{"id": "p1", "material": "cement", "location": "Nairobi",
                      "country": "Kenya", "price": 85.0, "currency": "USD",
                      "unit": "ton", "updated_at": "2024-01-01T00:00:00Z"}],
            "success": true,
            "timestamp": "2024-01-01T00:00:00Z"
        });

        let envelope: ApiEnvelope<Vec<PriceRecord>> = ApiEnvelope::from_value(value).unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].material, "cement");
        assert_eq!(envelope.data[0].change_percent, None);
    }

    #[test]
    fn failure_envelope_carries_message() {
        let value = json!({"data": null, "success": false, "message": "rate limited"});
        let envelope: ApiEnvelope<Option<PriceRecord>> = ApiEnvelope::from_value(value).unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.message.as_deref(), Some("rate limited"));
    }
}
