//! Conversion between user records and Firestore's REST document format.
//!
//! Every field value in a Firestore document is wrapped in an object naming its type,
//! like `{"stringValue": "Ana"}` or `{"doubleValue": 10.5}`. Integers are sent as
//! strings (`{"integerValue": "10"}`).

use serde::Deserialize;
use serde_json::{Map, Value, json};
use sharelocation_logic::{PositionUpdate, UserPosition};

const FIELD_NAME: &str = "nome";
const FIELD_EMAIL: &str = "email";
const FIELD_LATITUDE: &str = "latitude";
const FIELD_LONGITUDE: &str = "longitude";

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// Full resource name, ends with the document id
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPage {
    #[serde(default)]
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

/// Body and field mask for a partial write
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedUpdate {
    pub body: Value,
    pub mask: Vec<&'static str>,
}

fn string_field(value: &Value) -> Option<String> {
    value.get("stringValue")?.as_str().map(str::to_string)
}

fn number_field(value: &Value) -> Option<f64> {
    if let Some(double) = value.get("doubleValue") {
        double.as_f64()
    } else if let Some(int) = value.get("integerValue") {
        match int {
            Value::String(s) => s.parse::<i64>().ok().map(|i| i as f64),
            other => other.as_f64(),
        }
    } else {
        None
    }
}

impl Document {
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    fn string(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(string_field)
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(number_field)
    }

    /// Fields that are missing or have an unexpected type are left as `None`
    pub fn into_position(self) -> UserPosition {
        UserPosition {
            user_id: self.id().to_string(),
            display_name: self.string(FIELD_NAME),
            email: self.string(FIELD_EMAIL),
            latitude: self.number(FIELD_LATITUDE),
            longitude: self.number(FIELD_LONGITUDE),
        }
    }
}

pub fn encode_update(update: &PositionUpdate) -> EncodedUpdate {
    let mut fields = Map::new();
    let mut mask = Vec::with_capacity(4);

    if let Some(name) = &update.display_name {
        fields.insert(FIELD_NAME.to_string(), json!({ "stringValue": name }));
        mask.push(FIELD_NAME);
    }
    if let Some(email) = &update.email {
        fields.insert(FIELD_EMAIL.to_string(), json!({ "stringValue": email }));
        mask.push(FIELD_EMAIL);
    }
    if let Some(location) = update.location {
        fields.insert(
            FIELD_LATITUDE.to_string(),
            json!({ "doubleValue": location.lat }),
        );
        fields.insert(
            FIELD_LONGITUDE.to_string(),
            json!({ "doubleValue": location.long }),
        );
        mask.push(FIELD_LATITUDE);
        mask.push(FIELD_LONGITUDE);
    }

    EncodedUpdate {
        body: json!({ "fields": fields }),
        mask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharelocation_logic::Location;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).expect("Failed to parse document")
    }

    #[test]
    fn test_decode_full_record() {
        let pos = doc(json!({
            "name": "projects/demo/databases/(default)/documents/pessoa/abc123",
            "fields": {
                "nome": { "stringValue": "Ana" },
                "email": { "stringValue": "ana@example.com" },
                "latitude": { "doubleValue": 10.5 },
                "longitude": { "integerValue": "20" }
            },
            "createTime": "2024-01-01T00:00:00Z"
        }))
        .into_position();

        assert_eq!(pos.user_id, "abc123");
        assert_eq!(pos.display_name.as_deref(), Some("Ana"));
        assert_eq!(pos.email.as_deref(), Some("ana@example.com"));
        assert_eq!(pos.location(), Some(Location::new(10.5, 20.0)));
    }

    #[test]
    fn test_decode_partial_record() {
        let pos = doc(json!({
            "name": "projects/demo/databases/(default)/documents/pessoa/abc123",
            "fields": {
                "nome": { "integerValue": "5" },
                "latitude": { "doubleValue": 1.0 }
            }
        }))
        .into_position();

        assert_eq!(pos.display_name, None, "Wrong type should read as missing");
        assert_eq!(pos.latitude, Some(1.0));
        assert_eq!(pos.location(), None);

        let empty = doc(json!({ "name": "pessoa/xyz" })).into_position();
        assert_eq!(empty.user_id, "xyz");
        assert_eq!(empty.email, None);
    }

    #[test]
    fn test_encode_masks_only_set_fields() {
        let encoded = encode_update(&PositionUpdate::sentinel());
        assert_eq!(encoded.mask, vec!["latitude", "longitude"]);
        assert_eq!(
            encoded.body,
            json!({ "fields": {
                "latitude": { "doubleValue": 0.0 },
                "longitude": { "doubleValue": 0.0 }
            }})
        );

        let encoded = encode_update(&PositionUpdate::profile("Ana", "ana@example.com"));
        assert_eq!(encoded.mask, vec!["nome", "email"]);
        assert!(encoded.body["fields"].get("latitude").is_none());
    }

    #[test]
    fn test_page_without_documents() {
        let page: DocumentPage = serde_json::from_value(json!({})).unwrap();
        assert!(page.documents.is_empty());
        assert_eq!(page.next_page_token, None);

        let page: DocumentPage =
            serde_json::from_value(json!({ "nextPageToken": "next" })).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("next"));
    }
}
