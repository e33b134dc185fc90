//! Field mixins a model can embed with `#[serde(flatten)]`.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::identity::ObjectId;

/// Current time at the millisecond precision documents keep
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Identity stored under `_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdField {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
}

impl IdField {
    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

/// Creation and update timestamps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateFields {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DateFields {
    /// Stamp both fields with the same instant
    pub fn touch_created(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
        self.updated_at = Some(at);
    }

    /// Refresh `updated_at`, keeping it strictly increasing even when the
    /// clock has not moved past the previous value.
    pub fn touch_updated(&mut self, at: DateTime<Utc>) {
        let next = match self.updated_at {
            Some(previous) if at <= previous => previous + Duration::milliseconds(1),
            _ => at,
        };
        self.updated_at = Some(next);
    }
}

/// `IdField` plus `DateFields`, the usual embedding for a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultModel {
    #[serde(flatten)]
    pub id_field: IdField,
    #[serde(flatten)]
    pub date_fields: DateFields,
}

impl DefaultModel {
    pub fn id(&self) -> Option<ObjectId> {
        self.id_field.id()
    }

    pub fn set_id(&mut self, id: ObjectId) {
        self.id_field.set_id(id);
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.date_fields.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.date_fields.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_now_is_millisecond_precision() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_touch_created_sets_equal_fields() {
        let mut fields = DateFields::default();
        let at = now();
        fields.touch_created(at);
        assert_eq!(fields.created_at, Some(at));
        assert_eq!(fields.updated_at, fields.created_at);
    }

    #[test]
    fn test_touch_updated_is_strictly_increasing() {
        let mut fields = DateFields::default();
        let at = now();
        fields.touch_created(at);

        fields.touch_updated(at);
        assert_eq!(fields.updated_at, Some(at + Duration::milliseconds(1)));
        assert_eq!(fields.created_at, Some(at));

        let later = at + Duration::seconds(5);
        fields.touch_updated(later);
        assert_eq!(fields.updated_at, Some(later));
    }

    #[test]
    fn test_default_model_serializes_flat() {
        let id = ObjectId::parse_str("5f1a2b3c4d5e6f7a8b9c0d1e").unwrap();
        let mut base = DefaultModel::default();
        base.set_id(id);

        let value = serde_json::to_value(&base).unwrap();
        assert_eq!(value["_id"], json!("5f1a2b3c4d5e6f7a8b9c0d1e"));
        assert!(value.get("created_at").is_some());

        let back: DefaultModel = serde_json::from_value(value).unwrap();
        assert_eq!(back, base);
    }

    #[test]
    fn test_missing_id_is_skipped() {
        let value = serde_json::to_value(DefaultModel::default()).unwrap();
        assert!(value.get("_id").is_none());
        let back: DefaultModel = serde_json::from_value(json!({})).unwrap();
        assert_eq!(back.id(), None);
    }
}
