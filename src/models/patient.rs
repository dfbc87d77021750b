use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A patient demographic record. Unique per practice by `id_number`
/// (national ID or passport). Never hard-deleted in the normal flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub practice_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub address: String,
    pub phone: String,
    pub email: Option<String>,
    pub id_number: String,
    /// Free-form medical history, stored as JSON text when supplied
    /// by the structured registration shape.
    pub medical_history: Option<serde_json::Value>,
    pub insurance: Option<serde_json::Value>,
    pub has_file: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Structured address from the newer registration payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
}

impl StructuredAddress {
    /// Collapse to the single-line form the legacy schema stores.
    pub fn to_line(&self) -> String {
        [&self.street, &self.city, &self.province, &self.postal_code]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// The two historical registration payload shapes, accepted side by side:
/// the legacy flat form sends `address` as a plain string, the newer form
/// sends a structured object. Both normalize to one stored line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressField {
    Line(String),
    Structured(StructuredAddress),
}

impl AddressField {
    pub fn to_line(&self) -> String {
        match self {
            AddressField::Line(s) => s.trim().to_string(),
            AddressField::Structured(a) => a.to_line(),
        }
    }
}

/// Registration/update payload covering both endpoint shapes, kept side
/// by side for client compatibility. `phone` and `phoneNumber` are aliases.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPayload {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    #[serde(alias = "phoneNumber")]
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<AddressField>,
    pub id_number: Option<String>,
    pub medical_history: Option<serde_json::Value>,
    pub insurance: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_shape_deserializes() {
        let payload: PatientPayload = serde_json::from_str(
            r#"{
                "firstName": "Anna",
                "lastName": "Botha",
                "dateOfBirth": "1990-01-01",
                "phoneNumber": "0821234567",
                "address": "12 Main Rd, Cape Town",
                "idNumber": "9001015009087"
            }"#,
        )
        .unwrap();

        assert_eq!(payload.phone.as_deref(), Some("0821234567"));
        assert_eq!(
            payload.address.unwrap().to_line(),
            "12 Main Rd, Cape Town"
        );
    }

    #[test]
    fn nested_shape_deserializes() {
        let payload: PatientPayload = serde_json::from_str(
            r#"{
                "firstName": "Anna",
                "lastName": "Botha",
                "dateOfBirth": "1990-01-01",
                "phone": "0821234567",
                "address": {"street": "12 Main Rd", "city": "Cape Town", "postalCode": "8001"},
                "idNumber": "9001015009087",
                "medicalHistory": {"allergies": ["penicillin"]},
                "insurance": {"provider": "Discovery"}
            }"#,
        )
        .unwrap();

        assert_eq!(
            payload.address.unwrap().to_line(),
            "12 Main Rd, Cape Town, 8001"
        );
        assert!(payload.medical_history.is_some());
        assert!(payload.insurance.is_some());
    }

    #[test]
    fn structured_address_skips_empty_parts() {
        let addr = StructuredAddress {
            street: Some("12 Main Rd".into()),
            city: None,
            province: Some("  ".into()),
            postal_code: Some("8001".into()),
        };
        assert_eq!(addr.to_line(), "12 Main Rd, 8001");
    }

    #[test]
    fn patient_serializes_without_practice_id() {
        let now = chrono::Utc::now().naive_utc();
        let patient = Patient {
            id: Uuid::new_v4(),
            practice_id: Uuid::new_v4(),
            first_name: "Anna".into(),
            last_name: "Botha".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: None,
            address: "12 Main Rd".into(),
            phone: "0821234567".into(),
            email: None,
            id_number: "9001015009087".into(),
            medical_history: None,
            insurance: None,
            has_file: false,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&patient).unwrap();
        assert!(json.get("practiceId").is_none());
        assert_eq!(json["idNumber"], "9001015009087");
    }
}
