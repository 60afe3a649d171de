use chrono::{DateTime, Utc};
use fleet_db::{NewVehicle, VehiclePatch};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, INVALID_VEHICLE_ID, MISSING_REQUIRED_FIELD, NO_VALID_FIELDS};

/// Body of `POST /api/vehicles`.
///
/// Required fields are optional here so that a missing field turns into a
/// validation error instead of a JSON rejection.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddVehicleRequest {
    pub purchase_date: Option<DateTime<Utc>>,
    #[validate(required, length(min = 1))]
    pub serial_number: Option<String>,
    #[validate(required, length(min = 1))]
    pub make: Option<String>,
    #[validate(required, length(min = 1))]
    pub model: Option<String>,
    #[validate(required, range(min = 1))]
    pub year: Option<i32>,
    pub color: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<AddVehicleRequest> for NewVehicle {
    type Error = ApiError;

    fn try_from(request: AddVehicleRequest) -> Result<Self, Self::Error> {
        request.validate()?;

        let missing = || ApiError::Validation(MISSING_REQUIRED_FIELD.to_string());
        Ok(Self {
            purchase_date: request.purchase_date,
            serial_number: request.serial_number.ok_or_else(missing)?,
            make: request.make.ok_or_else(missing)?,
            model: request.model.ok_or_else(missing)?,
            year: request.year.ok_or_else(missing)?,
            color: request.color,
            description: request.description,
        })
    }
}

/// Check the body of `PUT /api/vehicles/{id}`.
///
/// At least one known attribute must carry a non-empty value (not `null`, an
/// empty string or a zero year). The patch itself is passed on unchanged, so
/// an empty string or a `null` next to a valid field still overrides.
pub fn validate_update(patch: VehiclePatch) -> Result<VehiclePatch, ApiError> {
    let text = |value: &Option<String>| value.as_deref().is_some_and(|s| !s.is_empty());
    let nullable_text = |value: &Option<Option<String>>| value.as_ref().is_some_and(text);

    let has_valid_field = patch.purchase_date.flatten().is_some()
        || text(&patch.serial_number)
        || text(&patch.make)
        || text(&patch.model)
        || patch.year.is_some_and(|year| year != 0)
        || nullable_text(&patch.color)
        || nullable_text(&patch.description);

    if has_valid_field {
        Ok(patch)
    } else {
        Err(ApiError::Validation(NO_VALID_FIELDS.to_string()))
    }
}

/// Parse a vehicle id taken from the request path.
pub fn parse_vehicle_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::Validation(INVALID_VEHICLE_ID.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn add_request(value: serde_json::Value) -> AddVehicleRequest {
        serde_json::from_value(value).unwrap()
    }

    fn validation_message(err: ApiError) -> String {
        match err {
            ApiError::Validation(message) => message,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_add_request_requires_fields() {
        let complete = json!({
            "serialNumber": "SN-1",
            "make": "Volvo",
            "model": "240",
            "year": 1988,
        });
        assert!(NewVehicle::try_from(add_request(complete.clone())).is_ok());

        for field in ["serialNumber", "make", "model", "year"] {
            let mut body = complete.clone();
            body.as_object_mut().unwrap().remove(field);
            let err = NewVehicle::try_from(add_request(body)).unwrap_err();
            assert_eq!(validation_message(err), MISSING_REQUIRED_FIELD, "missing {field}");
        }
    }

    #[test]
    fn test_add_request_rejects_empty_values() {
        let body = json!({
            "serialNumber": "",
            "make": "Volvo",
            "model": "240",
            "year": 1988,
        });
        let err = NewVehicle::try_from(add_request(body)).unwrap_err();
        assert_eq!(validation_message(err), MISSING_REQUIRED_FIELD);

        let body = json!({
            "serialNumber": "SN-1",
            "make": "Volvo",
            "model": "240",
            "year": 0,
        });
        assert!(NewVehicle::try_from(add_request(body)).is_err());
    }

    fn patch(value: serde_json::Value) -> VehiclePatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_update_without_valid_fields_is_rejected() {
        let body = json!({
            "id": Uuid::new_v4(),
            "extra": "An Extra Field",
            "make": "",
            "year": 0,
            "color": null,
        });

        let err = validate_update(patch(body)).unwrap_err();
        assert_eq!(validation_message(err), NO_VALID_FIELDS);
    }

    #[test]
    fn test_update_keeps_present_keys_unchanged() {
        let body = json!({ "make": "Saab", "color": "", "description": null });

        let validated = validate_update(patch(body.clone())).unwrap();

        assert_eq!(validated, patch(body));
        assert_eq!(validated.color, Some(Some(String::new())));
        assert_eq!(validated.description, Some(None));
    }

    #[test]
    fn test_parse_vehicle_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_vehicle_id(&id.to_string()).unwrap(), id);
        assert_eq!(
            validation_message(parse_vehicle_id("not-a-uuid").unwrap_err()),
            INVALID_VEHICLE_ID
        );
    }
}
