use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    error::DbError,
    pool::{Row, SqlValue},
};

/// Vehicle model - a single vehicle of the fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    /// Unique vehicle identifier, assigned by the database and never changed
    pub id: Uuid,
    /// When the vehicle was bought
    pub purchase_date: Option<DateTime<Utc>>,
    /// Manufacturer serial number
    pub serial_number: String,
    /// Manufacturer
    pub make: String,
    /// Model name
    pub model: String,
    /// Model year
    pub year: i32,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// A vehicle that has not been stored yet.
///
/// An `id` in the incoming payload is ignored: identifiers are always assigned
/// by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub purchase_date: Option<DateTime<Utc>>,
    pub serial_number: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// Partial update of a vehicle.
///
/// Every key present in the payload overrides the stored value, including an
/// empty string. For the nullable attributes the outer `Option` tells an
/// absent key (`None`) from an explicit `null` (`Some(None)`), which clears the
/// stored value. A `null` for a required attribute counts as absent. The
/// identifier and unknown keys are never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePatch {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub purchase_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub color: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

/// Marks a key as present even when its value is `null`. Absent keys fall
/// back to the field default.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl Vehicle {
    pub(crate) fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("id")?,
            purchase_date: row.get("purchase_date")?,
            serial_number: row.get("serial_number")?,
            make: row.get("make")?,
            model: row.get("model")?,
            year: row.get("year")?,
            color: row.get("color")?,
            description: row.get("description")?,
        })
    }

    /// Apply `patch` on top of this vehicle. The identifier is kept.
    pub fn merge(self, patch: VehiclePatch) -> Self {
        Self {
            id: self.id,
            purchase_date: patch.purchase_date.unwrap_or(self.purchase_date),
            serial_number: patch.serial_number.unwrap_or(self.serial_number),
            make: patch.make.unwrap_or(self.make),
            model: patch.model.unwrap_or(self.model),
            year: patch.year.unwrap_or(self.year),
            color: patch.color.unwrap_or(self.color),
            description: patch.description.unwrap_or(self.description),
        }
    }
}

impl NewVehicle {
    /// Column values in [`VEHICLE_COLUMNS`](crate::repositories::vehicle::VEHICLE_COLUMNS) order.
    pub(crate) fn column_values(&self) -> Vec<SqlValue> {
        vec![
            self.purchase_date.into(),
            self.serial_number.clone().into(),
            self.make.clone().into(),
            self.model.clone().into(),
            self.year.into(),
            self.color.clone().into(),
            self.description.clone().into(),
        ]
    }
}

impl From<Vehicle> for NewVehicle {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            purchase_date: vehicle.purchase_date,
            serial_number: vehicle.serial_number,
            make: vehicle.make,
            model: vehicle.model,
            year: vehicle.year,
            color: vehicle.color,
            description: vehicle.description,
        }
    }
}

impl VehiclePatch {
    /// Whether the payload carried no known key at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
