use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::money::check_price;
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub capacity: i32,
    pub price_per_hour: Decimal,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VenueRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(range(min = 1))]
    pub capacity: i32,
    #[serde(default)]
    pub price_per_hour: Decimal,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 30))]
    pub contact_phone: Option<String>,
    pub is_active: Option<bool>,
}

impl VenueRequest {
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        check_price("pricePerHour", self.price_per_hour)
    }

    pub fn into_venue(self, now: DateTime<Utc>) -> Venue {
        Venue {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            address: self.address,
            city: self.city,
            capacity: self.capacity,
            price_per_hour: self.price_per_hour,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            is_active: self.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_to(self, venue: &mut Venue, now: DateTime<Utc>) {
        venue.name = self.name;
        venue.description = self.description;
        venue.address = self.address;
        venue.city = self.city;
        venue.capacity = self.capacity;
        venue.price_per_hour = self.price_per_hour;
        venue.contact_email = self.contact_email;
        venue.contact_phone = self.contact_phone;
        if let Some(active) = self.is_active {
            venue.is_active = active;
        }
        venue.updated_at = now;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// Outcome of a venue delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VenueRemoval {
    Deleted,
    Deactivated,
}

impl Venue {
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.address.to_lowercase().contains(&needle)
            || self.city.to_lowercase().contains(&needle)
    }
}
