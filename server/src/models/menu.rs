use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::money::check_price;
use crate::utils::error::Result;

/// A catering item. Without an `event_id` it is a catalog entry not yet offered at any event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_per_person: Decimal,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub is_gluten_free: bool,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MenuRequest {
    pub event_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub price_per_person: Decimal,
    #[serde(default)]
    pub is_vegetarian: bool,
    #[serde(default)]
    pub is_vegan: bool,
    #[serde(default)]
    pub is_gluten_free: bool,
    pub is_available: Option<bool>,
}

impl MenuRequest {
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        check_price("pricePerPerson", self.price_per_person)
    }

    pub fn into_menu(self, now: DateTime<Utc>) -> Menu {
        Menu {
            id: Uuid::new_v4(),
            event_id: self.event_id,
            name: self.name,
            description: self.description,
            category: self.category,
            price_per_person: self.price_per_person,
            // vegan implies vegetarian
            is_vegetarian: self.is_vegetarian || self.is_vegan,
            is_vegan: self.is_vegan,
            is_gluten_free: self.is_gluten_free,
            is_available: self.is_available.unwrap_or(true),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_to(self, menu: &mut Menu, now: DateTime<Utc>) {
        menu.event_id = self.event_id;
        menu.name = self.name;
        menu.description = self.description;
        menu.category = self.category;
        menu.price_per_person = self.price_per_person;
        menu.is_vegetarian = self.is_vegetarian || self.is_vegan;
        menu.is_vegan = self.is_vegan;
        menu.is_gluten_free = self.is_gluten_free;
        if let Some(available) = self.is_available {
            menu.is_available = available;
        }
        menu.updated_at = now;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuAssignRequest {
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuQuery {
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub available_only: bool,
}
