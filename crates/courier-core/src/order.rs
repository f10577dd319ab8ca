// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order records handed to the dispatcher by the order-creation flow.
//!
//! These are read-only inputs; the gateway never persists them. Field names
//! follow the storefront's JSON (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer details attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// One purchased line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl LineItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Order data used to build notification and invoice messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotificationPayload {
    pub order_id: String,
    #[serde(default)]
    pub display_id: Option<String>,
    pub customer: CustomerInfo,
    pub items: Vec<LineItem>,
    pub total: f64,
    #[serde(default)]
    pub delivery_cost: f64,
    #[serde(default)]
    pub discount: f64,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    #[serde(rename = "type", default = "default_order_type")]
    pub order_type: String,
}

fn default_order_type() -> String {
    "delivery".to_string()
}

impl OrderNotificationPayload {
    /// The identifier shown to humans: the display id when present.
    pub fn reference(&self) -> &str {
        self.display_id.as_deref().unwrap_or(&self.order_id)
    }

    /// Sum of line totals before delivery and discount.
    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(LineItem::line_total).sum()
    }
}
