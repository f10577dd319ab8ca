// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message templates.

use std::fmt::Write;

use courier_core::OrderNotificationPayload;

/// Amount with two decimals and the currency code, e.g. `150.00 ETB`.
pub fn money(amount: f64, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}

/// Admin alert for a newly placed order.
pub fn order_notification(order: &OrderNotificationPayload, currency: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "New order #{}", order.reference());
    let _ = writeln!(out);

    let customer = &order.customer;
    let _ = writeln!(out, "Customer: {}", customer.name);
    let _ = writeln!(out, "Phone: {}", customer.phone);
    if let Some(email) = customer.email.as_deref().filter(|e| !e.is_empty()) {
        let _ = writeln!(out, "Email: {email}");
    }
    if let Some(address) = customer.address.as_deref().filter(|a| !a.is_empty()) {
        let _ = writeln!(out, "Address: {address}");
    }
    let _ = writeln!(out, "Type: {}", order.order_type);
    let _ = writeln!(out);

    let _ = writeln!(out, "Items:");
    for item in &order.items {
        let _ = writeln!(
            out,
            "- {} x {} @ {} = {}",
            item.quantity,
            item.name,
            money(item.unit_price, currency),
            money(item.line_total(), currency)
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Subtotal: {}", money(order.subtotal(), currency));
    if order.delivery_cost > 0.0 {
        let _ = writeln!(out, "Delivery: {}", money(order.delivery_cost, currency));
    }
    if order.discount > 0.0 {
        let _ = writeln!(out, "Discount: -{}", money(order.discount, currency));
    }
    let _ = writeln!(out, "Total: {}", money(order.total, currency));
    let _ = writeln!(out);

    let _ = writeln!(out, "Status: {}", order.status);
    let _ = write!(
        out,
        "Placed: {}",
        order.timestamp.format("%Y-%m-%d %H:%M UTC")
    );
    out
}

/// Short customer-facing status change message.
pub fn status_update(order: &OrderNotificationPayload, old_status: &str, new_status: &str) -> String {
    format!(
        "Hello {}, your order #{} is now {} (was {}).",
        order.customer.name,
        order.reference(),
        humanize(new_status),
        humanize(old_status)
    )
}

/// Body of the connectivity test message.
pub fn test_message(sender: &str, provider: &str) -> String {
    format!("Test message from {sender}. Messaging is working (provider: {provider}).")
}

/// `out_for_delivery` becomes `out for delivery`.
fn humanize(status: &str) -> String {
    status.trim().replace(['_', '-'], " ").to_lowercase()
}
