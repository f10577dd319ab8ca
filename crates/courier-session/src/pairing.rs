// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Terminal rendering of pairing codes.

use courier_core::CourierError;
use qrcode::QrCode;
use qrcode::render::unicode;

/// Render `code` as a QR made of unicode half blocks, two modules per character row.
///
/// Colors are inverted so the code scans on dark terminals.
pub fn render_qr(code: &str) -> Result<String, CourierError> {
    let qr = QrCode::new(code.as_bytes())
        .map_err(|e| CourierError::Internal(format!("pairing code cannot be encoded as QR: {e}")))?;
    Ok(qr
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}
