//! # Scan Input Handling
//!
//! Validation of raw scanner/keyboard input and the `count*barcode` bulk
//! shorthand, run before anything reaches the matcher.
//!
//! Several flows accept `12*0899123` from the keyboard wedge to enter twelve
//! units in one keystroke burst; a plain barcode means one unit.

use crate::error::ValidationError;
use crate::matcher::ScanEvent;
use crate::types::ReferenceItem;
use crate::MAX_SCAN_QUANTITY;

/// Maximum barcode length accepted from input.
pub const MAX_BARCODE_LEN: usize = 64;

/// Validates a bare barcode string.
pub fn validate_barcode(barcode: &str) -> Result<(), ValidationError> {
    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }
    if barcode.len() > MAX_BARCODE_LEN {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: MAX_BARCODE_LEN,
        });
    }
    if barcode.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "contains whitespace".to_string(),
        });
    }
    Ok(())
}

/// Validates a scan quantity.
pub fn validate_quantity(qty: i64) -> Result<(), ValidationError> {
    if qty < 1 || qty > MAX_SCAN_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_SCAN_QUANTITY,
        });
    }
    Ok(())
}

/// Parses raw scan input into a [`ScanEvent`].
///
/// - `"0899123"` -> one unit of barcode `0899123`
/// - `"12*0899123"` -> twelve units (bulk shorthand)
///
/// Surrounding whitespace is trimmed (keyboard wedges append CR).
pub fn parse_scan_input(input: &str) -> Result<ScanEvent, ValidationError> {
    let input = input.trim();

    let (qty, barcode) = match input.split_once('*') {
        Some((count, barcode)) => {
            let qty = count.trim().parse::<i64>().map_err(|_| ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: format!("'{}' is not a number", count.trim()),
            })?;
            (qty, barcode.trim())
        }
        None => (1, input),
    };

    validate_quantity(qty)?;
    validate_barcode(barcode)?;
    Ok(ScanEvent::bulk(barcode, qty))
}

/// Validates one downloaded reference row before it may enter the store.
///
/// Run over the full snapshot ahead of the swap, so a bad payload is refused
/// before any local data is touched.
pub fn validate_reference_item(item: &ReferenceItem) -> Result<(), ValidationError> {
    validate_barcode(&item.barcode)?;
    if item.sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }
    if item.list_price.is_negative() {
        return Err(ValidationError::NegativePrice {
            field: "list_price".to_string(),
        });
    }
    if item.special_price.is_some_and(|p| p.is_negative()) {
        return Err(ValidationError::NegativePrice {
            field: "special_price".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
