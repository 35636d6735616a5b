//! Input validation utilities

use crate::constants::{MAX_COOLDOWN_DAYS, MAX_PROMOTION_NAME_LENGTH};

/// Validate a two-letter uppercase country ISO code
pub fn validate_country_iso(country: &str) -> Result<(), &'static str> {
    if country.len() != 2 {
        return Err("Country ISO code must be exactly 2 characters");
    }
    if !country.chars().all(|c| c.is_ascii_uppercase()) {
        return Err("Country ISO code must be uppercase letters");
    }
    Ok(())
}

/// Validate a promotion name
pub fn validate_promotion_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Promotion name cannot be empty");
    }
    if trimmed.len() > MAX_PROMOTION_NAME_LENGTH as usize {
        return Err("Promotion name is too long");
    }
    Ok(())
}

/// Validate a cooldown in days
pub fn validate_cooldown_days(days: i32) -> Result<(), &'static str> {
    if days < 0 {
        return Err("Cooldown days cannot be negative");
    }
    if days > MAX_COOLDOWN_DAYS {
        return Err("Cooldown days exceed the maximum");
    }
    Ok(())
}

/// Validate a tier level
pub fn validate_tier_level(level: i32) -> Result<(), &'static str> {
    if level < 1 {
        return Err("Tier level must be at least 1");
    }
    Ok(())
}

/// Sanitize string input (remove control characters, trim whitespace)
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}
