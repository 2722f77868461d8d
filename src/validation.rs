use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;
use uuid::Uuid;

use crate::{
    dto::recipes::IngredientAmount,
    error::{AppError, AppResult},
};

pub const MAX_NAME_LEN: usize = 200;
pub const MAX_USER_FIELD_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MIN_AMOUNT: i32 = 1;
pub const MAX_AMOUNT: i32 = 32767;
pub const DEFAULT_TAG_COLOR: &str = "#ffffff";

static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$").unwrap());
static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap());
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

pub fn validate_hex_color(color: &str) -> AppResult<()> {
    if HEX_COLOR_RE.is_match(color) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "'{color}' is not a HEX colour"
        )))
    }
}

pub fn validate_slug(slug: &str) -> AppResult<()> {
    if slug.len() <= MAX_NAME_LEN && SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "slug may only contain letters, digits, hyphens and underscores",
        ))
    }
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if email.len() <= MAX_EMAIL_LEN && EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::bad_request("Enter a valid email address"))
    }
}

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.chars().count() <= MAX_USER_FIELD_LEN && USERNAME_RE.is_match(username) {
        Ok(())
    } else {
        Err(AppError::bad_request(
            "username may only contain letters, digits and @/./+/-/_",
        ))
    }
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 8 {
        return Err(AppError::bad_request(
            "password must be at least 8 characters long",
        ));
    }
    Ok(())
}

/// Non-empty and at most `max` characters.
pub fn validate_text(field: &str, value: &str, max: Option<usize>) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("{field} must not be empty")));
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(AppError::bad_request(format!(
                "{field} must be at most {max} characters"
            )));
        }
    }
    Ok(())
}

pub fn validate_cooking_time(minutes: i32) -> AppResult<()> {
    if (MIN_AMOUNT..=MAX_AMOUNT).contains(&minutes) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!(
            "cooking_time must be between {MIN_AMOUNT} and {MAX_AMOUNT} minutes"
        )))
    }
}

/// Every amount must be positive and each ingredient may appear once.
pub fn validate_recipe_ingredients(ingredients: &[IngredientAmount]) -> AppResult<()> {
    if ingredients.is_empty() {
        return Err(AppError::bad_request(
            "a recipe needs at least one ingredient",
        ));
    }
    let mut seen = HashSet::with_capacity(ingredients.len());
    for item in ingredients {
        if item.amount < MIN_AMOUNT {
            return Err(AppError::bad_request("amount cannot be less than 1"));
        }
        if item.amount > MAX_AMOUNT {
            return Err(AppError::bad_request(format!(
                "amount cannot be greater than {MAX_AMOUNT}"
            )));
        }
        if !seen.insert(item.id) {
            return Err(AppError::bad_request(
                "the same ingredient cannot be added to a recipe twice",
            ));
        }
    }
    Ok(())
}

/// Collapse repeated tag ids, keeping first-seen order.
pub fn dedup_tags(tags: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(tags.len());
    tags.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Uuid, amount: i32) -> IngredientAmount {
        IngredientAmount { id, amount }
    }

    #[test]
    fn accepts_short_and_long_hex_colors() {
        assert!(validate_hex_color("#fff").is_ok());
        assert!(validate_hex_color("#2200FE").is_ok());
    }

    #[test]
    fn rejects_malformed_colors() {
        for color in ["fff", "#ffff", "#gggggg", "#1234567", ""] {
            assert!(validate_hex_color(color).is_err(), "{color} should fail");
        }
    }

    #[test]
    fn slug_rejects_spaces() {
        assert!(validate_slug("breakfast_1").is_ok());
        assert!(validate_slug("late dinner").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn username_and_email_formats() {
        assert!(validate_username("chef.anna+1@home").is_ok());
        assert!(validate_username("chef anna").is_err());
        assert!(validate_email("anna@example.com").is_ok());
        assert!(validate_email("anna.example.com").is_err());
        assert!(validate_email("anna@localhost").is_err());
    }

    #[test]
    fn rejects_duplicate_ingredients() {
        let id = Uuid::new_v4();
        let err = validate_recipe_ingredients(&[item(id, 1), item(id, 3)]).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(validate_recipe_ingredients(&[item(Uuid::new_v4(), 0)]).is_err());
        assert!(validate_recipe_ingredients(&[item(Uuid::new_v4(), -5)]).is_err());
        assert!(validate_recipe_ingredients(&[item(Uuid::new_v4(), MAX_AMOUNT + 1)]).is_err());
    }

    #[test]
    fn accepts_distinct_positive_ingredients() {
        let items = [item(Uuid::new_v4(), 1), item(Uuid::new_v4(), MAX_AMOUNT)];
        assert!(validate_recipe_ingredients(&items).is_ok());
    }

    #[test]
    fn empty_ingredient_list_is_rejected() {
        assert!(validate_recipe_ingredients(&[]).is_err());
    }

    #[test]
    fn cooking_time_bounds() {
        assert!(validate_cooking_time(0).is_err());
        assert!(validate_cooking_time(1).is_ok());
        assert!(validate_cooking_time(MAX_AMOUNT + 1).is_err());
    }

    #[test]
    fn dedup_tags_keeps_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(dedup_tags(&[a, b, a, b]), vec![a, b]);
    }

    #[test]
    fn text_limits() {
        assert!(validate_text("name", "   ", Some(10)).is_err());
        assert!(validate_text("name", "Borscht", Some(10)).is_ok());
        assert!(validate_text("name", &"x".repeat(11), Some(10)).is_err());
        assert!(validate_text("text", &"x".repeat(5000), None).is_ok());
    }
}
