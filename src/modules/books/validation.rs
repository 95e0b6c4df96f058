//! Field rules for inbound book payloads.
//!
//! Every rule runs independently and every violation is reported. Rules on
//! optional fields only run when the field is present. Validation never
//! mutates the payload and never touches storage.

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::models::BookPayload;

pub const TITLE_MAX: usize = 200;
pub const AUTHOR_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 2000;
pub const GENRE_MAX: usize = 50;
pub const COVER_URL_MAX: usize = 500;
pub const EARLIEST_YEAR: i32 = 1000;
/// Publication years may run this far past the current year.
pub const YEARS_AHEAD: i32 = 5;
/// Raw ISBN length bounds: ten bare digits up to thirteen digits with four hyphens.
pub const ISBN_MIN_LEN: usize = 10;
pub const ISBN_MAX_LEN: usize = 17;

static ISBN_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9-]+$").unwrap());

static COVER_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(http|https)://([A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(/\S*)?$",
    )
    .unwrap()
});

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub rule: &'static str,
    pub message: String,
}

/// All rules a payload failed, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Error)]
#[serde(transparent)]
#[error("{} validation rule(s) failed", .0.len())]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    pub fn has(&self, field: &str, rule: &str) -> bool {
        self.0.iter().any(|v| v.field == field && v.rule == rule)
    }
}

/// Collects violations. `when` is the applicability guard for optional fields.
#[derive(Default)]
struct Rules {
    violations: Vec<Violation>,
}

impl Rules {
    fn check(&mut self, field: &'static str, rule: &'static str, ok: bool, message: impl FnOnce() -> String) {
        if !ok {
            self.violations.push(Violation {
                field,
                rule,
                message: message(),
            });
        }
    }

    fn required(&mut self, field: &'static str, label: &str, value: &str) {
        self.check(field, "required", !value.trim().is_empty(), || {
            format!("{label} is required.")
        });
    }

    fn max_chars(&mut self, field: &'static str, label: &str, value: &str, max: usize) {
        self.check(field, "max_length", value.chars().count() <= max, || {
            format!("{label} must not exceed {max} characters.")
        });
    }

    fn when<T>(&mut self, value: Option<T>, rules: impl FnOnce(&mut Self, T)) {
        if let Some(value) = value {
            rules(self, value);
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.violations))
        }
    }
}

/// Digits left once hyphens are removed.
pub fn isbn_digit_count(isbn: &str) -> usize {
    isbn.chars().filter(char::is_ascii_digit).count()
}

impl BookPayload {
    /// Validate against the current UTC year.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.validate_for_year(Utc::now().year())
    }

    /// Validate with an explicit "current" year bounding `publication_year`.
    pub fn validate_for_year(&self, current_year: i32) -> Result<(), ValidationErrors> {
        let mut rules = Rules::default();

        rules.check("guid", "required", !self.guid.is_nil(), || {
            "Guid is required.".to_string()
        });

        rules.required("title", "Title", &self.title);
        rules.max_chars("title", "Title", &self.title, TITLE_MAX);

        rules.required("author", "Author", &self.author);
        rules.max_chars("author", "Author", &self.author, AUTHOR_MAX);

        let isbn_len = self.isbn.chars().count();
        rules.required("isbn", "ISBN", &self.isbn);
        rules.check(
            "isbn",
            "length",
            (ISBN_MIN_LEN..=ISBN_MAX_LEN).contains(&isbn_len),
            || format!("ISBN must be between {ISBN_MIN_LEN} and {ISBN_MAX_LEN} characters."),
        );
        let digits = isbn_digit_count(&self.isbn);
        rules.check(
            "isbn",
            "format",
            ISBN_CHARS.is_match(&self.isbn) && (digits == 10 || digits == 13),
            || "ISBN must contain only digits and hyphens, with exactly 10 or 13 digits.".to_string(),
        );

        rules.when(self.description.as_deref(), |rules, description| {
            rules.max_chars("description", "Description", description, DESCRIPTION_MAX);
        });

        rules.when(self.publication_year, |rules, year| {
            let latest = current_year + YEARS_AHEAD;
            rules.check(
                "publicationYear",
                "range",
                (EARLIEST_YEAR..=latest).contains(&year),
                || format!("Publication year must be between {EARLIEST_YEAR} and {latest}."),
            );
        });

        rules.when(self.genre.as_deref(), |rules, genre| {
            rules.max_chars("genre", "Genre", genre, GENRE_MAX);
        });

        rules.when(self.cover_image_url.as_deref(), |rules, url| {
            rules.max_chars("coverImageUrl", "Cover image URL", url, COVER_URL_MAX);
            rules.check("coverImageUrl", "url", COVER_URL.is_match(url), || {
                "Cover image URL must be a valid http or https URL.".to_string()
            });
        });

        rules.finish()
    }
}
