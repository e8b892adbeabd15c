// URL-safe slug generation with collision detection

use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::select;
use diesel_async::RunQueryDsl;
use rand::{thread_rng, Rng};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::db::DieselPool;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Hex characters appended to every slug to avoid collisions
const SLUG_SUFFIX_LEN: usize = 6;
/// Attempts before giving up on a unique slug
const MAX_SLUG_ATTEMPTS: usize = 5;
/// Hard cap on the base portion, suffix excluded
const MAX_BASE_LEN: usize = 120;

// =============================================================================
// ERROR TYPES
// =============================================================================

#[derive(Error, Debug)]
pub enum SlugError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),

    #[error("Cannot build a slug from empty input")]
    EmptySource,

    #[error("Failed to generate unique slug after {attempts} attempts")]
    GenerationExhausted { attempts: usize },
}

// =============================================================================
// SLUG GENERATOR
// =============================================================================

pub struct SlugGenerator {
    pool: DieselPool,
}

impl SlugGenerator {
    pub fn new(pool: DieselPool) -> Self {
        Self { pool }
    }

    /// Build a unique listing slug from product and route, e.g.
    /// "soja de sorriso para paranagua" becomes "soja-de-sorriso-para-paranagua-3fa9c1".
    #[instrument(skip(self))]
    pub async fn generate_freight_slug(
        &self,
        product: &str,
        origin_city: &str,
        dest_city: &str,
    ) -> Result<String, SlugError> {
        let base = slugify(&format!("{} de {} para {}", product, origin_city, dest_city));
        if base.is_empty() {
            return Err(SlugError::EmptySource);
        }

        for attempt in 0..MAX_SLUG_ATTEMPTS {
            let candidate = format!("{}-{}", base, random_hex_suffix());

            if self.is_slug_taken(&candidate).await? {
                warn!(
                    "Slug collision detected: {} (attempt: {})",
                    candidate,
                    attempt + 1
                );
                continue;
            }

            info!(
                "Generated freight slug: {} (attempts: {})",
                candidate,
                attempt + 1
            );
            return Ok(candidate);
        }

        Err(SlugError::GenerationExhausted {
            attempts: MAX_SLUG_ATTEMPTS,
        })
    }

    /// Check the freights table for an existing slug
    async fn is_slug_taken(&self, candidate: &str) -> Result<bool, SlugError> {
        use crate::schema::freights::dsl::*;

        let mut conn = self.pool.get().await.map_err(|e| {
            SlugError::DatabaseError(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UnableToSendCommand,
                Box::new(e.to_string()),
            ))
        })?;

        let taken: bool = select(exists(freights.filter(slug.eq(candidate))))
            .get_result(&mut conn)
            .await?;

        Ok(taken)
    }
}

/// Random lowercase hex suffix
fn random_hex_suffix() -> String {
    let mut rng = thread_rng();
    (0..SLUG_SUFFIX_LEN)
        .map(|_| {
            let digit = rng.gen_range(0..16u8);
            char::from_digit(digit as u32, 16).unwrap_or('0')
        })
        .collect()
}

/// Lowercase, fold Portuguese diacritics, map everything else to hyphens
/// and collapse runs. Output is ASCII `[a-z0-9-]`.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_hyphen = true; // Suppress leading hyphens

    for ch in input.chars().flat_map(fold_diacritic) {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() {
            out.push(lower);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            out.push('-');
            last_was_hyphen = true;
        }

        if out.len() >= MAX_BASE_LEN {
            break;
        }
    }

    while out.ends_with('-') {
        out.pop();
    }

    out
}

/// Map accented characters common in Brazilian place and product names
/// down to their ASCII base letter. Unknown non-ASCII characters are dropped.
fn fold_diacritic(ch: char) -> Option<char> {
    let folded = match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ç' | 'Ç' => 'c',
        'ñ' | 'Ñ' => 'n',
        c if c.is_ascii() => c,
        _ => return None,
    };
    Some(folded)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_folds_diacritics() {
        assert_eq!(
            slugify("Soja de São Paulo para Paranaguá"),
            "soja-de-sao-paulo-para-paranagua"
        );
        assert_eq!(slugify("Açúcar Cristal"), "acucar-cristal");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  milho --  graos  "), "milho-graos");
        assert_eq!(slugify("a/b\\c"), "a-b-c");
    }

    #[test]
    fn test_slugify_drops_unknown_symbols() {
        assert_eq!(slugify("frete 🚛 urgente"), "frete-urgente");
    }

    #[test]
    fn test_slugify_empty_input() {
        assert_eq!(slugify("   "), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_random_suffix_shape() {
        for _ in 0..20 {
            let suffix = random_hex_suffix();
            assert_eq!(suffix.len(), SLUG_SUFFIX_LEN);
            assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
