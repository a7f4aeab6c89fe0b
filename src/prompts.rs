//! Prompt text for VLM-based spec extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the nine-field schema contract appears in
//!    exactly one place; adding a field means editing one constant, not
//!    hunting through the retry logic.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real model, making schema regressions easy to catch.
//!
//! Prompt wording is a parameter, not a design decision: the extraction
//! contract is the schema plus the retry/fallback process around the call,
//! both of which live in [`crate::pipeline::llm`].

use crate::config::PromptProfile;

/// The fixed output schema, shown to the model verbatim in every prompt.
pub const SCHEMA_EXAMPLE: &str = r#"[{"model":"...","watt":number,"cct":number,"beam":number,"lumen":number,"cri":"number or string","ip":"...","voltage":"...","price":"number or string"}]"#;

/// System prompt for full spec extraction from catalog pages.
pub const CATALOG_SYSTEM_PROMPT: &str = "\
You are a lighting-product spec extraction assistant.\n\
Output ONLY JSON — no explanations, no markdown fences.\n\
If the page contains no products, output an empty array [].";

/// System prompt for model/price pairs from tabular price screenshots.
///
/// Price lists use inconsistent headers (型號 / 牌價 / 售價 / 價格) and often
/// place two or three tables side by side on one screenshot; the model is
/// told to recognise synonyms and merge every table it sees.
pub const PRICE_TABLE_SYSTEM_PROMPT: &str = "\
You are a lighting price-list extraction assistant. Extract every model/price \
pair from the image.\n\
The model-code and price column headers vary (型號, 牌價, 售價, 價格, Model, \
Price) — treat synonyms as the same column.\n\
If the image contains several tables (side-by-side columns or sections), \
extract and merge all of them.\n\
For prices: remove currency symbols and thousands separators, output a bare \
number. If a price reads 時價, 面議, 洽詢 or similar, output \"時價\" as the \
price value.\n\
Output ONLY a JSON array, no explanations. \
Example: [{\"model\":\"LED-1234\",\"price\":1999},{\"model\":\"LED-5678\",\"price\":\"時價\"}]";

/// Build the user message for a text-grounded extraction attempt.
///
/// `text` must already be truncated to the configured character budget.
pub fn text_user_prompt(profile: PromptProfile, unit: usize, text: &str) -> String {
    match profile {
        PromptProfile::Catalog => format!(
            "Extract the product specs from the following text as a JSON array:\n\
             {SCHEMA_EXAMPLE}\n\n\
             Unit {unit} content:\n{text}"
        ),
        PromptProfile::PriceTable => format!(
            "Extract every model/price pair from the following text. \
             Output a JSON array; if there is no data, output [].\n\n\
             Unit {unit} content:\n{text}"
        ),
    }
}

/// The user message for a vision-grounded extraction attempt.
pub fn vision_user_prompt(profile: PromptProfile) -> String {
    match profile {
        PromptProfile::Catalog => format!(
            "Read the lighting product specs from the image and output a JSON array:\n\
             {SCHEMA_EXAMPLE}\n\
             If there are no products, output []."
        ),
        PromptProfile::PriceTable => {
            "Extract every model and its price from all tables in the image; \
             if there is no data, output []."
                .to_string()
        }
    }
}

/// The system prompt shared by both attempts of a profile.
pub fn system_prompt(profile: PromptProfile) -> &'static str {
    match profile {
        PromptProfile::Catalog => CATALOG_SYSTEM_PROMPT,
        PromptProfile::PriceTable => PRICE_TABLE_SYSTEM_PROMPT,
    }
}

// ── Keyword classification ───────────────────────────────────────────────

/// System prompt for the optional series/model keyword classification.
pub const CLASSIFY_SYSTEM_PROMPT: &str =
    "You classify lighting-catalog search keywords. Answer with exactly one \
     word: 'series' or 'model'.";

/// Build the user message for keyword classification.
pub fn classify_user_prompt(keyword: &str) -> String {
    format!("Is the following input a lighting product *series name* or a *model code*? {keyword}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_all_nine_fields() {
        for field in ["model", "watt", "cct", "beam", "lumen", "cri", "ip", "voltage", "price"] {
            assert!(
                SCHEMA_EXAMPLE.contains(&format!("\"{field}\"")),
                "schema missing field {field}"
            );
        }
    }

    #[test]
    fn text_prompt_embeds_unit_and_content() {
        let prompt = text_user_prompt(PromptProfile::Catalog, 3, "LED-10 10W 3000K");
        assert!(prompt.contains("Unit 3"));
        assert!(prompt.contains("LED-10 10W 3000K"));
        assert!(prompt.contains(SCHEMA_EXAMPLE));
    }

    #[test]
    fn price_table_prompt_names_header_synonyms() {
        assert!(PRICE_TABLE_SYSTEM_PROMPT.contains("牌價"));
        assert!(PRICE_TABLE_SYSTEM_PROMPT.contains("時價"));
    }
}
