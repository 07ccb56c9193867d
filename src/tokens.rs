/// Heuristic token accounting.
///
/// Providers tokenize differently; this uses the common approximation of
/// four characters per token, which is close enough for budgeting memory and
/// estimating spend.
pub struct TokenCalculator;

const CHARS_PER_TOKEN: usize = 4;

impl TokenCalculator {
    /// Approximate number of tokens in `text`
    pub fn count(text: &str) -> usize {
        let chars = text.chars().count();
        (chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
    }

    /// Estimated cost of `text` given a price per 1000 tokens
    pub fn estimate_cost(text: &str, price_per_1k: f64) -> f64 {
        Self::count(text) as f64 / 1000.0 * price_per_1k
    }
}
