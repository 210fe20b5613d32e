//! Greedy (argmax) token selection.

use crate::types::TokenId;

/// Picks the highest-scoring vocabulary entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedySelector;

impl GreedySelector {
    pub fn new() -> Self {
        Self
    }

    /// Index of the maximum score, lowest index on ties.
    ///
    /// NaN never beats a real score. Returns `None` for an empty vector; an
    /// all-NaN vector selects index 0.
    pub fn select(&self, scores: &[f32]) -> Option<TokenId> {
        if scores.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in scores.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((index, score)),
            }
        }

        let index = best.map(|(index, _)| index).unwrap_or(0);
        TokenId::try_from(index).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.1, 0.9, 0.3], 1)]
    #[case(&[5.0], 0)]
    #[case(&[-3.0, -1.0, -2.0], 1)]
    #[case(&[-1e12, -1e11], 1)]
    #[case(&[2.0, 7.0, 7.0, 1.0], 1)]
    #[case(&[7.0, 7.0, 7.0], 0)]
    #[case(&[f32::NAN, 0.5, 0.2], 1)]
    #[case(&[0.5, f32::NAN, 0.9], 2)]
    #[case(&[f32::NAN, f32::NAN], 0)]
    #[case(&[f32::NEG_INFINITY, f32::NEG_INFINITY, -1.0], 2)]
    #[case(&[1.0, f32::INFINITY, f32::INFINITY], 1)]
    fn test_select(#[case] scores: &[f32], #[case] expected: TokenId) {
        assert_eq!(GreedySelector::new().select(scores), Some(expected));
    }

    #[test]
    fn test_select_empty() {
        assert_eq!(GreedySelector::new().select(&[]), None);
    }
}
