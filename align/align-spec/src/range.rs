//! Layer range expressions.

use std::collections::BTreeSet;

use crate::{SpecError, SpecResult};

/// Parse a layer range expression such as `"3,5-7,12"` into the set of
/// named layers. The empty string parses to the empty set.
///
/// # Errors
///
/// [`SpecError::BadRange`] for malformed pieces or descending ranges.
pub fn parse_layer_range(text: &str) -> SpecResult<BTreeSet<i64>> {
    let mut layers = BTreeSet::new();
    let bad = || SpecError::BadRange {
        text: text.to_string(),
    };
    for piece in text.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = piece.split_once('-') {
            let lo: i64 = lo.trim().parse().map_err(|_| bad())?;
            let hi: i64 = hi.trim().parse().map_err(|_| bad())?;
            if hi < lo {
                return Err(bad());
            }
            layers.extend(lo..=hi);
        } else {
            layers.insert(piece.parse().map_err(|_| bad())?);
        }
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_expression_is_empty_set() {
        assert!(parse_layer_range("").unwrap().is_empty());
        assert!(parse_layer_range(" , ").unwrap().is_empty());
    }

    #[test]
    fn singles_and_ranges_combine() {
        let set = parse_layer_range("3,5-7,12").unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![3, 5, 6, 7, 12]);
    }

    #[test]
    fn overlaps_are_deduplicated() {
        let set = parse_layer_range("1-3,2-4").unwrap();
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn malformed_pieces_are_rejected()  {
        assert!(parse_layer_range("a").is_err());
        assert!(parse_layer_range("5-3").is_err());
        assert!(parse_layer_range("1-").is_err());
    }
}
