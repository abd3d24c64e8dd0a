//! Dilution factor and replicate group inference from export filenames.
//!
//! Both lookups are soft: when the prefix is unset or absent they fall back
//! to defaults (factor 1, sample name = filename) and report `found = false`.

/// Read the dilution factor following `dilution_prefix` in `filename`.
///
/// Takes the maximal run of ASCII digits right after the first occurrence of
/// the prefix. Returns `(1, false)` when the prefix is unset, absent, not
/// followed by digits, or the digits overflow.
pub fn classify_dilution(filename: &str, dilution_prefix: Option<&str>) -> (u64, bool) {
    let Some(prefix) = dilution_prefix.filter(|p| !p.is_empty()) else {
        return (1, false);
    };
    let Some(pos) = filename.find(prefix) else {
        return (1, false);
    };

    let after = &filename[pos + prefix.len()..];
    let digits_len = after
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();

    match after[..digits_len].parse::<u64>() {
        Ok(factor) => (factor, true),
        Err(_) => (1, false),
    }
}

/// Split `filename` into its sample name and replicate suffix.
///
/// Everything after the last occurrence of `replicate_prefix` is the
/// replicate suffix; the sample name is what precedes the prefix. Returns
/// `(filename, false)` when the prefix is unset or absent.
pub fn classify_replicate(filename: &str, replicate_prefix: Option<&str>) -> (String, bool) {
    let Some(prefix) = replicate_prefix.filter(|p| !p.is_empty()) else {
        return (filename.to_string(), false);
    };
    match filename.rfind(prefix) {
        Some(pos) => (filename[..pos].to_string(), true),
        None => (filename.to_string(), false),
    }
}

/// The replicate suffix of `filename` relative to `sample_name`.
pub fn replicate_suffix<'a>(filename: &'a str, sample_name: &str) -> &'a str {
    filename.strip_prefix(sample_name).unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dilution_digits_after_prefix() {
        assert_eq!(classify_dilution("S1_dilution10_rep1", Some("dilution")), (10, true));
        assert_eq!(classify_dilution("S2_dilution5", Some("dilution")), (5, true));
        assert_eq!(classify_dilution("x_d250000y", Some("_d")), (250000, true));
    }

    #[test]
    fn test_dilution_uses_first_occurrence() {
        assert_eq!(classify_dilution("dil2_dil300", Some("dil")), (2, true));
    }

    #[test]
    fn test_dilution_defaults() {
        assert_eq!(classify_dilution("S1_dilution10", None), (1, false));
        assert_eq!(classify_dilution("S1_dilution10", Some("")), (1, false));
        assert_eq!(classify_dilution("S1_x10", Some("dilution")), (1, false));
        assert_eq!(classify_dilution("S1_dilution_10", Some("dilution")), (1, false));
        assert_eq!(
            classify_dilution("S1_dilution99999999999999999999999", Some("dilution")),
            (1, false)
        );
    }

    #[test]
    fn test_replicate_group() {
        assert_eq!(
            classify_replicate("S1_dilution10_rep1", Some("rep")),
            ("S1_dilution10_".to_string(), true)
        );
        assert_eq!(
            classify_replicate("S1_dilution10_repB", Some("rep")),
            ("S1_dilution10_".to_string(), true)
        );
    }

    #[test]
    fn test_replicate_defaults() {
        assert_eq!(
            classify_replicate("S2_dilution5", Some("rep")),
            ("S2_dilution5".to_string(), false)
        );
        assert_eq!(
            classify_replicate("S1_rep1", None),
            ("S1_rep1".to_string(), false)
        );
    }

    #[test]
    fn test_replicates_reduce_to_same_sample() {
        let (a, _) = classify_replicate("S1_rep1", Some("rep"));
        let (b, _) = classify_replicate("S1_rep2", Some("rep"));
        assert_eq!(a, b);
        assert_eq!(replicate_suffix("S1_rep2", &b), "rep2");
    }
}
