use crate::config::LoaderConfig;

use super::error::{LoaderError, Result};

// ---------------------------------------------------------------------------
// Filename predicate
// ---------------------------------------------------------------------------

/// Whether a single filename passes the configured keyword rules.
///
/// A name passes when:
/// * it ends with `suffix`
/// * it contains at least one include keyword (case-sensitive)
/// * it does not contain `exclude_keyword` (an empty exclude excludes nothing)
/// * it contains every required keyword
pub fn is_selected(filename: &str, config: &LoaderConfig) -> bool {
    if !filename.ends_with(&config.suffix) {
        return false;
    }
    if !config
        .include_keywords
        .iter()
        .any(|k| filename.contains(k.as_str()))
    {
        return false;
    }
    if !config.exclude_keyword.is_empty() && filename.contains(&config.exclude_keyword) {
        return false;
    }
    config
        .required_keywords
        .iter()
        .all(|k| filename.contains(k.as_str()))
}

/// Keep the filenames that pass [`is_selected`], preserving their order.
/// An empty selection is an error rather than an empty dataset.
pub fn select_files(filenames: &[String], config: &LoaderConfig) -> Result<Vec<String>> {
    let selected: Vec<String> = filenames
        .iter()
        .filter(|f| is_selected(f, config))
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(LoaderError::NoMatchingFiles {
            directory: config.directory.clone(),
        });
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(include: &[&str], exclude: &str) -> LoaderConfig {
        LoaderConfig {
            include_keywords: include.iter().map(|s| s.to_string()).collect(),
            exclude_keyword: exclude.to_string(),
            suffix: ".anno.txt.gz".to_string(),
            required_keywords: Vec::new(),
            ..LoaderConfig::default()
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn keeps_order_and_applies_every_rule() {
        let input = names(&[
            "GSM1_AML419A-D0.anno.txt.gz",
            "GSM2_BM5-34p.anno.txt.gz",
            "GSM3_BM5-34p38n.anno.txt.gz",
            "GSM4_BM1.dem.txt.gz",
            "GSM5_AML420B-D0.anno.txt.gz",
            "GSM6_BM3.anno.txt.gz",
        ]);
        let cfg = config(&["BM", "AML419"], "38n");
        let selected = select_files(&input, &cfg).unwrap();
        assert_eq!(
            selected,
            names(&[
                "GSM1_AML419A-D0.anno.txt.gz",
                "GSM2_BM5-34p.anno.txt.gz",
                "GSM6_BM3.anno.txt.gz",
            ])
        );

        for name in &selected {
            assert!(input.contains(name));
            assert!(name.ends_with(&cfg.suffix));
            assert!(cfg.include_keywords.iter().any(|k| name.contains(k.as_str())));
            assert!(!name.contains(&cfg.exclude_keyword));
        }
    }

    #[test]
    fn include_match_is_case_sensitive() {
        let cfg = config(&["BM"], "38n");
        assert!(!is_selected("GSM1_bm1.anno.txt.gz", &cfg));
        assert!(is_selected("GSM1_BM1.anno.txt.gz", &cfg));
    }

    #[test]
    fn required_keywords_are_all_needed() {
        let mut cfg = config(&["BM"], "38n");
        cfg.required_keywords = vec!["-D0".to_string()];
        assert!(is_selected("GSM1_BM1-D0.anno.txt.gz", &cfg));
        assert!(!is_selected("GSM1_BM1-D7.anno.txt.gz", &cfg));
    }

    #[test]
    fn empty_exclude_excludes_nothing() {
        let cfg = config(&["BM"], "");
        assert!(is_selected("GSM1_BM1.anno.txt.gz", &cfg));
    }

    #[test]
    fn no_match_is_an_error() {
        let cfg = config(&["PB"], "38n");
        let input = names(&["GSM1_BM1.anno.txt.gz", "GSM2_PB38n.anno.txt.gz"]);
        let err = select_files(&input, &cfg).unwrap_err();
        assert!(matches!(err, LoaderError::NoMatchingFiles { .. }));

        assert!(select_files(&[], &cfg).is_err());
        assert!(select_files(&input, &config(&[], "")).is_err());
    }
}
