use super::error::{LoaderError, Result};

/// Donor identifier encoded in a filename of the form
/// `<prefix>_<donor>-<tag>...`, e.g. `GSM3587954_AML419A-D0.anno.txt.gz`
/// gives `AML419A`.
pub fn derive_identifier(filename: &str) -> Result<String> {
    let malformed = || LoaderError::MalformedFilename {
        filename: filename.to_string(),
    };

    let segment = filename.split('_').nth(1).ok_or_else(malformed)?;
    let donor = segment.split('-').next().unwrap_or_default();
    if donor.is_empty() {
        return Err(malformed());
    }
    Ok(donor.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_sample_name() {
        assert_eq!(
            derive_identifier("GSM3587954_AML419A-D0.anno.txt.gz").unwrap(),
            "AML419A"
        );
        assert_eq!(derive_identifier("A_X1-D0.anno.txt.gz").unwrap(), "X1");
    }

    #[test]
    fn no_dash_takes_whole_segment() {
        assert_eq!(derive_identifier("GSM1_BM5_extra.anno.txt.gz").unwrap(), "BM5");
        assert_eq!(derive_identifier("GSM1_BM5.anno.txt.gz").unwrap(), "BM5.anno.txt.gz");
    }

    #[test]
    fn malformed_names() {
        for name in ["malformed.txt.gz", "GSM1_-D0.anno.txt.gz", "GSM1_"] {
            let err = derive_identifier(name).unwrap_err();
            assert!(
                matches!(err, LoaderError::MalformedFilename { ref filename } if filename == name),
                "{name}: {err}"
            );
        }
    }
}
