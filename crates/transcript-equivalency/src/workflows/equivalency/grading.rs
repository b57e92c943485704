/// Scale every grade is projected onto before scoring.
pub const COMMON_SCALE: f64 = 20.0;

/// Project a grade onto the 0-20 scale.
///
/// Grades already on the common scale are returned untouched. Out-of-range input (negative,
/// or above `scale`) is not clamped; callers treat such results as a data-quality signal.
pub fn normalize_grade(raw_grade: f64, scale: f64) -> f64 {
    if scale == COMMON_SCALE {
        return raw_grade;
    }
    raw_grade / scale * COMMON_SCALE
}

/// Comparison key for transcript labels: zero-width characters and BOMs removed, whitespace
/// collapsed, lower-cased.
pub fn normalize_label(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_scale_grades_pass_through() {
        for grade in [0.0, 7.25, 13.333_333, 20.0, -3.0, 27.5] {
            assert_eq!(normalize_grade(grade, COMMON_SCALE), grade);
        }
    }

    #[test]
    fn other_scales_are_projected_linearly() {
        assert_eq!(normalize_grade(80.0, 100.0), 16.0);
        assert_eq!(normalize_grade(10.0, 10.0), 20.0);
        assert_eq!(normalize_grade(3.0, 4.0), 15.0);
    }

    #[test]
    fn malformed_grades_are_not_clamped() {
        assert_eq!(normalize_grade(-10.0, 100.0), -2.0);
        assert_eq!(normalize_grade(120.0, 100.0), 24.0);
    }

    #[test]
    fn labels_compare_on_collapsed_lowercase() {
        assert_eq!(normalize_label("\u{feff}Algèbre   Linéaire"), "algèbre linéaire");
        assert_eq!(normalize_label(" Probabilités\u{200b} "), "probabilités");
    }
}
