use serde::{Deserialize, Serialize};

/// Academic standing derived from GPA. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AcademicRank {
    Excellent,
    Good,
    Fair,
    Average,
    Weak,
}

impl AcademicRank {
    pub const ALL: [AcademicRank; 5] = [
        AcademicRank::Excellent,
        AcademicRank::Good,
        AcademicRank::Fair,
        AcademicRank::Average,
        AcademicRank::Weak,
    ];

    pub fn from_gpa(gpa: f64) -> Self {
        match gpa {
            g if g >= 3.6 => AcademicRank::Excellent,
            g if g >= 3.2 => AcademicRank::Good,
            g if g >= 2.5 => AcademicRank::Fair,
            g if g >= 2.0 => AcademicRank::Average,
            _ => AcademicRank::Weak,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AcademicRank::Excellent => "Excellent",
            AcademicRank::Good => "Good",
            AcademicRank::Fair => "Fair",
            AcademicRank::Average => "Average",
            AcademicRank::Weak => "Weak",
        }
    }
}

impl std::fmt::Display for AcademicRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_follow_expected_tiers() {
        assert_eq!(AcademicRank::from_gpa(4.0), AcademicRank::Excellent);
        assert_eq!(AcademicRank::from_gpa(3.6), AcademicRank::Excellent);
        assert_eq!(AcademicRank::from_gpa(3.599999), AcademicRank::Good);
        assert_eq!(AcademicRank::from_gpa(3.2), AcademicRank::Good);
        assert_eq!(AcademicRank::from_gpa(2.5), AcademicRank::Fair);
        assert_eq!(AcademicRank::from_gpa(2.0), AcademicRank::Average);
        assert_eq!(AcademicRank::from_gpa(1.99), AcademicRank::Weak);
        assert_eq!(AcademicRank::from_gpa(0.0), AcademicRank::Weak);
    }

    #[test]
    fn nan_is_weak() {
        assert_eq!(AcademicRank::from_gpa(f64::NAN), AcademicRank::Weak);
    }

    #[test]
    fn labels_match_display() {
        for rank in AcademicRank::ALL {
            assert_eq!(rank.to_string(), rank.label());
        }
    }

    #[test]
    fn display_honours_column_width() {
        assert_eq!(format!("[{:<9}]", AcademicRank::Good), "[Good     ]");
        assert_eq!(format!("[{:>5}]", AcademicRank::Weak), "[ Weak]");
    }
}
