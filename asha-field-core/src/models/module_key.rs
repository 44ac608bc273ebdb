use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of health record. Each module has its own storage partition,
/// client id prefix and set of required payload fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleKey {
    Pregnancy,
    ChildHealth,
    FamilyPlanning,
    DiseaseSurveillance,
    Referrals,
    HealthAwareness,
}

impl ModuleKey {
    /// Number of modules.
    pub const COUNT: usize = 6;

    /// All modules, in dashboard order.
    pub const ALL: [ModuleKey; Self::COUNT] = [
        ModuleKey::Pregnancy,
        ModuleKey::ChildHealth,
        ModuleKey::FamilyPlanning,
        ModuleKey::DiseaseSurveillance,
        ModuleKey::Referrals,
        ModuleKey::HealthAwareness,
    ];

    /// Storage key of the module's partition.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKey::Pregnancy => "pregnancy",
            ModuleKey::ChildHealth => "childHealth",
            ModuleKey::FamilyPlanning => "familyPlanning",
            ModuleKey::DiseaseSurveillance => "diseaseSurveillance",
            ModuleKey::Referrals => "referrals",
            ModuleKey::HealthAwareness => "healthAwareness",
        }
    }

    /// Prefix of client ids allocated in this module.
    pub fn prefix(&self) -> &'static str {
        match self {
            ModuleKey::Pregnancy => "P",
            ModuleKey::ChildHealth => "CH",
            ModuleKey::FamilyPlanning => "FP",
            ModuleKey::DiseaseSurveillance => "DS",
            ModuleKey::Referrals => "R",
            ModuleKey::HealthAwareness => "HA",
        }
    }

    /// Payload fields that must be present and non-blank.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ModuleKey::Pregnancy => &["name", "age", "bloodGroup", "edd", "phone", "village"],
            ModuleKey::ChildHealth => &[
                "childName",
                "age",
                "gender",
                "village",
                "parentName",
                "phone",
            ],
            ModuleKey::FamilyPlanning => &["coupleName", "contact", "method", "village"],
            ModuleKey::DiseaseSurveillance => &["patientName", "age", "gender", "village"],
            ModuleKey::Referrals => &["patientName", "reason", "referredTo", "village"],
            ModuleKey::HealthAwareness => &["topic", "targetGroup", "location"],
        }
    }

    /// Human readable module title.
    pub fn title(&self) -> &'static str {
        match self {
            ModuleKey::Pregnancy => "Pregnancy Registration",
            ModuleKey::ChildHealth => "Child Health",
            ModuleKey::FamilyPlanning => "Family Planning",
            ModuleKey::DiseaseSurveillance => "Disease Surveillance",
            ModuleKey::Referrals => "Referrals",
            ModuleKey::HealthAwareness => "Health Awareness",
        }
    }

    /// Key under which the module's id counter is persisted.
    pub fn counter_key(&self) -> String {
        format!("{}:seq", self.as_str())
    }

    /// Formats the client id for sequence number `n`.
    pub fn format_id(&self, n: u64) -> String {
        format!("{}{:05}", self.prefix(), n)
    }

    /// Extracts the sequence number from a client id of this module.
    ///
    /// Returns `None` when the prefix does not match or the rest is not numeric.
    pub fn parse_seq(&self, client_id: &str) -> Option<u64> {
        let digits = client_id.strip_prefix(self.prefix())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModuleKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "pregnancy" => Ok(ModuleKey::Pregnancy),
            "childhealth" => Ok(ModuleKey::ChildHealth),
            "familyplanning" => Ok(ModuleKey::FamilyPlanning),
            "diseasesurveillance" => Ok(ModuleKey::DiseaseSurveillance),
            "referrals" => Ok(ModuleKey::Referrals),
            "healthawareness" => Ok(ModuleKey::HealthAwareness),
            _ => Err(format!(
                "Invalid module '{}'. Valid options: pregnancy, child-health, family-planning, \
                 disease-surveillance, referrals, health-awareness",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_table() {
        assert_eq!(ModuleKey::Pregnancy.prefix(), "P");
        assert_eq!(ModuleKey::ChildHealth.prefix(), "CH");
        assert_eq!(ModuleKey::FamilyPlanning.prefix(), "FP");
        assert_eq!(ModuleKey::DiseaseSurveillance.prefix(), "DS");
        assert_eq!(ModuleKey::Referrals.prefix(), "R");
        assert_eq!(ModuleKey::HealthAwareness.prefix(), "HA");
    }

    #[test]
    fn test_format_id_pads_to_five_digits() {
        assert_eq!(ModuleKey::Pregnancy.format_id(1), "P00001");
        assert_eq!(ModuleKey::ChildHealth.format_id(7), "CH00007");
        assert_eq!(ModuleKey::Referrals.format_id(123456), "R123456");
    }

    #[test]
    fn test_parse_seq() {
        assert_eq!(ModuleKey::Pregnancy.parse_seq("P00042"), Some(42));
        assert_eq!(ModuleKey::ChildHealth.parse_seq("CH00007"), Some(7));
        assert_eq!(ModuleKey::Pregnancy.parse_seq("CH00007"), None);
        assert_eq!(ModuleKey::Referrals.parse_seq("R"), None);
        assert_eq!(ModuleKey::Referrals.parse_seq("R12a"), None);
    }

    #[test]
    fn test_from_str_accepts_storage_and_cli_spellings() {
        assert_eq!(
            ModuleKey::from_str("childHealth").unwrap(),
            ModuleKey::ChildHealth
        );
        assert_eq!(
            ModuleKey::from_str("child-health").unwrap(),
            ModuleKey::ChildHealth
        );
        assert_eq!(
            ModuleKey::from_str("DISEASE_SURVEILLANCE").unwrap(),
            ModuleKey::DiseaseSurveillance
        );
        assert!(ModuleKey::from_str("dental").is_err());
    }

    #[test]
    fn test_serde_uses_storage_key() {
        let json = serde_json::to_string(&ModuleKey::FamilyPlanning).unwrap();
        assert_eq!(json, "\"familyPlanning\"");

        for module in ModuleKey::ALL {
            let json = serde_json::to_string(&module).unwrap();
            assert_eq!(json, format!("\"{}\"", module.as_str()));
        }
    }
}
