use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata key marking a route call as a data upload.
pub const UPLOAD_FLAG_KEY: &str = "data_upload";
/// Metadata key carrying the data-kind tag of an upload.
pub const UPLOAD_KIND_KEY: &str = "data_type";

/// The closed set of data kinds the coach understands. Uploads are
/// tagged with one of these; handlers declare which they support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Sleep,
    Exercise,
    Nutrition,
    Biometric,
}

impl DataKind {
    pub const ALL: [DataKind; 4] = [
        DataKind::Sleep,
        DataKind::Exercise,
        DataKind::Nutrition,
        DataKind::Biometric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Sleep => "sleep",
            DataKind::Exercise => "exercise",
            DataKind::Nutrition => "nutrition",
            DataKind::Biometric => "biometric",
        }
    }

    pub fn parse(tag: &str) -> Option<DataKind> {
        match tag {
            "sleep" => Some(DataKind::Sleep),
            "exercise" => Some(DataKind::Exercise),
            "nutrition" => Some(DataKind::Nutrition),
            "biometric" => Some(DataKind::Biometric),
            _ => None,
        }
    }

    /// Key under which an upload payload carries this kind's records,
    /// e.g. `sleep` records arrive under `"sleep_data"`.
    pub fn payload_key(&self) -> &'static str {
        match self {
            DataKind::Sleep => "sleep_data",
            DataKind::Exercise => "exercise_data",
            DataKind::Nutrition => "nutrition_data",
            DataKind::Biometric => "biometric_data",
        }
    }

    /// Topic keywords a query is matched against when scoring this
    /// kind's observation context.
    pub fn topic_keywords(&self) -> &'static [&'static str] {
        match self {
            DataKind::Sleep => &["sleep", "rest", "bed", "tired", "insomnia", "nap", "dream"],
            DataKind::Exercise => &[
                "exercise", "workout", "activity", "calories", "active", "fitness", "training",
            ],
            DataKind::Nutrition => &[
                "nutrition", "diet", "food", "eat", "meal", "calories", "protein", "carbs",
                "fat", "vitamins",
            ],
            DataKind::Biometric => &[
                "weight", "blood", "pressure", "heart", "rate", "body", "fat", "biometric", "bmi",
            ],
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::DataKind;

    #[test]
    fn parse_round_trips_every_kind() {
        for kind in DataKind::ALL {
            assert_eq!(DataKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DataKind::parse("steps"), None);
    }

    #[test]
    fn payload_key_is_kind_suffixed() {
        for kind in DataKind::ALL {
            assert_eq!(kind.payload_key(), format!("{kind}_data"));
        }
    }

    #[test]
    fn kind_tags_serialize_snake_case() {
        let json = serde_json::to_string(&DataKind::Biometric).unwrap();
        assert_eq!(json, "\"biometric\"");
    }
}
