//! Profile model - personal and business details beyond the account record.

use serde::{Deserialize, Serialize};

/// Extended details of an account.
///
/// Every field is optional. Profiles are shown only to their owner and to
/// admins; they never appear in account summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub father_name: Option<String>,
    pub business_name: Option<String>,
    pub business_option: Option<String>,
    /// Date of birth as supplied by the client (ISO 8601 expected)
    pub dob: Option<String>,
    pub phone_no: Option<String>,
    pub aadhar_no: Option<String>,
    pub pan_no: Option<String>,
    pub post: Option<String>,
    pub pin_code: Option<String>,
    pub police_station: Option<String>,
    pub district: Option<String>,
    pub state: Option<String>,
    pub village_town: Option<String>,
}

impl Profile {
    /// Overwrite fields that are set (and non-blank) in `update`.
    pub fn merge(&mut self, update: Profile) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                *slot = Some(v);
            }
        }

        take(&mut self.father_name, update.father_name);
        take(&mut self.business_name, update.business_name);
        take(&mut self.business_option, update.business_option);
        take(&mut self.dob, update.dob);
        take(&mut self.phone_no, update.phone_no);
        take(&mut self.aadhar_no, update.aadhar_no);
        take(&mut self.pan_no, update.pan_no);
        take(&mut self.post, update.post);
        take(&mut self.pin_code, update.pin_code);
        take(&mut self.police_station, update.police_station);
        take(&mut self.district, update.district);
        take(&mut self.state, update.state);
        take(&mut self.village_town, update.village_town);
    }

    pub fn is_empty(&self) -> bool {
        *self == Profile::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_unset_and_blank_fields() {
        let mut profile = Profile {
            district: Some("North".into()),
            phone_no: Some("123".into()),
            ..Default::default()
        };
        profile.merge(Profile {
            district: Some("  ".into()),
            phone_no: Some("456".into()),
            state: Some("Kerala".into()),
            ..Default::default()
        });

        assert_eq!(profile.district.as_deref(), Some("North"));
        assert_eq!(profile.phone_no.as_deref(), Some("456"));
        assert_eq!(profile.state.as_deref(), Some("Kerala"));
    }

    #[test]
    fn deserializes_camel_case() {
        let json = r#"{"fatherName":"R","villageTown":"Ayr"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.father_name.as_deref(), Some("R"));
        assert_eq!(profile.village_town.as_deref(), Some("Ayr"));
        assert!(!profile.is_empty());
    }
}
