use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Teams that may own a feature flag.
pub const KNOWN_TEAMS: &[&str] = &[
    "autotest-team",
    "b2b-united",
    "delivery-team",
    "devops-team",
    "pnb-team",
    "randi-team",
    "reporting-team",
    "rnd-team",
    "storebox-team",
    "tms-team",
    "ux-team",
];

/// Default content of the task id field. On its own it is not a task id.
pub const TASK_ID_PREFIX: &str = "OMNI-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudienceType {
    All,
    Service,
}

impl AudienceType {
    pub fn as_str(self) -> &'static str {
        match self {
            AudienceType::All => "ALL",
            AudienceType::Service => "SERVICE",
        }
    }
}

impl FromStr for AudienceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(AudienceType::All),
            "SERVICE" => Ok(AudienceType::Service),
            _ => Err(ValidationError::UnknownAudienceType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audience {
    #[serde(rename = "type")]
    pub audience_type: AudienceType,
    pub target: Vec<String>,
}

/// Body of the create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePayload {
    pub id: String,
    pub description: String,
    pub enabled: bool,
    pub team: String,
    pub audience: Audience,
    pub task_id: String,
    pub is_scheduled_for_removal: bool,
    pub removal_feature_task_id: String,
    pub planned_removal_date: String,
}

/// One `(feature id, enabled)` pair of an activity update batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityUpdate {
    pub feature_id: String,
    pub enabled: bool,
}

impl ActivityUpdate {
    pub fn new(feature_id: impl Into<String>, enabled: bool) -> Self {
        Self {
            feature_id: feature_id.into(),
            enabled,
        }
    }
}

impl fmt::Display for ActivityUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.feature_id, self.enabled)
    }
}

/// Parses `ID=true` / `ID=false`. The id may itself contain `=`; the last one splits.
impl FromStr for ActivityUpdate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidActivityUpdate(s.to_string());
        let (id, enabled) = s.trim().rsplit_once('=').ok_or_else(invalid)?;
        let id = id.trim();
        if id.is_empty() {
            return Err(invalid());
        }
        let enabled = match enabled.trim().to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => return Err(invalid()),
        };
        Ok(Self::new(id, enabled))
    }
}

/// Raw create-form input, as typed by the operator.
#[derive(Debug, Clone, Default)]
pub struct FeatureForm {
    pub id: String,
    pub description: String,
    pub enabled: bool,
    pub team: String,
    pub audience_type: String,
    /// Comma separated list of affected services
    pub audience_target: String,
    pub task_id: String,
    pub is_scheduled_for_removal: bool,
    pub removal_feature_task_id: String,
    pub planned_removal_date: String,
}

impl FeatureForm {
    /// Check required fields and build the create payload.
    ///
    /// All missing fields are reported at once, in form order.
    pub fn validate(&self) -> Result<FeaturePayload, ValidationError> {
        let id = self.id.trim();
        let description = self.description.trim();
        let team = self.team.trim();
        let target = split_targets(&self.audience_target);
        let task_id = self.task_id.trim();
        let removal_task_id = self.removal_feature_task_id.trim();
        let removal_date = self.planned_removal_date.trim();

        let mut missing = Vec::new();
        if id.is_empty() {
            missing.push("ID");
        }
        if description.is_empty() {
            missing.push("Description");
        }
        if team.is_empty() {
            missing.push("Team");
        }
        if target.is_empty() {
            missing.push("Audience Target");
        }
        if task_id.is_empty() || task_id == TASK_ID_PREFIX {
            missing.push("Task ID");
        }
        if self.is_scheduled_for_removal {
            if removal_date.is_empty() {
                missing.push("Planned Removal Date");
            }
            if removal_task_id.is_empty() {
                missing.push("Removal Feature Task ID");
            }
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        if !KNOWN_TEAMS.contains(&team) {
            return Err(ValidationError::UnknownTeam(team.to_string()));
        }
        let audience_type = if self.audience_type.trim().is_empty() {
            AudienceType::All
        } else {
            self.audience_type.parse()?
        };

        let (removal_feature_task_id, planned_removal_date) = if self.is_scheduled_for_removal {
            (removal_task_id.to_string(), removal_date.to_string())
        } else {
            (String::new(), String::new())
        };

        Ok(FeaturePayload {
            id: id.to_string(),
            description: description.to_string(),
            enabled: self.enabled,
            team: team.to_string(),
            audience: Audience {
                audience_type,
                target,
            },
            task_id: task_id.to_string(),
            is_scheduled_for_removal: self.is_scheduled_for_removal,
            removal_feature_task_id,
            planned_removal_date,
        })
    }
}

fn split_targets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filled_form() -> FeatureForm {
        FeatureForm {
            id: "Team.Service.X".to_string(),
            description: "New checkout flow".to_string(),
            enabled: false,
            team: "delivery-team".to_string(),
            audience_type: "SERVICE".to_string(),
            audience_target: " orders, , billing ".to_string(),
            task_id: "OMNI-1234".to_string(),
            ..FeatureForm::default()
        }
    }

    #[test]
    fn test_unscheduled_feature_needs_no_removal_fields() {
        let payload = filled_form().validate().unwrap();
        assert_eq!(payload.id, "Team.Service.X");
        assert!(!payload.enabled);
        assert!(!payload.is_scheduled_for_removal);
        assert_eq!(payload.removal_feature_task_id, "");
        assert_eq!(payload.planned_removal_date, "");
        assert_eq!(payload.audience.target, vec!["orders", "billing"]);
    }

    #[test]
    fn test_scheduled_removal_requires_date_and_task() {
        let form = FeatureForm {
            is_scheduled_for_removal: true,
            ..filled_form()
        };
        assert_eq!(
            form.validate(),
            Err(ValidationError::MissingFields(vec![
                "Planned Removal Date",
                "Removal Feature Task ID"
            ]))
        );

        let form = FeatureForm {
            is_scheduled_for_removal: true,
            planned_removal_date: "2026-12-31".to_string(),
            removal_feature_task_id: "OMNI-999".to_string(),
            ..filled_form()
        };
        let payload = form.validate().unwrap();
        assert_eq!(payload.planned_removal_date, "2026-12-31");
        assert_eq!(payload.removal_feature_task_id, "OMNI-999");
    }

    #[test]
    fn test_removal_fields_are_dropped_when_not_scheduled() {
        let form = FeatureForm {
            planned_removal_date: "2026-12-31".to_string(),
            removal_feature_task_id: "OMNI-999".to_string(),
            ..filled_form()
        };
        let payload = form.validate().unwrap();
        assert_eq!(payload.planned_removal_date, "");
        assert_eq!(payload.removal_feature_task_id, "");
    }

    #[test]
    fn test_missing_fields_are_reported_together_in_form_order() {
        let form = FeatureForm {
            task_id: TASK_ID_PREFIX.to_string(),
            audience_target: " , ".to_string(),
            ..FeatureForm::default()
        };
        assert_eq!(
            form.validate(),
            Err(ValidationError::MissingFields(vec![
                "ID",
                "Description",
                "Team",
                "Audience Target",
                "Task ID"
            ]))
        );
    }

    #[test]
    fn test_team_and_audience_type_are_checked() {
        let form = FeatureForm {
            team: "marketing".to_string(),
            ..filled_form()
        };
        assert_eq!(
            form.validate(),
            Err(ValidationError::UnknownTeam("marketing".to_string()))
        );

        let form = FeatureForm {
            audience_type: "some".to_string(),
            ..filled_form()
        };
        assert_eq!(
            form.validate(),
            Err(ValidationError::UnknownAudienceType("some".to_string()))
        );
    }

    #[test]
    fn test_payload_serializes_with_api_field_names() {
        let payload = filled_form().validate().unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "id": "Team.Service.X",
                "description": "New checkout flow",
                "enabled": false,
                "team": "delivery-team",
                "audience": { "type": "SERVICE", "target": ["orders", "billing"] },
                "taskId": "OMNI-1234",
                "isScheduledForRemoval": false,
                "removalFeatureTaskId": "",
                "plannedRemovalDate": ""
            })
        );
    }

    #[test]
    fn test_parse_activity_update() {
        assert_eq!(
            "a.b.c=true".parse::<ActivityUpdate>().unwrap(),
            ActivityUpdate::new("a.b.c", true)
        );
        assert_eq!(
            " x.y = FALSE ".parse::<ActivityUpdate>().unwrap(),
            ActivityUpdate::new("x.y", false)
        );
        for raw in ["a.b.c", "=true", "a.b.c=yes", "a.b.c="] {
            assert_eq!(
                raw.parse::<ActivityUpdate>(),
                Err(ValidationError::InvalidActivityUpdate(raw.to_string()))
            );
        }
    }
}
