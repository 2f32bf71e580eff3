//! Schedule template models.

use serde::{Deserialize, Serialize};
use shiftgrid_core::error::CoreError;
use shiftgrid_core::template::{
    ConstraintRules, PreferenceRules, RestRules, RosterTemplate, ShiftDefinition,
};
use shiftgrid_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `schedule_templates` table. Rule payloads are JSONB in
/// storage and decode into the typed rule model before they reach the engine.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScheduleTemplate {
    pub id: DbId,
    pub tenant_id: DbId,
    pub name: String,
    pub timezone: String,
    pub coverage_plan: serde_json::Value,
    pub rest_rules: serde_json::Value,
    pub constraint_rules: serde_json::Value,
    pub preference_rules: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScheduleTemplate {
    /// Decode and validate the stored payloads into the domain template.
    pub fn to_domain(&self) -> Result<RosterTemplate, CoreError> {
        let timezone: chrono_tz::Tz = self
            .timezone
            .parse()
            .map_err(|_| CoreError::Validation(format!("Unknown timezone '{}'", self.timezone)))?;
        let coverage_plan: Vec<ShiftDefinition> = decode("coverage_plan", &self.coverage_plan)?;
        let rest_rules: RestRules = decode("rest_rules", &self.rest_rules)?;
        let constraint_rules: ConstraintRules = decode("constraint_rules", &self.constraint_rules)?;
        let preference_rules: PreferenceRules = decode("preference_rules", &self.preference_rules)?;

        let template = RosterTemplate {
            name: self.name.clone(),
            timezone,
            coverage_plan,
            rest_rules,
            constraint_rules,
            preference_rules,
        };
        template.validate()?;
        Ok(template)
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    field: &str,
    value: &serde_json::Value,
) -> Result<T, CoreError> {
    serde_json::from_value(value.clone())
        .map_err(|e| CoreError::Validation(format!("Invalid {field}: {e}")))
}

/// DTO for creating a template. Carries the typed rule model; storage
/// serializes it back to JSONB.
#[derive(Debug, Deserialize)]
pub struct NewScheduleTemplate {
    pub name: String,
    pub timezone: String,
    pub coverage_plan: Vec<ShiftDefinition>,
    #[serde(default)]
    pub rest_rules: RestRules,
    #[serde(default)]
    pub constraint_rules: ConstraintRules,
    #[serde(default)]
    pub preference_rules: PreferenceRules,
}

impl NewScheduleTemplate {
    /// Validate the payload as the domain template it would become.
    pub fn validate_domain(&self) -> Result<(), CoreError> {
        let timezone: chrono_tz::Tz = self
            .timezone
            .parse()
            .map_err(|_| CoreError::Validation(format!("Unknown timezone '{}'", self.timezone)))?;
        let template = RosterTemplate {
            name: self.name.clone(),
            timezone,
            coverage_plan: self.coverage_plan.clone(),
            rest_rules: self.rest_rules.clone(),
            constraint_rules: self.constraint_rules.clone(),
            preference_rules: self.preference_rules.clone(),
        };
        template.validate()
    }
}
