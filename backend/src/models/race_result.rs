//! Race results with split times stored as whole seconds.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::error::FieldErrors;
use crate::models::text_enum;
use crate::models::user::PublicUser;
use crate::types::{RaceResultId, UserId};
use crate::validation::rules::{self, IntegerInput};

const MAX_SECONDS: i64 = i32::MAX as i64;
const MAX_POSITION: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RaceType {
    #[serde(rename = "ironman")]
    Ironman,
    #[serde(rename = "ironman_70_3")]
    Ironman703,
    #[serde(rename = "5150")]
    Olympic5150,
}

impl RaceType {
    pub const ALL: [RaceType; 3] = [RaceType::Ironman, RaceType::Ironman703, RaceType::Olympic5150];

    pub fn as_str(&self) -> &'static str {
        match self {
            RaceType::Ironman => "ironman",
            RaceType::Ironman703 => "ironman_70_3",
            RaceType::Olympic5150 => "5150",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RaceType::Ironman => "Ironman",
            RaceType::Ironman703 => "Ironman 70.3",
            RaceType::Olympic5150 => "5150",
        }
    }
}

text_enum!(RaceType);

/// Renders seconds as `HH:MM:SS`. Hours are zero padded to two digits but
/// never truncated, so 370000 renders as `102:46:40`.
pub fn format_time(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

#[derive(Debug, Clone, FromRow)]
pub struct RaceResult {
    pub id: RaceResultId,
    pub user_id: UserId,
    pub race_date: NaiveDate,
    pub location: String,
    pub race_type: RaceType,
    pub swim_time: i32,
    pub t1_time: i32,
    pub bike_time: i32,
    pub t2_time: i32,
    pub run_time: i32,
    /// Supplied by the athlete. Not derived from the legs.
    pub total_time: i32,
    pub age_group: Option<String>,
    pub overall_position: Option<i32>,
    pub age_group_position: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields of a new race result.
#[derive(Debug, Clone, PartialEq)]
pub struct RaceResultFields {
    pub race_date: NaiveDate,
    pub location: String,
    pub race_type: RaceType,
    pub swim_time: i32,
    pub t1_time: i32,
    pub bike_time: i32,
    pub t2_time: i32,
    pub run_time: i32,
    pub total_time: i32,
    pub age_group: Option<String>,
    pub overall_position: Option<i32>,
    pub age_group_position: Option<i32>,
}

impl RaceResult {
    pub fn new(user_id: UserId, fields: RaceResultFields, now: DateTime<Utc>) -> Self {
        Self {
            id: RaceResultId::new(),
            user_id,
            race_date: fields.race_date,
            location: fields.location,
            race_type: fields.race_type,
            swim_time: fields.swim_time,
            t1_time: fields.t1_time,
            bike_time: fields.bike_time,
            t2_time: fields.t2_time,
            run_time: fields.run_time,
            total_time: fields.total_time,
            age_group: fields.age_group,
            overall_position: fields.overall_position,
            age_group_position: fields.age_group_position,
            created_at: now,
            updated_at: now,
        }
    }
}

fn validate_race_type(value: &str) -> Result<(), ValidationError> {
    value
        .parse::<RaceType>()
        .map(|_| ())
        .map_err(|_| rules::invalid_choice())
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateRaceResultRequest {
    #[serde(default)]
    #[validate(required, custom(function = "rules::validate_date"))]
    #[schema(value_type = String, format = Date)]
    pub race_date: Option<String>,
    #[serde(default)]
    #[validate(
        required,
        custom(function = "rules::validate_required"),
        length(max = 255)
    )]
    pub location: Option<String>,
    #[serde(default)]
    #[validate(required, custom(function = "validate_race_type"))]
    #[schema(value_type = RaceType)]
    pub race_type: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub swim_time: Option<IntegerInput>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub t1_time: Option<IntegerInput>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub bike_time: Option<IntegerInput>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub t2_time: Option<IntegerInput>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub run_time: Option<IntegerInput>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub total_time: Option<IntegerInput>,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub age_group: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub overall_position: Option<IntegerInput>,
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub age_group_position: Option<IntegerInput>,
}

/// Converts a range-checked value; callers validate before converting.
fn to_i32(value: i64) -> i32 {
    value.clamp(0, MAX_SECONDS) as i32
}

/// A required split time in seconds.
fn seconds(field: &str, value: Option<IntegerInput>, errors: &mut FieldErrors) -> Option<i32> {
    match value {
        Some(value) => rules::check_integer(field, value, 0, MAX_SECONDS, errors).map(to_i32),
        None => {
            errors.add(
                field,
                format!("The {} field is required.", field.replace('_', " ")),
            );
            None
        }
    }
}

fn position(field: &str, value: IntegerInput, errors: &mut FieldErrors) -> Option<i32> {
    rules::check_integer(field, value, 1, MAX_POSITION, errors).map(to_i32)
}

impl CreateRaceResultRequest {
    /// Validates the request and converts it into typed fields.
    pub fn into_fields(self) -> Result<RaceResultFields, FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Err(validation) = self.validate() {
            crate::error::collect_validation_errors(&validation, None, &mut errors);
        }

        let swim_time = seconds("swim_time", self.swim_time, &mut errors);
        let t1_time = seconds("t1_time", self.t1_time, &mut errors);
        let bike_time = seconds("bike_time", self.bike_time, &mut errors);
        let t2_time = seconds("t2_time", self.t2_time, &mut errors);
        let run_time = seconds("run_time", self.run_time, &mut errors);
        let total_time = seconds("total_time", self.total_time, &mut errors);
        let overall_position = self
            .overall_position
            .and_then(|value| position("overall_position", value, &mut errors));
        let age_group_position = self
            .age_group_position
            .and_then(|value| position("age_group_position", value, &mut errors));

        let race_date = self.race_date.as_deref().and_then(rules::parse_date);
        let race_type = self
            .race_type
            .as_deref()
            .and_then(|value| value.parse::<RaceType>().ok());
        if !errors.is_empty() {
            return Err(errors);
        }

        let (
            Some(race_date),
            Some(race_type),
            Some(location),
            Some(swim_time),
            Some(t1_time),
            Some(bike_time),
            Some(t2_time),
            Some(run_time),
            Some(total_time),
        ) = (
            race_date,
            race_type,
            self.location,
            swim_time,
            t1_time,
            bike_time,
            t2_time,
            run_time,
            total_time,
        )
        else {
            return Err(FieldErrors::single(
                "race_date",
                "The race date field is required.",
            ));
        };

        Ok(RaceResultFields {
            race_date,
            location: location.trim().to_string(),
            race_type,
            swim_time,
            t1_time,
            bike_time,
            t2_time,
            run_time,
            total_time,
            age_group: rules::blank_to_none(self.age_group),
            overall_position,
            age_group_position,
        })
    }
}

/// Partial update. Absent fields are untouched. `null` is only accepted for
/// the nullable fields.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRaceResultRequest {
    #[serde(default, deserialize_with = "rules::double_option")]
    #[validate(custom(function = "rules::validate_date"))]
    #[schema(value_type = Option<String>, format = Date)]
    pub race_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[validate(custom(function = "rules::validate_required"), length(max = 255))]
    #[schema(value_type = Option<String>)]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[validate(custom(function = "validate_race_type"))]
    #[schema(value_type = Option<RaceType>)]
    pub race_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub swim_time: Option<Option<IntegerInput>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub t1_time: Option<Option<IntegerInput>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub bike_time: Option<Option<IntegerInput>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub t2_time: Option<Option<IntegerInput>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub run_time: Option<Option<IntegerInput>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub total_time: Option<Option<IntegerInput>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[validate(length(max = 20))]
    #[schema(value_type = Option<String>)]
    pub age_group: Option<Option<String>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub overall_position: Option<Option<IntegerInput>>,
    #[serde(default, deserialize_with = "rules::double_option")]
    #[schema(value_type = Option<i64>)]
    pub age_group_position: Option<Option<IntegerInput>>,
}

/// Validated changes for an existing race result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceResultChanges {
    pub race_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub race_type: Option<RaceType>,
    pub swim_time: Option<i32>,
    pub t1_time: Option<i32>,
    pub bike_time: Option<i32>,
    pub t2_time: Option<i32>,
    pub run_time: Option<i32>,
    pub total_time: Option<i32>,
    pub age_group: Option<Option<String>>,
    pub overall_position: Option<Option<i32>>,
    pub age_group_position: Option<Option<i32>>,
}

/// A field that may be omitted but not set to `null`.
fn present<T>(field: &str, value: Option<Option<T>>, errors: &mut FieldErrors) -> Option<T> {
    match value {
        Some(Some(value)) => Some(value),
        Some(None) => {
            errors.add(
                field,
                format!("The {} field is required.", field.replace('_', " ")),
            );
            None
        }
        None => None,
    }
}

impl UpdateRaceResultRequest {
    pub fn into_changes(self) -> Result<RaceResultChanges, FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Err(validation) = self.validate() {
            crate::error::collect_validation_errors(&validation, None, &mut errors);
        }

        let race_date = present("race_date", self.race_date, &mut errors);
        let location = present("location", self.location, &mut errors);
        let race_type = present("race_type", self.race_type, &mut errors);
        let mut split = |field: &str, value: Option<Option<IntegerInput>>| {
            present(field, value, &mut errors)
                .and_then(|value| rules::check_integer(field, value, 0, MAX_SECONDS, &mut errors))
                .map(to_i32)
        };
        let swim_time = split("swim_time", self.swim_time);
        let t1_time = split("t1_time", self.t1_time);
        let bike_time = split("bike_time", self.bike_time);
        let t2_time = split("t2_time", self.t2_time);
        let run_time = split("run_time", self.run_time);
        let total_time = split("total_time", self.total_time);
        let overall_position = self
            .overall_position
            .map(|value| value.and_then(|value| position("overall_position", value, &mut errors)));
        let age_group_position = self.age_group_position.map(|value| {
            value.and_then(|value| position("age_group_position", value, &mut errors))
        });

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(RaceResultChanges {
            race_date: race_date.as_deref().and_then(rules::parse_date),
            location: location.map(|value| value.trim().to_string()),
            race_type: race_type.and_then(|value| value.parse().ok()),
            swim_time,
            t1_time,
            bike_time,
            t2_time,
            run_time,
            total_time,
            age_group: self.age_group.map(rules::blank_to_none),
            overall_position,
            age_group_position,
        })
    }
}

impl RaceResultChanges {
    pub fn apply(&self, result: &mut RaceResult, now: DateTime<Utc>) {
        if let Some(race_date) = self.race_date {
            result.race_date = race_date;
        }
        if let Some(location) = &self.location {
            result.location = location.clone();
        }
        if let Some(race_type) = self.race_type {
            result.race_type = race_type;
        }
        let legs = [
            (self.swim_time, &mut result.swim_time),
            (self.t1_time, &mut result.t1_time),
            (self.bike_time, &mut result.bike_time),
            (self.t2_time, &mut result.t2_time),
            (self.run_time, &mut result.run_time),
            (self.total_time, &mut result.total_time),
        ];
        for (change, target) in legs {
            if let Some(value) = change {
                *target = value;
            }
        }
        if let Some(age_group) = &self.age_group {
            result.age_group = age_group.clone();
        }
        if let Some(position) = self.overall_position {
            result.overall_position = position;
        }
        if let Some(position) = self.age_group_position {
            result.age_group_position = position;
        }
        result.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RaceResultResponse {
    pub id: RaceResultId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[schema(value_type = String, format = Date)]
    pub race_date: NaiveDate,
    pub location: String,
    pub race_type: RaceType,
    pub race_type_label: &'static str,
    pub swim_time: String,
    pub t1_time: String,
    pub bike_time: String,
    pub t2_time: String,
    pub run_time: String,
    pub total_time: String,
    pub age_group: Option<String>,
    pub overall_position: Option<i32>,
    pub age_group_position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUser>,
    pub created_at: DateTime<Utc>,
}

impl From<&RaceResult> for RaceResultResponse {
    fn from(result: &RaceResult) -> Self {
        Self {
            id: result.id,
            user_id: Some(result.user_id),
            race_date: result.race_date,
            location: result.location.clone(),
            race_type: result.race_type,
            race_type_label: result.race_type.label(),
            swim_time: format_time(result.swim_time.into()),
            t1_time: format_time(result.t1_time.into()),
            bike_time: format_time(result.bike_time.into()),
            t2_time: format_time(result.t2_time.into()),
            run_time: format_time(result.run_time.into()),
            total_time: format_time(result.total_time.into()),
            age_group: result.age_group.clone(),
            overall_position: result.overall_position,
            age_group_position: result.age_group_position,
            user: None,
            created_at: result.created_at,
        }
    }
}

impl RaceResultResponse {
    pub fn without_user_id(mut self) -> Self {
        self.user_id = None;
        self
    }

    pub fn with_user(mut self, user: PublicUser) -> Self {
        self.user = Some(user);
        self
    }
}
