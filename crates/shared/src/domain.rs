use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(RoutineId);
id_newtype!(ProductId);

/// Steps are identified by the product they apply.
pub type StepId = ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanSessionId(pub Uuid);

impl ScanSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineType {
    Morning,
    Evening,
}

impl RoutineType {
    pub const ALL: [RoutineType; 2] = [RoutineType::Morning, RoutineType::Evening];

    pub fn as_str(self) -> &'static str {
        match self {
            RoutineType::Morning => "morning",
            RoutineType::Evening => "evening",
        }
    }
}

impl fmt::Display for RoutineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutineType {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(RoutineType::Morning),
            "evening" => Ok(RoutineType::Evening),
            other => Err(CoreError::Validation(format!(
                "unknown routine type '{other}'; expected morning or evening"
            ))),
        }
    }
}

/// Time of day a routine is scheduled for, persisted as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleTime {
    hour: u8,
    minute: u8,
}

impl ScheduleTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, CoreError> {
        if hour > 23 || minute > 59 {
            return Err(CoreError::Validation(format!(
                "schedule time {hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl Default for ScheduleTime {
    fn default() -> Self {
        Self { hour: 8, minute: 0 }
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ScheduleTime {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Validation(format!("invalid schedule time '{raw}'"));
        let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ScheduleTime {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleTime> for String {
    fn from(value: ScheduleTime) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub product_id: ProductId,
    pub category: String,
    pub order: u32,
    pub instructions: String,
}

impl Step {
    pub fn id(&self) -> StepId {
        self.product_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: RoutineId,
    pub name: String,
    #[serde(rename = "type")]
    pub routine_type: RoutineType,
    pub steps: Vec<Step>,
    pub time: ScheduleTime,
    pub enabled: bool,
    pub streak: u32,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

impl Routine {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn has_step(&self, step_id: StepId) -> bool {
        self.steps.iter().any(|step| step.id() == step_id)
    }

    /// Steps sorted by ordering key; equal keys keep insertion order.
    pub fn ordered_steps(&self) -> Vec<&Step> {
        let mut steps: Vec<&Step> = self.steps.iter().collect();
        steps.sort_by_key(|step| step.order);
        steps
    }

    pub fn is_usable(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Routines grouped by type, the persisted shape of `carefulapp-routines`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineCollections {
    #[serde(default)]
    pub morning: Vec<Routine>,
    #[serde(default)]
    pub evening: Vec<Routine>,
}

impl RoutineCollections {
    pub fn bucket(&self, routine_type: RoutineType) -> &[Routine] {
        match routine_type {
            RoutineType::Morning => &self.morning,
            RoutineType::Evening => &self.evening,
        }
    }

    pub fn bucket_mut(&mut self, routine_type: RoutineType) -> &mut Vec<Routine> {
        match routine_type {
            RoutineType::Morning => &mut self.morning,
            RoutineType::Evening => &mut self.evening,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Routine> {
        self.morning.iter().chain(self.evening.iter())
    }

    pub fn find(&self, id: RoutineId) -> Option<&Routine> {
        self.iter().find(|routine| routine.id == id)
    }

    pub fn find_mut(&mut self, id: RoutineId) -> Option<&mut Routine> {
        self.morning
            .iter_mut()
            .chain(self.evening.iter_mut())
            .find(|routine| routine.id == id)
    }

    pub fn len(&self) -> usize {
        self.morning.len() + self.evening.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_id(&self) -> Option<RoutineId> {
        self.iter().map(|routine| routine.id).max()
    }
}

/// Product offered when composing a new routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProduct {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyStatus {
    Safe,
    Caution,
    Avoid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalizedScore {
    pub status: SafetyStatus,
    pub score: u8,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyIngredient {
    pub name: String,
    pub purpose: String,
    pub safety: SafetyStatus,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub price: String,
    pub score: u8,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub image: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub personalized_score: Option<PersonalizedScore>,
    #[serde(default)]
    pub key_ingredients: Vec<KeyIngredient>,
    #[serde(default)]
    pub all_ingredients: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub age: u32,
    pub skin_type: String,
    pub hair_type: String,
    pub is_admin: bool,
    pub avatar: String,
    pub is_logged_in: bool,
    pub login_time: DateTime<Utc>,
}
