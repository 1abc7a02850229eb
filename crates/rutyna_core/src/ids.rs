use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChecklistItemId(pub Uuid);

impl ChecklistItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChecklistItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChecklistItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateTemplateId(pub Uuid);

impl StateTemplateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StateTemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateTemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutineTemplateId(pub Uuid);

impl RoutineTemplateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoutineTemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoutineTemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateItemId(pub Uuid);

impl StateItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StateItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutineItemId(pub Uuid);

impl RoutineItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoutineItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoutineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}
