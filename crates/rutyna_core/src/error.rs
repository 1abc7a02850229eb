use thiserror::Error;

use crate::ids::{ChecklistItemId, RoutineItemId, RoutineTemplateId, StateItemId, StateTemplateId};

/// Lookup failures at the store boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("state template {0} not found")]
    StateTemplateNotFound(StateTemplateId),
    #[error("routine template {0} not found")]
    RoutineTemplateNotFound(RoutineTemplateId),
    #[error("state item {0} not found")]
    StateItemNotFound(StateItemId),
    #[error("routine item {0} not found")]
    RoutineItemNotFound(RoutineItemId),
    #[error("checklist item {0} not found")]
    ChecklistItemNotFound(ChecklistItemId),
}
