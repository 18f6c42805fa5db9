//! Readiness state machine.
//!
//! A key is ready when every required locale has an approved translation.
//! A container is ready when it is not loading and all of its active keys
//! are ready. Project readiness is derived on read.

mod calculator;
mod project;

pub use calculator::{
    recalculate_container, recalculate_key, required_locales, requirements_for_key,
    ContainerTransition, KeyTransition,
};
pub use project::{project_readiness, ProjectReadiness};

use serde::{Deserialize, Serialize};

use crate::db::container_repo::ContainerRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessState {
    Loading,
    NotReady,
    Ready,
}

impl ReadinessState {
    pub fn of(container: &ContainerRow) -> Self {
        if container.loading {
            ReadinessState::Loading
        } else if container.ready {
            ReadinessState::Ready
        } else {
            ReadinessState::NotReady
        }
    }
}
