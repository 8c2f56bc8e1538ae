//! Stage states, inspected from the filesystem.
//!
//! The filesystem is the only record of progress. [`Plan::inspect`] reads it
//! once before a run; nothing else is persisted.

use crate::builder::config::PipelineConfig;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Fetch,
    Extract,
    Build,
    Collect,
    Patch,
}

impl Stage {
    /// Pipeline order.
    pub const ALL: [Stage; 5] = [
        Stage::Fetch,
        Stage::Extract,
        Stage::Build,
        Stage::Collect,
        Stage::Patch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Extract => "extract",
            Stage::Build => "build",
            Stage::Collect => "collect",
            Stage::Patch => "patch",
        }
    }

    /// Collect and patch always re-run; the others are skipped once their
    /// output exists.
    pub fn is_cacheable(self) -> bool {
        matches!(self, Stage::Fetch | Stage::Extract | Stage::Build)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageState {
    NotStarted,
    /// Output found on disk; the stage does no work.
    Cached,
    /// The stage ran to completion in this invocation.
    Completed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageState::NotStarted => "not started",
            StageState::Cached => "cached",
            StageState::Completed => "completed",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub state: StageState,
}

/// State of every stage, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    stages: Vec<StageStatus>,
}

impl Plan {
    /// Derive stage states from what is on disk.
    ///
    /// An extracted tree also satisfies the fetch stage, so a tree whose
    /// archive was deleted is not downloaded again.
    pub fn inspect(config: &PipelineConfig) -> Self {
        let tree = config.source_dir().exists();
        let archive = config.archive_path().exists();
        let primary = config.build_output().primary.exists();

        let output_present = |stage: Stage| match stage {
            Stage::Fetch => tree || archive,
            Stage::Extract => tree,
            Stage::Build => primary,
            Stage::Collect | Stage::Patch => false,
        };

        Self {
            stages: Stage::ALL
                .iter()
                .map(|&stage| StageStatus {
                    stage,
                    state: if stage.is_cacheable() && output_present(stage) {
                        StageState::Cached
                    } else {
                        StageState::NotStarted
                    },
                })
                .collect(),
        }
    }

    pub fn state(&self, stage: Stage) -> StageState {
        self.stages
            .iter()
            .find(|status| status.stage == stage)
            .map_or(StageState::NotStarted, |status| status.state)
    }

    pub fn set(&mut self, stage: Stage, state: StageState) {
        if let Some(status) = self.stages.iter_mut().find(|status| status.stage == stage) {
            status.state = state;
        }
    }

    /// First stage that has to do work.
    pub fn resume_point(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|status| status.state == StageState::NotStarted)
            .map(|status| status.stage)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageStatus> {
        self.stages.iter()
    }
}
