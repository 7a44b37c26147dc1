use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, IntoStaticStr};

/// Family of erase operation used on a drive.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WipeMethod {
    Sanitize,
    Format,
    SecurityErase,
    Blkdiscard,
    FillZero,
}

/// The specific action run within a [`WipeMethod`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, IntoStaticStr)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WipeAction {
    CryptoErase,
    BlockErase,
    CryptographicErase,
    UserDataErase,
    SanitizeCryptoScramble,
    SanitizeBlockErase,
    SecurityEraseEnhanced,
    Blkdiscard,
    FillZero,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WipeResult {
    Success,
    Failure,
}

/// Record of what happened to one drive during a wipe run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct WipeOutcome {
    pub disk: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<WipeMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<WipeAction>,

    pub duration_ms: u64,

    pub result: WipeResult,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WipeOutcome {
    pub fn success(
        disk: impl Into<PathBuf>,
        method: WipeMethod,
        action: WipeAction,
        elapsed: Duration,
    ) -> Self {
        Self {
            disk: disk.into(),
            method: Some(method),
            action: Some(action),
            duration_ms: duration_ms(elapsed),
            result: WipeResult::Success,
            error: None,
        }
    }

    pub fn failure(
        disk: impl Into<PathBuf>,
        plan: Option<(WipeMethod, WipeAction)>,
        elapsed: Duration,
        error: impl ToString,
    ) -> Self {
        Self {
            disk: disk.into(),
            method: plan.map(|(method, _)| method),
            action: plan.map(|(_, action)| action),
            duration_ms: duration_ms(elapsed),
            result: WipeResult::Failure,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == WipeResult::Success
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Aggregate result of a wipe run, ordered by disk.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct WipeReport {
    outcomes: Vec<WipeOutcome>,
}

impl WipeReport {
    pub fn new(mut outcomes: Vec<WipeOutcome>) -> Self {
        // Stable so that repeated requests for a disk keep their request order.
        outcomes.sort_by(|a, b| a.disk.cmp(&b.disk));
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[WipeOutcome] {
        &self.outcomes
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }
}
