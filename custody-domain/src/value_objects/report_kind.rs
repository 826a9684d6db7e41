// Report kind value object

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Disposal,
    Recycling,
    Final,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Disposal => "disposal",
            ReportKind::Recycling => "recycling",
            ReportKind::Final => "final",
        }
    }
}
