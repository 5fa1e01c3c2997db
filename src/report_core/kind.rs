//! What is being generated and why

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Sales,
    Activity,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Sales => "sales",
            ReportKind::Activity => "activity",
        }
    }

    /// Title noun used on charts and captions
    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Sales => "Sales",
            ReportKind::Activity => "Activity",
        }
    }

    pub fn y_axis_label(&self) -> &'static str {
        match self {
            ReportKind::Sales => "Amount",
            ReportKind::Activity => "Actions",
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales" => Ok(ReportKind::Sales),
            "activity" => Ok(ReportKind::Activity),
            other => Err(format!("unknown report kind: {}", other)),
        }
    }
}

/// Report = chart + CSV export, Stats = text summary + chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    Report,
    Stats,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Report => "report",
            Purpose::Stats => "statistics",
        }
    }
}
