use segment_schema::TrackingPlanId;
use std::fmt;

/// Whether a source is attached to a tracking plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
    Unlinked,
    Linked(TrackingPlanId),
}

impl Linkage {
    pub fn from_plan(plan: Option<TrackingPlanId>) -> Self {
        plan.map_or(Linkage::Unlinked, Linkage::Linked)
    }

    pub fn plan(&self) -> Option<&TrackingPlanId> {
        match self {
            Linkage::Linked(p) => Some(p),
            Linkage::Unlinked => None,
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::Unlinked => f.write_str("unlinked"),
            Linkage::Linked(p) => write!(f, "linked({p})"),
        }
    }
}

/// One remote step of a linkage change, executed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStep {
    Disconnect(TrackingPlanId),
    Connect(TrackingPlanId),
    /// Drop the locally recorded schema violation config.
    ClearSchemaConfig,
}

/// Steps taking a source from `from` to `to`. Empty when nothing changes.
pub fn transition(from: &Linkage, to: &Linkage) -> Vec<LinkStep> {
    match (from, to) {
        (Linkage::Unlinked, Linkage::Unlinked) => Vec::new(),
        (Linkage::Unlinked, Linkage::Linked(q)) => vec![LinkStep::Connect(q.clone())],
        (Linkage::Linked(p), Linkage::Linked(q)) if p == q => Vec::new(),
        (Linkage::Linked(p), Linkage::Linked(q)) => {
            vec![LinkStep::Disconnect(p.clone()), LinkStep::Connect(q.clone())]
        }
        (Linkage::Linked(p), Linkage::Unlinked) => {
            vec![LinkStep::Disconnect(p.clone()), LinkStep::ClearSchemaConfig]
        }
    }
}
