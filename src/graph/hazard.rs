//! Detection of read/write hazards between subpasses.

use crate::graph::pass::{SubpassId, SubpassInfo};
use crate::graph::resource::{AttachmentId, AttachmentRegistry};

/// Kind of hazard between two subpasses accessing the same attachment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HazardKind {
    /// The later subpass reads what the earlier subpass wrote.
    ReadAfterWrite,
    /// The later subpass overwrites what the earlier subpass read.
    WriteAfterRead,
    /// Both subpasses write.
    WriteAfterWrite,
}

impl HazardKind {
    /// Classify a pair of accesses. Returns `None` if neither access writes.
    pub fn classify(earlier_writes: bool, later_writes: bool) -> Option<Self> {
        match (earlier_writes, later_writes) {
            (true, true) => Some(HazardKind::WriteAfterWrite),
            (true, false) => Some(HazardKind::ReadAfterWrite),
            (false, true) => Some(HazardKind::WriteAfterRead),
            (false, false) => None,
        }
    }
}

/// Two subpasses that access the same attachment, at least one of them writing to it.
/// The earlier subpass is always scheduled in a strictly earlier stage than the later one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Hazard {
    pub(crate) attachment: AttachmentId,
    pub(crate) earlier: SubpassId,
    pub(crate) later: SubpassId,
    pub(crate) kind: HazardKind,
}

impl Hazard {
    pub fn attachment(&self) -> AttachmentId {
        self.attachment
    }

    pub fn earlier(&self) -> SubpassId {
        self.earlier
    }

    pub fn later(&self) -> SubpassId {
        self.later
    }

    pub fn kind(&self) -> HazardKind {
        self.kind
    }

    /// Whether this hazard is between the two given subpasses, in any order.
    pub fn connects(&self, a: SubpassId, b: SubpassId) -> bool {
        (self.earlier == a && self.later == b) || (self.earlier == b && self.later == a)
    }
}

/// Find all hazards in the graph. `ranks` orders the subpasses consistently with all explicit dependencies, and decides
/// which subpass of a pair goes first. Since every hazard points forward in this order, hazards never form a cycle.
pub(crate) fn detect(registry: &AttachmentRegistry, subpasses: &[SubpassInfo], ranks: &[u32]) -> Vec<Hazard> {
    let mut hazards: Vec<Hazard> = Vec::new();
    for (attachment, _) in registry.iter() {
        let accessors = registry.accessors(attachment);
        for (i, &a) in accessors.iter().enumerate() {
            for &b in &accessors[i + 1..] {
                let (earlier, later) = if ranks[a.idx()] < ranks[b.idx()] {
                    (a, b)
                } else {
                    (b, a)
                };
                let Some(kind) = HazardKind::classify(
                    subpasses[earlier.idx()].writes(attachment),
                    subpasses[later.idx()].writes(attachment),
                ) else {
                    continue;
                };
                if hazards
                    .iter()
                    .any(|hazard| hazard.attachment == attachment && hazard.connects(a, b))
                {
                    continue;
                }
                trace!("Hazard {kind:?} on attachment {attachment}: subpass {earlier} -> subpass {later}");
                hazards.push(Hazard {
                    attachment,
                    earlier,
                    later,
                    kind,
                });
            }
        }
    }
    hazards
}
