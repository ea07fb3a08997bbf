//! Runtime capability set of the secondary process.
//!
//! One binary covers the vf and mirror variants; the flavor selected at
//! startup decides which worker types may start and whether the status block
//! carries a classifier table.

use spp_protocol::{ProcKind, WorkerType};

#[derive(Debug, Clone, Copy)]
pub struct WorkerFlavor {
    proc_kind: ProcKind,
}

impl WorkerFlavor {
    pub fn new(proc_kind: ProcKind) -> Self {
        Self { proc_kind }
    }

    pub fn proc_kind(&self) -> ProcKind {
        self.proc_kind
    }

    /// Whether status responses include `classifier_table`.
    pub fn supports_classifier_table(&self) -> bool {
        self.proc_kind == ProcKind::Vf
    }

    /// Which worker types this process may run.
    pub fn allows_worker_type(&self, wk_type: WorkerType) -> bool {
        match self.proc_kind {
            ProcKind::Vf => matches!(
                wk_type,
                WorkerType::Forward | WorkerType::Merge | WorkerType::Classify
            ),
            ProcKind::Mirror => wk_type == WorkerType::Mirror,
            ProcKind::None => false,
        }
    }
}
