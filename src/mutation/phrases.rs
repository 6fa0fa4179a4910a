//! Per-operation wording used for summaries, progress messages, and error
//! text — "insert" surfaces to users as the "Add Row" action, and so on.

use crate::types::MutationKind;

#[derive(Debug, Clone, Copy)]
pub struct MutationPhrases {
    pub action_label: &'static str,
    pub in_progress: &'static str,
    pub success: &'static str,
    pub error: &'static str,
}

pub fn mutation_phrases(kind: MutationKind) -> MutationPhrases {
    match kind {
        MutationKind::Insert => MutationPhrases {
            action_label: "Add Row",
            in_progress: "Add row in progress",
            success: "Successfully added row",
            error: "Error adding row",
        },
        MutationKind::Update => MutationPhrases {
            action_label: "Edit Row",
            in_progress: "Edit row in progress",
            success: "Successfully edited row",
            error: "Error editing row",
        },
        MutationKind::Delete => MutationPhrases {
            action_label: "Delete Row",
            in_progress: "Delete row in progress",
            success: "Successfully deleted row",
            error: "Error deleting row",
        },
        MutationKind::Rpc => MutationPhrases {
            action_label: "Run RPC",
            in_progress: "Run RPC in progress",
            success: "Successfully ran RPC",
            error: "Error running RPC",
        },
        MutationKind::FlexibleMutation => MutationPhrases {
            action_label: "Flexible Mutation",
            in_progress: "Flexible Mutation in progress",
            success: "Successfully ran Flexible Mutation",
            error: "Error running Flexible Mutation",
        },
    }
}
