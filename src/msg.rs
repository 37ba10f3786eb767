use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// A message which is sent after a draw has been modified. Listeners use
/// this to refresh whatever they are displaying; the operation which sent it
/// has already returned its own result to its caller.
pub struct Msg {
    pub tournament_id: String,
    pub round_id: String,
    pub inner: MsgContents,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum MsgContents {
    DrawGenerated { generation_id: String },
    DrawRolledBack { generation_id: String },
    DrawAccepted,
    RoundCompleted,
}
