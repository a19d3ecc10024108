//! Wire messages exchanged with the job master over the message bus.
//!
//! # 送信（query）
//! `{ type: "query", content: { subtype: "JobMaster", message: { args: [...] } } }`
//!
//! # 受信
//! `{ type: "job.msg.task.output", content: { subtype, message: { uid, task, pos, len, msg, last } } }`
//! ほか、このクレートが解釈しない型（job.msg.batch など）も型付きで受け取ります。

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

use super::errors::DecodeError;
use super::key::TaskKey;

/// Arguments of a `JobMaster` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryArgs {
    /// `["task", owner_id, task_id, offset]`: next log chunk from `offset`.
    Task {
        owner_id: String,
        task_id: String,
        offset: u64,
    },
    Processing,
    History,
    Files,
}

impl QueryArgs {
    pub fn task(key: &TaskKey, offset: u64) -> Self {
        QueryArgs::Task {
            owner_id: key.owner_id().to_string(),
            task_id: key.task_id().to_string(),
            offset,
        }
    }
}

impl Serialize for QueryArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryArgs::Task {
                owner_id,
                task_id,
                offset,
            } => {
                let mut seq = serializer.serialize_seq(Some(4))?;
                seq.serialize_element("task")?;
                seq.serialize_element(owner_id)?;
                seq.serialize_element(task_id)?;
                seq.serialize_element(offset)?;
                seq.end()
            }
            QueryArgs::Processing => ["processing"].serialize(serializer),
            QueryArgs::History => ["history"].serialize(serializer),
            QueryArgs::Files => ["files"].serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryBody {
    pub args: QueryArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryContent {
    pub subtype: &'static str,
    pub message: QueryBody,
}

/// Message sent on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: QueryContent,
}

impl OutboundMessage {
    pub const QUERY: &'static str = "query";
    pub const JOB_MASTER: &'static str = "JobMaster";

    pub fn query(args: QueryArgs) -> Self {
        Self {
            kind: Self::QUERY,
            content: QueryContent {
                subtype: Self::JOB_MASTER,
                message: QueryBody { args },
            },
        }
    }

    pub fn args(&self) -> &QueryArgs {
        &self.content.message.args
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of a `job.msg.task.output` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub uid: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<u64>,
    pub msg: String,
    pub last: u8,
}

impl TaskOutput {
    pub fn is_last(&self) -> bool {
        self.last != 0
    }

    pub fn belongs_to(&self, key: &TaskKey) -> bool {
        key.matches(&self.uid, &self.task)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutputContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub message: TaskOutput,
}

/// Messages received from the bus.
///
/// Only `TaskOutput` is interpreted here; the other shapes belong to other
/// dashboard views and are carried as raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    TaskOutput(TaskOutputContent),
    Job(Value),
    JobBatch(Value),
    JobHistory(Value),
    FileExists(Value),
    FileNew(Value),
    Unknown { kind: String, content: Value },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

impl InboundMessage {
    pub const TASK_OUTPUT: &'static str = "job.msg.task.output";
    const JOB: &'static str = "job.msg";
    const JOB_BATCH: &'static str = "job.msg.batch";
    const JOB_HISTORY: &'static str = "job.msg.history";
    const FILE_EXISTS: &'static str = "job.msg.file.exists";
    const FILE_NEW: &'static str = "job.msg.file.new";

    /// Decode one text frame.
    ///
    /// A frame whose `type` is known but whose content is missing fields is an
    /// error; an unknown `type` decodes to `Unknown`.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let raw: RawFrame = serde_json::from_str(frame)?;
        let message = match raw.kind.as_str() {
            Self::TASK_OUTPUT => InboundMessage::TaskOutput(serde_json::from_value(raw.content)?),
            Self::JOB => InboundMessage::Job(raw.content),
            Self::JOB_BATCH => InboundMessage::JobBatch(raw.content),
            Self::JOB_HISTORY => InboundMessage::JobHistory(raw.content),
            Self::FILE_EXISTS => InboundMessage::FileExists(raw.content),
            Self::FILE_NEW => InboundMessage::FileNew(raw.content),
            _ => InboundMessage::Unknown {
                kind: raw.kind,
                content: raw.content,
            },
        };
        Ok(message)
    }

    /// Encode back to a text frame.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let (kind, content) = match self {
            InboundMessage::TaskOutput(content) => {
                (Self::TASK_OUTPUT, serde_json::to_value(content)?)
            }
            InboundMessage::Job(content) => (Self::JOB, content.clone()),
            InboundMessage::JobBatch(content) => (Self::JOB_BATCH, content.clone()),
            InboundMessage::JobHistory(content) => (Self::JOB_HISTORY, content.clone()),
            InboundMessage::FileExists(content) => (Self::FILE_EXISTS, content.clone()),
            InboundMessage::FileNew(content) => (Self::FILE_NEW, content.clone()),
            InboundMessage::Unknown { kind, content } => {
                return serde_json::to_string(&json!({ "type": kind, "content": content }));
            }
        };
        serde_json::to_string(&json!({ "type": kind, "content": content }))
    }

    pub fn task_output(output: TaskOutput) -> Self {
        InboundMessage::TaskOutput(TaskOutputContent {
            subtype: Some("output".to_string()),
            message: output,
        })
    }

    /// Task output addressed to `key`, if this is one.
    pub fn output_for(&self, key: &TaskKey) -> Option<&TaskOutput> {
        match self {
            InboundMessage::TaskOutput(content) if content.message.belongs_to(key) => {
                Some(&content.message)
            }
            _ => None,
        }
    }
}
