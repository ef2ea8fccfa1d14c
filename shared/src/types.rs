use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// The kind of entity a proof of work is mined against.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetType {
    User,
    Board,
    Thread,
    Post,
    Image,
    ChatRoom,
    Global,
}

impl TargetType {
    /// Content targets carry an aggregate PoW total and can lock.
    pub fn is_content(&self) -> bool {
        matches!(self, TargetType::Thread | TargetType::Post | TargetType::Board)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::User => "user",
            TargetType::Board => "board",
            TargetType::Thread => "thread",
            TargetType::Post => "post",
            TargetType::Image => "image",
            TargetType::ChatRoom => "chat-room",
            TargetType::Global => "global",
        }
    }
}

impl Display for TargetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TargetType::User),
            "board" => Ok(TargetType::Board),
            "thread" => Ok(TargetType::Thread),
            "post" => Ok(TargetType::Post),
            "image" => Ok(TargetType::Image),
            "chat-room" => Ok(TargetType::ChatRoom),
            "global" => Ok(TargetType::Global),
            other => Err(format!("unknown target type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TargetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A mining target: the entity kind plus its identifier, if any.
/// `Global` and `User` scoped searches may run without an id.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub target_type: TargetType,
    pub target_id: Option<TargetId>,
}

impl Target {
    pub fn new(target_type: TargetType, target_id: Option<TargetId>) -> Self {
        Self { target_type, target_id }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.target_id {
            Some(id) => write!(f, "{}:{}", self.target_type, id),
            None => write!(f, "{}", self.target_type),
        }
    }
}
