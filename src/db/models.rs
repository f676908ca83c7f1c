use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uid: i64,
    pub name: String,
}

/// A DishDash thread joined with its post. The post's owner owns the thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub thid: i64,
    pub postid: i64,
    pub description: String,
    pub owner_id: i64,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thid: i64,
    pub postid: i64,
    pub description: String,
    pub owner_id: i64,
    pub owner_name: Option<String>,
    pub message_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub mid: i64,
    pub reply_to: Option<i64>,
    pub sender: i64,
    pub sender_name: Option<String>,
    pub content: String,
    pub thread_id: i64,
    pub sent_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dish {
    pub did: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishComment {
    pub commentid: i64,
    pub owner: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub comment: String,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishPicture {
    pub pid: i64,
    pub filename: String,
    pub owner: Option<i64>,
    pub owner_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeastEvent {
    pub nid: i64,
    pub time: String,
    pub location: String,
    pub description: String,
}
