//! crates/discussion_core/src/domain.rs
//!
//! Defines the discussion data model carried by the real-time gateway events:
//! threads, posts, reactions and the presence roster entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Threads
//=========================================================================================

/// The kind of resource a discussion thread is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscussionType {
    CourseReview,
    LessonDiscussion,
}

/// A discussion surface bound 1:1 to a course review or a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DiscussionType,
    pub resource_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_rating: Option<f64>,
    /// Top-level posts in server order. The server makes no ordering promise.
    #[serde(default)]
    pub posts: Vec<Post>,
}

/// A thread listing entry that also carries the server-side post count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadWithPostCount {
    #[serde(flatten)]
    pub thread: Thread,
    #[serde(rename = "_count", default)]
    pub count: PostCount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCount {
    pub posts: u32,
}

//=========================================================================================
// Posts
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyCount {
    pub replies: u32,
}

/// A single discussion entry within a thread, possibly a reply to another post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Post>>,
    #[serde(default)]
    pub replies: Vec<Post>,
    pub author_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_counts: Option<ReactionCounts>,
    #[serde(rename = "_count", default)]
    pub count: ReplyCount,
}

impl Post {
    /// Whether this post answers another post rather than the thread itself.
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Whether the post has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns the server-provided reaction summary, or tallies the raw
    /// reaction list when the summary is absent.
    pub fn reaction_summary(&self) -> ReactionCounts {
        self.reaction_counts
            .clone()
            .unwrap_or_else(|| ReactionCounts::tally(&self.reactions))
    }

    /// The reaction left by `user_id`, if any. Uniqueness is not checked here;
    /// the first match wins.
    pub fn reaction_by(&self, user_id: &str) -> Option<&Reaction> {
        self.reactions.iter().find(|r| r.user_id == user_id)
    }
}

//=========================================================================================
// Reactions
//=========================================================================================

/// The fixed set of emoji-style reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReactionType {
    Like,
    Love,
    Care,
    Haha,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub const ALL: [ReactionType; 7] = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Care,
        ReactionType::Haha,
        ReactionType::Wow,
        ReactionType::Sad,
        ReactionType::Angry,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            ReactionType::Like => "👍",
            ReactionType::Love => "❤️",
            ReactionType::Care => "🤗",
            ReactionType::Haha => "😄",
            ReactionType::Wow => "😮",
            ReactionType::Sad => "😢",
            ReactionType::Angry => "😠",
        }
    }
}

/// A single user's reaction to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: ReactionType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Denormalized per-kind reaction counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    #[serde(rename = "LIKE", default)]
    pub like: u32,
    #[serde(rename = "LOVE", default)]
    pub love: u32,
    #[serde(rename = "CARE", default)]
    pub care: u32,
    #[serde(rename = "HAHA", default)]
    pub haha: u32,
    #[serde(rename = "WOW", default)]
    pub wow: u32,
    #[serde(rename = "SAD", default)]
    pub sad: u32,
    #[serde(rename = "ANGRY", default)]
    pub angry: u32,
    #[serde(default)]
    pub total: u32,
}

impl ReactionCounts {
    /// Builds a summary from a raw reaction list.
    pub fn tally(reactions: &[Reaction]) -> Self {
        let mut counts = Self::default();
        for reaction in reactions {
            *counts.slot_mut(reaction.kind) += 1;
            counts.total += 1;
        }
        counts
    }

    pub fn get(&self, kind: ReactionType) -> u32 {
        match kind {
            ReactionType::Like => self.like,
            ReactionType::Love => self.love,
            ReactionType::Care => self.care,
            ReactionType::Haha => self.haha,
            ReactionType::Wow => self.wow,
            ReactionType::Sad => self.sad,
            ReactionType::Angry => self.angry,
        }
    }

    fn slot_mut(&mut self, kind: ReactionType) -> &mut u32 {
        match kind {
            ReactionType::Like => &mut self.like,
            ReactionType::Love => &mut self.love,
            ReactionType::Care => &mut self.care,
            ReactionType::Haha => &mut self.haha,
            ReactionType::Wow => &mut self.wow,
            ReactionType::Sad => &mut self.sad,
            ReactionType::Angry => &mut self.angry,
        }
    }
}

//=========================================================================================
// Presence
//=========================================================================================

/// A user currently viewing a thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadUser {
    pub user_id: String,
    pub user_name: String,
}

/// Users currently typing share the roster entry shape.
pub type TypingUser = ThreadUser;

/// The full presence roster of a thread, sent wholesale by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadUsers {
    pub thread_id: String,
    pub users: Vec<ThreadUser>,
}

/// Payload of a post deletion notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPost {
    pub post_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post_json() -> serde_json::Value {
        json!({
            "id": "p1",
            "threadId": "t1",
            "authorId": "u1",
            "content": "Great course",
            "rating": 5,
            "isEdited": false,
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z",
            "reactions": [
                {"id": "r1", "postId": "p1", "userId": "u2", "type": "LIKE",
                 "createdAt": "2024-05-01T10:01:00Z", "updatedAt": "2024-05-01T10:01:00Z"},
                {"id": "r2", "postId": "p1", "userId": "u3", "type": "LOVE",
                 "createdAt": "2024-05-01T10:02:00Z", "updatedAt": "2024-05-01T10:02:00Z"},
                {"id": "r3", "postId": "p1", "userId": "u4", "type": "LIKE",
                 "createdAt": "2024-05-01T10:03:00Z", "updatedAt": "2024-05-01T10:03:00Z"}
            ],
            "_count": {"replies": 2}
        })
    }

    #[test]
    fn decodes_gateway_post() {
        let post: Post = serde_json::from_value(post_json()).unwrap();
        assert_eq!(post.thread_id, "t1");
        assert_eq!(post.rating, Some(5.0));
        assert_eq!(post.count.replies, 2);
        assert!(!post.is_reply());
        assert!(!post.is_deleted());
        assert_eq!(post.reactions[1].kind, ReactionType::Love);
    }

    #[test]
    fn tallies_reactions_when_summary_missing() {
        let post: Post = serde_json::from_value(post_json()).unwrap();
        let summary = post.reaction_summary();
        assert_eq!(summary.get(ReactionType::Like), 2);
        assert_eq!(summary.get(ReactionType::Love), 1);
        assert_eq!(summary.get(ReactionType::Angry), 0);
        assert_eq!(summary.total, 3);
        let listed: u32 = ReactionType::ALL.iter().map(|kind| summary.get(*kind)).sum();
        assert_eq!(listed, summary.total);
        assert_eq!(ReactionType::Like.emoji(), "👍");
    }

    #[test]
    fn prefers_server_summary() {
        let mut value = post_json();
        value["reactionCounts"] = json!({
            "LIKE": 10, "LOVE": 0, "CARE": 0, "HAHA": 1, "WOW": 0, "SAD": 0, "ANGRY": 0, "total": 11
        });
        let post: Post = serde_json::from_value(value).unwrap();
        assert_eq!(post.reaction_summary().like, 10);
        assert_eq!(post.reaction_summary().total, 11);
    }

    #[test]
    fn reply_and_soft_delete_flags() {
        let mut value = post_json();
        value["parentId"] = json!("p0");
        value["deletedAt"] = json!("2024-05-02T08:00:00Z");
        let post: Post = serde_json::from_value(value).unwrap();
        assert!(post.is_reply());
        assert!(post.is_deleted());
        assert_eq!(post.reaction_by("u3").map(|r| r.kind), Some(ReactionType::Love));
        assert!(post.reaction_by("nobody").is_none());
    }

    #[test]
    fn thread_listing_with_counts() {
        let thread: ThreadWithPostCount = serde_json::from_value(json!({
            "id": "t1",
            "type": "LESSON_DISCUSSION",
            "resourceId": "lesson-9",
            "title": "Lesson 9",
            "createdAt": "2024-05-01T10:00:00Z",
            "updatedAt": "2024-05-01T10:00:00Z",
            "deletedAt": null,
            "posts": [],
            "_count": {"posts": 4}
        }))
        .unwrap();
        assert_eq!(thread.thread.kind, DiscussionType::LessonDiscussion);
        assert_eq!(thread.count.posts, 4);
    }
}
