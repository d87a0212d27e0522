use chrono::{DateTime, Utc};
use im_core::entities::{group_members, groups};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be between 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupDto {
    pub group_id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub description: Option<String>,
    pub owner_id: String,
    pub member_count: usize,
    pub created_at: DateTime<Utc>,
}

impl GroupDto {
    pub fn from_model(group: groups::Model, member_count: usize) -> Self {
        Self {
            group_id: group.id,
            name: group.name,
            avatar: group.avatar,
            description: group.description,
            owner_id: group.owner_id,
            member_count,
            created_at: group.created_at.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupMemberDto {
    pub user_id: String,
    pub role: i16,
    pub joined_at: DateTime<Utc>,
}

impl From<group_members::Model> for GroupMemberDto {
    fn from(member: group_members::Model) -> Self {
        Self {
            user_id: member.user_id,
            role: member.role,
            joined_at: member.joined_at.into(),
        }
    }
}
