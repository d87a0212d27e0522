use super::dtos::*;
use crate::{AppError, AppResult};
use chrono::Utc;
use im_core::entities::{group_members, groups};
use im_core::ids;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use validator::Validate;

const DEFAULT_MAX_MEMBERS: i32 = 500;

pub struct CreateGroupUseCase;

impl CreateGroupUseCase {
    pub async fn execute(
        db: &DatabaseConnection,
        owner_id: &str,
        req: CreateGroupRequest,
    ) -> AppResult<GroupDto> {
        req.validate()?;

        let group_id = ids::new_entity_id();
        let now = Utc::now();

        let txn = db.begin().await?;

        let group = groups::ActiveModel {
            id: Set(group_id.clone()),
            name: Set(req.name),
            avatar: Set(req.avatar),
            description: Set(req.description),
            owner_id: Set(owner_id.to_string()),
            max_members: Set(DEFAULT_MAX_MEMBERS),
            status: Set(1),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let group = group.insert(&txn).await?;

        let owner = group_members::ActiveModel {
            id: Set(ids::new_entity_id()),
            group_id: Set(group_id.clone()),
            user_id: Set(owner_id.to_string()),
            role: Set(group_members::ROLE_OWNER),
            status: Set(group_members::MEMBER_ACTIVE),
            joined_at: Set(now.into()),
            created_at: Set(now.into()),
        };
        owner.insert(&txn).await?;

        let mut member_count = 1;
        for user_id in req.member_ids {
            if user_id == owner_id {
                continue;
            }
            let member = group_members::ActiveModel {
                id: Set(ids::new_entity_id()),
                group_id: Set(group_id.clone()),
                user_id: Set(user_id),
                role: Set(group_members::ROLE_MEMBER),
                status: Set(group_members::MEMBER_ACTIVE),
                joined_at: Set(now.into()),
                created_at: Set(now.into()),
            };
            member.insert(&txn).await?;
            member_count += 1;
        }

        txn.commit().await?;

        Ok(GroupDto::from_model(group, member_count))
    }
}

pub struct ListGroupMembersUseCase;

impl ListGroupMembersUseCase {
    /// Membership gates visibility: only a member may list members.
    pub async fn execute(
        db: &DatabaseConnection,
        group_id: &str,
        requester_id: &str,
    ) -> AppResult<Vec<GroupMemberDto>> {
        if !is_active_member(db, group_id, requester_id).await? {
            return Err(AppError::PermissionDenied(
                "requester is not a member of the group".to_string(),
            ));
        }

        let members = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id))
            .filter(group_members::Column::Status.eq(group_members::MEMBER_ACTIVE))
            .all(db)
            .await?;

        Ok(members.into_iter().map(Into::into).collect())
    }
}

/// Active member ids for fan-out. The caller is responsible for skipping the
/// sender.
pub async fn active_member_ids<C: ConnectionTrait>(
    conn: &C,
    group_id: &str,
) -> Result<Vec<String>, DbErr> {
    let members = group_members::Entity::find()
        .filter(group_members::Column::GroupId.eq(group_id))
        .filter(group_members::Column::Status.eq(group_members::MEMBER_ACTIVE))
        .all(conn)
        .await?;
    Ok(members.into_iter().map(|m| m.user_id).collect())
}

pub async fn is_active_member<C: ConnectionTrait>(
    conn: &C,
    group_id: &str,
    user_id: &str,
) -> Result<bool, DbErr> {
    let member = group_members::Entity::find()
        .filter(group_members::Column::GroupId.eq(group_id))
        .filter(group_members::Column::UserId.eq(user_id))
        .filter(group_members::Column::Status.eq(group_members::MEMBER_ACTIVE))
        .one(conn)
        .await?;
    Ok(member.is_some())
}
