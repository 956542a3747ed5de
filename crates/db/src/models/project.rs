use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
    sea_query::Query,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{ids, user::User};
use crate::entities::{project, project_member};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("User not found")]
    UserNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Workspace id on the AI service.
    pub ai_service_id: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub description: String,
    pub ai_service_id: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Project {
    fn from_model(model: project::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            ai_service_id: model.ai_service_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn find_model<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<project::Model, ProjectError> {
        project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(ProjectError::ProjectNotFound)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// Projects the user is a member of, newest first.
    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };
        let memberships = Query::select()
            .column(project_member::Column::ProjectId)
            .from(project_member::Entity)
            .and_where(project_member::Column::UserId.eq(user_row_id))
            .to_owned();
        let records = project::Entity::find()
            .filter(project::Column::Id.in_subquery(memberships))
            .order_by_desc(project::Column::CreatedAt)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn is_member<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DbErr> {
        let (Some(project_row_id), Some(user_row_id)) = (
            ids::project_id_by_uuid(db, id).await?,
            ids::user_id_by_uuid(db, user_id).await?,
        ) else {
            return Ok(false);
        };
        let membership = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .filter(project_member::Column::UserId.eq(user_row_id))
            .one(db)
            .await?;
        Ok(membership.is_some())
    }

    pub async fn members<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Vec<User>, ProjectError> {
        let model = Self::find_model(db, id).await?;
        Ok(User::find_by_project(db, model.id).await?)
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateProject) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            name: Set(data.name.trim().to_string()),
            description: Set(data.description.trim().to_string()),
            ai_service_id: Set(data.ai_service_id.clone()),
            analyze_response: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }

    /// Adds the given users as members. Users who already belong to the
    /// project are skipped; returns how many memberships were created.
    pub async fn add_members<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<u64, ProjectError> {
        let model = Self::find_model(db, id).await?;

        let requested: HashSet<Uuid> = user_ids.iter().copied().collect();
        let requested: Vec<Uuid> = requested.into_iter().collect();
        let user_row_ids = ids::user_ids_by_uuids(db, &requested).await?;
        if user_row_ids.len() != requested.len() {
            return Err(ProjectError::UserNotFound);
        }

        let existing: HashSet<i64> = project_member::Entity::find()
            .select_only()
            .column(project_member::Column::UserId)
            .filter(project_member::Column::ProjectId.eq(model.id))
            .into_tuple::<i64>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        let now = Utc::now();
        let mut added = 0;
        for user_row_id in user_row_ids {
            if existing.contains(&user_row_id) {
                continue;
            }
            let active = project_member::ActiveModel {
                project_id: Set(model.id),
                user_id: Set(user_row_id),
                created_at: Set(now.into()),
                ..Default::default()
            };
            active.insert(db).await?;
            added += 1;
        }
        Ok(added)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        let record = Self::find_model(db, id).await?;
        let mut active: project::ActiveModel = record.into();
        if let Some(name) = data.name.as_ref() {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = data.description.as_ref() {
            active.description = Set(description.trim().to_string());
        }
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn set_analyze_response<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        response: Option<String>,
    ) -> Result<(), ProjectError> {
        let record = Self::find_model(db, id).await?;
        let mut active: project::ActiveModel = record.into();
        active.analyze_response = Set(response);
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
        Ok(())
    }

    pub async fn analyze_response<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<Option<String>, ProjectError> {
        Ok(Self::find_model(db, id).await?.analyze_response)
    }

    /// Todos and memberships go with the project through cascading FKs.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = project::Entity::delete_many()
            .filter(project::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
