use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
    sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::ids;
use crate::{
    entities::{project_member, todo, user},
    types::{TodoPriority, TodoStatus},
};

#[derive(Debug, Error)]
pub enum TodoError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Todo not found")]
    TodoNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Assignee is not a member of this project")]
    AssigneeNotMember,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Todo {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub role: String,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    /// Task record the AI service produced, when the todo was imported.
    pub raw: Option<serde_json::Value>,
    pub ai_node_id: Option<i64>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TodoWithAssignee {
    #[serde(flatten)]
    #[ts(flatten)]
    pub todo: Todo,
    pub assignee_email: String,
}

impl std::ops::Deref for TodoWithAssignee {
    type Target = Todo;
    fn deref(&self) -> &Self::Target {
        &self.todo
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTodo {
    pub name: String,
    pub role: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub priority: TodoPriority,
    #[serde(skip)]
    #[ts(skip)]
    pub raw: Option<serde_json::Value>,
    #[serde(skip)]
    #[ts(skip)]
    pub ai_node_id: Option<i64>,
}

fn parse_raw(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|value| match serde_json::from_str(&value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            tracing::warn!("Ignoring unparsable raw todo payload: {}", err);
            None
        }
    })
}

impl Todo {
    fn from_model(model: todo::Model, project_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: model.uuid,
            project_id,
            user_id,
            name: model.name,
            role: model.role,
            status: model.status,
            priority: model.priority,
            raw: parse_raw(model.raw),
            ai_node_id: model.ai_node_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    async fn resolve<C: ConnectionTrait>(db: &C, model: todo::Model) -> Result<Self, DbErr> {
        let project_id = ids::project_uuid_by_id(db, model.project_id)
            .await?
            .ok_or(DbErr::RecordNotFound("Project not found".to_string()))?;
        let user_id = ids::user_uuid_by_id(db, model.user_id)
            .await?
            .ok_or(DbErr::RecordNotFound("User not found".to_string()))?;
        Ok(Self::from_model(model, project_id, user_id))
    }

    async fn find_model<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<todo::Model, TodoError> {
        todo::Entity::find()
            .filter(todo::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TodoError::TodoNotFound)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = todo::Entity::find()
            .filter(todo::Column::Uuid.eq(id))
            .one(db)
            .await?;
        match record {
            Some(model) => Ok(Some(Self::resolve(db, model).await?)),
            None => Ok(None),
        }
    }

    /// Todos of a project with their assignee's email, oldest first.
    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<TodoWithAssignee>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };

        let records = todo::Entity::find()
            .filter(todo::Column::ProjectId.eq(project_row_id))
            .order_by_asc(todo::Column::CreatedAt)
            .order_by_asc(todo::Column::Id)
            .all(db)
            .await?;

        let user_row_ids: HashSet<i64> = records.iter().map(|model| model.user_id).collect();
        let assignees: HashMap<i64, (Uuid, String)> = if user_row_ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .select_only()
                .column(user::Column::Id)
                .column(user::Column::Uuid)
                .column(user::Column::Email)
                .filter(user::Column::Id.is_in(user_row_ids))
                .into_tuple::<(i64, Uuid, String)>()
                .all(db)
                .await?
                .into_iter()
                .map(|(row_id, uuid, email)| (row_id, (uuid, email)))
                .collect()
        };

        let mut todos = Vec::with_capacity(records.len());
        for model in records {
            let Some((user_id, email)) = assignees.get(&model.user_id).cloned() else {
                continue;
            };
            todos.push(TodoWithAssignee {
                todo: Self::from_model(model, project_id, user_id),
                assignee_email: email,
            });
        }
        Ok(todos)
    }

    /// The assignee must belong to the project.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        data: &CreateTodo,
    ) -> Result<Self, TodoError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TodoError::ProjectNotFound)?;
        let user_row_id = ids::user_id_by_uuid(db, data.user_id)
            .await?
            .ok_or(TodoError::AssigneeNotMember)?;
        Self::create_for_rows(db, project_row_id, user_row_id, data)
            .await
            .map(|model| Self::from_model(model, project_id, data.user_id))
    }

    async fn create_for_rows<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
        user_row_id: i64,
        data: &CreateTodo,
    ) -> Result<todo::Model, TodoError> {
        let membership = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .filter(project_member::Column::UserId.eq(user_row_id))
            .one(db)
            .await?;
        if membership.is_none() {
            return Err(TodoError::AssigneeNotMember);
        }

        let raw = data
            .raw
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| DbErr::Custom(err.to_string()))?;

        let now = Utc::now();
        let active = todo::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            project_id: Set(project_row_id),
            user_id: Set(user_row_id),
            name: Set(data.name.trim().to_string()),
            role: Set(data.role.trim().to_string()),
            status: Set(data.status),
            priority: Set(data.priority),
            raw: Set(raw),
            ai_node_id: Set(data.ai_node_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        Ok(active.insert(db).await?)
    }

    pub async fn set_status<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        status: TodoStatus,
    ) -> Result<Self, TodoError> {
        let record = Self::find_model(db, id).await?;
        let mut active: todo::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::resolve(db, updated).await?)
    }

    pub async fn set_priority<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        priority: TodoPriority,
    ) -> Result<Self, TodoError> {
        let record = Self::find_model(db, id).await?;
        let mut active: todo::ActiveModel = record.into();
        active.priority = Set(priority);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::resolve(db, updated).await?)
    }

    /// Sets every todo of the project to `status`, returning rows touched.
    pub async fn set_status_for_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        status: TodoStatus,
    ) -> Result<u64, TodoError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(TodoError::ProjectNotFound)?;
        let result = todo::Entity::update_many()
            .col_expr(todo::Column::Status, Expr::value(status.to_value()))
            .col_expr(todo::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(todo::Column::ProjectId.eq(project_row_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// AI node ids already imported into the project.
    pub async fn ai_node_ids_for_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<HashSet<i64>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(HashSet::new());
        };
        let node_ids: Vec<Option<i64>> = todo::Entity::find()
            .select_only()
            .column(todo::Column::AiNodeId)
            .filter(todo::Column::ProjectId.eq(project_row_id))
            .filter(todo::Column::AiNodeId.is_not_null())
            .into_tuple()
            .all(db)
            .await?;
        Ok(node_ids.into_iter().flatten().collect())
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let result = todo::Entity::delete_many()
            .filter(todo::Column::Uuid.eq(id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}
