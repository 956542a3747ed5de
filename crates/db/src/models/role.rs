use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::role;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateRole {
    pub name: String,
    pub description: String,
}

impl Role {
    pub(crate) fn from_model(model: role::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = role::Entity::find()
            .order_by_asc(role::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = role::Entity::find()
            .filter(role::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_row_id<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        let record = role::Entity::find_by_id(row_id).one(db).await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateRole) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = role::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            name: Set(data.name.trim().to_string()),
            description: Set(data.description.trim().to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await?;
        Ok(Self::from_model(model))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn roles_are_listed_by_name() {
        let db = setup_db().await;
        for name in ["Frontend", "Backend"] {
            Role::create(
                &db,
                &CreateRole {
                    name: name.to_string(),
                    description: format!("{name} engineer"),
                },
            )
            .await
            .unwrap();
        }

        let names: Vec<_> = Role::find_all(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|role| role.name)
            .collect();
        assert_eq!(names, vec!["Backend", "Frontend"]);
    }
}
