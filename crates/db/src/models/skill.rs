use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::skill;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, TS)]
pub struct CreateSkill {
    pub name: String,
    pub description: String,
}

impl Skill {
    pub(crate) fn from_model(model: skill::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name,
            description: model.description,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    /// All skills, minus the ones listed in `exclude`.
    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        exclude: &[Uuid],
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = skill::Entity::find().order_by_asc(skill::Column::Name);
        if !exclude.is_empty() {
            query = query.filter(skill::Column::Uuid.is_not_in(exclude.iter().copied()));
        }
        let records = query.all(db).await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = skill::Entity::find()
            .filter(skill::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateSkill) -> Result<Self, DbErr> {
        let now = Utc::now();
        let active = skill::ActiveModel {
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
