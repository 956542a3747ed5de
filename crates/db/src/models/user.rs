use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr,
    sea_query::{LikeExpr, Query, SelectStatement},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{ids, role::Role, skill::Skill};
use crate::entities::{project_member, role, skill, user, user_skill};

const AUTOCOMPLETE_LIMIT: u64 = 5;
const LIKE_ESCAPE: char = '\\';

/// Substring pattern where `%`, `_` and the escape char match literally.
fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("User not found")]
    UserNotFound,
    #[error("Duplicate email, Please try another email.")]
    DuplicateEmail,
    #[error("Role not found")]
    RoleNotFound,
    #[error("Skill not found")]
    SkillNotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub experience: Option<String>,
    pub profile_url: Option<String>,
    /// Person key used when talking to the AI service.
    #[serde(skip)]
    #[ts(skip)]
    pub ai_service_id: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// Password hash lookup for login; never serialised.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub ai_service_id: String,
    pub role_id: Option<Uuid>,
    pub skill_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UserSearch {
    pub query: String,
    #[serde(default)]
    pub id_not_in: Vec<Uuid>,
    #[serde(default)]
    pub not_in_project_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct UserSearchResult {
    pub id: Uuid,
    pub email: String,
    pub profile_url: Option<String>,
}

impl User {
    pub(crate) fn from_model(model: user::Model) -> Self {
        Self {
            id: model.uuid,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            experience: model.experience,
            profile_url: model.profile_url,
            ai_service_id: model.ai_service_id,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    async fn find_model<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<user::Model, UserError> {
        user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(UserError::UserNotFound)
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_credentials_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<UserCredentials>, DbErr> {
        let record = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?;
        Ok(record.map(|model| UserCredentials {
            id: model.uuid,
            password_hash: model.password,
        }))
    }

    /// Inserts the user and attaches the optional role and skills. Callers
    /// run this inside a transaction so a bad skill id rolls back the user.
    pub async fn create<C: ConnectionTrait>(db: &C, data: &CreateUser) -> Result<Self, UserError> {
        if Self::find_by_email(db, &data.email).await?.is_some() {
            return Err(UserError::DuplicateEmail);
        }

        let role_row_id = match data.role_id {
            Some(role_id) => Some(
                ids::role_id_by_uuid(db, role_id)
                    .await?
                    .ok_or(UserError::RoleNotFound)?,
            ),
            None => None,
        };

        let now = Utc::now();
        let active = user::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            first_name: Set(data.first_name.trim().to_string()),
            last_name: Set(data.last_name.trim().to_string()),
            email: Set(data.email.trim().to_string()),
            password: Set(data.password_hash.clone()),
            experience: Set(None),
            role_id: Set(role_row_id),
            ai_service_id: Set(data.ai_service_id.clone()),
            profile_url: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        let model = active.insert(db).await.map_err(|err| {
            if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
                UserError::DuplicateEmail
            } else {
                UserError::Database(err)
            }
        })?;

        for skill_id in &data.skill_ids {
            Self::attach_skill(db, model.id, *skill_id).await?;
        }

        Ok(Self::from_model(model))
    }

    pub async fn role<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Role>, UserError> {
        let model = Self::find_model(db, id).await?;
        match model.role_id {
            Some(role_row_id) => Ok(Role::find_by_row_id(db, role_row_id).await?),
            None => Ok(None),
        }
    }

    pub async fn set_role<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        role_id: Option<Uuid>,
    ) -> Result<Option<Role>, UserError> {
        let model = Self::find_model(db, id).await?;
        let role = match role_id {
            Some(role_id) => Some(
                role::Entity::find()
                    .filter(role::Column::Uuid.eq(role_id))
                    .one(db)
                    .await?
                    .ok_or(UserError::RoleNotFound)?,
            ),
            None => None,
        };

        let mut active: user::ActiveModel = model.into();
        active.role_id = Set(role.as_ref().map(|role| role.id));
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;

        Ok(role.map(Role::from_model))
    }

    pub async fn skills<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Vec<Skill>, UserError> {
        let model = Self::find_model(db, id).await?;
        Ok(Self::skills_for_row(db, model.id).await?)
    }

    pub(crate) async fn skills_for_row<C: ConnectionTrait>(
        db: &C,
        user_row_id: i64,
    ) -> Result<Vec<Skill>, DbErr> {
        let records = skill::Entity::find()
            .filter(skill::Column::Id.in_subquery(skill_ids_of_user(user_row_id)))
            .order_by_asc(skill::Column::Name)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Skill::from_model).collect())
    }

    /// Adding a skill the user already has is a no-op.
    pub async fn add_skill<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        skill_id: Uuid,
    ) -> Result<(), UserError> {
        let model = Self::find_model(db, id).await?;
        Self::attach_skill(db, model.id, skill_id).await
    }

    async fn attach_skill<C: ConnectionTrait>(
        db: &C,
        user_row_id: i64,
        skill_id: Uuid,
    ) -> Result<(), UserError> {
        let skill_row_id = ids::skill_id_by_uuid(db, skill_id)
            .await?
            .ok_or(UserError::SkillNotFound)?;

        let existing = user_skill::Entity::find()
            .filter(user_skill::Column::UserId.eq(user_row_id))
            .filter(user_skill::Column::SkillId.eq(skill_row_id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let active = user_skill::ActiveModel {
            user_id: Set(user_row_id),
            skill_id: Set(skill_row_id),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };
        active.insert(db).await?;
        Ok(())
    }

    pub async fn remove_skill<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        skill_id: Uuid,
    ) -> Result<u64, UserError> {
        let model = Self::find_model(db, id).await?;
        let Some(skill_row_id) = ids::skill_id_by_uuid(db, skill_id).await? else {
            return Ok(0);
        };
        let result = user_skill::Entity::delete_many()
            .filter(user_skill::Column::UserId.eq(model.id))
            .filter(user_skill::Column::SkillId.eq(skill_row_id))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn set_experience<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        experience: Option<String>,
    ) -> Result<Self, UserError> {
        let model = Self::find_model(db, id).await?;
        let mut active: user::ActiveModel = model.into();
        active.experience = Set(experience
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()));
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(db).await?;
        Ok(Self::from_model(updated))
    }

    /// Email autocomplete for the invite picker.
    pub async fn search<C: ConnectionTrait>(
        db: &C,
        params: &UserSearch,
    ) -> Result<Vec<UserSearchResult>, DbErr> {
        let mut query = user::Entity::find()
            .filter(user::Column::Email.like(contains_pattern(params.query.trim())))
            .order_by_asc(user::Column::Email)
            .limit(AUTOCOMPLETE_LIMIT);

        if !params.id_not_in.is_empty() {
            query = query.filter(user::Column::Uuid.is_not_in(params.id_not_in.iter().copied()));
        }

        if let Some(project_id) = params.not_in_project_id {
            if let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? {
                query = query
                    .filter(user::Column::Id.not_in_subquery(member_ids_of_project(project_row_id)));
            }
        }

        let records = query.all(db).await?;
        Ok(records
            .into_iter()
            .map(|model| UserSearchResult {
                id: model.uuid,
                email: model.email,
                profile_url: model.profile_url,
            })
            .collect())
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        let records = user::Entity::find()
            .filter(user::Column::Id.in_subquery(member_ids_of_project(project_row_id)))
            .order_by_asc(user::Column::FirstName)
            .order_by_asc(user::Column::LastName)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }
}

fn skill_ids_of_user(user_row_id: i64) -> SelectStatement {
    Query::select()
        .column(user_skill::Column::SkillId)
        .from(user_skill::Entity)
        .and_where(user_skill::Column::UserId.eq(user_row_id))
        .to_owned()
}

pub(crate) fn member_ids_of_project(project_row_id: i64) -> SelectStatement {
    Query::select()
        .column(project_member::Column::UserId)
        .from(project_member::Entity)
        .and_where(project_member::Column::ProjectId.eq(project_row_id))
        .to_owned()
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::models::{
        role::CreateRole,
        skill::CreateSkill,
    };

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn new_user(email: &str, ai_service_id: &str) -> CreateUser {
        CreateUser {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            ai_service_id: ai_service_id.to_string(),
            role_id: None,
            skill_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let db = setup_db().await;
        User::create(&db, &new_user("ada@example.com", "aaaaaaaaaaaaaaaa"))
            .await
            .unwrap();

        let err = User::create(&db, &new_user("ada@example.com", "bbbbbbbbbbbbbbbb"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail));
    }

    #[tokio::test]
    async fn create_attaches_role_and_skills() {
        let db = setup_db().await;
        let role = Role::create(
            &db,
            &CreateRole {
                name: "Backend".to_string(),
                description: "APIs".to_string(),
            },
        )
        .await
        .unwrap();
        let skill = Skill::create(
            &db,
            &CreateSkill {
                name: "Rust".to_string(),
                description: "Systems".to_string(),
            },
        )
        .await
        .unwrap();

        let mut data = new_user("grace@example.com", "cccccccccccccccc");
        data.role_id = Some(role.id);
        data.skill_ids = vec![skill.id];
        let user = User::create(&db, &data).await.unwrap();

        assert_eq!(User::role(&db, user.id).await.unwrap().unwrap().name, "Backend");
        let skills = User::skills(&db, user.id).await.unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].id, skill.id);

        let cleared = User::set_role(&db, user.id, None).await.unwrap();
        assert!(cleared.is_none());
        assert!(User::role(&db, user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_skill_is_idempotent_and_remove_detaches() {
        let db = setup_db().await;
        let user = User::create(&db, &new_user("linus@example.com", "dddddddddddddddd"))
            .await
            .unwrap();
        let skill = Skill::create(
            &db,
            &CreateSkill {
                name: "C".to_string(),
                description: "Kernels".to_string(),
            },
        )
        .await
        .unwrap();

        User::add_skill(&db, user.id, skill.id).await.unwrap();
        User::add_skill(&db, user.id, skill.id).await.unwrap();
        assert_eq!(User::skills(&db, user.id).await.unwrap().len(), 1);

        assert_eq!(User::remove_skill(&db, user.id, skill.id).await.unwrap(), 1);
        assert!(User::skills(&db, user.id).await.unwrap().is_empty());

        let missing = User::add_skill(&db, user.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, UserError::SkillNotFound));
    }

    #[tokio::test]
    async fn set_experience_blanks_to_none() {
        let db = setup_db().await;
        let user = User::create(&db, &new_user("ken@example.com", "eeeeeeeeeeeeeeee"))
            .await
            .unwrap();

        let updated = User::set_experience(&db, user.id, Some(" 10 years ".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.experience.as_deref(), Some("10 years"));

        let cleared = User::set_experience(&db, user.id, Some("   ".to_string()))
            .await
            .unwrap();
        assert!(cleared.experience.is_none());
    }

    #[tokio::test]
    async fn search_limits_and_excludes() {
        let db = setup_db().await;
        let mut created = Vec::new();
        for idx in 0..7 {
            let ai_id: String = std::iter::repeat_n((b'a' + idx as u8) as char, 16).collect();
            let user = User::create(&db, &new_user(&format!("dev{idx}@team.io"), &ai_id))
                .await
                .unwrap();
            created.push(user);
        }

        let results = User::search(
            &db,
            &UserSearch {
                query: "team.io".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 5);

        let results = User::search(
            &db,
            &UserSearch {
                query: "dev0".to_string(),
                id_not_in: vec![created[0].id],
                not_in_project_id: None,
            },
        )
        .await
        .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_treats_like_wildcards_literally() {
        let db = setup_db().await;
        User::create(&db, &new_user("ann_lee@team.io", "ffffffffffffffff"))
            .await
            .unwrap();
        User::create(&db, &new_user("annxlee@team.io", "gggggggggggggggg"))
            .await
            .unwrap();

        let search = |query: &str| UserSearch {
            query: query.to_string(),
            ..Default::default()
        };

        let results = User::search(&db, &search("ann_")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].email, "ann_lee@team.io");

        assert!(User::search(&db, &search("%")).await.unwrap().is_empty());
        assert!(User::search(&db, &search("\\")).await.unwrap().is_empty());
        assert_eq!(User::search(&db, &search("")).await.unwrap().len(), 2);
    }
}
