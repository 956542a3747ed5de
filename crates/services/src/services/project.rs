use std::collections::HashMap;

use db::{
    DatabaseConnection, DbErr, TransactionTrait,
    models::{
        project::{CreateProject, Project, ProjectError},
        todo::{CreateTodo, Todo, TodoError},
        user::{User, UserError},
    },
    types::{TodoPriority, TodoStatus},
};
use thiserror::Error;
use uuid::Uuid;

use super::{
    ai_service::{
        AiServiceClient, AiServiceError, AnalyzeDocument, Graph, TasksByPerson, TeamDetails,
        TeamMemberDetails, generate_ai_service_id,
    },
    graph::relabel_graph,
};

const UNASSIGNED_ROLE: &str = "Unassigned";

#[derive(Debug, Error)]
pub enum ProjectServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("At least one document is required")]
    MissingDocuments,
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Todo(#[from] TodoError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    AiService(#[from] AiServiceError),
}

#[derive(Debug, Clone)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: String,
    pub member_ids: Vec<Uuid>,
    pub documents: Vec<AnalyzeDocument>,
}

#[derive(Clone)]
pub struct ProjectService {
    ai: AiServiceClient,
}

impl ProjectService {
    pub fn new(ai: AiServiceClient) -> Self {
        Self { ai }
    }

    pub fn ai(&self) -> &AiServiceClient {
        &self.ai
    }

    /// Creates the project with the creator and the invited users as members,
    /// sends the documents and team to the AI service and imports the tasks
    /// it hands back. The project is removed again when the AI service fails.
    pub async fn create_with_analysis(
        &self,
        db: &DatabaseConnection,
        creator: &User,
        request: CreateProjectRequest,
    ) -> Result<(Project, Vec<Todo>), ProjectServiceError> {
        if request.name.trim().is_empty() {
            return Err(ProjectServiceError::Validation(
                "Project name is required".to_string(),
            ));
        }
        if request.documents.is_empty() {
            return Err(ProjectServiceError::MissingDocuments);
        }

        let workspace_id = generate_ai_service_id();
        let tx = db.begin().await?;
        let project = Project::create(
            &tx,
            &CreateProject {
                name: request.name.clone(),
                description: request.description.clone(),
                ai_service_id: workspace_id.clone(),
            },
        )
        .await?;
        let mut member_ids = vec![creator.id];
        member_ids.extend(request.member_ids.iter().copied());
        Project::add_members(&tx, project.id, &member_ids).await?;
        let team = build_team_details(&tx, project.id).await?;
        tx.commit().await?;

        tracing::info!(
            project_id = %project.id,
            workspace_id = %workspace_id,
            members = team.team_members.len(),
            documents = request.documents.len(),
            "project created, requesting analysis"
        );

        match self.analyze_and_import(db, &project, &team, request.documents).await {
            Ok(todos) => Ok((project, todos)),
            Err(err) => {
                tracing::warn!(project_id = %project.id, error = %err, "analysis failed, removing project");
                if let Err(cleanup) = Project::delete(db, project.id).await {
                    tracing::error!(project_id = %project.id, error = %cleanup, "failed to remove project");
                }
                Err(err)
            }
        }
    }

    async fn analyze_and_import(
        &self,
        db: &DatabaseConnection,
        project: &Project,
        team: &TeamDetails,
        documents: Vec<AnalyzeDocument>,
    ) -> Result<Vec<Todo>, ProjectServiceError> {
        let response = self
            .ai
            .analyze(&project.ai_service_id, team, documents)
            .await?;
        let raw = serde_json::to_string(&response).map_err(|e| DbErr::Custom(e.to_string()))?;
        Project::set_analyze_response(db, project.id, Some(raw)).await?;

        let tasks = self.ai.tasks(&project.ai_service_id).await?;
        import_tasks(db, project, tasks).await
    }

    /// Imports AI tasks not yet present in the project.
    pub async fn sync_tasks(
        &self,
        db: &DatabaseConnection,
        project: &Project,
    ) -> Result<Vec<Todo>, ProjectServiceError> {
        let tasks = self.ai.tasks(&project.ai_service_id).await?;
        let created = import_tasks(db, project, tasks).await?;
        tracing::info!(project_id = %project.id, created = created.len(), "tasks synced");
        Ok(created)
    }

    /// Relationship graph with readable labels, or an empty graph when the AI
    /// service cannot provide one.
    pub async fn graph(
        &self,
        db: &DatabaseConnection,
        project: &Project,
    ) -> Result<Graph, ProjectServiceError> {
        let mut graph = match self.ai.graph(&project.ai_service_id).await {
            Ok(graph) => graph,
            Err(err) => {
                tracing::warn!(project_id = %project.id, error = %err, "graph unavailable");
                return Ok(Graph::default());
            }
        };
        let members = Project::members(db, project.id).await?;
        relabel_graph(&mut graph, &project.ai_service_id, &project.name, &members);
        Ok(graph)
    }
}

/// `team_details` payload for every member of the project.
pub async fn build_team_details<C: db::ConnectionTrait>(
    db: &C,
    project_id: Uuid,
) -> Result<TeamDetails, ProjectServiceError> {
    let mut team = TeamDetails::default();
    for member in Project::members(db, project_id).await? {
        let role = User::role(db, member.id).await?;
        let skills = User::skills(db, member.id).await?;
        team.team_members.insert(
            member.ai_service_id.clone(),
            TeamMemberDetails {
                current_role: role
                    .map(|role| role.name)
                    .unwrap_or_else(|| UNASSIGNED_ROLE.to_string()),
                skills: skills.into_iter().map(|skill| skill.name).collect(),
                experience: member.experience.clone().unwrap_or_default(),
            },
        );
    }
    Ok(team)
}

/// Turns the AI task list into todos in a single transaction. Persons are
/// matched to members by AI-service id; tasks whose node id is already
/// imported are skipped.
pub async fn import_tasks(
    db: &DatabaseConnection,
    project: &Project,
    tasks: TasksByPerson,
) -> Result<Vec<Todo>, ProjectServiceError> {
    let tx = db.begin().await?;
    let members: HashMap<String, Uuid> = Project::members(&tx, project.id)
        .await?
        .into_iter()
        .map(|member| (member.ai_service_id, member.id))
        .collect();
    let mut seen = Todo::ai_node_ids_for_project(&tx, project.id).await?;

    let mut created = Vec::new();
    for (person, person_tasks) in tasks {
        let Some(user_id) = members.get(&person).copied() else {
            tracing::warn!(project_id = %project.id, person = %person, "no member for AI person, skipping tasks");
            continue;
        };
        for task in person_tasks {
            if !seen.insert(task.node_id) {
                continue;
            }
            let raw = serde_json::to_value(&task).map_err(|e| DbErr::Custom(e.to_string()))?;
            let todo = Todo::create(
                &tx,
                project.id,
                &CreateTodo {
                    name: task.task.clone(),
                    role: task.role.clone(),
                    user_id,
                    status: TodoStatus::from_ai_label(task.status.as_deref()),
                    priority: TodoPriority::from_ai_label(task.priority.as_deref()),
                    raw: Some(raw),
                    ai_node_id: Some(task.node_id),
                },
            )
            .await?;
            created.push(todo);
        }
    }
    tx.commit().await?;
    Ok(created)
}
