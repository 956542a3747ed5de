use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let decls: Vec<String> = vec![
        utils::response::ApiResponse::<()>::decl(),
        db::types::TodoStatus::decl(),
        db::types::TodoPriority::decl(),
        db::models::user::User::decl(),
        db::models::user::UserSearch::decl(),
        db::models::user::UserSearchResult::decl(),
        db::models::role::Role::decl(),
        db::models::role::CreateRole::decl(),
        db::models::skill::Skill::decl(),
        db::models::skill::CreateSkill::decl(),
        db::models::project::Project::decl(),
        db::models::project::UpdateProject::decl(),
        db::models::todo::Todo::decl(),
        db::models::todo::TodoWithAssignee::decl(),
        db::models::todo::CreateTodo::decl(),
        services::services::auth::RegisterRequest::decl(),
        services::services::auth::LoginRequest::decl(),
        services::services::ai_service::Graph::decl(),
        services::services::ai_service::GraphNode::decl(),
        services::services::ai_service::GraphEdge::decl(),
        server::routes::settings::AddSkillRequest::decl(),
        server::routes::settings::SetRoleRequest::decl(),
        server::routes::settings::UserInfo::decl(),
        server::routes::projects::CreateProjectResponse::decl(),
        server::routes::projects::InviteMembers::decl(),
        server::routes::projects::ToggleAllTodos::decl(),
        server::routes::todos::SetTodoStatus::decl(),
        server::routes::todos::SetTodoPriority::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|decl| {
            let trimmed = decl.trim_start();
            if trimmed.starts_with("export") {
                decl
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "// This file was generated by `cargo run --bin generate_types`.\n// Do not edit it by hand.\n\n{body}\n"
    )
}

fn main() {
    let check_mode = env::args().any(|arg| arg == "--check");
    let shared_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        let current = fs::read_to_string(&types_path).unwrap_or_default();
        if current == generated {
            println!("shared/types.ts is up to date.");
            return;
        }
        eprintln!("shared/types.ts is out of date. Run `cargo run --bin generate_types`.");
        std::process::exit(1);
    }

    if let Err(e) = fs::create_dir_all(&shared_path) {
        eprintln!("Failed to create {}: {e}", shared_path.display());
        std::process::exit(1);
    }
    if let Err(e) = fs::write(&types_path, generated) {
        eprintln!("Failed to write {}: {e}", types_path.display());
        std::process::exit(1);
    }
    println!("Wrote {}", types_path.display());
}
