pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::admin;
use crate::auth::handlers as auth;
use crate::auth::middleware::{authenticate, require_admin, require_manager};
use crate::industries::handlers as industries;
use crate::learning::handlers as learning;
use crate::pitches::handlers as pitches;
use crate::rate_limit::{limit_api, limit_auth};
use crate::state::AppState;
use crate::storage::MAX_AUDIO_BYTES;
use crate::team::handlers as team;
use crate::training::handlers as training;
use crate::users::handlers as users;

/// Multipart framing and text fields on top of the audio payload.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Public, behind the stricter per-IP quota
    let public_auth = Router::new()
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_auth));

    // team_lead, admin
    let team_routes = Router::new()
        .route("/team", get(team::handle_get_team))
        .route("/team/analytics", get(team::handle_team_analytics))
        .route("/team/members/:id/pitches", get(team::handle_member_pitches))
        .route_layer(middleware::from_fn(require_manager));

    // admin
    let admin_routes = Router::new()
        .route("/admin/stats", get(admin::stats::handle_platform_stats))
        .route("/admin/users", get(admin::users::handle_list_users))
        .route(
            "/admin/users/:id",
            delete(admin::users::handle_delete_user),
        )
        .route("/admin/users/:id/role", put(admin::users::handle_update_role))
        .route("/admin/users/:id/team", put(admin::users::handle_update_team))
        .route(
            "/admin/teams",
            get(admin::catalog::handle_list_teams).post(admin::catalog::handle_create_team),
        )
        .route(
            "/admin/teams/:id",
            put(admin::catalog::handle_update_team).delete(admin::catalog::handle_delete_team),
        )
        .route("/admin/industries", post(industries::handle_create_industry))
        .route(
            "/admin/industries/:id",
            put(industries::handle_update_industry).delete(industries::handle_delete_industry),
        )
        .route(
            "/admin/learning/modules",
            post(admin::catalog::handle_create_module),
        )
        .route(
            "/admin/learning/modules/:id",
            put(admin::catalog::handle_update_module).delete(admin::catalog::handle_delete_module),
        )
        .route(
            "/admin/skills",
            get(admin::catalog::handle_list_skills).post(admin::catalog::handle_create_skill),
        )
        .route_layer(middleware::from_fn(require_admin));

    // Any authenticated role
    let protected = Router::new()
        .route("/auth/me", get(auth::handle_me))
        // Pitches
        .route(
            "/pitches",
            get(pitches::handle_list_pitches).post(pitches::handle_create_pitch),
        )
        .route("/pitches/stats", get(pitches::handle_pitch_stats))
        .route(
            "/pitches/audio",
            post(pitches::handle_upload_audio_pitch)
                .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES + MULTIPART_OVERHEAD)),
        )
        .route(
            "/pitches/:id",
            get(pitches::handle_get_pitch).delete(pitches::handle_delete_pitch),
        )
        // Role-play training
        .route(
            "/training/sessions",
            get(training::handle_list_sessions).post(training::handle_create_session),
        )
        .route("/training/sessions/:id", get(training::handle_get_session))
        .route(
            "/training/sessions/:id/messages",
            post(training::handle_send_message),
        )
        .route(
            "/training/sessions/:id/complete",
            post(training::handle_complete_session),
        )
        // Learning
        .route("/learning/modules", get(learning::handle_list_modules))
        .route("/learning/modules/:id", get(learning::handle_get_module))
        .route(
            "/learning/modules/:id/progress",
            put(learning::handle_update_progress),
        )
        .route("/learning/progress", get(learning::handle_progress_overview))
        // Industries
        .route("/industries", get(industries::handle_list_industries))
        .route("/industries/:id", get(industries::handle_get_industry))
        // Own profile
        .route(
            "/user/profile",
            get(users::handle_get_profile).put(users::handle_update_profile),
        )
        .route("/user/password", put(users::handle_change_password))
        .route("/user/stats", get(users::handle_user_stats))
        .route("/user/skills", get(users::handle_user_skills))
        .merge(team_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    let api = public_auth
        .merge(protected)
        .layer(middleware::from_fn_with_state(state.clone(), limit_api));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api", api)
        .with_state(state)
}
