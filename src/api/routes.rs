//! API route configuration.
//!
//! Every route here sits behind bearer authentication and the `member` role
//! check, see [`crate::api::middleware`].

use crate::api::handlers::{entries, github, habits, imports, tags, users};
use crate::application::services::import_service::MAX_IMPORT_FILE_BYTES;
use crate::state::AppState;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};

/// Room for multipart boundaries and part headers around the CSV file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// All API routes.
///
/// # Endpoints
///
/// - `GET/POST /habits`, `GET/PUT/DELETE /habits/{id}`
/// - `PUT /habits/{id}/tags`, `DELETE /habits/{id}/tags/{tagId}`
/// - `GET/POST /tags`, `GET/PUT/DELETE /tags/{id}`
/// - `GET/POST /entries`, `GET/PUT/DELETE /entries/{id}`
/// - `GET /entries/stats`, `POST /entries/batch`
/// - `PUT /entries/{id}/archive`, `PUT /entries/{id}/un-archive`
/// - `GET/POST /entries/imports`, `GET /entries/imports/{id}`
/// - `GET /users/me`, `GET /users/{id}`, `PUT /users/me/profile`
/// - `PUT/DELETE /github/personal-access-token`
/// - `GET /github/profile`, `GET /github/events`
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/habits",
            get(habits::list_habits_handler).post(habits::create_habit_handler),
        )
        .route(
            "/habits/{id}",
            get(habits::get_habit_handler)
                .put(habits::update_habit_handler)
                .delete(habits::delete_habit_handler),
        )
        .route("/habits/{id}/tags", put(habits::upsert_habit_tags_handler))
        .route(
            "/habits/{id}/tags/{tag_id}",
            delete(habits::remove_habit_tag_handler),
        )
        .route(
            "/tags",
            get(tags::list_tags_handler).post(tags::create_tag_handler),
        )
        .route(
            "/tags/{id}",
            get(tags::get_tag_handler)
                .put(tags::update_tag_handler)
                .delete(tags::delete_tag_handler),
        )
        .route(
            "/entries",
            get(entries::list_entries_handler).post(entries::create_entry_handler),
        )
        .route("/entries/stats", get(entries::entry_stats_handler))
        .route("/entries/batch", post(entries::create_entry_batch_handler))
        .route(
            "/entries/imports",
            get(imports::list_imports_handler)
                .post(imports::create_import_handler)
                .layer(DefaultBodyLimit::max(
                    MAX_IMPORT_FILE_BYTES + MULTIPART_OVERHEAD_BYTES,
                )),
        )
        .route("/entries/imports/{id}", get(imports::get_import_handler))
        .route(
            "/entries/{id}",
            get(entries::get_entry_handler)
                .put(entries::update_entry_handler)
                .delete(entries::delete_entry_handler),
        )
        .route("/entries/{id}/archive", put(entries::archive_entry_handler))
        .route(
            "/entries/{id}/un-archive",
            put(entries::unarchive_entry_handler),
        )
        .route("/users/me", get(users::me_handler))
        .route("/users/me/profile", put(users::update_profile_handler))
        .route("/users/{id}", get(users::get_user_handler))
        .route(
            "/github/personal-access-token",
            put(github::store_token_handler).delete(github::revoke_token_handler),
        )
        .route("/github/profile", get(github::github_profile_handler))
        .route("/github/events", get(github::github_events_handler))
}
