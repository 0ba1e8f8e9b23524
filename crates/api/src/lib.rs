pub mod auth;
pub mod config;
pub mod error;
pub mod otp;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::ApiError;
pub use state::AppState;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))
        // Auth routes
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/verify", post(routes::auth::verify))
        .route("/auth/dev-login", post(routes::auth::dev_login))
        // Public schedule and shift listings
        .route("/schedules", get(routes::schedules::list_schedules))
        .route("/shifts/available", get(routes::shifts::list_available))
        // Booking routes
        .route(
            "/bookings",
            post(routes::bookings::create_booking),
        )
        .route("/bookings/my", get(routes::bookings::my_bookings))
        .route("/bookings/:id", delete(routes::bookings::cancel_booking))
        .route("/bookings/:id/checkin", post(routes::bookings::check_in))
        .route(
            "/bookings/:id/attendance",
            post(routes::bookings::mark_attendance),
        )
        // Report routes
        .route(
            "/bookings/:id/report",
            post(routes::reports::create_shift_report),
        )
        .route(
            "/reports/off-shift",
            post(routes::reports::create_off_shift_report),
        )
        // Push subscription routes
        .route("/push/subscribe", post(routes::push::subscribe))
        .route("/push/subscribe/:endpoint", delete(routes::push::unsubscribe))
        .route("/push/vapid-public-key", get(routes::push::vapid_public_key))
        // Admin: schedules
        .route(
            "/api/admin/schedules",
            get(routes::admin_schedules::list_schedules)
                .post(routes::admin_schedules::create_schedule),
        )
        .route(
            "/api/admin/schedules/:id",
            get(routes::admin_schedules::get_schedule)
                .put(routes::admin_schedules::update_schedule)
                .delete(routes::admin_schedules::delete_schedule),
        )
        // Admin: users
        .route(
            "/api/admin/users",
            get(routes::admin_users::list_users).post(routes::admin_users::create_user),
        )
        .route(
            "/api/admin/users/:id",
            get(routes::admin_users::get_user)
                .put(routes::admin_users::update_user)
                .delete(routes::admin_users::delete_user),
        )
        // Admin: bookings and the raw slot stream
        .route(
            "/api/admin/bookings",
            get(routes::admin_bookings::list_bookings).post(routes::admin_bookings::assign_booking),
        )
        .route(
            "/api/admin/bookings/:id",
            delete(routes::admin_bookings::cancel_booking),
        )
        .route("/api/admin/slots", get(routes::shifts::list_all_admin))
        // Admin: recurring assignments
        .route(
            "/api/admin/recurring-assignments",
            get(routes::admin_assignments::list_assignments)
                .post(routes::admin_assignments::create_assignment),
        )
        .route(
            "/api/admin/recurring-assignments/:id",
            axum::routing::patch(routes::admin_assignments::set_assignment_active)
                .delete(routes::admin_assignments::delete_assignment),
        )
        // Admin: reports
        .route("/api/admin/reports", get(routes::admin_reports::list_reports))
        .route(
            "/api/admin/reports/stats",
            get(routes::admin_reports::report_stats),
        )
        .route(
            "/api/admin/reports/:id/archive",
            post(routes::admin_reports::archive_report),
        )
        .route(
            "/api/admin/reports/:id/unarchive",
            post(routes::admin_reports::unarchive_report),
        )
        // Admin: broadcasts
        .route(
            "/api/admin/broadcasts",
            get(routes::admin_broadcasts::list_broadcasts)
                .post(routes::admin_broadcasts::create_broadcast),
        )
        // Admin: dashboard
        .route("/api/admin/dashboard", get(routes::dashboard::get_metrics))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
