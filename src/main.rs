/*!
Here we go!
*/
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    Router,
    routing::{get, get_service},
};
use simplelog::{ColorChoice, TerminalMode, TermLogger};
use tower_http::services::fs::ServeDir;

use enroll::config;
use enroll::inter;
use enroll::inter::{dashboard, login, register};

async fn catchall_error_handler(e: std::io::Error) -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Unhandled internal error: {}", &e)
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_cfg = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("enroll")
        .build();
    TermLogger::init(
        enroll::log_level_from_env(),
        log_cfg,
        TerminalMode::Stdout,
        ColorChoice::Auto
    ).unwrap();
    log::info!("Logging started.");

    let config_path = std::env::var("ENROLL_CONFIG")
        .unwrap_or_else(|_| "enroll.toml".to_owned());
    let glob = config::load_configuration(&config_path).await.unwrap();

    inter::init(&glob.template_dir).unwrap();

    let serve_static = get_service(ServeDir::new(&glob.static_dir))
        .handle_error(catchall_error_handler);

    let addr = glob.addr;
    let glob = Arc::new(glob);

    let app = Router::new()
        .route("/", get(inter::home).post(inter::home))
        .route("/home", get(inter::home).post(inter::home))
        .route(
            "/register/admin",
            get(register::admin_form).post(register::admin_submit)
        )
        .route(
            "/register/teacher",
            get(register::teacher_form).post(register::teacher_submit)
        )
        .route(
            "/register/student",
            get(register::student_form).post(register::student_submit)
        )
        .route("/login", get(login::form).post(login::submit))
        .route("/logout", get(login::logout))
        .route("/dashboard/admin", get(dashboard::admin))
        .route("/dashboard/teacher", get(dashboard::teacher))
        .route("/dashboard/student", get(dashboard::student))
        .nest_service("/static", serve_static)
        .layer(Extension(glob));

    log::info!("Listening on {}", &addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
