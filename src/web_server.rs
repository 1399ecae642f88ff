use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware, web};
use sqlx::sqlite::SqlitePool;

use crate::config::ServerConfig;
use crate::queue::RunQueue;
use crate::routes;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_BIND_PORT: u16 = 12345;

pub fn build_server(
    server_config: ServerConfig,
    db_pool: Arc<SqlitePool>,
    run_queue: Arc<RunQueue>,
) -> std::io::Result<Server> {
    let db_pool = web::Data::from(db_pool);
    let run_queue = web::Data::from(run_queue);

    let bind_address = server_config
        .bind_address
        .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
    let bind_port = server_config.bind_port.unwrap_or(DEFAULT_BIND_PORT);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(db_pool.clone())
            .app_data(run_queue.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((bind_address.as_str(), bind_port))?
    .run();

    log::info!("Listening on {bind_address}:{bind_port}");
    Ok(server)
}
