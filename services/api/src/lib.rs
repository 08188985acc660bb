mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use admission_flow::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
