mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use transcript_equivalency::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
