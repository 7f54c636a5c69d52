mod cli;
mod infra;
mod routes;
mod server;

use survey_bridge::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
