use bitebook_import::{server, AppConfig, ImportOutcome, RecipeImporter};
use log::error;
use serde_json::json;
use std::env;
use std::process::ExitCode;

const USAGE: &str = "Usage: bitebook-import serve | bitebook-import <url>";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if command == "serve" {
        return match server::serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    let importer = match RecipeImporter::from_config(&config) {
        Ok(importer) => importer,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (output, code) = match importer.import(command).await {
        ImportOutcome::Recipe(recipe) => (json!(recipe), ExitCode::SUCCESS),
        ImportOutcome::NoRecipeFound => (
            json!({"no_recipe_found": true, "message": bitebook_import::NO_RECIPE_FOUND}),
            ExitCode::SUCCESS,
        ),
        ImportOutcome::Error(failure) => (json!(failure), ExitCode::FAILURE),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(e) => error!("Failed to print result: {e}"),
    }
    code
}
