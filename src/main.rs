use std::process::exit;

use anyhow::Result;
use clap::Parser;
use netquery::{
    database::Database,
    model::Entity,
    settings::{ServerArgs, Settings},
    web,
};
use tracing::error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = ServerArgs::parse();

    let settings = match Settings::from_file(args.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Problem while loading settings: {e}");
            exit(1);
        }
    };

    let db = match open(&settings, &args) {
        Ok(db) => db,
        Err(e) => {
            error!("Problem while preparing the database: {e:#}");
            exit(1);
        }
    };

    web::serve(db, settings.web.address).await;
}

fn open(settings: &Settings, args: &ServerArgs) -> Result<Database> {
    let db = Database::connect(&settings.database.path)?;
    if let Some(path) = &args.equipment {
        db.import_json(Entity::Equipment, path)?;
    }
    if let Some(path) = &args.pop {
        db.import_json(Entity::Pop, path)?;
    }
    Ok(db)
}
